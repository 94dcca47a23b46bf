//! Instruction-local rewrites that preserve semantics.

use crate::core::ObfRng;
use crate::ir::{Function, Inst, Opcode, Operand};

/// Rewrites RNG-chosen integer adds into a subtract-of-negation pair:
/// `a + b` becomes `a - (0 - b)`. Only instruction-local semantics change,
/// so this is insensitive to block structure and runs last in the
/// per-function group.
pub(super) fn substitute(func: &mut Function, rng: &mut ObfRng) -> bool {
    let mut changed = false;
    let mut counter = 0usize;
    for block in &mut func.blocks {
        let mut idx = 0;
        while idx < block.insts.len() {
            let inst = &block.insts[idx];
            if inst.op != Opcode::Add || inst.operands.len() != 2 || !rng.gen_bool() {
                idx += 1;
                continue;
            }
            let lhs = inst.operands[0].clone();
            let rhs = inst.operands[1].clone();
            let result = inst.result.clone();
            let neg = format!("sub.neg.{counter}");
            counter += 1;

            block.insts[idx] =
                Inst::new(Some(neg.clone()), Opcode::Sub, vec![Operand::Imm(0), rhs]);
            block.insts.insert(
                idx + 1,
                Inst::new(result, Opcode::Sub, vec![lhs, Operand::Value(neg)]),
            );
            idx += 2;
            changed = true;
        }
    }
    changed
}
