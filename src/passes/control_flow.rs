//! Structural control-flow transforms: block splitting, bogus edges,
//! dispatcher flattening, indirect branches.

use crate::core::ObfRng;
use crate::ir::{Block, Function, Global, GlobalInit, Inst, Module, Opcode, Operand};

/// Splits every block with at least two body instructions at an RNG-chosen
/// point. Runs first in the per-function group: the finer block granularity
/// is what bogus-edge insertion works against.
pub(super) fn split_basic_block(func: &mut Function, rng: &mut ObfRng) -> bool {
    let mut changed = false;
    let mut split_counter = 0usize;
    let mut idx = 0;
    while idx < func.blocks.len() {
        let body_len = func.blocks[idx].body_len();
        if body_len < 2 {
            idx += 1;
            continue;
        }
        let at = 1 + rng.gen_range(body_len - 1);
        let tail_name = format!("{}.split.{}", func.blocks[idx].name, split_counter);
        split_counter += 1;
        let block = &mut func.blocks[idx];
        let tail = block.insts.split_off(at);
        block.insts.push(Inst::br(&tail_name));
        func.blocks.insert(idx + 1, Block { name: tail_name, insts: tail });
        changed = true;
        // the freshly created tail is not split again
        idx += 2;
    }
    changed
}

/// Guards RNG-chosen unconditional edges with an always-false opaque
/// predicate whose taken-on-true side is a junk block. Assumes splitting has
/// already run; flattening later subsumes the new edges under its dispatcher.
pub(super) fn bogus_control_flow(func: &mut Function, rng: &mut ObfRng) -> bool {
    let mut changed = false;
    let mut junk_blocks = Vec::new();
    let mut counter = 0usize;
    for block in &mut func.blocks {
        let is_plain_br = matches!(block.terminator(), Some(t) if t.op == Opcode::Br);
        if !is_plain_br || !rng.gen_bool() {
            continue;
        }
        let Some(Operand::Block(target)) = block.insts.last().and_then(|t| t.operands.first()).cloned()
        else {
            continue;
        };

        let bogus_name = format!("{}.bogus.{}", block.name, counter);
        let opaque = format!("{}.opq.{}", block.name, counter);
        counter += 1;

        // `and x, 0` is always zero, so the false edge (the real target) is
        // the only one ever taken.
        block.insts.pop();
        block.insts.push(Inst::new(
            Some(opaque.clone()),
            Opcode::And,
            vec![Operand::Imm(i64::from(rng.next_u32())), Operand::Imm(0)],
        ));
        block.insts.push(Inst::new(
            None,
            Opcode::CondBr,
            vec![
                Operand::Value(opaque),
                Operand::Block(bogus_name.clone()),
                Operand::Block(target.clone()),
            ],
        ));

        let junk = Inst::new(
            Some(format!("{bogus_name}.junk")),
            Opcode::Xor,
            vec![
                Operand::Imm(i64::from(rng.next_u32())),
                Operand::Imm(i64::from(rng.next_u32())),
            ],
        );
        junk_blocks.push(Block { name: bogus_name, insts: vec![junk, Inst::br(&target)] });
        changed = true;
    }
    func.blocks.extend(junk_blocks);
    changed
}

/// Rewrites unconditional branches to re-enter a prepended dispatcher that
/// switches on a state value. Runs after bogus edges exist so the dispatcher
/// subsumes them; the entry block stays first.
pub(super) fn flatten(func: &mut Function) -> bool {
    if func.blocks.len() < 2 {
        return false;
    }
    let cases: Vec<(String, i64)> = func
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.clone(), i as i64))
        .collect();
    // the input may legally contain a block named "dispatch" already
    let mut dispatch_name = "dispatch".to_string();
    let mut suffix = 0usize;
    while func.blocks.iter().any(|b| b.name == dispatch_name) {
        dispatch_name = format!("dispatch.{suffix}");
        suffix += 1;
    }

    let mut changed = false;
    for block in &mut func.blocks {
        let is_plain_br = matches!(block.terminator(), Some(t) if t.op == Opcode::Br);
        if !is_plain_br {
            continue;
        }
        let Some(Operand::Block(target)) = block.insts.last().and_then(|t| t.operands.first()).cloned()
        else {
            continue;
        };
        let Some(&(_, case)) = cases.iter().find(|(name, _)| *name == target) else {
            continue;
        };
        block.insts.pop();
        block.insts.push(Inst::new(
            None,
            Opcode::Store,
            vec![Operand::Imm(case), Operand::Value("cff.state".to_string())],
        ));
        block.insts.push(Inst::br(&dispatch_name));
        changed = true;
    }

    if changed {
        let mut operands = vec![Operand::Value("cff.state".to_string())];
        for (name, case) in &cases {
            operands.push(Operand::Imm(*case));
            operands.push(Operand::Block(name.clone()));
        }
        let dispatch = Block {
            name: dispatch_name,
            insts: vec![Inst::new(None, Opcode::Switch, operands)],
        };
        func.blocks.insert(1, dispatch);
    }
    changed
}

/// Converts direct branches into table-indexed indirect branches backed by a
/// per-function branch-table global. Runs after the body transforms so the
/// table captures the final block layout.
pub(super) fn indirect_branch(module: &mut Module, func_idx: usize) -> bool {
    let (table_name, table, changed) = {
        let func = &mut module.functions[func_idx];
        let table_name = format!("{}.branch_table", func.name);
        let block_order: Vec<String> = func.blocks.iter().map(|b| b.name.clone()).collect();
        let mut targets: Vec<(String, u8)> = Vec::new();
        let mut changed = false;
        for block in &mut func.blocks {
            let is_plain_br = matches!(block.terminator(), Some(t) if t.op == Opcode::Br);
            if !is_plain_br {
                continue;
            }
            let Some(Operand::Block(target)) =
                block.insts.last().and_then(|t| t.operands.first()).cloned()
            else {
                continue;
            };
            // table entries are byte-sized block positions; targets beyond
            // that range (or not in this function) keep their direct branch
            let Some(position) = block_order
                .iter()
                .position(|b| *b == target)
                .and_then(|p| u8::try_from(p).ok())
            else {
                continue;
            };
            let slot = match targets.iter().position(|(t, _)| *t == target) {
                Some(slot) => slot,
                None => {
                    targets.push((target.clone(), position));
                    targets.len() - 1
                }
            };
            block.insts.pop();
            block.insts.push(Inst::new(
                None,
                Opcode::IndirectBr,
                vec![
                    Operand::Global(table_name.clone()),
                    Operand::Imm(slot as i64),
                    Operand::Block(target),
                ],
            ));
            changed = true;
        }
        let table: Vec<u8> = targets.into_iter().map(|(_, position)| position).collect();
        (table_name, table, changed)
    };

    if changed {
        module.add_global(Global { name: table_name, init: GlobalInit::Bytes(table) });
    }
    changed
}
