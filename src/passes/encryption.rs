//! String and constant encryption over module globals and immediates.

use crate::core::ObfRng;
use crate::ir::{Global, GlobalInit, Inst, Module, Opcode, Operand};

/// XORs every string global with a fresh keystream. The ciphertext replaces
/// the string, the keystream stays behind in a companion `.key` global, and
/// the runtime decryptor declaration is synthesized once. Runs before
/// constant encryption and before the structural transforms, so literal
/// values are already opaque when control flow is reshaped.
pub(super) fn string_encryption(module: &mut Module, rng: &mut ObfRng) -> bool {
    let mut companions = Vec::new();
    let mut changed = false;
    for global in &mut module.globals {
        let GlobalInit::Str(text) = &global.init else {
            continue;
        };
        let plain = text.clone().into_bytes();
        let key: Vec<u8> = plain.iter().map(|_| rng.next_u32() as u8).collect();
        let cipher: Vec<u8> = plain.iter().zip(&key).map(|(p, k)| p ^ k).collect();
        global.init = GlobalInit::Bytes(cipher);
        companions.push(Global {
            name: format!("{}.key", global.name),
            init: GlobalInit::Bytes(key),
        });
        changed = true;
    }
    if changed {
        for companion in companions {
            module.add_global(companion);
        }
        module.declare("__veil_strdec");
    }
    changed
}

/// Replaces RNG-chosen immediate operands `v` with a reference to a freshly
/// inserted `xor (v^k), k` materialization. Terminator operands stay literal
/// (switch case values and branch slots must remain decodable). Runs after
/// the body transforms so the fresh instructions are not themselves re-split.
pub(super) fn constant_encryption(module: &mut Module, rng: &mut ObfRng) -> bool {
    let mut changed = false;
    for func in module.definitions_mut() {
        let mut counter = 0usize;
        for block in &mut func.blocks {
            let mut idx = 0;
            while idx < block.insts.len() {
                let mut picked: Vec<(usize, i64)> = Vec::new();
                if !block.insts[idx].op.is_terminator() {
                    for (slot, operand) in block.insts[idx].operands.iter().enumerate() {
                        if let Operand::Imm(value) = operand {
                            if rng.gen_bool() {
                                picked.push((slot, *value));
                            }
                        }
                    }
                }
                for (slot, value) in picked {
                    let key = rng.next_u64() as i64;
                    let name = format!("cenc.{counter}");
                    counter += 1;
                    block.insts.insert(
                        idx,
                        Inst::new(
                            Some(name.clone()),
                            Opcode::Xor,
                            vec![Operand::Imm(value ^ key), Operand::Imm(key)],
                        ),
                    );
                    idx += 1;
                    block.insts[idx].operands[slot] = Operand::Value(name);
                    changed = true;
                }
                idx += 1;
            }
        }
    }
    changed
}
