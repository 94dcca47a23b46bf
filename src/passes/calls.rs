//! Call-site obfuscation and function wrapping.

use std::collections::HashSet;

use crate::core::ObfRng;
use crate::ir::{Block, Function, Global, GlobalInit, Inst, Module, Opcode, Operand};
use crate::markers;

/// Prefix for runtime helper symbols the units synthesize. Distinct from the
/// marker prefix, so the marker purge can never collect a helper.
pub(super) const RUNTIME_PREFIX: &str = "__veil_";

/// Routes direct calls to external functions through a runtime
/// symbol-resolution helper, consuming per-site marker configuration on the
/// way. A marker call's immediate operand configures the sites that follow it
/// in the same block (bit 0 set leaves a site direct). Runs before the body
/// transforms so the rewritten call sites are themselves flattened and
/// substituted.
pub(super) fn function_call_obfuscate(module: &mut Module, func_idx: usize) -> bool {
    let external: HashSet<String> = module
        .functions
        .iter()
        .filter(|f| {
            f.is_declaration() && !markers::is_marker(&f.name) && !f.name.starts_with(RUNTIME_PREFIX)
        })
        .map(|f| f.name.clone())
        .collect();

    let mut sym_globals = Vec::new();
    let mut changed = false;
    {
        let func = &mut module.functions[func_idx];
        let func_name = func.name.clone();
        let mut counter = 0usize;
        for block in &mut func.blocks {
            let mut site_config: i64 = 0;
            for inst in &mut block.insts {
                if inst.op != Opcode::Call {
                    continue;
                }
                let Some(Operand::Func(callee)) = inst.operands.first() else {
                    continue;
                };
                if markers::is_marker(callee) {
                    // purge removes the marker call later; only its config
                    // word matters here
                    if let Some(Operand::Imm(cfg)) = inst.operands.get(1) {
                        site_config = *cfg;
                    }
                    continue;
                }
                if !external.contains(callee.as_str()) || site_config & 1 == 1 {
                    continue;
                }
                let sym_name = format!("fco.{func_name}.{counter}");
                counter += 1;
                sym_globals.push(Global {
                    name: sym_name.clone(),
                    init: GlobalInit::Str(callee.clone()),
                });
                inst.operands[0] = Operand::Func(format!("{RUNTIME_PREFIX}dlsym"));
                inst.operands.insert(1, Operand::Global(sym_name));
                changed = true;
            }
        }
    }

    if changed {
        for global in sym_globals {
            module.add_global(global);
        }
        module.declare("__veil_dlsym");
    }
    changed
}

/// Hides RNG-chosen definitions behind forwarding wrappers and retargets
/// every call site at the wrapper. Runs last of all transforms: it must see
/// the final function set.
pub(super) fn function_wrapper(module: &mut Module, rng: &mut ObfRng) -> bool {
    let candidates: Vec<usize> = module
        .functions
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_declaration() && !f.name.starts_with(RUNTIME_PREFIX))
        .map(|(idx, _)| idx)
        .collect();

    let mut wrappers: Vec<Function> = Vec::new();
    let mut retargets: Vec<(String, String)> = Vec::new();
    for idx in candidates {
        if !rng.gen_bool() {
            continue;
        }
        let orig = &module.functions[idx];
        let wrapper_name = format!("{}.wrap", orig.name);
        if module.find_function(&wrapper_name).is_some() {
            continue;
        }
        let params = orig.params.clone();
        let mut call_operands = vec![Operand::Func(orig.name.clone())];
        call_operands.extend(params.iter().map(|p| Operand::Value(p.clone())));
        let body = Block {
            name: "entry".to_string(),
            insts: vec![
                Inst::new(Some("fw.ret".to_string()), Opcode::Call, call_operands),
                Inst::new(None, Opcode::Ret, vec![Operand::Value("fw.ret".to_string())]),
            ],
        };
        retargets.push((orig.name.clone(), wrapper_name.clone()));
        wrappers.push(Function { name: wrapper_name, params, blocks: vec![body] });
    }
    if retargets.is_empty() {
        return false;
    }

    // retarget existing call sites before the wrappers join the module, so a
    // wrapper's own forwarding call is never rewritten
    for func in module.definitions_mut() {
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                if inst.op != Opcode::Call {
                    continue;
                }
                let Some(Operand::Func(callee)) = inst.operands.first_mut() else {
                    continue;
                };
                if let Some((_, wrapper)) = retargets.iter().find(|(orig, _)| orig == callee) {
                    *callee = wrapper.clone();
                }
            }
        }
    }
    module.functions.extend(wrappers);
    true
}
