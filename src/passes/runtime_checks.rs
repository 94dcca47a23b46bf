//! Whole-module runtime check injection and metadata hardening.

use crate::ir::{Block, Function, GlobalInit, Inst, Module, Opcode, Operand};

use super::calls::RUNTIME_PREFIX;

fn check_call(helper: &str) -> Inst {
    Inst::new(None, Opcode::Call, vec![Operand::Func(helper.to_string())])
}

/// Prepends an integrity-check call to every definition's entry block. Must
/// run before any other stage disturbs the functions it instruments.
pub(super) fn anti_hooking(module: &mut Module) -> bool {
    let helper = format!("{RUNTIME_PREFIX}antihook_check");
    let mut changed = false;
    for func in module.definitions_mut() {
        let Some(entry) = func.entry_block_mut() else {
            continue;
        };
        if entry.insts.first().is_some_and(|inst| inst.calls(&helper)) {
            continue;
        }
        entry.insts.insert(0, check_call(&helper));
        changed = true;
    }
    if changed {
        module.declare(&helper);
    }
    changed
}

/// Ensures the debugger-detection runtime gets initialized: through `main`
/// when the module defines one, otherwise through a synthesized constructor.
pub(super) fn anti_debugging(module: &mut Module) -> bool {
    let helper = format!("{RUNTIME_PREFIX}adb_init");
    let has_main = module
        .find_function("main")
        .is_some_and(|f| !f.is_declaration());

    if has_main {
        let main = match module.find_function_mut("main") {
            Some(main) => main,
            None => return false,
        };
        let Some(entry) = main.entry_block_mut() else {
            return false;
        };
        if entry.insts.first().is_some_and(|inst| inst.calls(&helper)) {
            return false;
        }
        entry.insts.insert(0, check_call(&helper));
    } else {
        if module.find_function("adb.ctor").is_some() {
            return false;
        }
        module.functions.push(Function {
            name: "adb.ctor".to_string(),
            params: Vec::new(),
            blocks: vec![Block {
                name: "entry".to_string(),
                insts: vec![check_call(&helper), Inst::ret()],
            }],
        });
    }
    module.declare(&helper);
    true
}

/// Metadata-level hardening: erases the static initializer of every
/// class-metadata global and synthesizes a runtime initializer that rebuilds
/// them, so nothing structural remains for a dumper to read. Must run early,
/// before any control-flow-level transform touches the module.
pub(super) fn anti_class_dump(module: &mut Module) -> bool {
    if module.find_function("acd.initializer").is_some() {
        return false;
    }
    let doomed: Vec<(String, usize)> = module
        .globals
        .iter()
        .filter(|g| g.name.starts_with("objc_class_") && g.init != GlobalInit::Zero)
        .map(|g| {
            let len = match &g.init {
                GlobalInit::Str(s) => s.len(),
                GlobalInit::Bytes(b) => b.len(),
                GlobalInit::Zero => 0,
            };
            (g.name.clone(), len)
        })
        .collect();
    if doomed.is_empty() {
        return false;
    }

    for global in &mut module.globals {
        if doomed.iter().any(|(name, _)| *name == global.name) {
            global.init = GlobalInit::Zero;
        }
    }

    let mut insts: Vec<Inst> = doomed
        .iter()
        .map(|(name, len)| {
            Inst::new(
                None,
                Opcode::Store,
                vec![Operand::Imm(*len as i64), Operand::Global(name.clone())],
            )
        })
        .collect();
    insts.push(Inst::ret());
    module.functions.push(Function {
        name: "acd.initializer".to_string(),
        params: Vec::new(),
        blocks: vec![Block { name: "entry".to_string(), insts }],
    });
    true
}
