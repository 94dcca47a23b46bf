//! Marker declarations: reserved-name signaling between stages.
//!
//! An external annotation-lowering stage introduces function declarations
//! carrying the reserved prefix; calls to them encode per-call-site
//! configuration for the call-site obfuscation stage. Markers are build-time
//! constructs only: after a run, neither a marker declaration nor any
//! instruction referencing one may remain in the module.

use crate::ir::Module;

/// Reserved name prefix for marker declarations.
pub const MARKER_PREFIX: &str = "hikari_";

pub fn is_marker(name: &str) -> bool {
    name.starts_with(MARKER_PREFIX)
}

/// Deletes every marker declaration together with every instruction that
/// references one. Two-phase: collect the doomed declarations first, then
/// strip references, then drop the declarations themselves, so references
/// never outlive their definition and no container is mutated while it is
/// being iterated. Absence of any marker is a no-op.
pub fn purge(module: &mut Module) -> bool {
    let doomed: Vec<String> = module
        .functions
        .iter()
        .filter(|f| f.is_declaration() && is_marker(&f.name))
        .map(|f| f.name.clone())
        .collect();
    if doomed.is_empty() {
        return false;
    }

    for func in module.definitions_mut() {
        for block in &mut func.blocks {
            block
                .insts
                .retain(|inst| !doomed.iter().any(|name| inst.references_func(name)));
        }
    }
    module
        .functions
        .retain(|f| !(f.is_declaration() && is_marker(&f.name)));
    true
}
