//! Transform units: opaque handles over the transformation kinds.
//!
//! Every unit is constructed per run with its effective enablement baked in.
//! A disabled unit is still safely applicable and guarantees it performs no
//! mutation — the scheduler's control flow is identical regardless of which
//! flags are set; only the unit's own behavior varies.

mod calls;
mod control_flow;
mod encryption;
mod runtime_checks;
mod substitution;

use crate::core::{ObfRng, StageScope};
use crate::ir::Module;

/// The transformation kinds the scheduler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    AntiHooking,
    AntiClassDump,
    FunctionCallObfuscate,
    AntiDebugging,
    StringEncryption,
    SplitBasicBlock,
    BogusControlFlow,
    Flattening,
    Substitution,
    ConstantEncryption,
    IndirectBranch,
    FunctionWrapper,
}

impl PassKind {
    pub const ALL: [PassKind; 12] = [
        PassKind::AntiHooking,
        PassKind::AntiClassDump,
        PassKind::FunctionCallObfuscate,
        PassKind::AntiDebugging,
        PassKind::StringEncryption,
        PassKind::SplitBasicBlock,
        PassKind::BogusControlFlow,
        PassKind::Flattening,
        PassKind::Substitution,
        PassKind::ConstantEncryption,
        PassKind::IndirectBranch,
        PassKind::FunctionWrapper,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            PassKind::AntiHooking => "anti-hooking",
            PassKind::AntiClassDump => "anti-class-dump",
            PassKind::FunctionCallObfuscate => "function-call-obfuscate",
            PassKind::AntiDebugging => "anti-debugging",
            PassKind::StringEncryption => "string-encryption",
            PassKind::SplitBasicBlock => "split-basic-block",
            PassKind::BogusControlFlow => "bogus-control-flow",
            PassKind::Flattening => "flattening",
            PassKind::Substitution => "substitution",
            PassKind::ConstantEncryption => "constant-encryption",
            PassKind::IndirectBranch => "indirect-branch",
            PassKind::FunctionWrapper => "function-wrapper",
        }
    }

    /// Granularity the scheduler applies this kind at.
    pub const fn scope(self) -> StageScope {
        match self {
            PassKind::AntiHooking
            | PassKind::AntiClassDump
            | PassKind::AntiDebugging
            | PassKind::StringEncryption
            | PassKind::ConstantEncryption
            | PassKind::FunctionWrapper => StageScope::Module,
            PassKind::FunctionCallObfuscate
            | PassKind::SplitBasicBlock
            | PassKind::BogusControlFlow
            | PassKind::Flattening
            | PassKind::Substitution
            | PassKind::IndirectBranch => StageScope::Function,
        }
    }
}

/// One constructed transform unit, owned by the scheduler for the duration
/// of a single application.
#[derive(Debug, Clone, Copy)]
pub struct TransformPass {
    kind: PassKind,
    enabled: bool,
}

impl TransformPass {
    pub fn construct(kind: PassKind, enabled: bool) -> Self {
        Self { kind, enabled }
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Applies a whole-module unit. Disabled units return unchanged without
    /// touching the module.
    pub fn run_on_module(&self, module: &mut Module, rng: &mut ObfRng) -> bool {
        if !self.enabled {
            return false;
        }
        debug_assert_eq!(self.kind.scope(), StageScope::Module);
        let changed = match self.kind {
            PassKind::AntiHooking => runtime_checks::anti_hooking(module),
            PassKind::AntiClassDump => runtime_checks::anti_class_dump(module),
            PassKind::AntiDebugging => runtime_checks::anti_debugging(module),
            PassKind::StringEncryption => encryption::string_encryption(module, rng),
            PassKind::ConstantEncryption => encryption::constant_encryption(module, rng),
            PassKind::FunctionWrapper => calls::function_wrapper(module, rng),
            _ => false,
        };
        if changed {
            log::debug!("{} changed module {}", self.kind.name(), module.name);
        }
        changed
    }

    /// Applies a per-function unit to one definition. Disabled units return
    /// unchanged; declarations are never touched.
    pub fn run_on_function(&self, module: &mut Module, func_idx: usize, rng: &mut ObfRng) -> bool {
        if !self.enabled {
            return false;
        }
        debug_assert_eq!(self.kind.scope(), StageScope::Function);
        if module.functions[func_idx].is_declaration() {
            return false;
        }
        let changed = match self.kind {
            PassKind::FunctionCallObfuscate => calls::function_call_obfuscate(module, func_idx),
            PassKind::SplitBasicBlock => {
                control_flow::split_basic_block(&mut module.functions[func_idx], rng)
            }
            PassKind::BogusControlFlow => {
                control_flow::bogus_control_flow(&mut module.functions[func_idx], rng)
            }
            PassKind::Flattening => control_flow::flatten(&mut module.functions[func_idx]),
            PassKind::Substitution => {
                substitution::substitute(&mut module.functions[func_idx], rng)
            }
            PassKind::IndirectBranch => control_flow::indirect_branch(module, func_idx),
            _ => false,
        };
        if changed {
            log::trace!(
                "{} changed function {}",
                self.kind.name(),
                module.functions[func_idx].name
            );
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObfRng;

    #[test]
    fn disabled_unit_never_mutates() {
        let mut module = Module::parse(
            "@msg = \"secret\"\nextern puts\nf(%x) {\nentry:\n  %a = add %x, 1\n  %b = add %a, 2\n  ret %b\n}\n",
        )
        .unwrap();
        let before = module.print();
        let mut rng = ObfRng::seeded(1);
        for kind in PassKind::ALL {
            let pass = TransformPass::construct(kind, false);
            let changed = match kind.scope() {
                StageScope::Module => pass.run_on_module(&mut module, &mut rng),
                StageScope::Function => pass.run_on_function(&mut module, 1, &mut rng),
            };
            assert!(!changed, "{} should be a no-op when disabled", kind.name());
        }
        assert_eq!(module.print(), before);
    }
}
