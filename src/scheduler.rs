//! The ordered driver.
//!
//! The host pass infrastructure can only express analysis dependencies, not
//! transform-to-transform ordering, so the order these transformations need
//! is written out by hand as one fixed total order. Each stage's comment
//! below states the structural precondition it assumes.

use crate::config::{EffectiveConfig, ObfuscationOptions};
use crate::core::{ObfRng, RunStats, RunTimer, StageRecord, StageScope};
use crate::ir::Module;
use crate::markers;
use crate::passes::{PassKind, TransformPass};

/// Drives the fixed obfuscation pipeline over whole modules.
///
/// Construction resolves the effective configuration (the one environment
/// read) and seeds the shared generator; flags never change mid-run.
pub struct ObfuscationScheduler {
    cfg: EffectiveConfig,
    rng: ObfRng,
    stats: RunStats,
}

impl ObfuscationScheduler {
    pub fn new(options: &ObfuscationOptions) -> Self {
        Self::with_config(EffectiveConfig::resolve(options))
    }

    /// Entry for pipeline registration and tests: takes an already-resolved
    /// configuration, bypassing the environment.
    pub fn with_config(cfg: EffectiveConfig) -> Self {
        let rng = ObfRng::from_seed_option(cfg.seed);
        Self { cfg, rng, stats: RunStats::default() }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.cfg
    }

    /// Ordered application log of the most recent run.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Applies the whole pipeline to one module. Returns whether anything
    /// changed, which callers use to decide whether cached analyses survive.
    pub fn run_on_module(&mut self, module: &mut Module) -> bool {
        if !self.cfg.ir_obfuscation {
            // normal path, not an error: the top-level switch is off and the
            // scheduler performs zero work
            return false;
        }
        // every run starts from a fresh generator and an empty log, so a
        // scheduler instance is reusable across modules
        self.rng = ObfRng::from_seed_option(self.cfg.seed);
        self.stats.clear();
        let timer = RunTimer::start();
        log::info!("Running obfuscation on {}", module.name);
        let mut changed = false;

        // 1. Anti-hooking first: its entry instrumentation must land before
        //    any other stage disturbs the functions it checks.
        changed |= self.module_stage(PassKind::AntiHooking, module);

        // 2. Anti-class-dump is metadata-level and precedes every
        //    control-flow transform. The one stage whose construction is
        //    gated at the call site.
        if self.cfg.flag(PassKind::AntiClassDump) {
            changed |= self.module_stage(PassKind::AntiClassDump, module);
        }

        // 3. Call-site obfuscation before the body transforms, so rewritten
        //    call sites are themselves flattened and substituted.
        changed |= self.function_stage(PassKind::FunctionCallObfuscate, module);

        // 4. Anti-debugging instrumentation.
        changed |= self.module_stage(PassKind::AntiDebugging, module);

        // 5. String encryption before constant encryption and before the
        //    structural transforms: literals are already opaque when control
        //    flow is reshaped.
        changed |= self.module_stage(PassKind::StringEncryption, module);

        // 6. The four body transforms in this exact nested order, one
        //    function at a time: split creates the block granularity
        //    bogus-edge insertion wants; flattening subsumes the bogus edges
        //    under its dispatcher; substitution only rewrites
        //    instruction-local semantics and goes last.
        for idx in 0..module.functions.len() {
            if module.functions[idx].is_declaration() {
                continue;
            }
            changed |= self.apply_to_function(PassKind::SplitBasicBlock, module, idx);
            changed |= self.apply_to_function(PassKind::BogusControlFlow, module, idx);
            changed |= self.apply_to_function(PassKind::Flattening, module, idx);
            changed |= self.apply_to_function(PassKind::Substitution, module, idx);
        }

        // 7. Constant encryption after the body transforms so the fresh
        //    decode instructions are not re-split.
        changed |= self.module_stage(PassKind::ConstantEncryption, module);

        log::debug!("Doing post-run cleanup");

        // 8/9. Control-transfer finalization: both must see the final block
        //      and function structure.
        changed |= self.function_stage(PassKind::IndirectBranch, module);
        changed |= self.module_stage(PassKind::FunctionWrapper, module);

        // 10. Markers are build-time signaling only; nothing carrying the
        //     reserved prefix may survive into the artifact.
        changed |= markers::purge(module);

        log::info!("Obfuscation finished for {}", module.name);
        log::info!("Spend time: {:.7}s", timer.elapsed_secs());
        changed
    }

    fn module_stage(&mut self, kind: PassKind, module: &mut Module) -> bool {
        let pass = TransformPass::construct(kind, self.cfg.flag(kind));
        let changed = pass.run_on_module(module, &mut self.rng);
        self.stats.record(StageRecord {
            kind: pass.kind(),
            scope: StageScope::Module,
            function: None,
            enabled: pass.enabled(),
            changed,
        });
        changed
    }

    fn function_stage(&mut self, kind: PassKind, module: &mut Module) -> bool {
        let mut changed = false;
        for idx in 0..module.functions.len() {
            if module.functions[idx].is_declaration() {
                continue;
            }
            changed |= self.apply_to_function(kind, module, idx);
        }
        changed
    }

    fn apply_to_function(&mut self, kind: PassKind, module: &mut Module, idx: usize) -> bool {
        let pass = TransformPass::construct(kind, self.cfg.flag(kind));
        let function = module.functions[idx].name.clone();
        let changed = pass.run_on_function(module, idx, &mut self.rng);
        self.stats.record(StageRecord {
            kind: pass.kind(),
            scope: StageScope::Function,
            function: Some(function),
            enabled: pass.enabled(),
            changed,
        });
        changed
    }
}
