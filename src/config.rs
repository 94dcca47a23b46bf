//! Enablement directive resolution.
//!
//! Three sources overlap for every transformation: the explicit per-flag
//! directive, the master enable-all directive, and an environment override.
//! They collapse into one immutable [`EffectiveConfig`] computed exactly once
//! at scheduler construction; nothing re-reads flags or the environment
//! mid-run.

use crate::core::DEFAULT_SEED;
use crate::passes::PassKind;

/// Name the scheduler registers under in a pipeline description.
pub const PIPELINE_NAME: &str = "hikari";

pub const FLAG_ANTI_CLASS_DUMP: &str = "enable-acdobf";
pub const FLAG_ANTI_HOOKING: &str = "enable-antihook";
pub const FLAG_ANTI_DEBUGGING: &str = "enable-adb";
pub const FLAG_BOGUS_CONTROL_FLOW: &str = "enable-bcfobf";
pub const FLAG_FLATTENING: &str = "enable-cffobf";
pub const FLAG_SPLIT_BASIC_BLOCK: &str = "enable-splitobf";
pub const FLAG_SUBSTITUTION: &str = "enable-subobf";
pub const FLAG_ENABLE_ALL: &str = "enable-allobf";
pub const FLAG_FUNCTION_CALL_OBFUSCATE: &str = "enable-fco";
pub const FLAG_STRING_ENCRYPTION: &str = "enable-strcry";
pub const FLAG_CONSTANT_ENCRYPTION: &str = "enable-constenc";
pub const FLAG_INDIRECT_BRANCH: &str = "enable-indibran";
pub const FLAG_FUNCTION_WRAPPER: &str = "enable-funcwra";

/// Raw directive set, before resolution. Defaults to everything off with the
/// entropy seed sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationOptions {
    /// Top-level switch; off means the scheduler performs zero work.
    pub ir_obfuscation: bool,
    /// PRNG seed; [`DEFAULT_SEED`] requests entropy self-seeding.
    pub seed: u64,
    pub anti_class_dump: bool,
    pub anti_hooking: bool,
    pub anti_debugging: bool,
    pub bogus_control_flow: bool,
    pub flattening: bool,
    pub split_basic_block: bool,
    pub substitution: bool,
    /// Master directive: forces every effective flag true.
    pub enable_all: bool,
    pub function_call_obfuscate: bool,
    pub string_encryption: bool,
    pub constant_encryption: bool,
    pub indirect_branch: bool,
    pub function_wrapper: bool,
}

impl Default for ObfuscationOptions {
    fn default() -> Self {
        Self {
            ir_obfuscation: false,
            seed: DEFAULT_SEED,
            anti_class_dump: false,
            anti_hooking: false,
            anti_debugging: false,
            bogus_control_flow: false,
            flattening: false,
            split_basic_block: false,
            substitution: false,
            enable_all: false,
            function_call_obfuscate: false,
            string_encryption: false,
            constant_encryption: false,
            indirect_branch: false,
            function_wrapper: false,
        }
    }
}

impl ObfuscationOptions {
    /// Maps a pipeline element name plus its nested sub-element names to a
    /// directive set. Returns `None` when `name` is not ours. Unknown inner
    /// names are ignored; matching the outer name alone turns the top-level
    /// switch on.
    pub fn from_pipeline_element(name: &str, inner: &[&str]) -> Option<Self> {
        if name != PIPELINE_NAME {
            return None;
        }
        let mut opts = Self { ir_obfuscation: true, ..Self::default() };
        for element in inner {
            match *element {
                FLAG_ANTI_CLASS_DUMP => opts.anti_class_dump = true,
                FLAG_ANTI_HOOKING => opts.anti_hooking = true,
                FLAG_ANTI_DEBUGGING => opts.anti_debugging = true,
                FLAG_BOGUS_CONTROL_FLOW => opts.bogus_control_flow = true,
                FLAG_FLATTENING => opts.flattening = true,
                FLAG_SPLIT_BASIC_BLOCK => opts.split_basic_block = true,
                FLAG_SUBSTITUTION => opts.substitution = true,
                FLAG_ENABLE_ALL => opts.enable_all = true,
                FLAG_FUNCTION_CALL_OBFUSCATE => opts.function_call_obfuscate = true,
                FLAG_STRING_ENCRYPTION => opts.string_encryption = true,
                FLAG_CONSTANT_ENCRYPTION => opts.constant_encryption = true,
                FLAG_INDIRECT_BRANCH => opts.indirect_branch = true,
                FLAG_FUNCTION_WRAPPER => opts.function_wrapper = true,
                _ => {}
            }
        }
        Some(opts)
    }
}

/// One effective boolean per transformation, computed once per run.
/// Effective value = explicit OR master OR environment override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub ir_obfuscation: bool,
    pub seed: u64,
    pub anti_class_dump: bool,
    pub anti_hooking: bool,
    pub anti_debugging: bool,
    pub bogus_control_flow: bool,
    pub flattening: bool,
    pub split_basic_block: bool,
    pub substitution: bool,
    pub function_call_obfuscate: bool,
    pub string_encryption: bool,
    pub constant_encryption: bool,
    pub indirect_branch: bool,
    pub function_wrapper: bool,
}

impl EffectiveConfig {
    /// Resolves against the process environment. Called once, at scheduler
    /// construction.
    pub fn resolve(opts: &ObfuscationOptions) -> Self {
        Self::resolve_with(opts, |name| std::env::var_os(name).is_some())
    }

    /// Resolution with an injected environment lookup. Presence of a
    /// variable (any value, including empty) forces that flag true; absence
    /// means no override. Nothing can force a flag false.
    pub fn resolve_with(opts: &ObfuscationOptions, lookup: impl Fn(&str) -> bool) -> Self {
        let master = opts.enable_all || lookup("ALLOBF");
        let on = |explicit: bool, env: &str| explicit || master || lookup(env);
        Self {
            ir_obfuscation: opts.ir_obfuscation,
            seed: opts.seed,
            anti_class_dump: on(opts.anti_class_dump, "ACDOBF"),
            anti_hooking: on(opts.anti_hooking, "ANTIHOOK"),
            anti_debugging: on(opts.anti_debugging, "ADB"),
            bogus_control_flow: on(opts.bogus_control_flow, "BCFOBF"),
            flattening: on(opts.flattening, "CFFOBF"),
            split_basic_block: on(opts.split_basic_block, "SPLITOBF"),
            substitution: on(opts.substitution, "SUBOBF"),
            function_call_obfuscate: on(opts.function_call_obfuscate, "FCO"),
            string_encryption: on(opts.string_encryption, "STRCRY"),
            constant_encryption: on(opts.constant_encryption, "CONSTENC"),
            indirect_branch: on(opts.indirect_branch, "INDIBRAN"),
            // Upstream marks the FUNCWRA environment path broken yet keeps
            // both it and the ordinary flag; both enable paths stay live here.
            function_wrapper: on(opts.function_wrapper, "FUNCWRA"),
        }
    }

    /// Effective flag for one transformation kind.
    pub fn flag(&self, kind: PassKind) -> bool {
        match kind {
            PassKind::AntiHooking => self.anti_hooking,
            PassKind::AntiClassDump => self.anti_class_dump,
            PassKind::FunctionCallObfuscate => self.function_call_obfuscate,
            PassKind::AntiDebugging => self.anti_debugging,
            PassKind::StringEncryption => self.string_encryption,
            PassKind::SplitBasicBlock => self.split_basic_block,
            PassKind::BogusControlFlow => self.bogus_control_flow,
            PassKind::Flattening => self.flattening,
            PassKind::Substitution => self.substitution,
            PassKind::ConstantEncryption => self.constant_encryption,
            PassKind::IndirectBranch => self.indirect_branch,
            PassKind::FunctionWrapper => self.function_wrapper,
        }
    }
}
