//! Obfuscation driver binary.
//!
//! Reads a textual IR module from a file or stdin, runs the scheduler with
//! the requested enablement directives, and prints the transformed module.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use veil::{Module, ObfuscationOptions, ObfuscationScheduler, DEFAULT_SEED};

#[derive(Parser, Debug)]
#[command(name = "veil", about = "IR obfuscation pass scheduler")]
struct Args {
    /// Input IR file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Enable IR obfuscation (top-level switch)
    #[arg(long = "hikari")]
    hikari: bool,

    /// Seed for the PRNG; the default sentinel self-seeds from entropy
    #[arg(long = "aes-seed", default_value_t = DEFAULT_SEED)]
    aes_seed: u64,

    /// Enable AntiClassDump
    #[arg(long = "enable-acdobf")]
    acdobf: bool,

    /// Enable AntiHooking
    #[arg(long = "enable-antihook")]
    antihook: bool,

    /// Enable AntiDebugging
    #[arg(long = "enable-adb")]
    adb: bool,

    /// Enable BogusControlFlow
    #[arg(long = "enable-bcfobf")]
    bcfobf: bool,

    /// Enable Flattening
    #[arg(long = "enable-cffobf")]
    cffobf: bool,

    /// Enable BasicBlockSplitting
    #[arg(long = "enable-splitobf")]
    splitobf: bool,

    /// Enable Instruction Substitution
    #[arg(long = "enable-subobf")]
    subobf: bool,

    /// Enable All Obfuscation
    #[arg(long = "enable-allobf")]
    allobf: bool,

    /// Enable Function CallSite Obfuscation
    #[arg(long = "enable-fco")]
    fco: bool,

    /// Enable String Encryption
    #[arg(long = "enable-strcry")]
    strcry: bool,

    /// Enable Constant Encryption
    #[arg(long = "enable-constenc")]
    constenc: bool,

    /// Enable Indirect Branching
    #[arg(long = "enable-indibran")]
    indibran: bool,

    /// Enable Function Wrapper
    #[arg(long = "enable-funcwra")]
    funcwra: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (text, name) = match &args.input {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "module".to_string());
            (text, name)
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            (buffer, "stdin".to_string())
        }
    };

    let mut module = match Module::parse(&text) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    module.name = name;

    let options = ObfuscationOptions {
        ir_obfuscation: args.hikari,
        seed: args.aes_seed,
        anti_class_dump: args.acdobf,
        anti_hooking: args.antihook,
        anti_debugging: args.adb,
        bogus_control_flow: args.bcfobf,
        flattening: args.cffobf,
        split_basic_block: args.splitobf,
        substitution: args.subobf,
        enable_all: args.allobf,
        function_call_obfuscate: args.fco,
        string_encryption: args.strcry,
        constant_encryption: args.constenc,
        indirect_branch: args.indibran,
        function_wrapper: args.funcwra,
    };

    let mut scheduler = ObfuscationScheduler::new(&options);
    let changed = scheduler.run_on_module(&mut module);
    log::debug!("module changed: {changed}");

    print!("{module}");
    Ok(())
}
