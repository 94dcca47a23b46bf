//! veil - IR obfuscation pass scheduler.
//!
//! veil sequences a set of independent obfuscating transformations over a
//! module so that stages with implicit ordering dependencies run in a
//! correct, deterministic order. Per-transformation enablement is resolved
//! once per run from three overlapping sources (explicit flags, a master
//! enable-all switch, environment overrides); disabled stages still run as
//! guaranteed no-ops, so the pipeline's control flow never varies with the
//! configuration.
//!
//! # Primary Usage
//!
//! ```
//! use veil::{Module, ObfuscationOptions, ObfuscationScheduler};
//!
//! let mut module = Module::parse("f() {\nentry:\n  ret\n}\n").unwrap();
//! let options = ObfuscationOptions {
//!     ir_obfuscation: true,
//!     enable_all: true,
//!     seed: 0x42,
//!     ..Default::default()
//! };
//! let mut scheduler = ObfuscationScheduler::new(&options);
//! let changed = scheduler.run_on_module(&mut module);
//! assert!(changed);
//! ```
//!
//! # Architecture
//!
//! - [`scheduler`] - The ordered driver imposing the fixed stage total order
//! - [`config`] - Enablement directive resolution (flags, master, env)
//! - [`passes`] - Transform units behind a uniform enabled/disabled handle
//! - [`markers`] - Reserved-prefix signaling declarations and their purge
//! - [`ir`] - Owned mini-IR substrate with parser and printer
//! - [`core`] - Shared infrastructure (rng, run reporting, boundary errors)

pub mod config;
pub mod core;
pub mod ir;
pub mod markers;
pub mod passes;
pub mod scheduler;

// Re-export common types
pub use crate::core::{
    IrParseError, ObfRng, ParseResult, RunStats, RunTimer, StageRecord, StageScope, DEFAULT_SEED,
};
pub use config::{EffectiveConfig, ObfuscationOptions, PIPELINE_NAME};
pub use ir::{Block, Function, Global, GlobalInit, Inst, Module, Opcode, Operand};
pub use markers::MARKER_PREFIX;
pub use passes::{PassKind, TransformPass};
pub use scheduler::ObfuscationScheduler;
