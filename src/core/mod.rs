//! Shared infrastructure: random generator, run reporting, boundary errors.

pub mod error;
pub mod rng;
pub mod session;

pub use error::{IrParseError, ParseResult};
pub use rng::{ObfRng, DEFAULT_SEED};
pub use session::{RunStats, RunTimer, StageRecord, StageScope};
