//! Cycle-accurate superscalar out-of-order pipeline simulator.
//!
//! This crate implements a MIPS-style superscalar core, cycle by cycle:
//! 1. **Front end:** Fetch through the I-cache with branch prediction,
//!    decode with renaming and reorder-buffer allocation.
//! 2. **Back end:** Reservation stations per functional-unit class,
//!    out-of-order execution, a common data bus, a load/store queue with
//!    store-to-load forwarding, and in-order commit with misprediction
//!    squash.
//! 3. **Memory:** Flat byte memory behind set-associative, write-back
//!    I/D caches.
//! 4. **Tooling:** A two-pass assembler for the MIPS-like input language,
//!    JSON-deserializable configuration, and a serializable results record.

/// Common types and errors.
pub mod common;
/// Simulator configuration (defaults, enums, validation).
pub mod config;
/// The simulated core (arenas, predictors, pipeline stages).
pub mod core;
/// Instruction set (registers, opcodes, assembler).
pub mod isa;
/// Memory hierarchy (flat memory, caches).
pub mod mem;
/// Program loading and the run loop.
pub mod sim;
/// Statistics collection and the results record.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The simulated core; owned by `Simulator`.
pub use crate::core::Core;
/// Assembled program image.
pub use crate::isa::Program;
/// Top-level simulator; construct with `Simulator::new` or `from_source`.
pub use crate::sim::Simulator;
/// Final metrics record.
pub use crate::stats::SimReport;
