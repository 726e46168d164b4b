//! Cycle-based simulator for netlists produced by `seqc-synth`.
//!
//! The simulator flattens a [Design](seqc_ir::rtl::Design) into a single
//! table of two-state nets at most 128 bits wide. Continuous assignments are
//! sorted once and re-evaluated after every change; clocked processes run on
//! each rising edge with non-blocking semantics.
//!
//! # Usage
//!
//! ```ignore
//! let design = seqc_synth::synthesize(&ctx, top, true);
//! let mut sim = Simulator::new(&design)?;
//! sim.reset()?;
//! sim.poke("start", 1)?;
//! sim.step();
//! assert_eq!(sim.peek("running")?, 1);
//! ```
//!
//! # Modules
//!
//! - `error`: simulation error types
//! - `evaluator`: compiled expressions and statements
//! - `kernel`: hierarchy flattening and the clock loop

mod error;
mod evaluator;
mod kernel;

pub use error::{SimError, SimResult};
pub use kernel::Simulator;
