//! Shared utilities for the seqc compiler.
mod errors;
mod id;
mod namegenerator;
mod out_file;

pub mod math;

pub use errors::{Error, SeqResult};
pub use id::{GetName, Id};
pub use math::bits_needed_for;
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
