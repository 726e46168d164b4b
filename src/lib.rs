//! # The seqc compiler
//!
//! This crate plumbs together the seqc crates and provides the command-line
//! interface. Libraries that build programs in code should depend on
//! [`seqc_ir`], [`seqc_synth`] and [`seqc_backend`] directly.
pub mod cmdline;
pub mod driver;
