//! Frontend for the seqc compiler.
//!
//! Programs are described as JSON. [parser] turns the text into the types of
//! [ast]; a [Workspace] links them into a [seqc_ir::Context].

pub mod ast;
pub mod parser;

mod workspace;

pub use ast::Description;
pub use workspace::Workspace;
