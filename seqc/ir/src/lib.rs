//! Internal representation for the seqc compiler.
//!
//! A program is authored as plain data ([Seq] trees grouped into
//! [BinDef]s) and handed to a [Context], which links every bin exactly once
//! into a [Bin]: names are registered, register and port references are
//! resolved, shared resources are bucketed and child bins are wired in.
//! The [rtl] module holds the structural netlist that bins are lowered to.
mod bin;
mod context;
mod link;
mod node;
mod seq;
mod signal;

pub mod rtl;

pub use bin::{Bin, BinDef, BinId, Bucket, RESERVED_NAMES, SeqData, StaticKind};
pub use context::{Context, SeqRef};
pub use node::{
    ChildLink, CountDir, DetachMode, Node, NodeKind, Parent, SeqIdx, SetMap,
    Value,
};
pub use seq::{ChildTarget, Detach, Exports, Justify, Operand, Seq, SeqKind};
pub use signal::{Direction, Port, Signal};

// Re-export types from the utils crate.
pub use seqc_utils::{Error, GetName, Id, SeqResult};
