//! Backends for the seqc compiler.
mod backend_opt;
mod instance;
mod param_map;
mod traits;
mod verilog;

pub use backend_opt::BackendOpt;
pub use instance::InstanceBackend;
pub use param_map::ParamMapBackend;
pub use traits::{Backend, Unit};
pub use verilog::{VerilogBackend, emit_module, validate_module};
