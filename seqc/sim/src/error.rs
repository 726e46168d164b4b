//! Simulation error types.

/// Errors raised while flattening a design or accessing its nets.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The design's top module is missing.
    #[error("design has no module `{0}'")]
    UnknownModule(String),

    /// An expression, connection or access names a net that does not exist.
    #[error("unknown net `{0}'")]
    UnknownNet(String),

    /// Continuous assignments depend on each other in a cycle.
    #[error("combinational loop through `{0}'")]
    CombinationalLoop(String),

    /// Values are held in 128 bits.
    #[error("net `{name}' is {width} bits wide, the simulator supports at most 128")]
    TooWide {
        /// Hierarchical net name.
        name: String,
        /// Declared width.
        width: u64,
    },
}

/// Result of a simulator operation.
pub type SimResult<T> = Result<T, SimError>;
