use crate::{Backend, InstanceBackend, ParamMapBackend, VerilogBackend};
use itertools::Itertools;
use std::{fmt, str::FromStr};

/// Enumeration of valid backends
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOpt {
    #[default]
    Verilog,
    Map,
    Instance,
    All,
}

/// Return a vector that maps strings to Backends.
#[inline(always)]
fn backends() -> Vec<(&'static str, BackendOpt)> {
    vec![
        ("verilog", BackendOpt::Verilog),
        ("map", BackendOpt::Map),
        ("instance", BackendOpt::Instance),
        ("all", BackendOpt::All),
    ]
}

impl BackendOpt {
    /// The backends to run, in order.
    pub fn backends(self) -> Vec<Box<dyn Backend>> {
        match self {
            BackendOpt::Verilog => vec![Box::new(VerilogBackend)],
            BackendOpt::Map => vec![Box::new(ParamMapBackend)],
            BackendOpt::Instance => vec![Box::new(InstanceBackend)],
            BackendOpt::All => vec![
                Box::new(VerilogBackend),
                Box::new(ParamMapBackend),
                Box::new(InstanceBackend),
            ],
        }
    }
}

/// Command line parsing for the Backend enum
impl FromStr for BackendOpt {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let backends = backends();
        if let Some((_, opt)) = backends.iter().find(|(name, _)| &input == name) {
            return Ok(*opt);
        }
        let names = backends.iter().map(|(name, _)| *name).join(", ");
        Err(format!(
            "`{input}` is not a valid backend.\nValid backends: {names}"
        ))
    }
}

impl fmt::Display for BackendOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = backends()
            .into_iter()
            .find(|(_, opt)| opt == self)
            .map(|(name, _)| name)
            .unwrap_or("verilog");
        write!(f, "{name}")
    }
}
