use seqc_utils::{Error, GetName, Id, SeqResult, math};

/// A typed wire: name, bit width, signedness and the value a register built
/// from it takes on reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub name: Id,
    pub width: u64,
    pub signed: bool,
    pub init: i64,
}

impl Signal {
    /// An unsigned signal that resets to zero.
    pub fn new<S: Into<Id>>(name: S, width: u64) -> Self {
        Signal {
            name: name.into(),
            width,
            signed: false,
            init: 0,
        }
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn with_init(mut self, init: i64) -> Self {
        self.init = init;
        self
    }

    /// The reset value encoded into `width` bits.
    pub fn init_bits(&self) -> u128 {
        math::encode(self.init, self.width)
    }

    pub(crate) fn validate(&self) -> SeqResult<()> {
        if self.width == 0 {
            return Err(Error::invalid_config(format!(
                "signal `{}' must be at least one bit wide",
                self.name
            )));
        }
        Ok(())
    }
}

impl GetName for Signal {
    fn name(&self) -> Id {
        self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// A signal exposed at a bin boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub sig: Signal,
    pub dir: Direction,
    /// Driven by a register the bin owns.
    pub reg: bool,
}

impl Port {
    pub fn input(sig: Signal) -> Self {
        Port {
            sig,
            dir: Direction::Input,
            reg: false,
        }
    }

    pub fn output(sig: Signal) -> Self {
        Port {
            sig,
            dir: Direction::Output,
            reg: false,
        }
    }

    pub fn register(sig: Signal) -> Self {
        Port {
            sig,
            dir: Direction::Output,
            reg: true,
        }
    }

    /// Whether this port should replace `existing` when both carry the same
    /// name: outputs always win and an output is never downgraded.
    pub fn overrides(&self, existing: &Port) -> bool {
        self.dir == Direction::Output || existing.dir == Direction::Input
    }
}

impl GetName for Port {
    fn name(&self) -> Id {
        self.sig.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_classification_wins() {
        let x = Signal::new("x_sig", 4);
        let inp = Port::input(x.clone());
        let out = Port::output(x);
        assert!(out.overrides(&inp));
        assert!(!inp.overrides(&out));
        assert!(inp.overrides(&inp.clone()));
    }

    #[test]
    fn init_is_encoded_in_width() {
        let s = Signal::new("s_sig", 4).signed().with_init(-2);
        assert_eq!(s.init_bits(), 0b1110);
    }
}
