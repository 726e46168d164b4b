use crate::Id;
use std::collections::{HashMap, HashSet};

/// Name generator threaded through program construction. Unnamed sequences
/// draw from a single counter (`seq0001`, `seq0002`, ...) so that a given
/// construction order always yields the same names; other prefixes get
/// their own counters.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    seq_counter: u64,
    name_hash: HashMap<Id, u64>,
    generated_names: HashSet<Id>,
}

impl NameGenerator {
    /// Create a NameGenerator where `names` are already defined so that this
    /// generator will never generate those names.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator {
            generated_names: names,
            ..Default::default()
        }
    }

    /// Add names the generator must avoid.
    pub fn add_names(&mut self, names: impl IntoIterator<Item = Id>) {
        self.generated_names.extend(names)
    }

    /// Next automatic sequence name, skipping any name rejected by `taken`.
    pub fn gen_seq_name(&mut self, taken: impl Fn(Id) -> bool) -> Id {
        loop {
            self.seq_counter += 1;
            let name = Id::from(format!("seq{:04}", self.seq_counter));
            if !taken(name) && self.generated_names.insert(name) {
                return name;
            }
        }
    }

    /// Returns a new name that starts with `prefix`.
    /// ```
    /// # use seqc_utils::NameGenerator;
    /// let mut namegen = NameGenerator::default();
    /// assert_eq!(namegen.gen_name("tmp"), "tmp");
    /// assert_eq!(namegen.gen_name("tmp"), "tmp0");
    /// ```
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let prefix: Id = prefix.into();
        loop {
            let count = self.name_hash.entry(prefix).or_insert(0);
            let name = if *count == 0 {
                prefix
            } else {
                Id::from(format!("{}{}", prefix, *count - 1))
            };
            *count += 1;

            // If we've not generated this name before, return it.
            if self.generated_names.insert(name) {
                return name;
            }
        }
    }
}
