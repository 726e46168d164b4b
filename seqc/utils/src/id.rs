//! Interned identifiers used for every name in the compiler: signals,
//! sequences, bins and generated nets.
use lazy_static::lazy_static;
use std::{cmp::Ordering, fmt, sync::Mutex};
use string_interner::{
    StringInterner, backend::BucketBackend, symbol::SymbolU32,
};

type Pool = StringInterner<BucketBackend>;

lazy_static! {
    static ref POOL: Mutex<Pool> = Mutex::new(Pool::new());
}

fn with_pool<R>(f: impl FnOnce(&mut Pool) -> R) -> R {
    // A poisoned pool still holds valid strings.
    let mut pool = POOL.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut pool)
}

/// A globally interned name.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Id(SymbolU32);

impl Id {
    pub fn new(s: impl AsRef<str>) -> Self {
        Id(with_pool(|pool| pool.get_or_intern(s.as_ref())))
    }

    /// The interned string.
    pub fn as_str(&self) -> &'static str {
        with_pool(|pool| {
            let s = pool.resolve(self.0).unwrap_or("");
            // SAFETY: the bucket backend never moves or frees the bytes of an
            // interned string and the pool is never dropped.
            unsafe { &*(s as *const str) }
        })
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Id::new(s)
    }
}

impl From<&Id> for Id {
    fn from(id: &Id) -> Self {
        *id
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Ids order by their text so that sorted output does not depend on the
/// order in which names were interned.
impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        } else {
            self.as_str().cmp(other.as_str())
        }
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

/// Anything that carries a name.
pub trait GetName {
    fn name(&self) -> Id;
}
