//! Global name interner.
//!
//! Type, member, method and parameter names are interned once and compared
//! by symbol afterwards.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static INTERNER: Lazy<RwLock<StringInterner<DefaultBackend>>> =
    Lazy::new(|| RwLock::new(StringInterner::default()));

/// A name that has been interned in the global string interner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(DefaultSymbol);

impl Name {
    /// Intern a string and return its Name
    pub fn new(s: &str) -> Self {
        // Most lookups hit names declared long ago; avoid the write lock for those
        if let Some(symbol) = INTERNER.read().get(s) {
            return Name(symbol);
        }
        Name(INTERNER.write().get_or_intern(s))
    }

    /// Resolve the name back to an owned string
    pub fn resolve(&self) -> String {
        self.with_str(str::to_owned)
    }

    /// Run `f` with the resolved string slice, without allocating.
    /// `f` must not intern new names (the interner is read-locked meanwhile).
    pub fn with_str<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = INTERNER.read();
        f(interner.resolve(self.0).unwrap_or_default())
    }

    pub fn is(&self, s: &str) -> bool {
        self.with_str(|own| own == s)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|s| f.write_str(s))
    }
}
