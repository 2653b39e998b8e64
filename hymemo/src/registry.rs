//! Registry of memoized attribute names.
//!
//! Every [`crate::Blueprint`] owns one [`LetRegistry`]. Names are kept in declaration order and
//! deduplicated, so listing the registry always yields the order in which attributes were first
//! declared. A derived blueprint starts from a snapshot of its parent's registry; the two evolve
//! independently afterwards.
use std::{borrow::Borrow, collections::HashMap, fmt, ops::Deref, sync::Arc};

/// Stable identifier of a memoized attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LetName(Arc<str>);

impl LetName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for LetName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for LetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LetName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LetName {
    fn from(value: &str) -> Self {
        LetName(Arc::from(value))
    }
}

impl From<String> for LetName {
    fn from(value: String) -> Self {
        LetName(Arc::from(value))
    }
}

impl From<&String> for LetName {
    fn from(value: &String) -> Self {
        LetName(Arc::from(value.as_str()))
    }
}

impl From<&LetName> for LetName {
    fn from(value: &LetName) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for LetName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for LetName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Ordered, deduplicated list of memoized attribute names.
///
/// ```rust
/// # use hymemo::LetRegistry;
/// let mut registry = LetRegistry::new();
/// registry.register("b").register("a").register("b");
/// assert_eq!(registry.list(), ["b", "a"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LetRegistry {
    names: Vec<LetName>,
    // INFO: position of each name inside `names`, kept in sync on every insertion
    index: HashMap<LetName, usize>,
}

impl LetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` unless it is already registered. Registering a name twice keeps its
    /// original position.
    pub fn register(&mut self, name: impl Into<LetName>) -> &mut Self {
        self.insert(name.into());
        self
    }

    /// Insert `name` and return its position along with whether it was newly added.
    pub(crate) fn insert(&mut self, name: LetName) -> (usize, bool) {
        if let Some(&position) = self.index.get(&name) {
            return (position, false);
        }

        let position = self.names.len();
        self.index.insert(name.clone(), position);
        self.names.push(name);
        (position, true)
    }

    /// Registered names, in declaration order.
    pub fn list(&self) -> &[LetName] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &LetName> {
        self.names.iter()
    }

    /// Position of `name` in declaration order, if registered.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registry handed to a blueprint derived from the owner of `self`.
    ///
    /// The child receives every name registered so far. Names registered on either side after
    /// this call are not visible to the other.
    pub fn on_derive(&self) -> Self {
        self.clone()
    }
}
