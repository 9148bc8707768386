#![deny(rust_2018_idioms)]

use indexmap::IndexMap;
use std::fmt;

/// One lexical unit recognized by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `<name key="value">`
    Open { name: String, attributes: Attributes },
    /// `</name>`, or the second half of `<name/>`
    Close { name: String },
    /// Character data between tags, or the body of a raw region
    Text { content: String },
}

impl Event {
    pub fn open(name: impl Into<String>, attributes: impl Into<Attributes>) -> Self {
        Event::Open {
            name: name.into(),
            attributes: attributes.into(),
        }
    }

    pub fn close(name: impl Into<String>) -> Self {
        Event::Close { name: name.into() }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Event::Text {
            content: content.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Event::Open { name, .. } | Event::Close { name } => Some(name),
            Event::Text { .. } => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Open { name, attributes } => {
                write!(f, "open {name}")?;
                if !attributes.is_empty() {
                    write!(f, " {attributes}")?;
                }
                Ok(())
            }
            Event::Close { name } => write!(f, "close {name}"),
            Event::Text { content } => write!(f, "text {content:?}"),
        }
    }
}

/// The attributes of an open tag.
///
/// Keys are unique and keep the order they were first seen in. Assigning
/// to an existing key replaces its value without moving it.
#[derive(Debug, Clone, Default)]
pub struct Attributes(IndexMap<String, String>);

// `IndexMap` equality ignores order
impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().eq(other.0.iter())
    }
}

impl Eq for Attributes {}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value previously stored under `key`, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        attributes.extend(iter);
        attributes
    }
}

impl<K, V> Extend<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
