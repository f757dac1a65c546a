//! Identity keys and entity kinds.
//!
//! Every entity is addressed by an [`EntityKey`], a documentation-ID style
//! string built from the entity's fully qualified signature:
//!
//! | Kind | Key |
//! |------|-----|
//! | method / constructor / external method | `M:Container.Name(T1,T2)` |
//! | field | `F:Container.Name` |
//! | property | `P:Container.Name` |
//! | event | `E:Container.Name` |
//!
//! Keys are nullability-insensitive: every `?` is dropped when a key is
//! built or deserialized, so two signatures that differ only in annotations
//! name the same entity. This is what keeps identities stable while the
//! declarations they address are rewritten.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TypeSyntax;

/// Stable, nullability-insensitive identity of a program entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityKey(String);

impl EntityKey {
    /// Create a key from raw text, normalizing away annotations and whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        EntityKey(
            raw.as_ref()
                .chars()
                .filter(|c| *c != '?' && !c.is_whitespace())
                .collect(),
        )
    }

    /// Key for a method or constructor.
    pub fn method(container: &str, name: &str, params: &[TypeSyntax]) -> Self {
        let params: Vec<String> = params.iter().map(TypeSyntax::normalized).collect();
        EntityKey::new(format!("M:{}.{}({})", container, name, params.join(",")))
    }

    /// Key for a field.
    pub fn field(container: &str, name: &str) -> Self {
        EntityKey::new(format!("F:{}.{}", container, name))
    }

    /// Key for a property.
    pub fn property(container: &str, name: &str) -> Self {
        EntityKey::new(format!("P:{}.{}", container, name))
    }

    /// Key for an event.
    pub fn event(container: &str, name: &str) -> Self {
        EntityKey::new(format!("E:{}.{}", container, name))
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The single-letter prefix (`M`, `F`, `P`, `E`), if present.
    pub fn prefix(&self) -> Option<char> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(p), Some(':')) => Some(p),
            _ => None,
        }
    }

    /// The qualified path without prefix or parameter list (`Container.Name`).
    pub fn qualified_name(&self) -> &str {
        let body = match self.prefix() {
            Some(_) => &self.0[2..],
            None => &self.0,
        };
        match body.find('(') {
            Some(idx) => &body[..idx],
            None => body,
        }
    }

    /// The member name (last path segment).
    pub fn member_name(&self) -> &str {
        let qualified = self.qualified_name();
        match qualified.rfind('.') {
            Some(idx) => &qualified[idx + 1..],
            None => qualified,
        }
    }

    /// The containing type path, if the key has one.
    pub fn container(&self) -> Option<&str> {
        let qualified = self.qualified_name();
        qualified.rfind('.').map(|idx| &qualified[..idx])
    }
}

impl From<String> for EntityKey {
    fn from(raw: String) -> Self {
        EntityKey::new(raw)
    }
}

impl From<&str> for EntityKey {
    fn from(raw: &str) -> Self {
        EntityKey::new(raw)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of program entity tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Method or constructor with a local declaration.
    Method,
    Field,
    Property,
    Event,
    /// Callee with no local declaration (library routine).
    ExternalMethod,
}

impl EntityKind {
    /// Whether entities of this kind have a live declaration.
    pub fn is_local(&self) -> bool {
        !matches!(self, EntityKind::ExternalMethod)
    }

    /// Stable output name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Method => "method",
            EntityKind::Field => "field",
            EntityKind::Property => "property",
            EntityKind::Event => "event",
            EntityKind::ExternalMethod => "external_method",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
