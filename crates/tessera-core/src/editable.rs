//! Property introspection for generic tooling.
//!
//! Components keep typed configuration structs for their own logic. Editors,
//! CLIs and inspectors that need to enumerate settings without knowing the
//! concrete type go through [`Editable`], which exposes each setting as a
//! named, tagged [`Property`].
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{Editable, ParallelismSettings, PropertyValue};
//!
//! let mut settings = ParallelismSettings::default();
//! settings.set_property("min_count", PropertyValue::Integer(512)).unwrap();
//! assert_eq!(settings.min_count, 512);
//! assert!(settings.properties().iter().any(|p| p.name == "target_count"));
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// Type tag of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Unsigned integer.
    Integer,
    /// Boolean flag.
    Flag,
    /// One of a fixed set of names.
    Choice,
}

/// Value carried by a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Unsigned integer value.
    Integer(u64),
    /// Boolean value.
    Flag(bool),
    /// Selected name.
    Choice(String),
}

impl PropertyValue {
    /// Type tag of this value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Integer(_) => PropertyKind::Integer,
            Self::Flag(_) => PropertyKind::Flag,
            Self::Choice(_) => PropertyKind::Choice,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Choice(v) => write!(f, "{v}"),
        }
    }
}

/// One named setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Stable property name.
    pub name: &'static str,
    /// Type tag.
    pub kind: PropertyKind,
    /// Current value.
    pub value: PropertyValue,
}

impl Property {
    /// Describes a property; the kind is taken from the value.
    pub fn new(name: &'static str, value: PropertyValue) -> Self {
        Self {
            name,
            kind: value.kind(),
            value,
        }
    }
}

/// A component whose settings can be listed and edited generically.
pub trait Editable {
    /// Current settings, in a stable order.
    fn properties(&self) -> Vec<Property>;

    /// Replaces one setting.
    ///
    /// Fails with a validation error for unknown names or values of the
    /// wrong kind.
    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<()>;

    /// Reads one setting by name.
    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.properties()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }
}

/// Error for a property update that does not fit the target.
pub(crate) fn property_mismatch(name: &str, value: &PropertyValue) -> Error {
    Error::validation(
        format!("property '{name}'"),
        format!("cannot accept {:?} value '{value}'", value.kind()),
    )
}
