//! Domain types providing compile-time safety and self-documentation
//!
//! Locations, functions and mappings reference each other by identity. These
//! newtype wrappers keep a `FunctionId` from being passed where a
//! `LocationId` is expected. All identities are 1-based; 0 is never issued.

use serde::Serialize;
use std::fmt;

/// Identity of a [`Location`](crate::profile::Location) within one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocationId(pub u64);

/// Identity of a [`Function`](crate::profile::Function) within one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FunctionId(pub u64);

/// Identity of a [`Mapping`](crate::profile::Mapping) within one mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MappingId(pub u64);

macro_rules! sequential_id {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// Identity of the entity stored at `index` in its owning list.
            #[must_use]
            pub fn from_index(index: usize) -> Self {
                Self(index as u64 + 1)
            }

            /// Position of this entity in its owning list; `None` for 0,
            /// which is never issued.
            #[must_use]
            pub fn index(self) -> Option<usize> {
                self.0.checked_sub(1).and_then(|i| usize::try_from(i).ok())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

sequential_id!(LocationId, "L");
sequential_id!(FunctionId, "F");
sequential_id!(MappingId, "M");

/// A (type, unit) descriptor for a profile value, e.g. `("cpu", "nanoseconds")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
}

impl ValueType {
    #[must_use]
    pub fn new(kind: impl Into<String>, unit: impl Into<String>) -> Self {
        Self { kind: kind.into(), unit: unit.into() }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.unit)
    }
}
