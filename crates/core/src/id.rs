//! Strongly-typed identifiers used across the engine.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Identifier of a store (`"andheri"`, `"bandra-west"`).
///
/// Store ids are lowercase slugs. Their lexicographic order is the global lock
/// order for operations that touch more than one store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreId(String);

/// Stock-keeping unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl StoreId {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EngineError> {
        let s = raw.as_ref().trim().to_ascii_lowercase();
        if s.is_empty() {
            return Err(EngineError::validation("store id cannot be empty"));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(EngineError::validation(format!(
                "store id '{s}' may only contain letters, digits, '-' and '_'"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Sku {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EngineError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(EngineError::validation("sku cannot be empty"));
        }
        if s.len() > 64 {
            return Err(EngineError::validation("sku cannot exceed 64 characters"));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_slug_newtype {
    ($t:ty) => {
        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = EngineError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_slug_newtype!(StoreId);
impl_slug_newtype!(Sku);

/// Identifier of a transfer negotiation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NegotiationId(Uuid);

/// Identifier of a detected anomaly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyId(Uuid);

/// Identifier of a candidate route (deterministic, see `RouteId::derive`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| EngineError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(NegotiationId, "NegotiationId");
impl_uuid_newtype!(AnomalyId, "AnomalyId");
impl_uuid_newtype!(RouteId, "RouteId");

/// Namespace for name-based route ids.
const ROUTE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_3c2a_9b4e_4c7a_8e15_2d0b_77a1_c0de);

impl RouteId {
    /// Derive a stable id from the parts that define a route.
    ///
    /// Identical parts always produce the same id.
    pub fn derive(parts: &[&str]) -> Self {
        let name = parts.join("\u{1f}");
        Self(Uuid::new_v5(&ROUTE_NAMESPACE, name.as_bytes()))
    }
}
