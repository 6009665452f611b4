use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wgrid_core::{EngineError, StoreId};

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
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

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Which stores a principal may act on. Serialized as `"all"` or a store id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoreScope {
    All,
    Store(StoreId),
}

impl StoreScope {
    pub fn allows(&self, store_id: &StoreId) -> bool {
        match self {
            StoreScope::All => true,
            StoreScope::Store(s) => s == store_id,
        }
    }
}

impl TryFrom<String> for StoreScope {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(StoreScope::All);
        }
        Ok(StoreScope::Store(StoreId::new(value)?))
    }
}

impl From<StoreScope> for String {
    fn from(value: StoreScope) -> Self {
        match value {
            StoreScope::All => "all".to_string(),
            StoreScope::Store(s) => s.to_string(),
        }
    }
}

impl core::fmt::Display for StoreScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreScope::All => f.write_str("all"),
            StoreScope::Store(s) => core::fmt::Display::fmt(s, f),
        }
    }
}
