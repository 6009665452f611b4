//! Optional JSON provisioning file: stores, their opening stock and fleets.
//!
//! ```json
//! { "stores": [ { "id": "andheri", "name": "Andheri West", "location": {"lat": 19.13, "lng": 72.84},
//!                 "region": "mumbai",
//!                 "items": [ { "sku": "Milk", "category": "groceries", "quantity": 40,
//!                              "reorder_level": 20, "expiry_horizon_days": 5 } ],
//!                 "fleet": [ { "id": "EV-001", "vehicle_type": "electric" } ] } ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use wgrid_core::{EngineError, EngineResult};
use wgrid_inventory::{NewItem, Store};
use wgrid_routing::Fleet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedStore {
    #[serde(flatten)]
    pub store: Store,
    #[serde(default)]
    pub items: Vec<NewItem>,
    /// Falls back to the standard fleet when absent.
    #[serde(default)]
    pub fleet: Option<Fleet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub stores: Vec<SeedStore>,
}

impl SeedFile {
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw).map_err(|e| EngineError::validation(format!("seed file: {e}")))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::validation(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_documented_shape() {
        let seed = SeedFile::from_json(
            r#"{ "stores": [ { "id": "andheri", "name": "Andheri West",
                 "location": {"lat": 19.13, "lng": 72.84}, "region": "mumbai",
                 "items": [ { "sku": "Milk", "category": "groceries", "quantity": 40,
                              "reorder_level": 20, "expiry_horizon_days": 5 } ],
                 "fleet": [ { "id": "EV-001", "vehicle_type": "electric" } ] } ] }"#,
        )
        .unwrap();
        assert_eq!(seed.stores.len(), 1);
        let s = &seed.stores[0];
        assert!(s.store.active);
        assert_eq!(s.items[0].quantity, 40);
        assert_eq!(s.fleet.as_ref().map(|f| f.vehicles().len()), Some(1));
    }

    #[test]
    fn malformed_seed_is_a_validation_error() {
        let err = SeedFile::from_json("{ \"stores\": 3 }").unwrap_err();
        assert_eq!(err.kind(), wgrid_core::ErrorKind::ValidationError);
    }

    #[test]
    fn out_of_range_location_is_refused() {
        let err = SeedFile::from_json(
            r#"{ "stores": [ { "id": "andheri", "name": "Andheri West",
                 "location": {"lat": 191.3, "lng": 72.84}, "region": "mumbai" } ] }"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), wgrid_core::ErrorKind::ValidationError);
        assert!(err.to_string().contains("latitude 191.3 out of range"), "got {err}");
    }
}
