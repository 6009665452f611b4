use serde::{Deserialize, Serialize};

use wgrid_core::{EngineError, EngineResult};

/// kg CO2 per km for vehicles we cannot classify.
pub const FALLBACK_EMISSION_FACTOR: f64 = 0.25;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VehicleType {
    Electric,
    Hybrid,
    Diesel,
    Petrol,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Electric => "electric",
            VehicleType::Hybrid => "hybrid",
            VehicleType::Diesel => "diesel",
            VehicleType::Petrol => "petrol",
        }
    }

    /// kg CO2 per km.
    pub fn emission_factor(&self) -> f64 {
        match self {
            VehicleType::Electric => 0.0,
            VehicleType::Hybrid => 0.17,
            VehicleType::Diesel => 0.25,
            VehicleType::Petrol => 0.23,
        }
    }

    /// Strict lookup by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "electric" => Some(VehicleType::Electric),
            "hybrid" => Some(VehicleType::Hybrid),
            "diesel" => Some(VehicleType::Diesel),
            "petrol" => Some(VehicleType::Petrol),
            _ => None,
        }
    }

    // Defaults used when a fleet entry omits its operating figures.
    fn default_speed_kmh(&self) -> f64 {
        match self {
            VehicleType::Electric => 25.0,
            VehicleType::Hybrid => 30.0,
            VehicleType::Diesel | VehicleType::Petrol => 35.0,
        }
    }

    fn default_cost_per_km(&self) -> f64 {
        match self {
            VehicleType::Electric => 8.0,
            VehicleType::Hybrid => 10.0,
            VehicleType::Diesel => 12.0,
            VehicleType::Petrol => 11.0,
        }
    }
}

/// Unrecognised names are treated as diesel.
impl From<String> for VehicleType {
    fn from(value: String) -> Self {
        VehicleType::from_name(&value).unwrap_or(VehicleType::Diesel)
    }
}

impl From<VehicleType> for String {
    fn from(value: VehicleType) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emission factor by vehicle type name; unknown names use the diesel factor.
pub fn emission_factor_for(name: &str) -> f64 {
    VehicleType::from_name(name)
        .map(|v| v.emission_factor())
        .unwrap_or(FALLBACK_EMISSION_FACTOR)
}

pub fn carbon_footprint_kg(distance_km: f64, vehicle_type: VehicleType) -> f64 {
    distance_km * vehicle_type.emission_factor()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub driver: Option<String>,
    /// Average driving speed in km/h; defaults per vehicle type.
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    #[serde(default)]
    pub cost_per_km: Option<f64>,
    /// Flat cost per dispatch.
    #[serde(default = "default_fixed_cost")]
    pub fixed_cost: f64,
}

fn default_fixed_cost() -> f64 {
    150.0
}

impl Vehicle {
    pub fn new(id: impl Into<String>, vehicle_type: VehicleType) -> Self {
        Self {
            id: id.into(),
            vehicle_type,
            driver: None,
            avg_speed_kmh: None,
            cost_per_km: None,
            fixed_cost: default_fixed_cost(),
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_speed(mut self, kmh: f64) -> Self {
        self.avg_speed_kmh = Some(kmh);
        self
    }

    pub fn with_cost(mut self, fixed: f64, per_km: f64) -> Self {
        self.fixed_cost = fixed;
        self.cost_per_km = Some(per_km);
        self
    }

    pub fn speed_kmh(&self) -> f64 {
        self.avg_speed_kmh
            .unwrap_or_else(|| self.vehicle_type.default_speed_kmh())
    }

    pub fn rate_per_km(&self) -> f64 {
        self.cost_per_km
            .unwrap_or_else(|| self.vehicle_type.default_cost_per_km())
    }

    fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::validation("vehicle id must not be empty"));
        }
        let speed = self.speed_kmh();
        if !(speed.is_finite() && speed > 0.0) {
            return Err(EngineError::validation(format!(
                "vehicle {}: average speed must be positive",
                self.id
            )));
        }
        for v in [self.fixed_cost, self.rate_per_km()] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(EngineError::validation(format!(
                    "vehicle {}: costs must be non-negative",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Vehicles available to one store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
}

impl Fleet {
    pub fn new(vehicles: Vec<Vehicle>) -> EngineResult<Self> {
        let fleet = Self { vehicles };
        fleet.validate()?;
        Ok(fleet)
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for v in &self.vehicles {
            v.validate()?;
            if !seen.insert(v.id.as_str()) {
                return Err(EngineError::validation(format!("duplicate vehicle id {}", v.id)));
            }
        }
        Ok(())
    }
}
