//! `wgrid-routing`
//!
//! **Responsibility:** stateless delivery route scoring for carbon, time and
//! cost. Reads nothing but its request.

pub mod fleet;
pub mod optimizer;
pub mod route;

pub use fleet::{carbon_footprint_kg, emission_factor_for, Fleet, Vehicle, VehicleType, FALLBACK_EMISSION_FACTOR};
pub use optimizer::{optimize, pooled_only, OptimizerConfig, RouteOptimizer};
pub use route::{compare_routes, DeliveryRequest, Objective, Route, RouteKind, RouteRequest, Stop};
