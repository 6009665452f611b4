//! Candidate generation and ranking.
//!
//! For each vehicle: one direct route per delivery, plus one pooled
//! nearest-neighbour tour over all deliveries when there is more than one.
//! Everything is derived from the request; identical inputs produce
//! identical routes, ids and ordering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use wgrid_core::{EngineError, EngineResult, GeoPoint, RouteId};

use crate::fleet::{carbon_footprint_kg, Vehicle};
use crate::route::{compare_routes, DeliveryRequest, Objective, Route, RouteKind, RouteRequest, Stop};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Road distance / great-circle distance.
    pub circuity_factor: f64,
    /// Minutes spent at each stop.
    pub dwell_min_per_stop: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            circuity_factor: 1.3,
            dwell_min_per_stop: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteOptimizer {
    config: OptimizerConfig,
}

impl RouteOptimizer {
    pub fn new(config: OptimizerConfig) -> EngineResult<Self> {
        if !(config.circuity_factor.is_finite() && config.circuity_factor >= 1.0) {
            return Err(EngineError::validation("circuity factor must be >= 1"));
        }
        if !(config.dwell_min_per_stop.is_finite() && config.dwell_min_per_stop >= 0.0) {
            return Err(EngineError::validation("dwell time must be non-negative"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Road distance in km between two points.
    pub fn road_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        a.distance_km(b) * self.config.circuity_factor
    }

    /// All candidate routes, ascending by the objective metric.
    pub fn optimize(&self, request: &RouteRequest, objective: Objective) -> EngineResult<Vec<Route>> {
        request.fleet.validate()?;
        let mut ids = BTreeSet::new();
        for d in &request.deliveries {
            if d.id.trim().is_empty() {
                return Err(EngineError::validation("delivery id must not be empty"));
            }
            if !ids.insert(d.id.as_str()) {
                return Err(EngineError::validation(format!("duplicate delivery id {}", d.id)));
            }
        }

        let mut routes = Vec::new();
        for vehicle in request.fleet.vehicles() {
            for delivery in &request.deliveries {
                routes.push(self.build(request, vehicle, RouteKind::Direct, vec![delivery], objective));
            }
            if request.deliveries.len() > 1 {
                let tour = self.nearest_neighbour(&request.origin, &request.deliveries);
                routes.push(self.build(request, vehicle, RouteKind::Pooled, tour, objective));
            }
        }

        routes.sort_by(|a, b| compare_routes(a, b, objective));
        debug!(
            store = %request.store_id,
            objective = %objective,
            candidates = routes.len(),
            "routes optimized"
        );
        Ok(routes)
    }

    /// Greedy tour from `origin`; ties go to the smaller delivery id.
    fn nearest_neighbour<'a>(&self, origin: &GeoPoint, deliveries: &'a [DeliveryRequest]) -> Vec<&'a DeliveryRequest> {
        let mut remaining: Vec<&DeliveryRequest> = deliveries.iter().collect();
        remaining.sort_by(|a, b| a.id.cmp(&b.id));
        let mut tour = Vec::with_capacity(remaining.len());
        let mut at = *origin;
        while !remaining.is_empty() {
            let mut best = 0;
            for (i, d) in remaining.iter().enumerate().skip(1) {
                if at.distance_km(&d.location).total_cmp(&at.distance_km(&remaining[best].location)).is_lt() {
                    best = i;
                }
            }
            let next = remaining.remove(best);
            at = next.location;
            tour.push(next);
        }
        tour
    }

    fn build(
        &self,
        request: &RouteRequest,
        vehicle: &Vehicle,
        kind: RouteKind,
        tour: Vec<&DeliveryRequest>,
        objective: Objective,
    ) -> Route {
        let speed = vehicle.speed_kmh();
        let dwell = self.config.dwell_min_per_stop;

        let mut distance_km = 0.0;
        let mut elapsed_min = 0.0;
        let mut at = request.origin;
        let mut stops = Vec::with_capacity(tour.len());
        for d in &tour {
            let leg = self.road_km(&at, &d.location);
            distance_km += leg;
            elapsed_min += leg / speed * 60.0;
            stops.push(Stop {
                location: d.location,
                delivery_id: d.id.clone(),
                eta_min: elapsed_min,
            });
            elapsed_min += dwell;
            at = d.location;
        }

        let mut id_parts: Vec<&str> = vec![request.store_id.as_str(), vehicle.id.as_str(), kind.as_str()];
        id_parts.extend(tour.iter().map(|d| d.id.as_str()));

        Route {
            id: RouteId::derive(&id_parts),
            store_id: request.store_id.clone(),
            vehicle_id: vehicle.id.clone(),
            vehicle_type: vehicle.vehicle_type,
            kind,
            objective,
            distance_km,
            estimated_duration_min: elapsed_min,
            carbon_footprint_kg: carbon_footprint_kg(distance_km, vehicle.vehicle_type),
            cost: vehicle.fixed_cost + distance_km * vehicle.rate_per_km(),
            stops,
        }
    }
}

/// Rank with the default configuration.
pub fn optimize(request: &RouteRequest, objective: Objective) -> EngineResult<Vec<Route>> {
    RouteOptimizer::default().optimize(request, objective)
}

/// Keep only pooled routes, preserving order.
pub fn pooled_only(routes: Vec<Route>) -> Vec<Route> {
    routes.into_iter().filter(|r| r.kind == RouteKind::Pooled).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use wgrid_core::StoreId;

    use crate::fleet::{Fleet, VehicleType};

    fn fleet() -> Fleet {
        Fleet::new(vec![
            Vehicle::new("ev-1", VehicleType::Electric),
            Vehicle::new("hy-1", VehicleType::Hybrid),
            Vehicle::new("dz-1", VehicleType::Diesel),
        ])
        .unwrap()
    }

    fn request(deliveries: Vec<(&str, f64, f64)>) -> RouteRequest {
        RouteRequest {
            store_id: StoreId::new("andheri").unwrap(),
            origin: GeoPoint::new(19.1136, 72.8697).unwrap(),
            deliveries: deliveries
                .into_iter()
                .map(|(id, lat, lng)| DeliveryRequest {
                    id: id.to_string(),
                    location: GeoPoint::new(lat, lng).unwrap(),
                    sku: None,
                    units: 0,
                })
                .collect(),
            fleet: fleet(),
        }
    }

    fn mumbai() -> RouteRequest {
        request(vec![("bandra", 19.0596, 72.8295), ("malad", 19.1874, 72.8484)])
    }

    #[test]
    fn generates_direct_and_pooled_candidates_per_vehicle() {
        let routes = optimize(&mumbai(), Objective::Eco).unwrap();
        // 3 vehicles x (2 direct + 1 pooled)
        assert_eq!(routes.len(), 9);
        assert_eq!(pooled_only(routes.clone()).len(), 3);
        assert!(routes.iter().all(|r| !r.stops.is_empty()));
    }

    #[test]
    fn eco_puts_electric_first_and_time_puts_fastest_first() {
        let eco = optimize(&mumbai(), Objective::Eco).unwrap();
        assert_eq!(eco[0].vehicle_type, VehicleType::Electric);
        assert_eq!(eco[0].carbon_footprint_kg, 0.0);

        let time = optimize(&mumbai(), Objective::Time).unwrap();
        for pair in time.windows(2) {
            assert!(pair[0].estimated_duration_min <= pair[1].estimated_duration_min);
        }
        assert_eq!(time[0].kind, RouteKind::Direct);
    }

    #[test]
    fn metrics_follow_the_formulas() {
        let req = request(vec![("bandra", 19.0596, 72.8295)]);
        let routes = optimize(&req, Objective::Cost).unwrap();
        let hybrid = routes.iter().find(|r| r.vehicle_id == "hy-1").unwrap();
        let km = req.origin.distance_km(&req.deliveries[0].location) * 1.3;
        assert!((hybrid.distance_km - km).abs() < 1e-9);
        assert!((hybrid.carbon_footprint_kg - km * 0.17).abs() < 1e-9);
        assert!((hybrid.cost - (150.0 + km * 10.0)).abs() < 1e-9);
        assert!((hybrid.estimated_duration_min - (km / 30.0 * 60.0 + 5.0)).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_produce_identical_output() {
        let a = optimize(&mumbai(), Objective::Cost).unwrap();
        let b = optimize(&mumbai(), Objective::Cost).unwrap();
        assert_eq!(a, b);
        // Ids do not depend on the objective.
        let eco = optimize(&mumbai(), Objective::Eco).unwrap();
        let ids_a: BTreeSet<RouteId> = a.iter().map(|r| r.id).collect();
        let ids_eco: BTreeSet<RouteId> = eco.iter().map(|r| r.id).collect();
        assert_eq!(ids_a, ids_eco);
    }

    #[test]
    fn pooled_tour_visits_nearest_first() {
        let routes = optimize(&mumbai(), Objective::Eco).unwrap();
        let pooled = pooled_only(routes);
        let order: Vec<&str> = pooled[0].stops.iter().map(|s| s.delivery_id.as_str()).collect();
        // Andheri -> Bandra is ~7.3 km, Andheri -> Malad ~8.4 km.
        assert_eq!(order, vec!["bandra", "malad"]);
        assert!(pooled[0].stops[0].eta_min < pooled[0].stops[1].eta_min);
    }

    #[test]
    fn rejects_duplicate_delivery_ids_and_handles_empty_requests() {
        let dup = request(vec![("x", 19.0, 72.8), ("x", 19.1, 72.9)]);
        assert!(optimize(&dup, Objective::Eco).is_err());
        assert!(optimize(&request(vec![]), Objective::Eco).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn eco_ordering_is_non_decreasing(points in proptest::collection::vec((18.9f64..19.3, 72.7f64..73.0), 1..6)) {
            let deliveries = points
                .iter()
                .enumerate()
                .map(|(i, (lat, lng))| (format!("d{i}"), *lat, *lng))
                .collect::<Vec<_>>();
            let req = request(deliveries.iter().map(|(id, lat, lng)| (id.as_str(), *lat, *lng)).collect());
            let routes = optimize(&req, Objective::Eco).unwrap();
            for pair in routes.windows(2) {
                prop_assert!(pair[0].carbon_footprint_kg <= pair[1].carbon_footprint_kg);
            }
        }
    }
}
