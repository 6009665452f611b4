use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use wgrid_auth::{Principal, PrincipalId, Role, StoreScope};
use wgrid_coordination::{CoordinationFacade, EngineConfig, SeedFile};
use wgrid_core::{ErrorKind, ManualClock, Sku, StoreId};
use wgrid_negotiation::{TransferRequest, TransferStatus, Urgency};
use wgrid_routing::Objective;

const SEED: &str = r#"{
  "stores": [
    { "id": "andheri", "name": "Andheri West", "location": {"lat": 19.1136, "lng": 72.8697}, "region": "mumbai",
      "items": [ { "sku": "Milk", "category": "groceries", "quantity": 120, "reorder_level": 20, "expiry_horizon_days": 5 },
                 { "sku": "Rice", "category": "groceries", "quantity": 300, "reorder_level": 50, "expiry_horizon_days": 365 } ],
      "fleet": [ { "id": "EV-001", "vehicle_type": "electric" }, { "id": "DZ-001", "vehicle_type": "diesel" } ] },
    { "id": "bandra", "name": "Bandra", "location": {"lat": 19.0596, "lng": 72.8295}, "region": "mumbai",
      "items": [ { "sku": "Milk", "category": "groceries", "quantity": 8, "reorder_level": 20, "expiry_horizon_days": 5 },
                 { "sku": "Rice", "category": "groceries", "quantity": 40, "reorder_level": 50, "expiry_horizon_days": 365 } ] },
    { "id": "powai", "name": "Powai", "location": {"lat": 19.1176, "lng": 72.9060}, "region": "mumbai",
      "items": [ { "sku": "Milk", "category": "groceries", "quantity": 60, "reorder_level": 20, "expiry_horizon_days": 5 },
                 { "sku": "Rice", "category": "groceries", "quantity": 90, "reorder_level": 50, "expiry_horizon_days": 365 } ] }
  ]
}"#;

const STORES: [&str; 3] = ["andheri", "bandra", "powai"];

fn sid(s: &str) -> StoreId {
    StoreId::new(s).unwrap()
}

fn admin() -> Principal {
    Principal::new(PrincipalId::new(), vec![Role::ADMIN], StoreScope::All)
}

fn seeded() -> CoordinationFacade {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
    let facade = CoordinationFacade::new(&EngineConfig::default(), clock).unwrap();
    facade.provision(&SeedFile::from_json(SEED).unwrap()).unwrap();
    facade
}

fn network_units(facade: &CoordinationFacade, sku: &Sku) -> u64 {
    let admin = admin();
    STORES
        .iter()
        .flat_map(|s| facade.inventory(&admin, &sid(s)).unwrap())
        .filter(|i| &i.sku == sku)
        .map(|i| i.quantity)
        .sum()
}

#[test]
fn seeded_fleet_is_used_and_pooled_tour_serves_both_transfers() {
    let facade = seeded();
    let admin = admin();
    let milk = Sku::new("Milk").unwrap();

    for dest in ["bandra", "powai"] {
        let t = facade
            .propose_negotiation(
                &admin,
                TransferRequest {
                    source_store: sid("andheri"),
                    dest_store: sid(dest),
                    sku: milk.clone(),
                    quantity: 10,
                    urgency: Urgency::Routine,
                    notes: None,
                },
            )
            .unwrap();
        facade.approve_negotiation(&admin, t.id_typed()).unwrap();
    }

    let routes = facade.routes(&admin, &sid("andheri"), Objective::Cost).unwrap();
    // 2 vehicles x (2 direct + 1 pooled)
    assert_eq!(routes.len(), 6);
    assert!(routes.iter().all(|r| r.vehicle_id == "EV-001" || r.vehicle_id == "DZ-001"));

    let pooled: Vec<_> = routes.iter().filter(|r| r.stops.len() == 2).collect();
    assert_eq!(pooled.len(), 2);

    // A route id may be pinned to only one live transfer.
    let transfers = facade.negotiations(&admin, &sid("andheri")).unwrap();
    let tour = pooled[0].clone();
    facade
        .dispatch_negotiation(&admin, transfers[0].id_typed(), tour.id, Some(Objective::Cost))
        .unwrap();
    let err = facade
        .dispatch_negotiation(&admin, transfers[1].id_typed(), tour.id, Some(Objective::Cost))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidTransition));
}

#[test]
fn deactivated_store_refuses_new_proposals() {
    let facade = seeded();
    facade.deactivate_store(&sid("powai")).unwrap();
    let err = facade
        .propose_negotiation(
            &admin(),
            TransferRequest {
                source_store: sid("powai"),
                dest_store: sid("bandra"),
                sku: Sku::new("Rice").unwrap(),
                quantity: 5,
                urgency: Urgency::Urgent,
                notes: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    // Still readable.
    assert_eq!(facade.inventory(&admin(), &sid("powai")).unwrap().len(), 2);
    // And skipped as a donor.
    let drafts = facade.suggest_transfers(&admin(), &sid("bandra"), &[]).unwrap();
    assert!(drafts.iter().all(|d| d.request.source_store == sid("andheri")));
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

    #[test]
    fn transfers_never_create_or_destroy_stock(
        moves in proptest::collection::vec((0usize..3, 0usize..3, 1u64..80, any::<bool>()), 1..12)
    ) {
        let facade = seeded();
        let admin = admin();
        let milk = Sku::new("Milk").unwrap();
        let before = network_units(&facade, &milk);

        for (from, to, qty, complete) in moves {
            if from == to {
                continue;
            }
            let Ok(t) = facade.propose_negotiation(&admin, TransferRequest {
                source_store: sid(STORES[from]),
                dest_store: sid(STORES[to]),
                sku: milk.clone(),
                quantity: qty,
                urgency: Urgency::Routine,
                notes: None,
            }) else { continue };
            if facade.approve_negotiation(&admin, t.id_typed()).is_err() || !complete {
                continue;
            }
            let routes = facade.routes(&admin, &sid(STORES[from]), Objective::Eco).unwrap();
            let id = t.id_typed().to_string();
            let Some(route) = routes.iter().find(|r| r.serves(&id) && r.stops.len() == 1) else { continue };
            facade.dispatch_negotiation(&admin, t.id_typed(), route.id, None).unwrap();
            let result = facade.fulfill_negotiation(&admin, t.id_typed());
            let after = facade.negotiation(&admin, t.id_typed()).unwrap();
            match result {
                Ok(_) => prop_assert_eq!(after.status(), TransferStatus::Completed),
                Err(e) => {
                    prop_assert_eq!(e.kind(), ErrorKind::InsufficientStock);
                    prop_assert_eq!(after.status(), TransferStatus::Rejected);
                }
            }
        }

        prop_assert_eq!(network_units(&facade, &milk), before);
    }
}
