//! `wgrid-core` — shared engine building blocks.
//!
//! Identifiers, the error taxonomy, injected time, aggregate traits and the
//! bounded lock-retry policy. No IO lives here.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod geo;
pub mod id;
pub mod retry;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use geo::GeoPoint;
pub use id::{AnomalyId, NegotiationId, RouteId, Sku, StoreId};
pub use retry::RetryPolicy;
