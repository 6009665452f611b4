//! `wgrid-negotiation`
//!
//! **Responsibility:** the lifecycle of inter-store transfers.
//!
//! ```text
//! pending -> approved -> in_transit -> completed
//!    |          |            |
//!    +----------+------------+--> rejected
//! ```
//!
//! Decisions live in the [`Transfer`] aggregate (pure `handle`/`apply`); the
//! [`NegotiationEngine`] reads inventory, enforces reservations and route
//! pinning, and moves stock on fulfilment.

pub mod engine;
pub mod pricing;
pub mod transfer;

pub use engine::{NegotiationConfig, NegotiationEngine, TransferRequest};
pub use pricing::{calculate_priority, calculate_transfer_cost, Priority, Urgency, DEFAULT_BASE_RATE_PER_KM};
pub use transfer::{Transfer, TransferCommand, TransferEvent, TransferStatus, CANCELLED_NOTE};
