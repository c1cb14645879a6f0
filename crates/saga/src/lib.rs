//! Saga orchestration for order creation.
//!
//! This crate provides a generic saga coordinator that runs steps in order
//! and compensates completed steps in reverse when one fails, plus the
//! order creation saga built on top of it:
//! 1. Check availability and capture prices
//! 2. Persist the order and its items
//! 3. Reserve inventory
//! 4. Link the reservation and confirm the order
//!
//! Every run produces a [`SagaJournal`] recording what happened.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod inventory;
pub mod journal;
pub mod order_creation;
pub mod step;

pub use config::{InventoryClientConfig, SagaConfig};
pub use context::{CancelHandle, RequestContext};
pub use coordinator::{SagaCoordinator, SagaOutcome};
pub use error::SagaAbort;
pub use inventory::{
    AvailabilityResult, HttpInventoryClient, InMemoryInventoryService, InventoryClient,
    InventoryError, ItemReservation, ReleaseCall, ReleaseResult, ReservationResult,
};
pub use journal::{CompensationFailure, JournalEntry, SagaEvent, SagaJournal, SagaState};
pub use order_creation::{
    FailureKind, OrderCreationError, OrderCreationWorkflow, OrderSagaData, OrderStep,
    UnavailableItem,
};
pub use step::SagaStep;
