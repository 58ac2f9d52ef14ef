//! Persistence collaborator.
//!
//! The dispatch core only needs keyed reads, per-store listings and a handful
//! of conditional writes. Each concern is its own trait so a backing store can
//! be swapped (or wrapped in tests) one table at a time.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::notification::NotificationEvent;
use crate::models::order::DeliveryOrder;
use crate::models::rider::Rider;
use crate::models::zone::DeliveryZone;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn insert_zone(&self, zone: DeliveryZone) -> Result<(), StoreError>;
    async fn get_zone(&self, id: Uuid) -> Result<Option<DeliveryZone>, StoreError>;
    async fn list_zones(&self, store_id: Uuid) -> Result<Vec<DeliveryZone>, StoreError>;

    /// Replaces an existing row of the same store. `false` if there is none.
    async fn update_zone(&self, zone: DeliveryZone) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RiderStore: Send + Sync {
    async fn insert_rider(&self, rider: Rider) -> Result<(), StoreError>;
    async fn get_rider(&self, id: Uuid) -> Result<Option<Rider>, StoreError>;
    async fn list_riders(&self, store_id: Uuid) -> Result<Vec<Rider>, StoreError>;

    /// `available` -> `busy` for an active rider of `store_id`, checked and
    /// written under one lock. Only the dispatch fields are compared, so
    /// unrelated edits such as ratings or location pings never fail a claim.
    /// Returns the claimed row, or `None` if the rider was not claimable.
    async fn claim_if_available(
        &self,
        store_id: Uuid,
        rider_id: Uuid,
    ) -> Result<Option<Rider>, StoreError>;

    /// Replaces the row only if its version still equals `expected_version`.
    /// The stored copy gets `expected_version + 1`. Returns `false` on a lost
    /// race or a missing row.
    async fn update_rider_if_version(
        &self,
        rider: Rider,
        expected_version: u64,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: DeliveryOrder) -> Result<(), StoreError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Inserts unless the order already has a non-terminal assignment, in
    /// which case nothing is written and `false` is returned.
    async fn insert_assignment(&self, assignment: DeliveryAssignment) -> Result<bool, StoreError>;

    async fn get_assignment(&self, id: Uuid) -> Result<Option<DeliveryAssignment>, StoreError>;

    async fn active_assignment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<DeliveryAssignment>, StoreError>;

    async fn assignments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<DeliveryAssignment>, StoreError>;

    /// Replaces the row only if its stored status equals `expected`.
    async fn update_assignment_if_status(
        &self,
        assignment: DeliveryAssignment,
        expected: AssignmentStatus,
    ) -> Result<bool, StoreError>;

    async fn find_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<DeliveryAssignment>, StoreError>;

    async fn tracking_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_tracking_code(code).await?.is_some())
    }
}

#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn append(&self, event: NotificationEvent) -> Result<(), StoreError>;
    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<NotificationEvent>, StoreError>;
}

/// Handles to every table the dispatch core touches.
#[derive(Clone)]
pub struct Stores {
    pub zones: Arc<dyn ZoneStore>,
    pub riders: Arc<dyn RiderStore>,
    pub orders: Arc<dyn OrderStore>,
    pub assignments: Arc<dyn AssignmentStore>,
    pub notifications: Arc<dyn NotificationLog>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            zones: store.clone(),
            riders: store.clone(),
            orders: store.clone(),
            assignments: store.clone(),
            notifications: store,
        }
    }
}
