use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::notification::NotificationEvent;
use crate::models::order::DeliveryOrder;
use crate::models::rider::{Rider, RiderStatus};
use crate::models::zone::DeliveryZone;
use crate::store::{
    AssignmentStore, NotificationLog, OrderStore, RiderStore, StoreError, ZoneStore,
};

/// In-process record store.
///
/// Conditional writes run under the owning shard's lock and release it before
/// returning, so no lock outlives a single call.
#[derive(Default)]
pub struct MemoryStore {
    zones: DashMap<Uuid, DeliveryZone>,
    riders: DashMap<Uuid, Rider>,
    orders: DashMap<Uuid, DeliveryOrder>,
    assignments: DashMap<Uuid, DeliveryAssignment>,
    active_by_order: DashMap<Uuid, Uuid>,
    tracking_codes: DashMap<String, Uuid>,
    notifications: DashMap<Uuid, Vec<NotificationEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ZoneStore for MemoryStore {
    async fn insert_zone(&self, zone: DeliveryZone) -> Result<(), StoreError> {
        self.zones.insert(zone.id, zone);
        Ok(())
    }

    async fn get_zone(&self, id: Uuid) -> Result<Option<DeliveryZone>, StoreError> {
        Ok(self.zones.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_zones(&self, store_id: Uuid) -> Result<Vec<DeliveryZone>, StoreError> {
        Ok(self
            .zones
            .iter()
            .filter(|entry| entry.store_id == store_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_zone(&self, zone: DeliveryZone) -> Result<bool, StoreError> {
        let Some(mut row) = self.zones.get_mut(&zone.id) else {
            return Ok(false);
        };
        if row.store_id != zone.store_id {
            return Ok(false);
        }
        *row = zone;
        Ok(true)
    }
}

#[async_trait]
impl RiderStore for MemoryStore {
    async fn insert_rider(&self, rider: Rider) -> Result<(), StoreError> {
        match self.riders.entry(rider.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("rider {}", rider.id))),
            Entry::Vacant(slot) => {
                slot.insert(rider);
                Ok(())
            }
        }
    }

    async fn get_rider(&self, id: Uuid) -> Result<Option<Rider>, StoreError> {
        Ok(self.riders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_riders(&self, store_id: Uuid) -> Result<Vec<Rider>, StoreError> {
        Ok(self
            .riders
            .iter()
            .filter(|entry| entry.store_id == store_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn claim_if_available(
        &self,
        store_id: Uuid,
        rider_id: Uuid,
    ) -> Result<Option<Rider>, StoreError> {
        let Some(mut row) = self.riders.get_mut(&rider_id) else {
            return Ok(None);
        };

        if row.store_id != store_id || !row.is_dispatchable() {
            return Ok(None);
        }

        row.status = RiderStatus::Busy;
        row.updated_at = Utc::now();
        row.version += 1;
        Ok(Some(row.clone()))
    }

    async fn update_rider_if_version(
        &self,
        mut rider: Rider,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let Some(mut row) = self.riders.get_mut(&rider.id) else {
            return Ok(false);
        };

        if row.version != expected_version || row.store_id != rider.store_id {
            return Ok(false);
        }

        rider.version = expected_version + 1;
        *row = rider;
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: DeliveryOrder) -> Result<(), StoreError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("order {}", order.id))),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<DeliveryOrder>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn insert_assignment(&self, assignment: DeliveryAssignment) -> Result<bool, StoreError> {
        // Lock order: active_by_order, tracking_codes, assignments.
        let slot = match self.active_by_order.entry(assignment.order_id) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(slot) => slot,
        };

        match self.tracking_codes.entry(assignment.tracking_code.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Duplicate(format!(
                    "tracking code {}",
                    assignment.tracking_code
                )));
            }
            Entry::Vacant(code) => {
                code.insert(assignment.id);
            }
        }

        if !assignment.status.is_terminal() {
            slot.insert(assignment.id);
        }
        self.assignments.insert(assignment.id, assignment);
        Ok(true)
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<DeliveryAssignment>, StoreError> {
        Ok(self.assignments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn active_assignment_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<DeliveryAssignment>, StoreError> {
        let Some(id) = self.active_by_order.get(&order_id).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.assignments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn assignments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<DeliveryAssignment>, StoreError> {
        let mut found: Vec<DeliveryAssignment> = self
            .assignments
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|a| a.assigned_at);
        Ok(found)
    }

    async fn update_assignment_if_status(
        &self,
        assignment: DeliveryAssignment,
        expected: AssignmentStatus,
    ) -> Result<bool, StoreError> {
        let (order_id, id) = (assignment.order_id, assignment.id);
        let closed = !expected.is_terminal() && assignment.status.is_terminal();

        {
            let Some(mut row) = self.assignments.get_mut(&id) else {
                return Ok(false);
            };
            if row.status != expected {
                return Ok(false);
            }
            *row = assignment;
        }

        if closed {
            self.active_by_order
                .remove_if(&order_id, |_, active_id| *active_id == id);
        }
        Ok(true)
    }

    async fn find_by_tracking_code(
        &self,
        code: &str,
    ) -> Result<Option<DeliveryAssignment>, StoreError> {
        let Some(id) = self.tracking_codes.get(code).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.assignments.get(&id).map(|entry| entry.value().clone()))
    }

    async fn tracking_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.tracking_codes.contains_key(code))
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn append(&self, event: NotificationEvent) -> Result<(), StoreError> {
        self.notifications
            .entry(event.order_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<NotificationEvent>, StoreError> {
        Ok(self
            .notifications
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
    use crate::store::AssignmentStore;

    fn assignment(order_id: Uuid, code: &str) -> DeliveryAssignment {
        let now = Utc::now();
        DeliveryAssignment {
            id: Uuid::new_v4(),
            store_id: Uuid::from_u128(1),
            order_id,
            rider_id: Some(Uuid::new_v4()),
            zone_id: None,
            status: AssignmentStatus::Assigned,
            delivery_fee: Decimal::new(500, 2),
            rider_earnings: Decimal::new(350, 2),
            estimated_minutes: Some(30),
            tracking_code: code.to_string(),
            assigned_at: Some(now),
            accepted_at: None,
            picked_up_at: None,
            in_transit_at: None,
            delivered_at: None,
            failed_at: None,
            cancelled_at: None,
            failure_reason: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn second_active_assignment_for_order_is_refused() {
        let store = MemoryStore::new();
        let order_id = Uuid::new_v4();

        assert!(store.insert_assignment(assignment(order_id, "AAAA2222")).await.unwrap());
        assert!(!store.insert_assignment(assignment(order_id, "BBBB3333")).await.unwrap());
        assert!(!store.tracking_code_exists("BBBB3333").await.unwrap());
    }

    #[tokio::test]
    async fn closing_an_assignment_frees_the_order() {
        let store = MemoryStore::new();
        let order_id = Uuid::new_v4();
        let first = assignment(order_id, "CCCC4444");
        store.insert_assignment(first.clone()).await.unwrap();

        let mut cancelled = first.clone();
        cancelled.stamp(AssignmentStatus::Cancelled, Utc::now());
        assert!(store
            .update_assignment_if_status(cancelled, AssignmentStatus::Assigned)
            .await
            .unwrap());

        assert!(store.active_assignment_for_order(order_id).await.unwrap().is_none());
        assert!(store.insert_assignment(assignment(order_id, "DDDD5555")).await.unwrap());
    }

    #[tokio::test]
    async fn stale_expected_status_is_rejected() {
        let store = MemoryStore::new();
        let first = assignment(Uuid::new_v4(), "EEEE6666");
        store.insert_assignment(first.clone()).await.unwrap();

        let mut accepted = first.clone();
        accepted.stamp(AssignmentStatus::Accepted, Utc::now());
        assert!(!store
            .update_assignment_if_status(accepted, AssignmentStatus::PickedUp)
            .await
            .unwrap());
    }
}
