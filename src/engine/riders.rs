use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::rider::{Rider, RiderStatus, VehicleType};
use crate::models::zone::GeoPoint;
use crate::store::RiderStore;

/// Read-modify-write retries for updates that must eventually land.
const MAX_CAS_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct RiderInput {
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub vehicle_number: Option<String>,
}

/// Sole writer of rider dispatch status.
///
/// Every change is a conditional write against the row version, so two
/// dispatchers can never both turn the same rider `busy`.
pub struct RiderRegistry {
    riders: Arc<dyn RiderStore>,
}

impl RiderRegistry {
    pub fn new(riders: Arc<dyn RiderStore>) -> Self {
        Self { riders }
    }

    pub async fn create(&self, store_id: Uuid, input: RiderInput) -> Result<Rider, AppError> {
        if input.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        if input.phone.trim().is_empty() {
            return Err(AppError::BadRequest("phone cannot be empty".to_string()));
        }

        let now = Utc::now();
        let rider = Rider {
            id: Uuid::new_v4(),
            store_id,
            name: input.name.trim().to_string(),
            phone: input.phone.trim().to_string(),
            vehicle_type: input.vehicle_type,
            vehicle_number: input.vehicle_number.filter(|n| !n.trim().is_empty()),
            is_active: true,
            is_online: false,
            status: RiderStatus::Offline,
            rating: 0.0,
            rating_count: 0,
            total_deliveries: 0,
            location: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.riders.insert_rider(rider.clone()).await?;
        Ok(rider)
    }

    pub async fn get(&self, store_id: Uuid, rider_id: Uuid) -> Result<Rider, AppError> {
        self.riders
            .get_rider(rider_id)
            .await?
            .filter(|rider| rider.store_id == store_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))
    }

    pub async fn list(&self, store_id: Uuid) -> Result<Vec<Rider>, AppError> {
        let mut riders = self.riders.list_riders(store_id).await?;
        riders.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(riders)
    }

    /// Riders that could be claimed right now. Nothing is reserved.
    pub async fn list_available(&self, store_id: Uuid) -> Result<Vec<Rider>, AppError> {
        let mut riders = self.list(store_id).await?;
        riders.retain(Rider::is_dispatchable);
        Ok(riders)
    }

    /// `available` → `busy`, only for an active rider.
    ///
    /// Never waits: losing a race to another claim is `RiderUnavailable`
    /// immediately, and the caller should try a different rider.
    pub async fn claim(&self, store_id: Uuid, rider_id: Uuid) -> Result<Rider, AppError> {
        let current = self.get(store_id, rider_id).await?;
        if !current.is_dispatchable() {
            return Err(AppError::RiderUnavailable(rider_id));
        }

        match self.riders.claim_if_available(store_id, rider_id).await? {
            Some(claimed) => Ok(claimed),
            None => {
                debug!(rider_id = %rider_id, "rider claim lost a race");
                Err(AppError::RiderUnavailable(rider_id))
            }
        }
    }

    /// `busy` → `available` (or `offline` if the rider dropped offline while
    /// busy). Any other status is left alone, so repeated calls are harmless.
    pub async fn release(&self, store_id: Uuid, rider_id: Uuid) -> Result<RiderStatus, AppError> {
        let rider = self
            .update_with(store_id, rider_id, |rider| {
                if rider.status != RiderStatus::Busy {
                    return None;
                }
                let mut next = rider.clone();
                next.status = if rider.is_online {
                    RiderStatus::Available
                } else {
                    RiderStatus::Offline
                };
                Some(next)
            })
            .await?;

        Ok(rider.status)
    }

    /// Device presence from the rider app. A busy rider stays busy until the
    /// delivery ends.
    pub async fn set_online(
        &self,
        store_id: Uuid,
        rider_id: Uuid,
        online: bool,
        location: Option<GeoPoint>,
    ) -> Result<Rider, AppError> {
        let rider = self
            .update_with(store_id, rider_id, |rider| {
                let mut next = rider.clone();
                next.is_online = online;
                if location.is_some() {
                    next.location = location;
                }
                next.status = match (online, rider.status) {
                    (true, RiderStatus::Offline) => RiderStatus::Available,
                    (false, RiderStatus::Available) => RiderStatus::Offline,
                    (_, status) => status,
                };
                Some(next)
            })
            .await?;

        info!(rider_id = %rider_id, online, status = ?rider.status, "rider presence changed");
        Ok(rider)
    }

    /// Employment flag. Inactive riders are never claimed, whatever their status.
    pub async fn set_active(
        &self,
        store_id: Uuid,
        rider_id: Uuid,
        active: bool,
    ) -> Result<Rider, AppError> {
        self.update_with(store_id, rider_id, |rider| {
            let mut next = rider.clone();
            next.is_active = active;
            Some(next)
        })
        .await
    }

    pub async fn record_delivery(&self, store_id: Uuid, rider_id: Uuid) -> Result<Rider, AppError> {
        self.update_with(store_id, rider_id, |rider| {
            let mut next = rider.clone();
            next.total_deliveries = rider.total_deliveries.saturating_add(1);
            Some(next)
        })
        .await
    }

    /// Folds a 1–5 customer rating into the running average.
    pub async fn rate(&self, store_id: Uuid, rider_id: Uuid, score: f64) -> Result<Rider, AppError> {
        if !(1.0..=5.0).contains(&score) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".to_string()));
        }

        self.update_with(store_id, rider_id, |rider| {
            let count = f64::from(rider.rating_count);
            let mut next = rider.clone();
            next.rating = (rider.rating * count + score) / (count + 1.0);
            next.rating_count = rider.rating_count.saturating_add(1);
            Some(next)
        })
        .await
    }

    async fn update_with<F>(&self, store_id: Uuid, rider_id: Uuid, change: F) -> Result<Rider, AppError>
    where
        F: Fn(&Rider) -> Option<Rider> + Send + Sync,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.get(store_id, rider_id).await?;
            let Some(mut next) = change(&current) else {
                return Ok(current);
            };
            next.updated_at = Utc::now();

            if self
                .riders
                .update_rider_if_version(next.clone(), current.version)
                .await?
            {
                next.version = current.version + 1;
                return Ok(next);
            }

            debug!(rider_id = %rider_id, attempt, "rider changed concurrently; retrying");
        }

        Err(AppError::Internal(format!(
            "rider {rider_id} kept changing; gave up after {MAX_CAS_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use uuid::Uuid;

    use super::{RiderInput, RiderRegistry};
    use crate::error::AppError;
    use crate::models::rider::{RiderStatus, VehicleType};
    use crate::models::zone::GeoPoint;
    use crate::store::{MemoryStore, RiderStore};

    fn input(name: &str) -> RiderInput {
        RiderInput {
            name: name.to_string(),
            phone: "+15550001111".to_string(),
            vehicle_type: VehicleType::Motorcycle,
            vehicle_number: None,
        }
    }

    async fn online_rider(registry: &RiderRegistry, store_id: Uuid, name: &str) -> Uuid {
        let rider = registry.create(store_id, input(name)).await.unwrap();
        registry
            .set_online(store_id, rider.id, true, None)
            .await
            .unwrap();
        rider.id
    }

    #[tokio::test]
    async fn new_rider_starts_offline() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let rider = registry.create(Uuid::new_v4(), input("Ana")).await.unwrap();

        assert_eq!(rider.status, RiderStatus::Offline);
        assert!(!rider.is_online);
    }

    #[tokio::test]
    async fn claim_then_second_claim_fails() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;

        let claimed = registry.claim(store_id, id).await.unwrap();
        assert_eq!(claimed.status, RiderStatus::Busy);

        assert_matches!(
            registry.claim(store_id, id).await,
            Err(AppError::RiderUnavailable(rider)) if rider == id
        );
    }

    #[tokio::test]
    async fn unrelated_edits_do_not_fail_a_claim() {
        let store = Arc::new(MemoryStore::new());
        let registry = RiderRegistry::new(store.clone());
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;
        let seen = registry.get(store_id, id).await.unwrap();

        registry.rate(store_id, id, 4.0).await.unwrap();
        registry
            .set_online(store_id, id, true, Some(GeoPoint::new(1.0, 1.0)))
            .await
            .unwrap();
        assert!(registry.get(store_id, id).await.unwrap().version > seen.version);

        let claimed = registry.claim(store_id, id).await.unwrap();
        assert_eq!(claimed.status, RiderStatus::Busy);
        assert_eq!(claimed.rating_count, 1);
        assert!(store.claim_if_available(store_id, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inactive_rider_cannot_be_claimed() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;
        registry.set_active(store_id, id, false).await.unwrap();

        assert_matches!(
            registry.claim(store_id, id).await,
            Err(AppError::RiderUnavailable(_))
        );
        assert!(registry.list_available(store_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rider_from_another_store_is_not_found() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let id = online_rider(&registry, Uuid::new_v4(), "Ana").await;

        assert_matches!(
            registry.claim(Uuid::new_v4(), id).await,
            Err(AppError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;
        registry.claim(store_id, id).await.unwrap();

        assert_eq!(registry.release(store_id, id).await.unwrap(), RiderStatus::Available);
        assert_eq!(registry.release(store_id, id).await.unwrap(), RiderStatus::Available);
        assert_eq!(
            registry.get(store_id, id).await.unwrap().status,
            RiderStatus::Available
        );
    }

    #[tokio::test]
    async fn going_offline_while_busy_releases_to_offline() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;
        registry.claim(store_id, id).await.unwrap();

        let rider = registry.set_online(store_id, id, false, None).await.unwrap();
        assert_eq!(rider.status, RiderStatus::Busy);

        assert_eq!(registry.release(store_id, id).await.unwrap(), RiderStatus::Offline);
    }

    #[tokio::test]
    async fn list_available_excludes_busy_and_offline() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let busy = online_rider(&registry, store_id, "Busy Bea").await;
        let free = online_rider(&registry, store_id, "Free Fay").await;
        registry.create(store_id, input("Offline Olga")).await.unwrap();
        registry.claim(store_id, busy).await.unwrap();

        let available = registry.list_available(store_id).await.unwrap();
        let ids: Vec<Uuid> = available.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![free]);
    }

    #[tokio::test]
    async fn rating_is_a_running_average() {
        let registry = RiderRegistry::new(Arc::new(MemoryStore::new()));
        let store_id = Uuid::new_v4();
        let id = online_rider(&registry, store_id, "Ana").await;

        registry.rate(store_id, id, 5.0).await.unwrap();
        let rider = registry.rate(store_id, id, 4.0).await.unwrap();

        assert!((rider.rating - 4.5).abs() < 1e-9);
        assert_eq!(rider.rating_count, 2);
        assert_matches!(
            registry.rate(store_id, id, 6.0).await,
            Err(AppError::BadRequest(_))
        );
    }
}
