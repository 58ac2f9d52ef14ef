use rand::Rng;
use tracing::debug;

use crate::error::AppError;
use crate::store::AssignmentStore;

/// Uppercase letters and digits minus I, O, 0 and 1, which get confused when
/// read out over the phone.
pub const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const TRACKING_CODE_LENGTH: usize = 8;

/// A random code. Uniqueness is not guaranteed; see [`generate_unique`].
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..TRACKING_CODE_LENGTH)
        .map(|_| TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())] as char)
        .collect()
}

/// Generates codes until one is unused, giving up after `max_attempts`.
pub async fn generate_unique(
    assignments: &dyn AssignmentStore,
    max_attempts: u32,
) -> Result<String, AppError> {
    generate_unique_with(assignments, max_attempts, generate).await
}

pub(crate) async fn generate_unique_with<G>(
    assignments: &dyn AssignmentStore,
    max_attempts: u32,
    mut next_code: G,
) -> Result<String, AppError>
where
    G: FnMut() -> String + Send,
{
    for attempt in 1..=max_attempts {
        let code = next_code();
        if !assignments.tracking_code_exists(&code).await? {
            return Ok(code);
        }
        debug!(attempt, "tracking code collision; regenerating");
    }

    Err(AppError::TrackingCodeExhausted(max_attempts))
}

pub fn tracking_url(base_url: &str, code: &str) -> String {
    format!("{}/{code}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
    use crate::store::MemoryStore;

    async fn store_with_code(code: &str) -> MemoryStore {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_assignment(DeliveryAssignment {
                id: Uuid::new_v4(),
                store_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                rider_id: None,
                zone_id: None,
                status: AssignmentStatus::Assigned,
                delivery_fee: Decimal::ZERO,
                rider_earnings: Decimal::ZERO,
                estimated_minutes: None,
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
            })
            .await
            .unwrap();
        store
    }

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..500 {
            let code = generate();
            assert_eq!(code.len(), TRACKING_CODE_LENGTH);
            assert!(code.bytes().all(|b| TRACKING_ALPHABET.contains(&b)), "{code}");
            assert!(!code.contains(['I', 'O', '0', '1']));
        }
    }

    #[tokio::test]
    async fn collision_triggers_a_retry() {
        let store = store_with_code("TAKEN234").await;
        let mut codes = VecDeque::from(["TAKEN234".to_string(), "FRESH567".to_string()]);

        let code = generate_unique_with(&store, 3, || codes.pop_front().unwrap())
            .await
            .unwrap();
        assert_eq!(code, "FRESH567");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = store_with_code("TAKEN234").await;

        let result = generate_unique_with(&store, 4, || "TAKEN234".to_string()).await;
        assert_matches!(result, Err(AppError::TrackingCodeExhausted(4)));
    }

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            tracking_url("https://track.example.com/", "ABCD2345"),
            "https://track.example.com/ABCD2345"
        );
    }
}
