use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Assigned,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 8] = [
        AssignmentStatus::Pending,
        AssignmentStatus::Assigned,
        AssignmentStatus::Accepted,
        AssignmentStatus::PickedUp,
        AssignmentStatus::InTransit,
        AssignmentStatus::Delivered,
        AssignmentStatus::Failed,
        AssignmentStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssignmentStatus::Delivered | AssignmentStatus::Failed | AssignmentStatus::Cancelled
        )
    }

    /// The single transition table for the assignment lifecycle.
    ///
    /// `Pending -> Assigned` is listed for completeness but is only reachable
    /// through a rider claim, never through a plain status update.
    pub fn can_transition_to(self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;

        match self {
            Pending => matches!(next, Assigned | Cancelled),
            Assigned => matches!(next, Accepted | Failed | Cancelled),
            Accepted => matches!(next, PickedUp | Failed | Cancelled),
            PickedUp => matches!(next, InTransit | Failed | Cancelled),
            InTransit => matches!(next, Delivered | Failed | Cancelled),
            Delivered | Failed | Cancelled => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::PickedUp => "picked_up",
            AssignmentStatus::InTransit => "in_transit",
            AssignmentStatus::Delivered => "delivered",
            AssignmentStatus::Failed => "failed",
            AssignmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub store_id: Uuid,
    pub order_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub status: AssignmentStatus,
    /// Frozen at creation; later zone edits never touch it.
    pub delivery_fee: Decimal,
    pub rider_earnings: Decimal,
    pub estimated_minutes: Option<u32>,
    pub tracking_code: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryAssignment {
    /// Moves to `next` and stamps the matching timestamp. Does not check the
    /// transition table; callers go through the dispatch engine for that.
    pub fn stamp(&mut self, next: AssignmentStatus, at: DateTime<Utc>) {
        match next {
            AssignmentStatus::Pending => {}
            AssignmentStatus::Assigned => self.assigned_at = Some(at),
            AssignmentStatus::Accepted => self.accepted_at = Some(at),
            AssignmentStatus::PickedUp => self.picked_up_at = Some(at),
            AssignmentStatus::InTransit => self.in_transit_at = Some(at),
            AssignmentStatus::Delivered => self.delivered_at = Some(at),
            AssignmentStatus::Failed => self.failed_at = Some(at),
            AssignmentStatus::Cancelled => self.cancelled_at = Some(at),
        }
        self.status = next;
        self.updated_at = at;
    }
}
