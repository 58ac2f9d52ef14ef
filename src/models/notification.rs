use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Customer,
    Rider,
}

/// Everything a template needs to render one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub order_id: Uuid,
    pub assignment_id: Uuid,
    pub status: AssignmentStatus,
    pub recipient: Recipient,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub rider_name: Option<String>,
    pub rider_phone: Option<String>,
    pub address: String,
    pub estimated_minutes: Option<u32>,
    pub tracking_url: String,
    pub failure_reason: Option<String>,
    pub country: String,
}

impl NotificationPayload {
    pub fn recipient_phone(&self) -> Option<&str> {
        let phone = match self.recipient {
            Recipient::Customer => self.customer_phone.as_deref(),
            Recipient::Rider => self.rider_phone.as_deref(),
        };
        phone.map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Audit record of one send attempt on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub assignment_id: Uuid,
    pub channel: Channel,
    pub recipient: Recipient,
    pub status: AssignmentStatus,
    pub message_preview: String,
    pub sent: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// `None` when there was no phone number to send to.
    pub channel: Option<Channel>,
    pub sent: bool,
}
