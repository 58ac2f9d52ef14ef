use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::models::notification::{Channel, NotificationEvent, NotificationPayload, NotifyOutcome};
use crate::notify::sender::MessageSender;
use crate::notify::templates::render;
use crate::observability::metrics::Metrics;
use crate::store::NotificationLog;

const PREVIEW_CHARS: usize = 120;

/// Renders and sends one message, WhatsApp first when preferred, SMS as the
/// fallback. Every attempt is audited. Failures never escape as errors.
pub struct NotificationDispatcher {
    sender: Arc<dyn MessageSender>,
    log: Arc<dyn NotificationLog>,
    metrics: Metrics,
    last_stamp: Mutex<DateTime<Utc>>,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, log: Arc<dyn NotificationLog>, metrics: Metrics) -> Self {
        Self {
            sender,
            log,
            metrics,
            last_stamp: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub async fn notify(&self, payload: &NotificationPayload, prefer_whatsapp: bool) -> NotifyOutcome {
        let Some(phone) = payload.recipient_phone() else {
            debug!(order_id = %payload.order_id, recipient = ?payload.recipient, "no phone number; skipping notification");
            self.metrics
                .notifications_total
                .with_label_values(&["none", "skipped"])
                .inc();
            return NotifyOutcome {
                channel: None,
                sent: false,
            };
        };

        if prefer_whatsapp && self.attempt(Channel::Whatsapp, phone, payload).await {
            return NotifyOutcome {
                channel: Some(Channel::Whatsapp),
                sent: true,
            };
        }

        let sent = self.attempt(Channel::Sms, phone, payload).await;
        NotifyOutcome {
            channel: Some(Channel::Sms),
            sent,
        }
    }

    async fn attempt(&self, channel: Channel, phone: &str, payload: &NotificationPayload) -> bool {
        let text = render(payload, channel);
        let result = match channel {
            Channel::Sms => self.sender.send_sms(phone, &text, &payload.country).await,
            Channel::Whatsapp => self.sender.send_whatsapp(phone, &text, &payload.country).await,
        };

        let (sent, error) = match result {
            Ok(()) => (true, None),
            Err(err) => {
                warn!(
                    order_id = %payload.order_id,
                    channel = channel.as_str(),
                    error = %err,
                    "notification send failed"
                );
                (false, Some(err.to_string()))
            }
        };

        self.metrics
            .notifications_total
            .with_label_values(&[channel.as_str(), if sent { "sent" } else { "failed" }])
            .inc();

        let event = NotificationEvent {
            id: Uuid::new_v4(),
            order_id: payload.order_id,
            assignment_id: payload.assignment_id,
            channel,
            recipient: payload.recipient,
            status: payload.status,
            message_preview: text.chars().take(PREVIEW_CHARS).collect(),
            sent,
            error,
            created_at: self.next_stamp(),
        };

        if let Err(err) = self.log.append(event).await {
            error!(order_id = %payload.order_id, error = %err, "failed to write notification audit");
        }

        sent
    }

    /// Wall clock, nudged forward so audit entries are strictly increasing.
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let stamp = if now > *last {
            now
        } else {
            *last + TimeDelta::microseconds(1)
        };
        *last = stamp;
        stamp
    }
}
