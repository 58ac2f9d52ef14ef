//! Per-status, per-channel message bodies.
//!
//! Both matches are exhaustive over `AssignmentStatus`: adding a status
//! without a template does not compile.

use crate::models::assignment::AssignmentStatus;
use crate::models::notification::{Channel, NotificationPayload, Recipient};

pub fn render(payload: &NotificationPayload, channel: Channel) -> String {
    match (payload.recipient, channel) {
        (Recipient::Customer, Channel::Sms) => customer_sms(payload),
        (Recipient::Customer, Channel::Whatsapp) => customer_whatsapp(payload),
        (Recipient::Rider, Channel::Sms) => rider_sms(payload),
        (Recipient::Rider, Channel::Whatsapp) => rider_whatsapp(payload),
    }
}

fn eta(payload: &NotificationPayload) -> String {
    payload
        .estimated_minutes
        .map(|minutes| format!("{minutes} min"))
        .unwrap_or_else(|| "soon".to_string())
}

fn rider(payload: &NotificationPayload) -> &str {
    payload.rider_name.as_deref().unwrap_or("your rider")
}

fn rider_phone(payload: &NotificationPayload) -> &str {
    payload.rider_phone.as_deref().unwrap_or("-")
}

fn reason(payload: &NotificationPayload) -> &str {
    payload.failure_reason.as_deref().unwrap_or("unknown reason")
}

fn customer_sms(p: &NotificationPayload) -> String {
    let order = &p.order_number;
    let track = &p.tracking_url;

    match p.status {
        AssignmentStatus::Pending => {
            format!("Order #{order} is ready and waiting for a rider. Track: {track}")
        }
        AssignmentStatus::Assigned => format!(
            "Hi {}, {} ({}) will deliver order #{order}. ETA {}. Track: {track}",
            p.customer_name,
            rider(p),
            rider_phone(p),
            eta(p)
        ),
        AssignmentStatus::Accepted => {
            format!("{} accepted order #{order}. Track: {track}", rider(p))
        }
        AssignmentStatus::PickedUp => {
            format!("Order #{order} has been picked up by {}. Track: {track}", rider(p))
        }
        AssignmentStatus::InTransit => format!(
            "Order #{order} is on its way to {}. ETA {}. Track: {track}",
            p.address,
            eta(p)
        ),
        AssignmentStatus::Delivered => {
            format!("Order #{order} was delivered. Thanks for ordering, {}!", p.customer_name)
        }
        AssignmentStatus::Failed => format!(
            "We could not deliver order #{order}: {}. We will contact you shortly.",
            reason(p)
        ),
        AssignmentStatus::Cancelled => format!("Delivery of order #{order} was cancelled."),
    }
}

fn customer_whatsapp(p: &NotificationPayload) -> String {
    let order = &p.order_number;
    let track = &p.tracking_url;

    match p.status {
        AssignmentStatus::Pending => format!(
            "🧾 *Order #{order}* is ready and waiting for a rider.\n\nTrack it here: {track}"
        ),
        AssignmentStatus::Assigned => format!(
            "Hi {} 👋\n\n🛵 *{}* will deliver your order *#{order}*.\n📞 {}\n⏱ ETA: {}\n\nTrack it here: {track}",
            p.customer_name,
            rider(p),
            rider_phone(p),
            eta(p)
        ),
        AssignmentStatus::Accepted => format!(
            "✅ *{}* accepted your order *#{order}*.\n\nTrack it here: {track}",
            rider(p)
        ),
        AssignmentStatus::PickedUp => format!(
            "📦 Your order *#{order}* was picked up by *{}*.\n\nTrack it here: {track}",
            rider(p)
        ),
        AssignmentStatus::InTransit => format!(
            "🛵 Your order *#{order}* is on its way!\n📍 {}\n⏱ ETA: {}\n\nTrack it here: {track}",
            p.address,
            eta(p)
        ),
        AssignmentStatus::Delivered => format!(
            "🎉 Order *#{order}* delivered. Enjoy, {}!",
            p.customer_name
        ),
        AssignmentStatus::Failed => format!(
            "⚠️ We could not deliver order *#{order}*.\nReason: _{}_\n\nWe will contact you shortly.",
            reason(p)
        ),
        AssignmentStatus::Cancelled => {
            format!("❌ Delivery of order *#{order}* was cancelled.")
        }
    }
}

fn rider_sms(p: &NotificationPayload) -> String {
    let order = &p.order_number;
    let customer_phone = p.customer_phone.as_deref().unwrap_or("-");

    match p.status {
        AssignmentStatus::Assigned => format!(
            "New delivery #{order} for {} ({customer_phone}) at {}.",
            p.customer_name, p.address
        ),
        AssignmentStatus::Cancelled => format!("Delivery #{order} was cancelled. Do not pick it up."),
        AssignmentStatus::Pending
        | AssignmentStatus::Accepted
        | AssignmentStatus::PickedUp
        | AssignmentStatus::InTransit
        | AssignmentStatus::Delivered
        | AssignmentStatus::Failed => format!("Delivery #{order} is now {}.", p.status),
    }
}

fn rider_whatsapp(p: &NotificationPayload) -> String {
    let order = &p.order_number;
    let customer_phone = p.customer_phone.as_deref().unwrap_or("-");

    match p.status {
        AssignmentStatus::Assigned => format!(
            "🆕 *New delivery #{order}*\n👤 {}\n📞 {customer_phone}\n📍 {}",
            p.customer_name, p.address
        ),
        AssignmentStatus::Cancelled => {
            format!("❌ Delivery *#{order}* was cancelled. Do not pick it up.")
        }
        AssignmentStatus::Pending
        | AssignmentStatus::Accepted
        | AssignmentStatus::PickedUp
        | AssignmentStatus::InTransit
        | AssignmentStatus::Delivered
        | AssignmentStatus::Failed => format!("Delivery *#{order}* is now _{}_.", p.status),
    }
}
