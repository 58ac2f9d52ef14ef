pub mod dispatcher;
pub mod queue;
pub mod sender;
pub mod templates;

pub use dispatcher::NotificationDispatcher;
pub use queue::{run_notification_worker, NotificationJob, NotificationQueue};
pub use sender::{LogSender, MessageSender, TransportError};
