pub mod assignment;
pub mod notification;
pub mod order;
pub mod rider;
pub mod zone;
