pub mod auto_dispatch;
pub mod dispatch;
pub mod queue;
pub mod riders;
pub mod scoring;
pub mod tracking;
pub mod zones;

pub use dispatch::{AdvanceData, AssignRequest, DispatchEngine, OrderInput, TrackingView};
pub use riders::{RiderInput, RiderRegistry};
pub use zones::ZoneCatalog;
