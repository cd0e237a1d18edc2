pub mod dispatch;
pub mod notification;
pub mod recorder;
pub mod registry;

pub use dispatch::{DispatchPlan, Dispatcher, InboundRequest, Rejection};
pub use notification::Notifier;
pub use recorder::{EventRecorder, PgEventRecorder};
pub use registry::{DestinationRegistry, PgDestinationRegistry};
