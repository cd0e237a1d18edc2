pub mod detect;
pub mod envelope;
pub mod parser;
pub mod signature;

pub use detect::{detect, Detected, WebhookHeaders};
pub use envelope::{DetailItem, EventEnvelope, EventKind, EventMetadata, Fact, Platform};
pub use parser::parse;
