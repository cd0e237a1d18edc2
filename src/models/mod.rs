pub mod delivery;
pub mod destination;

pub use delivery::{
    DeliveryResult, DeliveryStatus, DispatchStage, DispatchSummary, EnvelopeStatus,
};
pub use destination::{
    Destination, DestinationConfig, DestinationEntry, DestinationFilters, DestinationRow,
    DestinationType, DiscordConfig, InvalidConfig, MattermostConfig, SlackConfig, TelegramConfig,
};
