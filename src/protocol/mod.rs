pub mod constants;
pub mod messages;

pub use constants::{error_codes, events};
pub use messages::{InboundMessage, MessageData, PusherMessage};
