pub mod client;
pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

pub use client::{
    ClientConfig, ConnectionManager, ConnectionState, HostSignal, SendOutcome, Subscription,
};
pub use error::{LinkError, Result};
pub use types::{InboundFrame, OutboundFrame, QueuedTurn, SendOptions};
