pub mod frame;
pub mod options;
pub mod turn;

pub use frame::{InboundFrame, OutboundFrame};
pub use options::{AiModel, SendOptions, SpeechModel, TtsVoice};
pub use turn::QueuedTurn;
