pub mod chat;
pub mod realtime;
pub mod render;
pub mod storage;

pub use chat::{ChatSession, ChatTurn, SessionEvent, HISTORY_KEY};
pub use storage::FileStore;
