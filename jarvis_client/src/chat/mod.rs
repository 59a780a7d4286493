//! Chat session: the turn list the UI renders, fed by the realtime link.

mod session;
mod turn;

pub use session::{ChatSession, SessionEvent, HISTORY_KEY};
pub use turn::{ChatTurn, StoredTurn};
