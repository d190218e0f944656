//! Cache key layout. Every key for a chat shares the `chat:{id}` prefix.

use uuid::Uuid;

/// Scalar snapshot fields, one JSON document.
pub fn chat(chat_id: Uuid) -> String {
    format!("chat:{chat_id}")
}

/// Participant ids, an ordered list.
pub fn participants(chat_id: Uuid) -> String {
    format!("chat:{chat_id}:participants")
}

/// Recent-message ring: a hash holding `seq` plus one field per slot.
pub fn window(chat_id: Uuid) -> String {
    format!("chat:{chat_id}:window")
}

/// Hash field holding the window's append counter.
pub const WINDOW_SEQ_FIELD: &str = "seq";
