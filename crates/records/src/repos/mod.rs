//! Repository traits for record store operations.

pub mod chats;
pub mod messages;

pub use chats::ChatRepo;
pub use messages::MessageRepo;
