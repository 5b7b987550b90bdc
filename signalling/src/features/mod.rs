pub mod chat;
pub mod presence;
pub mod recording;
pub mod room;
