pub mod chat;
pub mod common;
pub mod recording;
pub mod room;
pub mod socket;
