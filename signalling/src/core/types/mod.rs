pub mod app_channel;
pub mod enums;
pub mod errors;
pub mod responses;
