pub mod list_message_response;
pub mod list_room_response;
pub mod message_response;
pub mod no_content_response;
pub mod recording_response;
pub mod room_response;
pub mod socket_response;
