pub mod edit_message_dto;
