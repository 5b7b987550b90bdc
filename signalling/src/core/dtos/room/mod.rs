pub mod create_room_dto;
pub mod join_room_dto;
