pub mod start_recording_dto;
pub mod stop_recording_dto;
