pub mod socket_dto;
