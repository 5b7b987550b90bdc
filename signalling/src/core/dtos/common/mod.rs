pub mod pagination_dto;
