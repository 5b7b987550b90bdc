pub mod api;
pub mod audit;
pub mod database;
pub mod dtos;
pub mod entities;
pub mod env;
pub mod socket;
pub mod types;
pub mod utils;
