pub mod models;
pub mod principal;
