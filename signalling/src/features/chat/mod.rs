pub mod flood_guard;
pub mod repository;
pub mod router;
pub mod service;
