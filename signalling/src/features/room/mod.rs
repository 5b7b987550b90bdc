pub mod repository;
pub mod router;
pub mod seats;
pub mod service;
