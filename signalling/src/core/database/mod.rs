pub mod db;
pub mod schema;

#[cfg(test)]
pub mod memory;
