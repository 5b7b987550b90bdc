pub mod core;
pub mod features;

#[cfg(test)]
pub mod test_utils;
