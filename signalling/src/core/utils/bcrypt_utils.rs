extern crate bcrypt;

use bcrypt::{hash, verify};

/// Room password hashing with a configurable work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password, self.cost)
    }

    /// A malformed stored hash verifies as a mismatch.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        verify(password, hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let hasher = PasswordHasher::new(4);
        let hashed = hasher.hash_password("s3cret!").unwrap();

        assert_ne!(hashed, "s3cret!");
        assert!(hasher.verify_password("s3cret!", &hashed));
        assert!(!hasher.verify_password("s3cret", &hashed));
        assert!(!hasher.verify_password("s3cret!", "not-a-bcrypt-hash"));
    }
}
