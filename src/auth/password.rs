use bcrypt::{hash, verify};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    HashingFailure(String),
}

/// bcrypt hasher with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        hash(password, self.cost).map_err(|e| CredentialError::HashingFailure(e.to_string()))
    }

    /// Returns `Ok(false)` for a wrong password. Only a stored hash that bcrypt cannot
    /// parse is an error.
    pub fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, CredentialError> {
        verify(password, hashed_password)
            .map_err(|e| CredentialError::HashingFailure(format!("Failed to verify password: {}", e)))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
