pub mod access;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};

// Re-export necessary items
pub use access::OwnedTask;
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{CredentialError, PasswordHasher};
pub use token::{Claims, TokenError, TokenService};

/// Header carrying the session token. Not the standard `Authorization` scheme.
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";

/// Response after registration or login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Signed session token, sent back in the `Access-Token` header.
    pub token: String,
}
