use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenService};
use crate::blob::BlobStore;
use crate::store::Repository;

/// Long-lived handles shared by every request. Built once in `main` (or a test) and
/// registered with `App::app_data(web::Data::new(state))`.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub blobs: Arc<dyn BlobStore>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStore>,
        tokens: TokenService,
        passwords: PasswordHasher,
    ) -> Self {
        Self {
            repo,
            blobs,
            tokens,
            passwords,
        }
    }
}
