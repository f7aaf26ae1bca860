use serde::{Deserialize, Serialize};

/// Credentials submitted to the admin login endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}
