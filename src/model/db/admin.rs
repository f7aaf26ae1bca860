use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{api::admin::AdminCredentials, mongodb::Coll, mongodb::Id};

/// The username of the bootstrap admin created on first launch.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to create an AdminCore is via
        // TryFrom<AdminCredentials>, so the hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

impl TryFrom<AdminCredentials> for AdminCore {
    type Error = argon2::Error;

    fn try_from(credentials: AdminCredentials) -> std::result::Result<Self, Self::Error> {
        let salt: [u8; 16] = rand::random();
        let password_hash = argon2::hash_encoded(
            credentials.password.as_bytes(),
            &salt,
            &argon2::Config::default(),
        )?;
        Ok(Self {
            username: credentials.username,
            password_hash,
        })
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Create the bootstrap admin if and only if there are no admins at all.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<()> {
    let count = admins.count_documents(None, None).await?;
    if count == 0 {
        let admin: NewAdmin = AdminCredentials {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
        .try_into()?;
        admins.insert_one(admin, None).await?;
        warn!("Created default admin '{DEFAULT_ADMIN_USERNAME}'; change its password immediately");
    }
    Ok(())
}
