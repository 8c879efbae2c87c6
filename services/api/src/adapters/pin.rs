//! services/api/src/adapters/pin.rs
//!
//! Argon2 implementation of the `PinHasher` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use classroom_core::ports::{PinHasher, PortError, PortResult};
use tracing::error;

#[derive(Default)]
pub struct Argon2PinHasher {
    argon2: Argon2<'static>,
}

impl Argon2PinHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinHasher for Argon2PinHasher {
    fn hash_pin(&self, pin: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(pin.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash PIN: {:?}", e);
                PortError::BackendUnavailable("failed to hash PIN".to_string())
            })
    }

    fn verify_pin(&self, pin: &str, pin_hash: &str) -> PortResult<bool> {
        let parsed_hash = PasswordHash::new(pin_hash).map_err(|e| {
            error!("Failed to parse stored PIN hash: {:?}", e);
            PortError::BackendUnavailable("stored PIN hash is unreadable".to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
