use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::config::Argon2Config;
use crate::progression::errors::EngineError;

/// Argon2id password hashing with optional custom cost parameters.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

impl CredentialHasher {
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Build from the `[security.argon2]` section; unset fields keep the argon2 defaults.
    pub fn from_config(config: Option<&Argon2Config>) -> Result<Self, EngineError> {
        let Some(a) = config else {
            return Ok(Self::default());
        };
        let builder = Params::DEFAULT;
        let mem = a.memory_kib.unwrap_or(builder.m_cost());
        let time = a.time_cost.unwrap_or(builder.t_cost());
        let para = a.parallelism.unwrap_or(builder.p_cost());
        let params = Params::new(mem, time, para, None)
            .map_err(|e| EngineError::Credential(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self::with_params(params))
    }

    pub fn hash(&self, password: &str) -> Result<String, EngineError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| EngineError::Credential(format!("password hash failure: {e}")))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, EngineError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| EngineError::Credential(format!("corrupt password hash: {e}")))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
