/// Password hashing and verification using Argon2id
///
/// Implements secure password hashing following OWASP recommendations:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 threads
/// - Salt: 16 bytes random, embedded in the PHC output
/// - Output: 32 bytes hash
///
/// Legacy bcrypt digests (`$2a$`, `$2b$`, `$2y$`) are still accepted by
/// [`PasswordHasher::verify`] so that imported accounts can sign in; they are
/// reported by [`needs_rehash`] and upgraded on the next successful signin.
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use keystone_core::PasswordConfig;
use once_cell::sync::OnceCell;
use thiserror::Error;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

fn to_params(config: &PasswordConfig) -> Result<Params, PasswordError> {
    Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        config.output_len,
    )
    .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Plaintext behind the placeholder digest used by [`PasswordHasher::verify_absent`]
const ABSENT_ACCOUNT_PASSWORD: &str = "keystone-absent-account";

/// One-way salted password hasher with constant-time verification
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    config: PasswordConfig,
    absent_digest: OnceCell<String>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self {
            config,
            absent_digest: OnceCell::new(),
        }
    }

    /// Hash a plaintext password
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - PHC string format hash (includes algorithm, parameters, salt, and hash)
    /// * `Err(PasswordError)` - If the parameters are invalid or hashing fails
    ///
    /// Every call generates a fresh salt, so hashing the same password twice
    /// yields two different digests that both verify.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let params = to_params(&self.config)?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Verify a plaintext password against a stored digest
    ///
    /// Returns `false` on mismatch and on digests that cannot be parsed; it
    /// never fails. The underlying comparison is constant-time.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        if is_bcrypt(digest) {
            return match bcrypt::verify(password, digest) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable bcrypt digest");
                    false
                }
            };
        }

        let parsed_hash = match PasswordHash::new(digest) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable password digest");
                return false;
            }
        };

        // Parameters and salt come from the digest itself
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Password verification failed");
                false
            }
        }
    }

    /// Run a full verification for a login whose account does not exist
    ///
    /// Costs the same as [`verify`](Self::verify) against a digest made with
    /// this hasher's parameters. Always returns `false`.
    pub fn verify_absent(&self, password: &str) -> bool {
        let digest = match self
            .absent_digest
            .get_or_try_init(|| self.hash(ABSENT_ACCOUNT_PASSWORD))
        {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(error = %e, "Could not prepare placeholder digest");
                return false;
            }
        };

        let _ = self.verify(password, digest);
        false
    }

    #[cfg(test)]
    pub(crate) fn has_absent_digest(&self) -> bool {
        self.absent_digest.get().is_some()
    }
}

fn is_bcrypt(digest: &str) -> bool {
    digest.starts_with("$2")
}

/// Whether a stored digest should be replaced by a fresh Argon2id hash
pub fn needs_rehash(digest: &str) -> bool {
    is_bcrypt(digest)
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    })
}
