//! Salt generation and one-way password digests.
//!
//! Digests are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`),
//! so every stored hash names its own algorithm and cost. Verification reads
//! those parameters back from the stored digest, which keeps hashes created
//! under older settings valid and lets callers detect when a rehash is due.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, SaltString},
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::constants::credentials::SALT_LEN;

#[derive(Debug, Error)]
pub enum HashError {
    /// The underlying primitive failed; callers must deny the operation.
    #[error("Password hashing unavailable: {0}")]
    Unavailable(String),

    #[error("Stored credential is malformed")]
    Malformed,
}

impl From<argon2::password_hash::Error> for HashError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<argon2::Error> for HashError {
    fn from(err: argon2::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// 16 random bytes mixed into one user's digest.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Fixed salt used only to burn hashing time for unknown usernames.
    const DUMMY: Self = Self([0x5a; SALT_LEN]);

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Encodes as unpadded standard base64, the `users.salt` column format.
    pub fn to_b64(&self) -> Result<String, HashError> {
        Ok(SaltString::encode_b64(&self.0)?.as_str().to_string())
    }

    pub fn from_b64(encoded: &str) -> Result<Self, HashError> {
        let salt = SaltString::from_b64(encoded).map_err(|_| HashError::Malformed)?;
        let mut buf = [0u8; SALT_LEN];
        let decoded = salt.as_salt().decode_b64(&mut buf).map_err(|_| HashError::Malformed)?;
        if decoded.len() != SALT_LEN {
            return Err(HashError::Malformed);
        }
        Ok(Self(buf))
    }

    fn to_salt_string(&self) -> Result<SaltString, HashError> {
        Ok(SaltString::encode_b64(&self.0)?)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt([REDACTED])")
    }
}

/// Draws a fresh salt from the thread-local CSPRNG.
#[must_use]
pub fn generate_salt() -> Salt {
    let mut bytes = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut bytes);
    Salt(bytes)
}

/// A PHC-format password digest. Never displayed.
#[derive(Clone)]
pub struct PasswordDigest(SecretString);

impl PasswordDigest {
    #[must_use]
    pub fn from_phc(phc: String) -> Self {
        Self(SecretString::from(phc))
    }

    /// Exposes the PHC string for persistence.
    #[must_use]
    pub fn expose_phc(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest([REDACTED])")
    }
}

/// The credential half of a user record. Only the credential store builds it
/// and only the auth service consumes it.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub digest: PasswordDigest,
    pub salt: Salt,
}

/// Argon2id hasher configured from [`SecurityConfig`].
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self, HashError> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )?;
        Ok(Self { params })
    }

    /// Digests `salt || password` with the configured cost.
    pub fn hash(&self, password: &str, salt: &Salt) -> Result<PasswordDigest, HashError> {
        let salt_string = salt.to_salt_string()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2.hash_password(password.as_bytes(), &salt_string)?;
        Ok(PasswordDigest::from_phc(hash.to_string()))
    }

    /// Recomputes the digest of `password` with the stored salt and the
    /// algorithm and cost recorded in the stored digest, then compares.
    pub fn verify(&self, password: &str, credential: &StoredCredential) -> Result<bool, HashError> {
        let stored =
            PasswordHash::new(credential.digest.expose_phc()).map_err(|_| HashError::Malformed)?;
        let params = Params::try_from(&stored).map_err(|_| HashError::Malformed)?;
        let salt_string = credential.salt.to_salt_string()?;

        let candidate = Argon2::default().hash_password_customized(
            password.as_bytes(),
            Some(stored.algorithm),
            stored.version,
            params,
            &salt_string,
        )?;

        // `Output` equality is constant-time over equal-length outputs.
        match (candidate.hash, stored.hash) {
            (Some(computed), Some(expected)) => Ok(computed == expected),
            _ => Err(HashError::Malformed),
        }
    }

    /// Hashes `password` against a fixed salt and discards the result, so a
    /// lookup miss costs as much as a wrong password.
    pub fn burn(&self, password: &str) {
        let _ = self.hash(password, &Salt::DUMMY);
    }

    /// True if `digest` was produced with a different algorithm or cost than
    /// the current configuration.
    #[must_use]
    pub fn needs_rehash(&self, digest: &PasswordDigest) -> bool {
        let Ok(stored) = PasswordHash::new(digest.expose_phc()) else {
            return true;
        };
        if stored.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        Params::try_from(&stored).map_or(true, |params| {
            params.m_cost() != self.params.m_cost()
                || params.t_cost() != self.params.t_cost()
                || params.p_cost() != self.params.p_cost()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> CredentialHasher {
        CredentialHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn salts_are_random() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), SALT_LEN);
    }

    #[test]
    fn salt_base64_round_trip() {
        let salt = generate_salt();
        let encoded = salt.to_b64().unwrap();
        assert_eq!(Salt::from_b64(&encoded).unwrap(), salt);
        assert!(Salt::from_b64("!!not base64!!").is_err());
        assert!(Salt::from_b64("c2hvcnQ").is_err());
    }

    #[test]
    fn digest_is_self_describing_and_not_plaintext() {
        let hasher = fast_hasher();
        let digest = hasher.hash("Password1", &generate_salt()).unwrap();
        assert!(digest.expose_phc().starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(!digest.expose_phc().contains("Password1"));
        assert_ne!(digest.expose_phc(), "Password1");
    }

    #[test]
    fn verify_accepts_only_the_hashed_password() {
        let hasher = fast_hasher();
        let salt = generate_salt();
        let credential = StoredCredential {
            digest: hasher.hash("Password1", &salt).unwrap(),
            salt,
        };
        assert!(hasher.verify("Password1", &credential).unwrap());
        assert!(!hasher.verify("Password2", &credential).unwrap());
        assert!(!hasher.verify("", &credential).unwrap());
    }

    #[test]
    fn verify_uses_stored_salt() {
        let hasher = fast_hasher();
        let credential = StoredCredential {
            digest: hasher.hash("Password1", &generate_salt()).unwrap(),
            salt: generate_salt(),
        };
        assert!(!hasher.verify("Password1", &credential).unwrap());
    }

    #[test]
    fn same_password_different_salts_differ() {
        let hasher = fast_hasher();
        let a = hasher.hash("Password1", &generate_salt()).unwrap();
        let b = hasher.hash("Password1", &generate_salt()).unwrap();
        assert_ne!(a.expose_phc(), b.expose_phc());
    }

    #[test]
    fn digests_from_older_cost_still_verify() {
        let old = fast_hasher();
        let current = CredentialHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 2048,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        })
        .unwrap();
        let salt = generate_salt();
        let credential = StoredCredential {
            digest: old.hash("Password1", &salt).unwrap(),
            salt,
        };

        assert!(current.verify("Password1", &credential).unwrap());
        assert!(current.needs_rehash(&credential.digest));
        assert!(!old.needs_rehash(&credential.digest));
    }

    #[test]
    fn malformed_digest_is_reported() {
        let hasher = fast_hasher();
        let credential = StoredCredential {
            digest: PasswordDigest::from_phc("not-a-phc-string".to_string()),
            salt: generate_salt(),
        };
        assert!(matches!(
            hasher.verify("Password1", &credential),
            Err(HashError::Malformed)
        ));
    }

    #[test]
    fn debug_output_is_redacted() {
        let hasher = fast_hasher();
        let salt = generate_salt();
        let credential = StoredCredential {
            digest: hasher.hash("Password1", &salt).unwrap(),
            salt,
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("argon2"));
    }
}
