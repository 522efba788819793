//! Credential primitives: input validation and password hashing.
//!
//! Both are free of database access so registration, password change and
//! administrative user creation share identical rules.

pub mod hasher;
pub mod validator;

pub use hasher::{CredentialHasher, HashError, PasswordDigest, Salt, StoredCredential, generate_salt};
pub use validator::{valid_password, valid_username};
