//! Symmetric (secret-key) cryptographic operations.
//!
//! Both modules here use a secret key which must be shared between all parties in advance.
//! [`secret_box`] encrypts and authenticates messages, [`one_time_auth`] only authenticates them.

pub mod one_time_auth;
pub mod secret_box;
