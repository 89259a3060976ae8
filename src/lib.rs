//! Safe, idiomatic Rust bindings to the secret-box and one-time authentication APIs of the
//! [Sodium](https://libsodium.org) cryptographic library.
//!
//! Sodium is a fast, modern cryptographic library written in C. This crate does not implement
//! any cryptography itself: every primitive is provided by Sodium. What this crate does provide is
//! a careful layer around those primitives, which checks the length of every key, nonce, and tag
//! before it reaches Sodium, and which returns results in owned Rust types.
//!
//! # Which API Should I Use?
//! * Encrypt a message so that only parties who share a secret key with me can read it, and so
//!   that any modification is detected
//!     * Use [`symmetric::secret_box`]
//! * Produce an authentication tag for a single message, using a key which will never be used to
//!   authenticate any other message
//!     * Use [`symmetric::one_time_auth`]
//! * Generate cryptographically secure pseudo-random data
//!     * Use [`random`]
//! * Convert ciphertexts to and from hex strings for transport over text-based channels
//!     * Use [`encode::hex`]
//!
//! # Hardened Buffer Types
//! The secret key types in this crate use a custom allocator from Sodium to manage their memory.
//! They are stored in memory locked regions, which won't be swapped to disk, and will be securely
//! zeroed on drop. Guard pages and canaries are used to detect buffer overflows. See the [`mem`]
//! module for details.
//!
//! # Errors
//! Every fallible function in this crate returns a [`SaltboxError`]. Length checks on keys,
//! nonces, and tags always happen before anything is passed to Sodium, so an error for which
//! [`SaltboxError::is_validation`] returns `true` means no cryptographic operation was attempted.
//!
//! # Logging
//! Diagnostics are emitted through [`tracing`](https://docs.rs/tracing). Rejected inputs are
//! logged at `debug` level with their lengths only: key, nonce, message, and tag contents are
//! never logged. No subscriber is installed by this crate.

use libsodium_sys as sodium;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub mod encode;
pub mod mem;
pub mod random;
pub mod symmetric;

/// General error type used in saltbox.
///
/// This type is returned by functions which can possibly fail throughout saltbox.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SaltboxError {
    /// Failed to initialise Sodium.
    ///
    /// This corresponds to a call to `sodium_init` returning -1, indicating initialisation
    /// failure. In such a case, Sodium is unsafe to use.
    #[error("failed to initialise libsodium")]
    SodiumInitFailed,

    /// Memory management error.
    ///
    /// This could indicate a number of possible issues. In the worst case, it indicates a buffer
    /// overflow or similar error occurred and was detected by Sodium, but it could also indicate
    /// any other reason secure memory allocation may fail.
    #[error("memory management error")]
    MemoryManagement,

    /// Tried to create a hardened buffer from an incorrectly sized slice.
    ///
    /// The 0th item is the expected length, the 1st item is the actual length of the slice.
    #[error("incorrect slice length: expected {0}, found {1}")]
    IncorrectSliceLength(usize, usize),

    /// Failed to decode a hex string.
    ///
    /// The string contained characters which are not valid hex digits, or had an odd length.
    #[error("failed to decode hex string")]
    DecodeError,

    /// An error occurred in the [`random`] module.
    #[error("PRNG error")]
    RandomError(#[from] random::RandomError),

    /// An error occurred in the [`symmetric::secret_box`] module.
    #[error("secret box error")]
    SecretBoxError(#[from] symmetric::secret_box::SecretBoxError),

    /// An error occurred in the [`symmetric::one_time_auth`] module.
    #[error("one-time authentication error")]
    OneTimeAuthError(#[from] symmetric::one_time_auth::OneTimeAuthError),
}

impl SaltboxError {
    /// Returns `true` if this error was raised by a length check on a key, nonce, MAC, or
    /// signature, before any cryptographic operation took place.
    ///
    /// Errors for which this returns `false` were either reported by Sodium itself, or indicate
    /// a malformed ciphertext.
    pub fn is_validation(&self) -> bool {
        use symmetric::one_time_auth::OneTimeAuthError;
        use symmetric::secret_box::SecretBoxError;

        matches!(
            self,
            Self::IncorrectSliceLength(..)
                | Self::SecretBoxError(
                    SecretBoxError::KeyLength(_)
                        | SecretBoxError::NonceLength(_)
                        | SecretBoxError::MacLength(_)
                )
                | Self::OneTimeAuthError(
                    OneTimeAuthError::KeyLength(_) | OneTimeAuthError::SignatureLength(_)
                )
        )
    }
}

/// Panics if `$result` (the return code of the Sodium function `$name`) is non-zero.
///
/// Only used for Sodium functions which are documented never to fail: a non-zero return here
/// means the linked Sodium build is broken, not that the caller did something wrong.
macro_rules! assert_not_err {
    ($result:expr, $name:expr) => {
        if $result != 0 {
            panic!(
                "an unexpected error occurred in {}, please report this as a bug in saltbox",
                $name
            );
        }
    };
}

pub(crate) use assert_not_err;

/// Tracks whether `sodium_init` has succeeded in this process.
///
/// Only success is remembered: while the flag is unset, every call runs the initialiser again.
struct InitGate {
    initialised: AtomicBool,
}

impl InitGate {
    const fn new() -> Self {
        Self {
            initialised: AtomicBool::new(false),
        }
    }

    /// Run `init` unless a previous call already succeeded.
    ///
    /// `init` follows the `sodium_init` convention: -1 on failure, 0 on success, or 1 if Sodium
    /// was already initialised (e.g: by another library in this process).
    fn ensure(&self, init: impl FnOnce() -> libc::c_int) -> Result<(), SaltboxError> {
        if self.is_initialised() {
            return Ok(());
        }

        let status = init();

        if status < 0 {
            tracing::error!(status, "sodium_init failed");
            return Err(SaltboxError::SodiumInitFailed);
        }

        tracing::trace!(status, "initialised libsodium");
        self.initialised.store(true, Ordering::Release);

        Ok(())
    }

    fn is_initialised(&self) -> bool {
        self.initialised.load(Ordering::Acquire)
    }
}

static SODIUM_INIT: InitGate = InitGate::new();

/// Ensure Sodium has been initialised.
///
/// n.b: Crates making use of saltbox do not have to call this function, it is only used
/// internally wherever initialisation may be necessary.
///
/// Calls `sodium_init` until it first succeeds, after which this is a single atomic read.
/// Concurrent first calls may each reach `sodium_init`, which is itself idempotent and
/// thread-safe. Returns [`SaltboxError::SodiumInitFailed`] if the initialisation was unsuccessful.
fn require_init() -> Result<(), SaltboxError> {
    SODIUM_INIT.ensure(|| unsafe {
        // SAFETY: This function can safely be called multiple times from multiple threads. Once it
        // has been called, all other Sodium functions are also thread-safe.
        sodium::sodium_init()
    })
}

#[cfg(test)]
mod tests {
    use super::{require_init, InitGate, SaltboxError, SODIUM_INIT};
    use crate::symmetric::{one_time_auth::OneTimeAuthError, secret_box::SecretBoxError};
    use std::thread;

    #[test]
    fn can_initialise() -> Result<(), SaltboxError> {
        require_init()?;
        require_init()
    }

    #[test]
    fn initialisation_is_remembered() -> Result<(), SaltboxError> {
        require_init()?;
        assert!(SODIUM_INIT.is_initialised());

        Ok(())
    }

    #[test]
    fn failed_initialisation_is_retried() -> Result<(), SaltboxError> {
        let gate = InitGate::new();
        let mut calls = 0;

        assert_eq!(
            gate.ensure(|| {
                calls += 1;
                -1
            }),
            Err(SaltboxError::SodiumInitFailed)
        );
        assert!(!gate.is_initialised());

        assert_eq!(
            gate.ensure(|| {
                calls += 1;
                -1
            }),
            Err(SaltboxError::SodiumInitFailed)
        );
        assert!(!gate.is_initialised());

        gate.ensure(|| {
            calls += 1;
            0
        })?;
        assert!(gate.is_initialised());

        // Once initialised, the initialiser is never run again.
        gate.ensure(|| {
            calls += 1;
            -1
        })?;
        assert_eq!(calls, 3);

        Ok(())
    }

    #[test]
    fn already_initialised_counts_as_success() -> Result<(), SaltboxError> {
        let gate = InitGate::new();
        gate.ensure(|| 1)?;
        assert!(gate.is_initialised());

        Ok(())
    }

    #[test]
    fn concurrent_initialisation() {
        let handles: Vec<_> = (0..16).map(|_| thread::spawn(require_init)).collect();

        for handle in handles {
            assert_eq!(handle.join().ok(), Some(Ok(())));
        }
    }

    #[test]
    fn validation_errors_are_classified() {
        assert!(SaltboxError::from(SecretBoxError::KeyLength(0)).is_validation());
        assert!(SaltboxError::from(SecretBoxError::NonceLength(23)).is_validation());
        assert!(SaltboxError::from(SecretBoxError::MacLength(15)).is_validation());
        assert!(SaltboxError::from(OneTimeAuthError::KeyLength(33)).is_validation());
        assert!(SaltboxError::from(OneTimeAuthError::SignatureLength(0)).is_validation());
        assert!(SaltboxError::IncorrectSliceLength(32, 31).is_validation());

        assert!(!SaltboxError::from(SecretBoxError::OpenFailed).is_validation());
        assert!(!SaltboxError::from(SecretBoxError::CreateFailed).is_validation());
        assert!(!SaltboxError::DecodeError.is_validation());
        assert!(!SaltboxError::SodiumInitFailed.is_validation());
    }
}
