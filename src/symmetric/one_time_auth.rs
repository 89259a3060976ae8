//! One-time message authentication.
//!
//! This module corresponds to the [`crypto_onetimeauth`
//! API](https://doc.libsodium.org/advanced/poly1305) from Sodium.
//!
//! A one-time authenticator computes a short tag for a message using a secret key. The tag is
//! deterministic: the same (message, key) pair always produces the same tag, and a party who knows
//! the key can check a received tag with [`verify`].
//!
//! # Algorithm Details
//! [Poly1305](https://en.wikipedia.org/wiki/Poly1305) is used to calculate tags.
//!
//! # Security Considerations
//! As the name suggests, a key must only ever be used to authenticate a *single* message. An
//! attacker who sees tags for two different messages under the same key can forge tags for other
//! messages. For authenticating many messages with one long-term key, use
//! [`secret_box`](super::secret_box), which derives a fresh Poly1305 key for every nonce.
//!
//! Tags must be checked with [`verify`], which compares them in constant time, rather than by
//! comparing the output of [`sign`] with a received tag yourself.
//!
//! # Examples
//! ```rust
//! use saltbox::symmetric::one_time_auth;
//!
//! let key = one_time_auth::generate_key().unwrap();
//! let tag = one_time_auth::sign("Adam Caudill", &key[..]).unwrap();
//!
//! assert!(one_time_auth::verify("Adam Caudill", &tag.0, &key[..]).unwrap());
//! assert!(!one_time_auth::verify("Adam Caudill!", &tag.0, &key[..]).unwrap());
//! ```

use crate::{assert_not_err, mem, random, require_init, SaltboxError};
use libsodium_sys as sodium;
use thiserror::Error;

/// Error type returned if something went wrong in the `one_time_auth` module.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum OneTimeAuthError {
    /// The key was not [`KEY_LENGTH`] bytes long.
    ///
    /// The contained value is the length of the key provided.
    #[error("one-time auth key must be 32 bytes, found {0}")]
    KeyLength(usize),

    /// The signature was not [`TAG_LENGTH`] bytes long.
    ///
    /// The contained value is the length of the signature provided.
    #[error("one-time auth signature must be 16 bytes, found {0}")]
    SignatureLength(usize),
}

/// The length of a one-time authentication key, in bytes.
pub const KEY_LENGTH: usize = sodium::crypto_onetimeauth_KEYBYTES as usize;

/// The length of an authentication tag, in bytes.
pub const TAG_LENGTH: usize = sodium::crypto_onetimeauth_BYTES as usize;

mem::hardened_buffer! {
    /// Secret key for one-time authentication.
    ///
    /// Should be generated randomly using [`Key::generate`], and used for one message only.
    ///
    /// This is a [hardened buffer type](https://docs.rs/saltbox#hardened-buffer-types), and will be
    /// zeroed on drop.
    pub Key(KEY_LENGTH);
}

impl Key {
    /// Generate a new, random key for use in one-time authentication.
    pub fn generate() -> Result<Self, SaltboxError> {
        let mut key = Self::new_empty()?;
        random::fill_random(&mut key[..])?;
        Ok(key)
    }
}

/// An authentication tag for a message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "use-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub [u8; TAG_LENGTH]);

impl AsRef<[u8]> for Tag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Generate a new, random key for use with [`sign`] and [`verify`].
pub fn generate_key() -> Result<Key, SaltboxError> {
    Key::generate()
}

fn check_key(key: &[u8]) -> Result<(), OneTimeAuthError> {
    if key.len() != KEY_LENGTH {
        tracing::debug!(expected = KEY_LENGTH, found = key.len(), "rejecting one-time auth key");
        return Err(OneTimeAuthError::KeyLength(key.len()));
    }

    Ok(())
}

/// Compute the authentication tag for `message` under `key`.
///
/// `key` must be [`KEY_LENGTH`] bytes, otherwise [`OneTimeAuthError::KeyLength`] is returned.
/// The result is deterministic in `message` and `key`.
pub fn sign(message: impl AsRef<[u8]>, key: &[u8]) -> Result<Tag, SaltboxError> {
    require_init()?;

    let message = message.as_ref();
    check_key(key)?;

    let mut tag = [0u8; TAG_LENGTH];

    let auth_result = unsafe {
        // SAFETY: The first argument to this function is the destination to which the tag will be
        // written. Tags are `crypto_onetimeauth_BYTES` long, and `tag` is defined to be this
        // length. The next two arguments specify the message to authenticate and its length, which
        // we take from `message.len()`. The final argument is the key, which we check above is
        // `crypto_onetimeauth_KEYBYTES` long.
        sodium::crypto_onetimeauth(
            tag.as_mut_ptr(),
            message.as_ptr(),
            message.len() as libc::c_ulonglong,
            key.as_ptr(),
        )
    };
    assert_not_err!(auth_result, "crypto_onetimeauth");

    Ok(Tag(tag))
}

/// Check whether `signature` is the correct authentication tag for `message` under `key`.
///
/// Returns [`OneTimeAuthError::KeyLength`] or [`OneTimeAuthError::SignatureLength`] if the key or
/// signature are the wrong size. Otherwise returns `Ok(true)` if the tag is valid and `Ok(false)`
/// if it is not. The comparison runs in constant time.
pub fn verify(
    message: impl AsRef<[u8]>,
    signature: &[u8],
    key: &[u8],
) -> Result<bool, SaltboxError> {
    require_init()?;

    let message = message.as_ref();
    check_key(key)?;

    if signature.len() != TAG_LENGTH {
        tracing::debug!(
            expected = TAG_LENGTH,
            found = signature.len(),
            "rejecting one-time auth signature"
        );
        return Err(OneTimeAuthError::SignatureLength(signature.len()).into());
    }

    let verify_result = unsafe {
        // SAFETY: The first argument to this function is the tag to verify, which we check above
        // is `crypto_onetimeauth_BYTES` long. The next two arguments specify the message and its
        // length, taken from `message.len()`. The final argument is the key, which we check above
        // is `crypto_onetimeauth_KEYBYTES` long.
        sodium::crypto_onetimeauth_verify(
            signature.as_ptr(),
            message.as_ptr(),
            message.len() as libc::c_ulonglong,
            key.as_ptr(),
        )
    };

    Ok(verify_result == 0)
}

#[cfg(test)]
mod tests {
    use super::{
        generate_key, sign, verify, Key, OneTimeAuthError, Tag, KEY_LENGTH, TAG_LENGTH,
    };
    use crate::random::{fill_random, random_u32_in_range};
    use crate::SaltboxError;

    #[test]
    fn constants() {
        assert_eq!(KEY_LENGTH, 32);
        assert_eq!(TAG_LENGTH, 16);
    }

    #[test]
    fn key_generation() -> Result<(), SaltboxError> {
        let a = generate_key()?;
        let b = Key::generate()?;
        assert_eq!(a.len(), KEY_LENGTH);
        assert_ne!(a, b);

        Ok(())
    }

    #[test]
    fn nacl_vector() -> Result<(), SaltboxError> {
        let key = [
            0xee, 0xa6, 0xa7, 0x25, 0x1c, 0x1e, 0x72, 0x91, 0x6d, 0x11, 0xc2, 0xcb, 0x21, 0x4d,
            0x3c, 0x25, 0x25, 0x39, 0x12, 0x1d, 0x8e, 0x23, 0x4e, 0x65, 0x2d, 0x65, 0x1f, 0xa4,
            0xc8, 0xcf, 0xf8, 0x80,
        ];
        let message = [
            0x8e, 0x99, 0x3b, 0x9f, 0x48, 0x68, 0x12, 0x73, 0xc2, 0x96, 0x50, 0xba, 0x32, 0xfc,
            0x76, 0xce, 0x48, 0x33, 0x2e, 0xa7, 0x16, 0x4d, 0x96, 0xa4, 0x47, 0x6f, 0xb8, 0xc5,
            0x31, 0xa1, 0x18, 0x6a, 0xc0, 0xdf, 0xc1, 0x7c, 0x98, 0xdc, 0xe8, 0x7b, 0x4d, 0xa7,
            0xf0, 0x11, 0xec, 0x48, 0xc9, 0x72, 0x71, 0xd2, 0xc2, 0x0f, 0x9b, 0x92, 0x8f, 0xe2,
            0x27, 0x0d, 0x6f, 0xb8, 0x63, 0xd5, 0x17, 0x38, 0xb4, 0x8e, 0xee, 0xe3, 0x14, 0xa7,
            0xcc, 0x8a, 0xb9, 0x32, 0x16, 0x45, 0x48, 0xe5, 0x26, 0xae, 0x90, 0x22, 0x43, 0x68,
            0x51, 0x7a, 0xcf, 0xea, 0xbd, 0x6b, 0xb3, 0x73, 0x2b, 0xc0, 0xe9, 0xda, 0x99, 0x83,
            0x2b, 0x61, 0xca, 0x01, 0xb6, 0xde, 0x56, 0x24, 0x4a, 0x9e, 0x88, 0xd5, 0xf9, 0xb3,
            0x79, 0x73, 0xf6, 0x22, 0xa4, 0x3d, 0x14, 0xa6, 0x59, 0x9b, 0x1f, 0x65, 0x4c, 0xb4,
            0x5a, 0x74, 0xe3, 0x55, 0xa5,
        ];
        let expected = Tag([
            0xf3, 0xff, 0xc7, 0x70, 0x3f, 0x94, 0x00, 0xe5, 0x2a, 0x7d, 0xfb, 0x4b, 0x3d, 0x33,
            0x05, 0xd9,
        ]);

        assert_eq!(sign(message, &key)?, expected);
        assert!(verify(message, &expected.0, &key)?);

        Ok(())
    }

    #[test]
    fn rfc_8439_vector() -> Result<(), SaltboxError> {
        let key = [
            0x85, 0xd6, 0xbe, 0x78, 0x57, 0x55, 0x6d, 0x33, 0x7f, 0x44, 0x52, 0xfe, 0x42, 0xd5,
            0x06, 0xa8, 0x01, 0x03, 0x80, 0x8a, 0xfb, 0x0d, 0xb2, 0xfd, 0x4a, 0xbf, 0xf6, 0xaf,
            0x41, 0x49, 0xf5, 0x1b,
        ];
        let expected = Tag([
            0xa8, 0x06, 0x1d, 0xc1, 0x30, 0x51, 0x36, 0xc6, 0xc2, 0x2b, 0x8b, 0xaf, 0x0c, 0x01,
            0x27, 0xa9,
        ]);

        assert_eq!(sign("Cryptographic Forum Research Group", &key)?, expected);
        assert!(verify(
            b"Cryptographic Forum Research Group",
            expected.as_ref(),
            &key
        )?);

        Ok(())
    }

    #[test]
    fn sign_is_deterministic() -> Result<(), SaltboxError> {
        let mut buf = [0u8; 1000];

        for _ in 0..100 {
            let key = generate_key()?;
            let length = random_u32_in_range(0, 1000)? as usize;
            fill_random(&mut buf[..length])?;

            let a = sign(&buf[..length], &key[..])?;
            let b = sign(&buf[..length], &key[..])?;
            assert_eq!(a, b);
            assert!(verify(&buf[..length], &a.0, &key[..])?);
        }

        Ok(())
    }

    #[test]
    fn wrong_tags_are_rejected() -> Result<(), SaltboxError> {
        let key = generate_key()?;
        let other_key = generate_key()?;
        let tag = sign("Adam Caudill", &key[..])?;

        assert!(!verify("Adam Caudil", &tag.0, &key[..])?);
        assert!(!verify("Adam Caudill", &tag.0, &other_key[..])?);
        assert!(!verify("Adam Caudill", &[0u8; TAG_LENGTH], &key[..])?);

        for byte in 0..TAG_LENGTH {
            for bit in 0..8 {
                let mut tampered = tag.0;
                tampered[byte] ^= 1 << bit;
                assert!(!verify("Adam Caudill", &tampered, &key[..])?);
            }
        }

        Ok(())
    }

    #[test]
    fn empty_message() -> Result<(), SaltboxError> {
        let key = generate_key()?;
        let tag = sign(b"", &key[..])?;
        assert!(verify(b"", &tag.0, &key[..])?);

        Ok(())
    }

    #[test]
    fn lengths_are_validated() -> Result<(), SaltboxError> {
        let key = generate_key()?;
        let tag = sign("Adam Caudill", &key[..])?;

        for length in (0..=64).filter(|l| *l != KEY_LENGTH) {
            let bad_key = vec![0u8; length];
            let expected = OneTimeAuthError::KeyLength(length).into();

            assert_eq!(sign("Adam Caudill", &bad_key), Err(expected));
            assert_eq!(verify("Adam Caudill", &tag.0, &bad_key), Err(expected));
        }

        for length in (0..=32).filter(|l| *l != TAG_LENGTH) {
            let bad_tag = vec![0u8; length];

            assert_eq!(
                verify("Adam Caudill", &bad_tag, &key[..]),
                Err(OneTimeAuthError::SignatureLength(length).into())
            );
        }

        // The key is checked before the signature.
        assert_eq!(
            verify("Adam Caudill", &[], &[0u8; 31]),
            Err(OneTimeAuthError::KeyLength(31).into())
        );

        Ok(())
    }
}
