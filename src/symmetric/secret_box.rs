//! Authenticated symmetric encryption.
//!
//! This module corresponds to the [`crypto_secretbox`
//! API](https://doc.libsodium.org/secret-key_cryptography/secretbox) from Sodium.
//!
//! Authenticated encryption is used to encrypt messages, providing assurance to the receiver that
//! the ciphertext has not been modified in transit by an attacker or transmission error. All
//! parties who wish to encrypt or decrypt messages must share the same secret key, which is used
//! for both encryption and decryption.
//!
//! # Algorithm Details
//! The [XSalsa20](https://en.wikipedia.org/wiki/Salsa20) stream cipher (Salsa20 with an eXtended
//! nonce length) is used for encryption, together with the
//! [Poly1305](https://en.wikipedia.org/wiki/Poly1305) MAC for authentication.
//!
//! # Combined and Detached Formats
//! [`create`] produces a single buffer, [`MAC_LENGTH`] bytes longer than the message, with the
//! MAC placed before the encrypted payload. [`create_detached`] returns the encrypted payload and
//! the MAC separately, as a [`DetachedBox`].
//!
//! # Security Considerations
//! * Nonces must *never* be reused with the same key. The nonce length is large enough that
//!   generating a random nonce for every message with [`generate_nonce`] is safe. Nonces do not
//!   need to be kept secret. This module does not track nonce use: that is the caller's
//!   responsibility.
//! * Opening a secret box fails with [`SecretBoxError::OpenFailed`] whether the ciphertext was
//!   tampered with, encrypted under a different key or nonce, or is simply malformed. No further
//!   detail is available, and none should be sought: treat any failure as "reject this
//!   ciphertext".
//! * For compatibility with producers which emitted NaCl's zero-padded `crypto_secretbox` layout,
//!   [`open`] strips 16 leading zero bytes from a ciphertext before attempting decryption. A
//!   genuine ciphertext whose MAC happened to be 16 zero bytes would be mis-handled by this, but
//!   the probability of this is 2^-128.
//!
//! # Examples
//! Encrypting and decrypting a message (uses [`create`] and [`open`]):
//!
//! ```rust
//! use saltbox::symmetric::secret_box;
//!
//! let key = secret_box::generate_key().unwrap();
//! let nonce = secret_box::generate_nonce().unwrap();
//!
//! // The nonce will be needed for decryption, so it should be sent alongside the ciphertext.
//! let ciphertext = secret_box::create("Attack at dawn", &nonce, &key[..]).unwrap();
//! assert_eq!(ciphertext.len(), 14 + secret_box::MAC_LENGTH);
//!
//! let plaintext = secret_box::open(&ciphertext, &nonce, &key[..]).unwrap();
//! assert_eq!(plaintext, b"Attack at dawn");
//! ```
//!
//! Using the detached format:
//!
//! ```rust
//! use saltbox::symmetric::secret_box;
//!
//! let key = secret_box::generate_key().unwrap();
//! let nonce = secret_box::generate_nonce().unwrap();
//!
//! let sealed = secret_box::create_detached(b"Attack at dawn", &nonce, &key[..]).unwrap();
//! assert_eq!(sealed.ciphertext.len(), 14);
//!
//! let plaintext =
//!     secret_box::open_detached(&sealed.ciphertext, &sealed.mac, &nonce, &key[..]).unwrap();
//! assert_eq!(plaintext, b"Attack at dawn");
//! ```

use crate::{encode, mem, random, require_init, SaltboxError};
use libsodium_sys as sodium;
use thiserror::Error;

/// Error type returned if something went wrong in the `secret_box` module.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SecretBoxError {
    /// The key was not [`KEY_LENGTH`] bytes long.
    ///
    /// The contained value is the length of the key provided.
    #[error("secret box key must be 32 bytes, found {0}")]
    KeyLength(usize),

    /// The nonce was not [`NONCE_LENGTH`] bytes long.
    ///
    /// The contained value is the length of the nonce provided.
    #[error("secret box nonce must be 24 bytes, found {0}")]
    NonceLength(usize),

    /// The MAC was not [`MAC_LENGTH`] bytes long.
    ///
    /// The contained value is the length of the MAC provided.
    #[error("secret box MAC must be 16 bytes, found {0}")]
    MacLength(usize),

    /// Sodium failed to encrypt the message.
    ///
    /// This is also returned if the message is longer than [`struct@MESSAGE_LENGTH_MAX`].
    #[error("failed to create secret box")]
    CreateFailed,

    /// The ciphertext could not be authenticated and decrypted.
    ///
    /// This could indicate an attempted forgery, a transmission error, the wrong key or nonce, or
    /// a ciphertext too short to contain a MAC. These cases cannot be told apart.
    #[error("failed to open secret box")]
    OpenFailed,
}

/// The length of a symmetric key used for encryption/decryption, in bytes.
pub const KEY_LENGTH: usize = sodium::crypto_secretbox_KEYBYTES as usize;

/// The length of a MAC, in bytes.
pub const MAC_LENGTH: usize = sodium::crypto_secretbox_MACBYTES as usize;

/// The length of a message nonce, in bytes.
pub const NONCE_LENGTH: usize = sodium::crypto_secretbox_NONCEBYTES as usize;

lazy_static::lazy_static! {
    /// The maximum message length which can be encrypted with this cipher.
    pub static ref MESSAGE_LENGTH_MAX: usize = unsafe {
        // SAFETY: This function just returns a constant value, and should always be safe to call.
        sodium::crypto_secretbox_messagebytes_max()
    };
}

mem::hardened_buffer! {
    /// Secret key for symmetric authenticated encryption.
    ///
    /// There are no technical constraints on the contents of a key, but it should be generated
    /// randomly using [`Key::generate`] (or [`generate_key`]).
    ///
    /// A secret key must not be made public.
    ///
    /// This is a [hardened buffer type](https://docs.rs/saltbox#hardened-buffer-types), and will be
    /// zeroed on drop. It can be thought of as roughly equivalent to a `[u8; KEY_LENGTH]`, and
    /// implements [`core::ops::Deref`], so `&key[..]` can be passed wherever a key is expected.
    pub Key(KEY_LENGTH);
}

impl Key {
    /// Generate a new, random key for use in symmetric authenticated encryption.
    pub fn generate() -> Result<Self, SaltboxError> {
        let mut key = Self::new_empty()?;
        random::fill_random(&mut key[..])?;
        Ok(key)
    }
}

/// A MAC (Message Authentication Code), used to authenticate the message.
pub type MAC = [u8; MAC_LENGTH];

/// A nonce, used to introduce non-determinism into the encryption calculation.
pub type Nonce = [u8; NONCE_LENGTH];

/// The output of [`create_detached`]: an encrypted payload, and its MAC.
///
/// Neither field is secret, and both are required to open the box.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "use-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetachedBox {
    /// The encrypted message, the same length as the plaintext.
    pub ciphertext: Vec<u8>,

    /// The MAC for `ciphertext`.
    pub mac: MAC,
}

impl DetachedBox {
    /// Try to authenticate and decrypt this box using `nonce` and `key`.
    ///
    /// Equivalent to [`open_detached`] with this box's ciphertext and MAC.
    pub fn open(&self, nonce: &[u8], key: &[u8]) -> Result<Vec<u8>, SaltboxError> {
        open_detached(&self.ciphertext, &self.mac, nonce, key)
    }
}

/// Generate a new, random key for use with the functions throughout this module.
pub fn generate_key() -> Result<Key, SaltboxError> {
    Key::generate()
}

/// Generate a random nonce for use with the functions throughout this module.
///
/// The nonce length for this cipher is long enough that a random nonce can be generated for every
/// message, and the chances of reusing a nonce are essentially zero.
pub fn generate_nonce() -> Result<Nonce, SaltboxError> {
    let mut nonce = [0; NONCE_LENGTH];
    random::fill_random(&mut nonce)?;
    Ok(nonce)
}

fn check_key(key: &[u8]) -> Result<(), SecretBoxError> {
    if key.len() != KEY_LENGTH {
        tracing::debug!(expected = KEY_LENGTH, found = key.len(), "rejecting secret box key");
        return Err(SecretBoxError::KeyLength(key.len()));
    }

    Ok(())
}

fn check_nonce(nonce: &[u8]) -> Result<(), SecretBoxError> {
    if nonce.len() != NONCE_LENGTH {
        tracing::debug!(
            expected = NONCE_LENGTH,
            found = nonce.len(),
            "rejecting secret box nonce"
        );
        return Err(SecretBoxError::NonceLength(nonce.len()));
    }

    Ok(())
}

fn check_mac(mac: &[u8]) -> Result<(), SecretBoxError> {
    if mac.len() != MAC_LENGTH {
        tracing::debug!(expected = MAC_LENGTH, found = mac.len(), "rejecting secret box MAC");
        return Err(SecretBoxError::MacLength(mac.len()));
    }

    Ok(())
}

fn check_message(message: &[u8]) -> Result<(), SecretBoxError> {
    if message.len() > *MESSAGE_LENGTH_MAX {
        tracing::debug!(length = message.len(), "message too long for secret box");
        return Err(SecretBoxError::CreateFailed);
    }

    Ok(())
}

/// Encrypt `message` using the provided `nonce` and `key`, returning the combined ciphertext.
///
/// `message` may be raw bytes or text; text is encrypted as its UTF-8 encoding. `nonce` must be
/// [`NONCE_LENGTH`] bytes, and should be generated with [`generate_nonce`]. It is *vital* that a
/// given nonce is *never* reused with the same key. `key` must be [`KEY_LENGTH`] bytes.
///
/// Returns the ciphertext, which is always `message.len()` + [`MAC_LENGTH`] bytes: the MAC,
/// followed by the encrypted message. Returns [`SecretBoxError::KeyLength`] or
/// [`SecretBoxError::NonceLength`] if the key or nonce are the wrong size, before any encryption
/// is attempted.
pub fn create(
    message: impl AsRef<[u8]>,
    nonce: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, SaltboxError> {
    require_init()?;

    let message = message.as_ref();
    check_key(key)?;
    check_nonce(nonce)?;
    check_message(message)?;

    let mut output = vec![0u8; message.len() + MAC_LENGTH];

    let encrypt_result = unsafe {
        // SAFETY: The first argument to this function is the destination pointer to which the
        // ciphertext should be written. We allocate `output` to be `message.len() + MAC_LENGTH`
        // bytes, enough to store the message + auth tag, so a buffer overflow will not occur. The
        // next two arguments specify the message to encrypt and its length. We use
        // `message.len()` to specify the message length, so it is correct for this pointer. The
        // final two arguments specify the nonce and key. We check above that `nonce` and `key` are
        // `crypto_secretbox_NONCEBYTES` and `crypto_secretbox_KEYBYTES` long, so they are of the
        // expected size for use with this function.
        sodium::crypto_secretbox_easy(
            output.as_mut_ptr(),
            message.as_ptr(),
            message.len() as libc::c_ulonglong,
            nonce.as_ptr(),
            key.as_ptr(),
        )
    };

    if encrypt_result != 0 {
        tracing::debug!("crypto_secretbox_easy failed");
        return Err(SecretBoxError::CreateFailed.into());
    }

    Ok(output)
}

/// Encrypt `message` using the provided `nonce` and `key`, returning the ciphertext and MAC
/// separately.
///
/// This function is very similar to [`create`]. The difference is that [`create`] places the
/// MAC before the encrypted payload in a single buffer, while this function returns a
/// [`DetachedBox`] with the payload (exactly `message.len()` bytes) and MAC in separate fields.
///
/// The same key and nonce requirements as [`create`] apply.
pub fn create_detached(
    message: impl AsRef<[u8]>,
    nonce: &[u8],
    key: &[u8],
) -> Result<DetachedBox, SaltboxError> {
    require_init()?;

    let message = message.as_ref();
    check_key(key)?;
    check_nonce(nonce)?;
    check_message(message)?;

    let mut ciphertext = vec![0u8; message.len()];
    let mut mac = [0u8; MAC_LENGTH];

    let encrypt_result = unsafe {
        // SAFETY: The first argument to this function is the destination pointer to which the
        // ciphertext should be written. `ciphertext` is allocated to be `message.len()` bytes, so
        // a buffer overflow will not occur. The next argument is the destination to which the MAC
        // will be written. A MAC is always `crypto_secretbox_MACBYTES` bytes, and we have defined
        // the `mac` buffer to be this length. The next two arguments specify the message to
        // encrypt and its length, which we take from `message.len()`. The final two arguments
        // specify the nonce and key, which we check above are of the expected sizes.
        sodium::crypto_secretbox_detached(
            ciphertext.as_mut_ptr(),
            mac.as_mut_ptr(),
            message.as_ptr(),
            message.len() as libc::c_ulonglong,
            nonce.as_ptr(),
            key.as_ptr(),
        )
    };

    if encrypt_result != 0 {
        tracing::debug!("crypto_secretbox_detached failed");
        return Err(SecretBoxError::CreateFailed.into());
    }

    Ok(DetachedBox { ciphertext, mac })
}

/// Try to authenticate and decrypt `cipher_text` (previously produced by [`create`]) using `nonce`
/// and `key`.
///
/// `key` and `nonce` must be [`KEY_LENGTH`] and [`NONCE_LENGTH`] bytes respectively. If
/// `cipher_text` begins with 16 zero bytes, they are removed before decryption: see the
/// [module-level documentation](self#security-considerations).
///
/// Returns the decrypted message, which is `cipher_text.len()` - [`MAC_LENGTH`] bytes, or
/// `cipher_text.len()` - 2 * [`MAC_LENGTH`] bytes if a zero prefix was removed. Returns
/// [`SecretBoxError::OpenFailed`] if `cipher_text` is too short to contain a MAC, or if
/// authentication fails for any reason.
pub fn open(
    cipher_text: impl AsRef<[u8]>,
    nonce: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, SaltboxError> {
    require_init()?;

    let mut cipher_text = cipher_text.as_ref();
    check_key(key)?;
    check_nonce(nonce)?;

    if cipher_text.len() < MAC_LENGTH {
        tracing::debug!(length = cipher_text.len(), "secret box too short to contain a MAC");
        return Err(SecretBoxError::OpenFailed.into());
    }

    if cipher_text[0] == 0 && mem::is_zero(&cipher_text[..MAC_LENGTH])? {
        tracing::debug!("stripping zero prefix from legacy secret box");
        cipher_text = &cipher_text[MAC_LENGTH..];

        if cipher_text.len() < MAC_LENGTH {
            tracing::debug!(length = cipher_text.len(), "secret box too short to contain a MAC");
            return Err(SecretBoxError::OpenFailed.into());
        }
    }

    let mut output = vec![0u8; cipher_text.len() - MAC_LENGTH];

    let decrypt_result = unsafe {
        // SAFETY: The first argument to this function is the destination to which the decrypted
        // message will be written if authentication succeeds. This will occupy
        // `cipher_text.len() - MAC_LENGTH` bytes, which is exactly the size of `output`. The next
        // two arguments specify the ciphertext to decrypt and its length, which we take from
        // `cipher_text.len()`; we check above that it is at least `MAC_LENGTH`. The final two
        // arguments specify the nonce and key, which we check above are of the expected sizes.
        sodium::crypto_secretbox_open_easy(
            output.as_mut_ptr(),
            cipher_text.as_ptr(),
            cipher_text.len() as libc::c_ulonglong,
            nonce.as_ptr(),
            key.as_ptr(),
        )
    };

    if decrypt_result != 0 {
        tracing::debug!("rejecting secret box");
        return Err(SecretBoxError::OpenFailed.into());
    }

    Ok(output)
}

/// Hex-decode `cipher_text`, then [`open`] it.
///
/// Returns [`SaltboxError::DecodeError`] if `cipher_text` is not a valid hex string.
pub fn open_hex(cipher_text: &str, nonce: &[u8], key: &[u8]) -> Result<Vec<u8>, SaltboxError> {
    let cipher_text = encode::hex::decode(cipher_text)?;
    open(cipher_text, nonce, key)
}

/// Try to authenticate and decrypt `cipher_text` (previously produced by [`create_detached`])
/// using its `mac`, `nonce`, and `key`.
///
/// `key`, `nonce`, and `mac` must be [`KEY_LENGTH`], [`NONCE_LENGTH`], and [`MAC_LENGTH`] bytes
/// respectively, otherwise [`SecretBoxError::KeyLength`], [`SecretBoxError::NonceLength`], or
/// [`SecretBoxError::MacLength`] is returned before any decryption is attempted.
///
/// Returns the decrypted message, which is `cipher_text.len()` bytes, or
/// [`SecretBoxError::OpenFailed`] if authentication fails.
pub fn open_detached(
    cipher_text: impl AsRef<[u8]>,
    mac: &[u8],
    nonce: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, SaltboxError> {
    require_init()?;

    let cipher_text = cipher_text.as_ref();
    check_key(key)?;
    check_nonce(nonce)?;
    check_mac(mac)?;

    let mut output = vec![0u8; cipher_text.len()];

    let decrypt_result = unsafe {
        // SAFETY: The first argument to this function is the destination to which the decrypted
        // message will be written if authentication succeeds. This will occupy
        // `cipher_text.len()` bytes, which is exactly the size of `output`. The second and fourth
        // arguments specify the ciphertext and its length, taken from `cipher_text.len()`. The
        // third, fifth, and sixth arguments specify the MAC, nonce, and key, which we check above
        // are `crypto_secretbox_MACBYTES`, `crypto_secretbox_NONCEBYTES`, and
        // `crypto_secretbox_KEYBYTES` long.
        sodium::crypto_secretbox_open_detached(
            output.as_mut_ptr(),
            cipher_text.as_ptr(),
            mac.as_ptr(),
            cipher_text.len() as libc::c_ulonglong,
            nonce.as_ptr(),
            key.as_ptr(),
        )
    };

    if decrypt_result != 0 {
        tracing::debug!("rejecting detached secret box");
        return Err(SecretBoxError::OpenFailed.into());
    }

    Ok(output)
}

/// Hex-decode `cipher_text`, then [`open_detached`] it.
///
/// Returns [`SaltboxError::DecodeError`] if `cipher_text` is not a valid hex string.
pub fn open_detached_hex(
    cipher_text: &str,
    mac: &[u8],
    nonce: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, SaltboxError> {
    let cipher_text = encode::hex::decode(cipher_text)?;
    open_detached(cipher_text, mac, nonce, key)
}
