//! Binary-to-text encoding/decoding functions.
//!
//! Ciphertexts are raw bytes, which can be inconvenient to move through text-based systems. This
//! module provides constant-time [hexadecimal](https://en.wikipedia.org/wiki/Hexadecimal)
//! encoding via Sodium. The `*_hex` functions in
//! [`symmetric::secret_box`](crate::symmetric::secret_box) use it to accept ciphertexts as hex
//! strings.
//!
//! # Security Considerations
//! Encoding is *not* the same as encryption: Anyone can decode an encoded message.

/// Hexadecimal encoding.
pub mod hex {
    use crate::{require_init, SaltboxError};
    use libsodium_sys as sodium;
    use std::ptr;

    /// Encode the contents of `buf` (raw bytes) as a lowercase hex string.
    ///
    /// This encoding runs in constant-time for a given length of `buf`.
    pub fn encode(buf: &[u8]) -> Result<String, SaltboxError> {
        require_init()?;

        // Two characters per byte, plus the null byte Sodium always writes.
        let mut out = vec![0u8; (buf.len() * 2) + 1];

        unsafe {
            // SAFETY: The first argument to this function is the destination pointer to which the
            // C-formatted string will be written, and the second is the maximum number of bytes
            // which can be written there. We allocate twice the length of the input buffer, plus
            // one byte for the null terminator, and pass `out.len()`, so `out` is sufficient. The
            // next two arguments specify the buffer to encode, and its length. We use `buf.len()`
            // to specify the length, so `buf` is definitely valid for reads of this length.
            sodium::sodium_bin2hex(
                out.as_mut_ptr() as *mut libc::c_char,
                out.len(),
                buf.as_ptr(),
                buf.len(),
            );
        }

        out.truncate(buf.len() * 2);

        // `sodium_bin2hex` only writes the characters `[0-9a-f]`.
        String::from_utf8(out).map_err(|_| SaltboxError::DecodeError)
    }

    /// Decode the hex string `hex`, returning the raw bytes.
    ///
    /// `hex` must consist only of the characters `[0-9a-fA-F]`, and be of even length, otherwise a
    /// [`SaltboxError::DecodeError`] is returned.
    ///
    /// This decoding runs in constant-time for a given length of hex string.
    pub fn decode(hex: &str) -> Result<Vec<u8>, SaltboxError> {
        require_init()?;

        let mut output = vec![0u8; hex.len() / 2];
        let mut written = 0;
        let mut hex_end: *const libc::c_char = ptr::null();

        let decode_result = unsafe {
            // SAFETY: The first two arguments specify the destination to which the decoded bytes
            // will be written, and its size: we pass `output.len()`, so `output` is valid for
            // writes of this length. The next two arguments specify the hex string to decode and
            // its length. As the length is given explicitly, the string does not need to be
            // null-terminated. The next argument is a C string of characters to ignore, which may
            // be NULL. The next argument is where the decoded length is written, a `usize`. The
            // final argument is where a pointer to the first unparsed character is written, which
            // is a valid location for a `*const c_char`.
            sodium::sodium_hex2bin(
                output.as_mut_ptr(),
                output.len(),
                hex.as_ptr() as *const libc::c_char,
                hex.len(),
                ptr::null(),
                &mut written,
                &mut hex_end,
            )
        };

        // Without an ignore set, Sodium stops at the first non-hex character but still reports
        // success, so we also require the whole input to have been consumed.
        if decode_result != 0 || written * 2 != hex.len() {
            tracing::debug!(length = hex.len(), "rejecting malformed hex string");
            return Err(SaltboxError::DecodeError);
        }

        output.truncate(written);
        Ok(output)
    }

    #[cfg(test)]
    mod tests {
        use super::{decode, encode};
        use crate::SaltboxError;

        #[test]
        fn encoding() -> Result<(), SaltboxError> {
            assert_eq!(&encode(b"")?, "");
            assert_eq!(&encode(b"f")?, "66");
            assert_eq!(&encode(b"fo")?, "666f");
            assert_eq!(&encode(b"foo")?, "666f6f");
            assert_eq!(&encode(b"foobar")?, "666f6f626172");
            assert_eq!(&encode(&[0x00, 0xff, 0x10])?, "00ff10");

            Ok(())
        }

        #[test]
        fn decoding() -> Result<(), SaltboxError> {
            assert_eq!(decode("")?, b"");
            assert_eq!(decode("66")?, b"f");
            assert_eq!(decode("666f6f626172")?, b"foobar");
            assert_eq!(decode("666F6F626172")?, b"foobar");
            assert_eq!(decode("00ff10")?, [0x00, 0xff, 0x10]);

            Ok(())
        }

        #[test]
        fn decoding_rejects_malformed() {
            assert_eq!(decode("6"), Err(SaltboxError::DecodeError));
            assert_eq!(decode("666"), Err(SaltboxError::DecodeError));
            assert_eq!(decode("zz"), Err(SaltboxError::DecodeError));
            assert_eq!(decode("66:6f"), Err(SaltboxError::DecodeError));
            assert_eq!(decode("66 6f"), Err(SaltboxError::DecodeError));
            assert_eq!(decode("666g"), Err(SaltboxError::DecodeError));
        }

        #[test]
        fn round_trip_random() -> Result<(), SaltboxError> {
            let bytes = crate::random::random_bytes(257)?;
            assert_eq!(decode(&encode(&bytes)?)?, bytes);

            Ok(())
        }
    }
}
