//! Random data suitable for cryptographic use.
//!
//! This module is a wrapper around the [`randombytes`
//! API](https://doc.libsodium.org/generating_random_data) from Sodium. Random data is sourced from
//! the platform's secure RNG API (e.g: `getrandom(2)` or `/dev/urandom`).
//!
//! Key and nonce generation throughout saltbox is built on [`fill_random`].
//!
//! # Examples
//! Using the [rand](https://rust-random.github.io/book)-compatible API:
//!
//! ```rust
//! use rand::prelude::*;
//! use saltbox::random::SodiumRng;
//!
//! let mut rng = SodiumRng;
//! let roll = rng.gen_range(1..7);
//! assert!((1..7).contains(&roll));
//! ```
//!
//! Using the more basic API:
//!
//! ```rust
//! use saltbox::random;
//!
//! let mut my_random_data = [0u8; 32];
//! random::fill_random(&mut my_random_data).unwrap();
//!
//! let more_random_data = random::random_bytes(64).unwrap();
//! assert_eq!(more_random_data.len(), 64);
//! ```

use crate::{require_init, SaltboxError};
use libsodium_sys as sodium;
use rand_core::{impls, CryptoRng, Error as RandError, RngCore};
use thiserror::Error;

/// Error type returned if something went wrong in the random module.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum RandomError {
    /// Tried to call [`random_u32_in_range`] with `low` > `high`.
    #[error("invalid bounds: low must not exceed high")]
    BoundsInvalid,
}

/// [rand](https://rust-random.github.io/book)-compatible CSPRNG API.
///
/// This struct implements the `RngCore` trait, allowing it to be used as a source of randomness
/// for `rand`. It will automatically implement the wider `Rng` trait if this is imported.
#[derive(Clone, Copy, Debug)]
pub struct SodiumRng;

impl RngCore for SodiumRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // `fill_random` can only fail if Sodium could not be initialised, in which case there is
        // no secure source of randomness available at all.
        if let Err(err) = fill_random(dest) {
            panic!("SodiumRng: {}", err);
        }
    }

    #[cfg(feature = "std")]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        fill_random(dest).map_err(RandError::new)
    }

    #[cfg(not(feature = "std"))]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        fill_random(dest).map_err(|_| {
            core::num::NonZeroU32::new(RandError::CUSTOM_START)
                .map_or_else(|| unreachable!(), RandError::from)
        })
    }
}

impl CryptoRng for SodiumRng {}

/// Returns a random 32-bit integer.
pub fn random_u32() -> Result<u32, SaltboxError> {
    require_init()?;

    unsafe {
        // SAFETY: This function is safe as long as Sodium has been initialised, which we ensure
        // with the call to `require_init` above.
        Ok(sodium::randombytes_random())
    }
}

/// Returns a random number in the range low (included) to high (excluded).
///
/// This should be preferred to simply taking [`random_u32`] modulo some value, which does not
/// guarantee a uniform distribution of output values.
pub fn random_u32_in_range(low: u32, high: u32) -> Result<u32, SaltboxError> {
    require_init()?;

    if low > high {
        return Err(RandomError::BoundsInvalid.into());
    }

    let unshifted = unsafe {
        // SAFETY: This function is safe as long as Sodium has been initialised, which we ensure
        // with the call to `require_init` above.
        sodium::randombytes_uniform(high - low)
    };

    Ok(low + unshifted)
}

/// Fill `buf` with random data suitable for cryptographic use.
///
/// Returns an error if Sodium could not be correctly initialised.
pub fn fill_random(buf: &mut [u8]) -> Result<(), SaltboxError> {
    require_init()?;

    unsafe {
        // SAFETY: The first argument to this function should be a pointer to which random data will
        // be written, and the second argument should be the number of bytes to write, starting at
        // the pointer. We use `buf.len()` to specify the number of bytes to write, so `buf` is
        // clearly valid for writes of the required length.
        sodium::randombytes_buf(buf.as_mut_ptr() as *mut libc::c_void, buf.len());
    }

    Ok(())
}

/// Returns a newly allocated buffer of `length` random bytes suitable for cryptographic use.
pub fn random_bytes(length: usize) -> Result<Vec<u8>, SaltboxError> {
    let mut buf = vec![0u8; length];
    fill_random(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    // These tests check that, for sufficiently many random samples, we cover the space of
    // possible outputs. They are here to prevent API regressions, not to "verify" randomness.
    use super::{fill_random, random_bytes, random_u32, random_u32_in_range, RandomError};
    use super::SodiumRng;
    use crate::SaltboxError;
    use rand_core::{Error as RandError, RngCore};

    #[test]
    fn random_u32_appears_random() -> Result<(), SaltboxError> {
        for shift in [0, 8, 16, 24] {
            let mut seen = [false; 256];

            for _ in 0..65535 {
                let x = random_u32()?;
                seen[((x >> shift) & 0xff) as usize] = true;
            }

            assert!(seen.iter().all(|b| *b));
        }

        Ok(())
    }

    #[test]
    fn random_u32_in_range_appears_random() -> Result<(), SaltboxError> {
        let mut seen = [false; 256];

        for _ in 0..65535 {
            let x = random_u32_in_range(256, 512)?;
            assert!((256..512).contains(&x));
            seen[(x - 256) as usize] = true;
        }

        assert!(seen.iter().all(|b| *b));
        assert_eq!(
            random_u32_in_range(10, 5),
            Err(RandomError::BoundsInvalid.into())
        );

        Ok(())
    }

    #[test]
    fn fill_random_appears_random() -> Result<(), SaltboxError> {
        let mut buf = [0u8; 65536];
        fill_random(&mut buf)?;

        let mut seen = [0; 256];
        for b in buf {
            seen[b as usize] += 1;
        }

        for c in seen {
            assert!(c > 0);
        }

        Ok(())
    }

    #[test]
    fn random_bytes_lengths() -> Result<(), SaltboxError> {
        assert!(random_bytes(0)?.is_empty());

        for length in [1, 16, 24, 32, 1000] {
            let a = random_bytes(length)?;
            let b = random_bytes(length)?;
            assert_eq!(a.len(), length);
            assert_eq!(b.len(), length);
            if length >= 16 {
                assert_ne!(a, b);
            }
        }

        Ok(())
    }

    #[test]
    fn sodiumrng_is_rngcore() -> Result<(), RandError> {
        for shift in [0, 8, 16, 24, 32, 40, 48, 56] {
            let mut seen = [false; 256];

            for _ in 0..65535 {
                let x = SodiumRng.next_u64();
                seen[((x >> shift) & 0xff) as usize] = true;
            }

            assert!(seen.iter().all(|b| *b));
        }

        let mut buf = [0u8; 4096];
        SodiumRng.try_fill_bytes(&mut buf)?;
        assert!(buf.iter().any(|b| *b != 0));

        Ok(())
    }
}
