//! Hardened memory management utilities.
//!
//! This module contains wrappers around Sodium's [secure memory management
//! functions](https://doc.libsodium.org/memory_management), used to keep secret keys safe while
//! they are located in memory.
//!
//! If we store a key on the heap while we perform some cryptographic operation, then free the
//! associated memory when done, the memory it occupied will not be erased, only marked as free. A
//! later allocation, in this process or another, could then be handed memory still containing the
//! key. Swapping and core dumps pose similar risks.
//!
//! Sodium's allocator clears memory on free in a way the compiler will not optimise away. The
//! allocated region is placed directly before a guard page, with a canary and a further guard
//! page before it, so overflows and underflows are detected. Regions are locked so they will not
//! be swapped to disk or included in core dumps. These measures make the allocator much slower
//! than the system allocator, so it is only used for secret values: the key types throughout
//! saltbox. Ciphertexts, nonces, and tags are not secret, and use ordinary memory.

use crate::{require_init, SaltboxError};
use libsodium_sys as sodium;
use std::alloc::Layout;
use std::ptr::NonNull;

/// Creates a hardened buffer type, for storing sensitive data (keys, seeds, etc).
///
/// `hardened_buffer!(Name(Size))` will create a new type `Name` that provides access to `Size`
/// bytes of contiguous hardened memory. The new type will implement the following traits:
/// * [`AsRef<[u8; $size]>`](std::convert::AsRef) and [`AsMut<[u8; $size]>`](std::convert::AsMut)
/// * [`Debug`](std::fmt::Debug), which does not reveal the buffer's contents
/// * [`Deref`](std::ops::Deref) and [`DerefMut`](std::ops::DerefMut)
/// * [`PartialEq<Self>`](std::cmp::PartialEq) and [`Eq`](std::cmp::Eq)
///     * This operation uses a constant-time comparison
/// * [`TryFrom<&[u8]>`](std::convert::TryFrom)
/// * [`TryFrom<&[u8; $size]>`](std::convert::TryFrom)
///
/// The new type will also implement the methods `new_empty`, `zero`, and `try_clone`. The struct
/// constant `LENGTH` will be set to `$size`.
macro_rules! hardened_buffer {
    ( $( $(#[$metadata:meta])* $vis:vis $name:ident($size:expr)$(;)? )* ) => {
        $(
            $(#[$metadata])*
            $vis struct $name {
                ptr: std::ptr::NonNull<[u8; $size]>,
                _marker: std::marker::PhantomData<[u8; $size]>,
            }

            impl $name {
                /// The length of this buffer, in bytes.
                pub const LENGTH: usize = $size as usize;

                /// Create a new instance of this type, filled with all zeroes.
                pub fn new_empty() -> Result<Self, $crate::SaltboxError> {
                    $crate::require_init()?;

                    let ptr = unsafe {
                        // SAFETY: This call to `malloc` will allocate the memory required for a
                        // `[u8; $size]` type, outside of Rust's memory management. The associated
                        // memory is always freed in the corresponding `drop` call. We never free
                        // the memory in any other place in this struct, and drop can only be called
                        // once, so a double-free is not possible. We never expose a pointer to the
                        // allocated memory directly.
                        let ptr = $crate::mem::malloc()?;

                        // SAFETY: This function expects a pointer to a region of memory, and a
                        // number of bytes to clear starting at that pointer. We allocate `$size`
                        // bytes of memory at `ptr` in the line above, and specify `$size` bytes
                        // should be cleared. All zeroes is a valid representation of a `u8` array.
                        libsodium_sys::sodium_memzero(ptr.as_ptr() as *mut libc::c_void, $size);

                        ptr
                    };

                    Ok(Self {
                        ptr,
                        _marker: std::marker::PhantomData,
                    })
                }

                /// Safely zero the contents of the buffer, in such a way that the compiler will
                /// not optimise away the operation.
                ///
                /// This is automatically done when the buffer is dropped, but you may wish to do
                /// this as soon as the buffer is no longer required.
                pub fn zero(&mut self) -> Result<(), $crate::SaltboxError> {
                    $crate::mem::clear(self.as_mut())
                }

                /// Create a new instance of the same type, copying the contents of this buffer.
                ///
                /// This operation may fail, as Sodium's allocator is more likely to encounter
                /// issues than the standard system allocator.
                pub fn try_clone(&self) -> Result<Self, $crate::SaltboxError> {
                    let mut new_buf = Self::new_empty()?;
                    new_buf.copy_from_slice(self.as_ref());
                    Ok(new_buf)
                }
            }

            impl Drop for $name {
                fn drop(&mut self) {
                    unsafe {
                        // SAFETY: We only free in `drop`, which is called exactly once, and none
                        // of the type's methods are reachable afterwards, so neither a double-free
                        // nor a use-after-free is possible. `self.ptr` was allocated in the
                        // constructor using Sodium's allocator, so it is correct to free it using
                        // Sodium's allocator.
                        $crate::mem::free(self.ptr);
                    }
                }
            }

            impl TryFrom<&[u8]> for $name {
                type Error = $crate::SaltboxError;

                fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
                    if buf.len() != $size {
                        return Err(Self::Error::IncorrectSliceLength($size as usize, buf.len()));
                    }

                    let mut new = Self::new_empty()?;
                    new.copy_from_slice(buf);
                    Ok(new)
                }
            }

            impl TryFrom<&[u8; $size]> for $name {
                type Error = $crate::SaltboxError;

                fn try_from(buf: &[u8; $size]) -> Result<Self, Self::Error> {
                    let mut new = Self::new_empty()?;
                    new.copy_from_slice(buf);
                    Ok(new)
                }
            }

            impl std::convert::AsMut<[u8; $size]> for $name {
                fn as_mut(&mut self) -> &mut [u8; $size] {
                    unsafe {
                        // SAFETY: The memory backing this buffer is valid for the lifetime of the
                        // struct, and the returned reference cannot outlive it. Any region of
                        // memory of length $size is a valid representation of a [u8; $size].
                        self.ptr.as_mut()
                    }
                }
            }

            impl std::convert::AsRef<[u8; $size]> for $name {
                fn as_ref(&self) -> &[u8; $size] {
                    unsafe {
                        // SAFETY: See `as_mut`.
                        self.ptr.as_ref()
                    }
                }
            }

            impl std::fmt::Debug for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&format!("{}([u8; {}])", stringify!($name), $size))
                }
            }

            impl std::ops::Deref for $name {
                type Target = [u8; $size];

                fn deref(&self) -> &Self::Target {
                    self.as_ref()
                }
            }

            impl std::ops::DerefMut for $name {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    self.as_mut()
                }
            }

            impl std::cmp::PartialEq<Self> for $name {
                fn eq(&self, other: &Self) -> bool {
                    // Sodium must already be initialised for either buffer to exist, so `eq`
                    // cannot fail here.
                    $crate::mem::eq(&self[..], &other[..]).unwrap_or(false)
                }
            }

            impl std::cmp::Eq for $name {}
        )*
    };
}

pub(crate) use hardened_buffer;

/// Allocate sufficient hardened memory to store a value of type `T`, returning a pointer to the
/// start of the allocated memory.
///
/// # Safety
/// This function returns a pointer to uninitialised memory, allocated outside of Rust's memory
/// management. Memory must be initialised before use, it must be freed exactly once, and not used
/// after having been freed. Memory allocated with this function must be freed using [`free`].
pub(crate) unsafe fn malloc<T>() -> Result<NonNull<T>, SaltboxError> {
    require_init()?;

    // As the region Sodium allocates will be placed at the end of a page boundary, if we pad the
    // layout until its size is a multiple of the alignment, the allocated region will be aligned
    // correctly.
    let layout = Layout::new::<T>().pad_to_align();
    let ptr = sodium::sodium_malloc(layout.size()) as *mut T;

    NonNull::new(ptr).ok_or(SaltboxError::MemoryManagement)
}

/// Free the memory pointed to by `ptr`, previously allocated using [`malloc`].
///
/// # Safety
/// This function should only be called with a pointer to memory previously allocated using
/// [`malloc`]. It will cause the program to exit if a buffer overflow is detected (i.e: the canary
/// placed next to the allocated region has been overwritten). It must be called exactly once for
/// each memory region allocated, and after the region has been freed, it must not be used again.
pub(crate) unsafe fn free<T>(ptr: NonNull<T>) {
    // `malloc` has already called `require_init`.
    sodium::sodium_free(ptr.as_ptr() as *mut libc::c_void)
}

/// Constant time test for equality of two slices.
///
/// For the same input size, the time taken to compare the slices is always identical. Returns true
/// if the slices contain the same contents, false otherwise. Always returns false if the slices are
/// not of the same length.
pub fn eq(a: &[u8], b: &[u8]) -> Result<bool, SaltboxError> {
    require_init()?;

    if a.len() != b.len() {
        return Ok(false);
    }

    let comparison_result = unsafe {
        // SAFETY: This function expects two pointers to regions of memory of the same length,
        // specified by the third parameter. We check above that a and b are of the same length,
        // and use a.len() to specify the length. This function will not modify either slice.
        sodium::sodium_memcmp(
            a.as_ptr() as *const libc::c_void,
            b.as_ptr() as *const libc::c_void,
            a.len(),
        )
    };

    Ok(comparison_result == 0)
}

/// Zero the contents of `buf`, in such a way that the compiler will not remove the operation.
pub fn clear(buf: &mut [u8]) -> Result<(), SaltboxError> {
    require_init()?;

    unsafe {
        // SAFETY: This function expects a pointer to a region of memory, and a number of bytes to
        // clear starting at that pointer. We pass a pointer to `buf`, and specify `buf.len()`
        // bytes should be cleared. All zeroes is a valid representation of a u8 slice.
        sodium::sodium_memzero(buf.as_mut_ptr() as *mut libc::c_void, buf.len());
    };

    Ok(())
}

/// Test whether `buf` is filled entirely with zeroes, in constant-time for a specific length.
pub fn is_zero(buf: &[u8]) -> Result<bool, SaltboxError> {
    require_init()?;

    let comparison_result = unsafe {
        // SAFETY: This function expects a pointer to a region of memory, and a number of bytes to
        // test for being zero. We use `buf.len()` as the number of bytes to check.
        sodium::sodium_is_zero(buf.as_ptr(), buf.len())
    };

    Ok(comparison_result != 0)
}
