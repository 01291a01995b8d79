//! Reference-counted byte buffer scalar.
//!
//! A `SharedBuffer` is the one piece of shared state a Context tree may hold:
//! cloning the scalar (or the whole tree) bumps a reference count instead of
//! copying pixel data, and the bytes are released when the last clone drops.
//!
//! A buffer either owns its bytes or aliases foreign memory that the caller
//! keeps alive (see [`SharedBuffer::borrowed`]). Writes go through the raw
//! pointer returned by [`SharedBuffer::as_mut_ptr`]; the tree itself never
//! mutates buffer contents.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{ContextError, Result};

/// Shared, reference-counted byte buffer.
#[derive(Clone)]
pub struct SharedBuffer {
    storage: Arc<Storage>,
}

struct Storage {
    ptr: NonNull<u8>,
    len: usize,
    owned: bool,
}

// SAFETY: the storage is a plain byte region. Owned bytes are only freed on
// drop of the last `Arc`; foreign bytes are never freed by us.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Drop for Storage {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: owned storage always comes from `Box::<[u8]>::into_raw`
            // with exactly `len` elements (see `SharedBuffer::from_vec`).
            unsafe {
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    self.ptr.as_ptr(),
                    self.len,
                )));
            }
        }
    }
}

impl SharedBuffer {
    /// Take ownership of `bytes`.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed) as *mut u8;
        // Box::into_raw is never null, even for empty slices.
        let ptr = NonNull::new(raw).unwrap_or(NonNull::dangling());
        Self {
            storage: Arc::new(Storage {
                ptr,
                len,
                owned: true,
            }),
        }
    }

    /// Allocate `len` zeroed bytes, reporting allocation failure instead of aborting.
    pub fn zeroed(len: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|e| ContextError::Allocation(format!("{len} bytes: {e}")))?;
        bytes.resize(len, 0);
        Ok(Self::from_vec(bytes))
    }

    /// Copy `bytes` into a new owned buffer.
    pub fn copy_from_slice(bytes: &[u8]) -> Result<Self> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(bytes.len())
            .map_err(|e| ContextError::Allocation(format!("{} bytes: {e}", bytes.len())))?;
        copy.extend_from_slice(bytes);
        Ok(Self::from_vec(copy))
    }

    /// Alias foreign memory without taking ownership.
    ///
    /// `len` may be zero when the size is unknown to the caller; such a buffer
    /// still hands out its pointer but reads as an empty slice.
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for reads of `len` bytes (and for writes, if the
    /// pointer is written through) for as long as any clone of the returned
    /// buffer is alive.
    pub unsafe fn borrowed(ptr: *mut u8, len: usize) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        Some(Self {
            storage: Arc::new(Storage {
                ptr,
                len,
                owned: false,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.storage.len
    }

    pub fn is_empty(&self) -> bool {
        self.storage.len == 0
    }

    /// Whether the bytes are freed together with the last clone.
    pub fn is_owned(&self) -> bool {
        self.storage.owned
    }

    /// Number of live clones sharing these bytes.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.storage.ptr.as_ptr()
    }

    /// Raw write access. Writers must not race with readers of any clone.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.storage.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: owned storage holds `len` initialized bytes; foreign storage
        // is valid for `len` bytes by the contract of `borrowed`.
        unsafe { std::slice::from_raw_parts(self.storage.ptr.as_ptr(), self.storage.len) }
    }

    /// Whether both handles share the same allocation.
    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl PartialEq for SharedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("owned", &self.is_owned())
            .field("refs", &self.ref_count())
            .finish()
    }
}

impl From<Vec<u8>> for SharedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}
