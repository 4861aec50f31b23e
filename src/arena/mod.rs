//! Bump arena over anonymous shared memory
//!
//! [`SharedArena`] maps one fixed-size `MAP_SHARED | MAP_ANONYMOUS` region
//! before the loader forks. The sandboxed child bump-allocates the whole
//! configuration graph into it and the parent reads the same bytes after
//! reaping the child. Nothing is freed individually; the mapping is released
//! when the owning `SharedArena` is dropped.
//!
//! Everything stored in the arena refers to other arena data by offset
//! ([`TextRef`]), never by pointer, so the graph needs no relocation and a
//! corrupt child cannot make the parent dereference memory outside the
//! mapping.

mod seq;

pub use seq::FixedSeq;

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::mem::{align_of, size_of};
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Types whose all-zero bit pattern is a valid value.
///
/// # Safety
///
/// Implementors must be plain data: no pointers, references, niches or
/// padding-dependent invariants, and every field must accept all-zero bytes.
pub unsafe trait ZeroSafe: Copy {}

/// Reference to text stored inside the arena.
///
/// Offset `0` is always occupied by the arena root, so a zero offset means
/// "unset". A set reference with `len == 0` is a valid empty string.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextRef {
    offset: u32,
    len: u32,
}

// SAFETY: two u32 fields, zero means unset.
unsafe impl ZeroSafe for TextRef {}

impl TextRef {
    /// The unset reference
    pub const UNSET: TextRef = TextRef { offset: 0, len: 0 };

    pub fn is_set(&self) -> bool {
        self.offset != 0
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte; 0 when unset
    pub fn end(&self) -> usize {
        if self.is_set() {
            self.offset as usize + self.len as usize
        } else {
            0
        }
    }
}

/// Reserved, not yet written text storage.
#[derive(Debug, Clone, Copy)]
pub struct TextSlot {
    offset: u32,
    capacity: u32,
}

impl TextSlot {
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

/// Fixed-size bump allocator over a process-shared anonymous mapping
pub struct SharedArena {
    base: NonNull<u8>,
    capacity: usize,
    cursor: usize,
    root_size: usize,
}

impl SharedArena {
    /// Map a zero-filled shared region of exactly `size` bytes.
    ///
    /// The region stays visible to every process forked after this call.
    pub fn create(size: usize) -> Result<Self> {
        if size > u32::MAX as usize {
            return Err(ConfigError::ArenaExhausted {
                requested: size,
                remaining: u32::MAX as usize,
            });
        }
        let length = NonZeroUsize::new(size).ok_or(ConfigError::ArenaExhausted {
            requested: 1,
            remaining: 0,
        })?;

        // SAFETY: a fresh anonymous mapping aliases nothing.
        let ptr = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED | MapFlags::MAP_ANONYMOUS,
            )
        }
        .map_err(ConfigError::ArenaMap)?;

        debug!("Mapped {} byte shared config arena", size);
        Ok(Self {
            base: ptr.cast::<u8>(),
            capacity: size,
            cursor: 0,
            root_size: 0,
        })
    }

    /// Total size of the mapping in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes handed out so far (including alignment padding)
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Reserve `len` bytes aligned to `align` and return their offset.
    pub fn allocate(&mut self, len: usize, align: usize) -> Result<usize> {
        let remaining = self.remaining();
        let exhausted = || ConfigError::ArenaExhausted {
            requested: len,
            remaining,
        };
        let align = align.max(1).next_power_of_two();
        let start = self
            .cursor
            .checked_add(align - 1)
            .map(|c| c & !(align - 1))
            .ok_or_else(exhausted)?;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.capacity)
            .ok_or_else(exhausted)?;
        self.cursor = end;
        Ok(start)
    }

    /// Reserve the root object at offset 0. Must be the first allocation.
    pub fn reserve_root<T: ZeroSafe>(&mut self) -> Result<()> {
        if self.cursor != 0 || self.root_size != 0 {
            return Err(ConfigError::RootReserved);
        }
        let offset = self.allocate(size_of::<T>(), align_of::<T>())?;
        debug_assert_eq!(offset, 0);
        self.root_size = size_of::<T>();
        Ok(())
    }

    fn check_root<T: ZeroSafe>(&self) -> Result<()> {
        // The mapping is page aligned, so offset 0 satisfies any alignment of T.
        if self.root_size != size_of::<T>() || self.root_size == 0 {
            return Err(ConfigError::RootMissing);
        }
        Ok(())
    }

    /// Shared view of the root object
    pub fn root<T: ZeroSafe>(&self) -> Result<&T> {
        self.check_root::<T>()?;
        // SAFETY: the root was reserved for T at offset 0, the mapping is
        // zero-initialised and T accepts any zero-or-written bit pattern.
        Ok(unsafe { &*(self.base.as_ptr() as *const T) })
    }

    /// Mutable view of the root object
    pub fn root_mut<T: ZeroSafe>(&mut self) -> Result<&mut T> {
        self.check_root::<T>()?;
        // SAFETY: as in `root`, and `&mut self` makes the borrow unique.
        Ok(unsafe { &mut *(self.base.as_ptr() as *mut T) })
    }

    /// Reserve text storage of `capacity` bytes without writing it yet.
    pub fn reserve_text(&mut self, capacity: usize) -> Result<TextSlot> {
        if self.root_size == 0 {
            // Offset 0 must stay taken or TextRef could not tell set from unset.
            return Err(ConfigError::RootMissing);
        }
        let offset = self.allocate(capacity, 1)?;
        Ok(TextSlot {
            offset: offset as u32,
            capacity: capacity as u32,
        })
    }

    /// Copy `text` into a reserved slot, failing instead of truncating.
    pub fn write_text(&mut self, slot: TextSlot, text: &str) -> Result<TextRef> {
        if text.len() > slot.capacity() {
            return Err(ConfigError::TextTooLong {
                len: text.len(),
                capacity: slot.capacity(),
            });
        }
        let dst = self.bytes_mut(slot.offset as usize, text.len())?;
        dst.copy_from_slice(text.as_bytes());
        Ok(TextRef {
            offset: slot.offset,
            len: text.len() as u32,
        })
    }

    /// Reserve exactly enough room for `text` and copy it in.
    pub fn copy_text(&mut self, text: &str) -> Result<TextRef> {
        let slot = self.reserve_text(text.len())?;
        self.write_text(slot, text)
    }

    /// Resolve a reference, checking bounds and UTF-8.
    ///
    /// Returns `Ok(None)` for an unset reference.
    pub fn text(&self, r: TextRef) -> Result<Option<&str>> {
        if !r.is_set() {
            return Ok(None);
        }
        let bytes = self.bytes(r.offset as usize, r.len as usize)?;
        std::str::from_utf8(bytes)
            .map(Some)
            .map_err(|e| ConfigError::CorruptRecord(format!("text at {}: {}", r.offset, e)))
    }

    /// Bounds-checked read access to raw arena bytes
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check_range(offset, len)?;
        // SAFETY: range checked against the mapping length above.
        Ok(unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(offset), len) })
    }

    fn bytes_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        self.check_range(offset, len)?;
        // SAFETY: range checked, unique borrow through `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) })
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(ConfigError::CorruptRecord(format!(
                "range {}+{} outside {} byte arena",
                offset, len, self.capacity
            ))),
        }
    }
}

impl Drop for SharedArena {
    fn drop(&mut self) {
        // SAFETY: base/capacity describe the mapping created in `create`, and
        // no borrow of it can outlive `self`.
        if let Err(e) = unsafe { munmap(self.base.cast(), self.capacity) } {
            debug!("munmap of config arena failed: {}", e);
        }
    }
}

impl std::fmt::Debug for SharedArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedArena")
            .field("capacity", &self.capacity)
            .field("used", &self.cursor)
            .finish()
    }
}
