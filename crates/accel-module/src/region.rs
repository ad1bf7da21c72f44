//! Shared ring regions.
//!
//! Each ring lives in its own shared-memory object, sized
//! `round_up(ring, PAGE) + PAGE` and zero-filled on creation. The object is
//! mapped once read-write for the worker; the client gets its own,
//! direction-restricted mapping of the same pages:
//!
//! ```text
//!                     ┌──────── memfd ────────┐
//!   worker  (RW)  ───►│ header │ slots │ seq  │◄─── client (WO: submission,
//!                     └───────────────────────┘              RO: completion)
//! ```
//!
//! Ring contents are plain bytes moved with volatile copies. The header
//! index and the sequence word are accessed as `AtomicU32`.

use accel_core::error::{AttachError, LayoutError};
use accel_core::layout;

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicU32;

use nix::errno::Errno;
use nix::unistd::SysconfVar;

/// Platform page size.
pub fn page_size() -> usize {
    nix::unistd::sysconf(SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .map(|v| v as usize)
        .unwrap_or(4096)
}

/// Access rights of one mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Worker view of either ring.
    ReadWrite,
    /// Client view of the submission ring.
    WriteOnly,
    /// Client view of the completion ring.
    ReadOnly,
}

impl Access {
    fn prot(self) -> libc::c_int {
        match self {
            Access::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
            Access::WriteOnly => libc::PROT_WRITE,
            Access::ReadOnly => libc::PROT_READ,
        }
    }
}

/// One `mmap` of a shared region. Unmapped on drop.
pub struct Mapping {
    base: NonNull<u8>,
    len: usize,
    access: Access,
}

// Safety: the mapping is plain shared memory. Concurrent access is
// coordinated through the atomic header index and sequence word.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    fn map(fd: &OwnedFd, len: usize, access: Access, region: &'static str) -> Result<Self, AttachError> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                access.prot(),
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(AttachError::Allocation(Errno::last() as i32));
        }
        // Safety: mmap never returns null on success.
        let base = unsafe { NonNull::new_unchecked(ptr as *mut u8) };
        let mapping = Self { base, len, access };

        if (base.as_ptr() as usize) & (page_size() - 1) != 0 {
            return Err(AttachError::Misaligned { region });
        }
        Ok(mapping)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Check that a ring of `ring_size` bytes plus its sequence page fits
    /// in this mapping and that the mapping is page-aligned.
    pub fn validate(&self, ring_size: usize) -> Result<(), LayoutError> {
        let page = page_size();
        let needed = layout::region_size(ring_size, page);
        if self.len < needed {
            return Err(LayoutError::Truncated {
                needed,
                got: self.len,
            });
        }
        let addr = self.base.as_ptr() as usize;
        if addr & (page - 1) != 0 {
            return Err(LayoutError::Unaligned {
                addr,
                page_size: page,
            });
        }
        Ok(())
    }

    /// The `u32` at `offset` viewed as an atomic.
    #[inline]
    pub(crate) fn word(&self, offset: usize) -> &AtomicU32 {
        debug_assert!(offset % 4 == 0 && offset + 4 <= self.len);
        // Safety: in bounds, 4-byte aligned (page-aligned base), and the
        // mapping outlives the returned reference.
        unsafe { &*(self.base.as_ptr().add(offset) as *const AtomicU32) }
    }

    /// Copy `buf.len()` bytes out of the mapping at `offset`.
    #[inline]
    pub(crate) fn read_into(&self, offset: usize, buf: &mut [u8]) {
        debug_assert!(self.access != Access::WriteOnly);
        debug_assert!(offset + buf.len() <= self.len);
        let src = unsafe { self.base.as_ptr().add(offset) };
        for (i, b) in buf.iter_mut().enumerate() {
            *b = unsafe { ptr::read_volatile(src.add(i)) };
        }
    }

    /// Copy `buf` into the mapping at `offset`.
    #[inline]
    pub(crate) fn write_from(&self, offset: usize, buf: &[u8]) {
        debug_assert!(self.access != Access::ReadOnly);
        debug_assert!(offset + buf.len() <= self.len);
        let dst = unsafe { self.base.as_ptr().add(offset) };
        for (i, b) in buf.iter().enumerate() {
            unsafe { ptr::write_volatile(dst.add(i), *b) };
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("access", &self.access)
            .finish()
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn create_object() -> Result<OwnedFd, AttachError> {
            let fd = unsafe { libc::memfd_create(c"accel-ring".as_ptr(), libc::MFD_CLOEXEC) };
            if fd < 0 {
                return Err(AttachError::Allocation(Errno::last() as i32));
            }
            Ok(unsafe { OwnedFd::from_raw_fd(fd) })
        }
    } else {
        fn create_object() -> Result<OwnedFd, AttachError> {
            use std::sync::atomic::{AtomicU64, Ordering};
            static NEXT: AtomicU64 = AtomicU64::new(0);

            let name = format!("/accel-{}-{}\0", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed));
            let fd = unsafe {
                libc::shm_open(
                    name.as_ptr() as *const libc::c_char,
                    libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                    0o600,
                )
            };
            if fd < 0 {
                return Err(AttachError::Allocation(Errno::last() as i32));
            }
            // Anonymous from here on: the fd keeps the object alive.
            unsafe { libc::shm_unlink(name.as_ptr() as *const libc::c_char) };
            Ok(unsafe { OwnedFd::from_raw_fd(fd) })
        }
    }
}

/// A zero-filled shared-memory object holding one ring plus its sequence page.
///
/// Owns the backing object and the worker's read-write mapping. Client
/// mappings created with [`SharedRegion::map_client`] keep the pages alive
/// on their own.
pub struct SharedRegion {
    fd: OwnedFd,
    worker: Mapping,
    ring_size: usize,
    sequence_offset: usize,
    name: &'static str,
}

impl SharedRegion {
    /// Allocate a region for a ring of `ring_size` bytes.
    pub fn create(name: &'static str, ring_size: usize) -> Result<Self, AttachError> {
        let page = page_size();
        let len = layout::region_size(ring_size, page);

        let fd = create_object()?;
        if unsafe { libc::ftruncate(fd.as_raw_fd(), len as libc::off_t) } < 0 {
            return Err(AttachError::Allocation(Errno::last() as i32));
        }

        let worker = Mapping::map(&fd, len, Access::ReadWrite, name)?;
        Ok(Self {
            fd,
            worker,
            ring_size,
            sequence_offset: layout::sequence_offset(ring_size, page),
            name,
        })
    }

    /// Map the region again for a client, with restricted access.
    pub fn map_client(&self, access: Access) -> Result<Mapping, AttachError> {
        Mapping::map(&self.fd, self.worker.len(), access, self.name)
    }

    /// The worker's read-write view.
    #[inline]
    pub fn worker(&self) -> &Mapping {
        &self.worker
    }

    #[inline]
    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// Offset of the sequence word.
    #[inline]
    pub fn sequence_offset(&self) -> usize {
        self.sequence_offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.worker.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.worker.is_empty()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_core::layout::SUBMISSION_RING_SIZE;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_region_is_page_aligned_and_sized() {
        let region = SharedRegion::create("submission", SUBMISSION_RING_SIZE).unwrap();
        let page = page_size();
        assert_eq!(region.len(), layout::region_size(SUBMISSION_RING_SIZE, page));
        assert_eq!(region.worker().as_ptr() as usize % page, 0);
        region.worker().validate(SUBMISSION_RING_SIZE).unwrap();
    }

    #[test]
    fn test_region_starts_zeroed() {
        let region = SharedRegion::create("submission", SUBMISSION_RING_SIZE).unwrap();
        let mut buf = vec![0xFFu8; region.len()];
        region.worker().read_into(0, &mut buf);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_client_view_sees_worker_writes() {
        let region = SharedRegion::create("completion", 264).unwrap();
        let client = region.map_client(Access::ReadOnly).unwrap();
        assert_eq!(client.access(), Access::ReadOnly);
        assert_ne!(client.as_ptr(), region.worker().as_ptr());

        region.worker().write_from(8, &[1, 2, 3, 4]);
        region.worker().word(region.sequence_offset()).store(9, Ordering::Release);

        let mut buf = [0u8; 4];
        client.read_into(8, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(client.word(region.sequence_offset()).load(Ordering::Acquire), 9);
    }

    #[test]
    fn test_client_write_only_view_reaches_worker() {
        let region = SharedRegion::create("submission", SUBMISSION_RING_SIZE).unwrap();
        let client = region.map_client(Access::WriteOnly).unwrap();
        client.write_from(16, &[7; 8]);

        let mut buf = [0u8; 8];
        region.worker().read_into(16, &mut buf);
        assert_eq!(buf, [7; 8]);
    }

    #[test]
    fn test_client_mapping_outlives_region() {
        let region = SharedRegion::create("completion", 264).unwrap();
        region.worker().write_from(8, &[42]);
        let client = region.map_client(Access::ReadOnly).unwrap();
        drop(region);

        let mut buf = [0u8; 1];
        client.read_into(8, &mut buf);
        assert_eq!(buf, [42]);
    }

    #[test]
    fn test_validate_rejects_short_ring() {
        let region = SharedRegion::create("completion", 264).unwrap();
        let too_big = region.len() * 2;
        assert!(matches!(
            region.worker().validate(too_big),
            Err(LayoutError::Truncated { .. })
        ));
    }
}
