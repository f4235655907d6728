use std::fs::File;
use std::num::NonZeroUsize;
use std::os::fd::AsFd;
use std::ptr::NonNull;

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use crate::error::{RegisterReadError, StartError};

/// Mapped view of the register aperture.
///
/// Owned exclusively by the sampling thread; no raw address ever leaves
/// this type, reads are dword-sized, bounds- and alignment-checked. The
/// mapping is released exactly once, when the value is dropped.
pub struct MappedRegisters {
    base: NonNull<libc::c_void>,
    len: usize,
}

// Moved into the sampling thread at startup and only ever accessed there.
unsafe impl Send for MappedRegisters {}

impl MappedRegisters {
    pub(crate) fn map(file: &File, offset: u64, len: usize) -> Result<Self, StartError> {
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| StartError::map_failed("zero-sized register aperture"))?;

        let base = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                file.as_fd(),
                offset as libc::off_t,
            )
        }.map_err(|errno| StartError::map_failed(format!("mmap: {errno}")))?;

        Ok(Self { base, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one dword register.
    pub fn read(&self, offset: u64) -> Result<u32, RegisterReadError> {
        if offset % 4 != 0 {
            return Err(RegisterReadError::Misaligned { offset });
        }
        let end = offset.checked_add(4).filter(|end| *end as usize <= self.len);
        if end.is_none() {
            return Err(RegisterReadError::OutOfRange { offset });
        }

        let value = unsafe {
            let ptr = (self.base.as_ptr() as *const u8).add(offset as usize);
            std::ptr::read_volatile(ptr as *const u32)
        };

        // A master abort on the bus completes with all ones; treating it as
        // a valid sample would count every block as busy on a dead device.
        if value == u32::MAX {
            return Err(RegisterReadError::Unavailable);
        }

        Ok(value)
    }
}

impl Drop for MappedRegisters {
    fn drop(&mut self) {
        let _ = unsafe { munmap(self.base, self.len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_map(len: usize) -> MappedRegisters {
        let file = File::open("/dev/zero").unwrap();
        MappedRegisters::map(&file, 0, len).unwrap()
    }

    #[test]
    fn read_in_bounds() {
        let map = zero_map(4096);
        assert_eq!(map.read(0), Ok(0));
        assert_eq!(map.read(4092), Ok(0));
    }

    #[test]
    fn read_out_of_bounds() {
        let map = zero_map(4096);
        assert_eq!(map.read(4096), Err(RegisterReadError::OutOfRange { offset: 4096 }));
        assert_eq!(map.read(u64::MAX - 3), Err(RegisterReadError::OutOfRange { offset: u64::MAX - 3 }));
    }

    #[test]
    fn read_misaligned() {
        let map = zero_map(4096);
        assert_eq!(map.read(2), Err(RegisterReadError::Misaligned { offset: 2 }));
    }

    #[test]
    fn zero_length_is_rejected() {
        let file = File::open("/dev/zero").unwrap();
        assert!(MappedRegisters::map(&file, 0, 0).is_err());
    }
}
