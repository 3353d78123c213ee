//! Per-coroutine stack regions.
//!
//! Each live stackful coroutine exclusively owns one anonymous mapping,
//! created at `create` and unmapped exactly once when the record is
//! destroyed. A `PROT_NONE` page at the low end turns stack overflow into
//! a fault instead of silent corruption.

use std::io;
use std::ptr::null_mut;

use libc::c_void;

#[derive(Debug)]
pub(super) struct Stack {
    base: *mut c_void,
    size: usize,
}

impl Stack {
    pub(super) fn new(size: usize) -> io::Result<Self> {
        unsafe {
            let mem = libc::mmap(
                null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            if mem == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }

            let page_size = libc::sysconf(libc::_SC_PAGESIZE) as usize;
            let wants_guard = size % page_size == 0 && size >= 2 * page_size;
            if wants_guard && libc::mprotect(mem, page_size, libc::PROT_NONE) < 0 {
                let err = io::Error::last_os_error();
                libc::munmap(mem, size);
                return Err(err);
            }

            Ok(Self { base: mem, size })
        }
    }

    /// One past the highest usable byte; stacks grow downward from here.
    pub(super) fn top(&self) -> *mut u8 {
        unsafe { self.base.byte_add(self.size) as *mut u8 }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base, self.size);
        }
    }
}
