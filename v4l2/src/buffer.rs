// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Driver buffers mapped into the process with `mmap`.

use std::num::NonZeroUsize;
use std::os::fd::BorrowedFd;
use std::ptr::NonNull;

use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};

use crate::{Error, Result};

/// One MMAP buffer of a V4L2 queue.
///
/// The mapping is released when the value is dropped; buffers must be
/// dropped before the queue is freed with `VIDIOC_REQBUFS(0)`.
#[derive(Debug)]
pub(crate) struct MappedBuffer {
    ptr: NonNull<u8>,
    len: NonZeroUsize,
    /// True while the buffer is owned by the driver.
    pub(crate) queued: bool,
}

// The mapping is plain memory owned by this value.
unsafe impl Send for MappedBuffer {}

impl MappedBuffer {
    /// Maps `len` bytes of `fd` at the driver supplied `offset`.
    pub(crate) fn map(fd: BorrowedFd<'_>, offset: u32, len: usize) -> Result<Self> {
        let len = NonZeroUsize::new(len)
            .ok_or_else(|| Error::Other("driver reported a zero sized buffer".into()))?;

        // Safety: a fresh shared mapping of a driver buffer, aliased by nothing
        // else in this process.
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        }
        .map_err(std::io::Error::from)?;

        Ok(MappedBuffer {
            ptr: ptr.cast(),
            len,
            queued: false,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len.get()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len.get()) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len.get()) }
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        if let Err(err) = unsafe { munmap(self.ptr.cast(), self.len.get()) } {
            tracing::warn!("munmap of {} bytes failed: {}", self.len, err);
        }
    }
}
