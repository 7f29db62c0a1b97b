// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for V4L2 operations.
//!
//! This module maps failed ioctls and device-level conditions to idiomatic
//! Rust error enums. A failed capability query is an error here; a device
//! whose formats fit no element role is not (that decision belongs to the
//! caller).

use crate::Fourcc;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when talking to a V4L2 device.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device node could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An ioctl returned an error.
    #[error("{ioctl} failed: {source}")]
    Ioctl {
        ioctl: &'static str,
        #[source]
        source: nix::Error,
    },

    /// The device is not a memory-to-memory device.
    #[error("{0} is not a memory-to-memory device")]
    NotM2m(String),

    /// The driver does not accept the requested pixel format.
    #[error("Unsupported pixel format {0}")]
    UnsupportedFormat(Fourcc),

    /// The operation needs a streaming queue.
    #[error("Queue is not active")]
    NotActive,

    /// The operation needs an open device.
    #[error("Device is not open")]
    NotOpen,

    /// Every buffer of the queue is owned by the driver.
    #[error("No free buffer")]
    NoFreeBuffer,

    /// A blocking wait timed out.
    #[error("Timeout")]
    Timeout,

    /// A generic error for failures not covered by the other variants.
    #[error("Other error: {0}")]
    Other(String),

    /// An I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a closure mapping a `nix` error to [`Error::Ioctl`].
    ///
    /// ```ignore
    /// unsafe { v4l2_sys::vidioc_querycap(fd, &mut cap) }
    ///     .map_err(Error::ioctl("VIDIOC_QUERYCAP"))?;
    /// ```
    pub(crate) fn ioctl(ioctl: &'static str) -> impl FnOnce(nix::Error) -> Error {
        move |source| Error::Ioctl { ioctl, source }
    }
}
