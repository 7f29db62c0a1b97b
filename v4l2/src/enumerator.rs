// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Device enumeration.
//!
//! Candidate device nodes are yielded one at a time through the
//! [`DeviceIterator`] trait. Two strategies exist:
//! - [`PathProbeIterator`] tests `/dev/video<N>` and `/dev/v4l2/video<N>`
//!   for existence,
//! - `UdevIterator` (feature `udev`) lists the `video4linux` subsystem from
//!   the udev database and adds the product name and sysfs path.
//!
//! Iterators release their resources when dropped.

mod path_probe;
#[cfg(feature = "udev")]
mod udev_db;

pub use path_probe::PathProbeIterator;
#[cfg(feature = "udev")]
pub use udev_db::UdevIterator;

use crate::Result;
use crate::config::EnumeratorKind;

/// A device node found by an iterator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceDescriptor {
    /// Path of the device node, e.g. `/dev/video0`.
    pub device_path: String,
    /// Human readable product name, when the enumerator knows it.
    pub device_name: Option<String>,
    /// sysfs path of the device, when the enumerator knows it.
    pub sys_path: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(device_path: impl Into<String>) -> Self {
        DeviceDescriptor {
            device_path: device_path.into(),
            device_name: None,
            sys_path: None,
        }
    }
}

/// Stateful cursor over candidate device nodes.
///
/// A fresh iterator is positioned before the first device; call
/// [`advance`](Self::advance) before reading [`current`](Self::current).
pub trait DeviceIterator {
    /// Moves to the next device. Returns `false` once exhausted, and keeps
    /// returning `false` afterwards.
    fn advance(&mut self) -> bool;

    /// The device the iterator is positioned on, `None` before the first
    /// successful advance or after exhaustion.
    fn current(&self) -> Option<&DeviceDescriptor>;
}

/// Creates an iterator of the requested kind.
///
/// Asking for udev in a build without the `udev` feature falls back to path
/// probing.
pub fn open_iterator(kind: EnumeratorKind) -> Result<Box<dyn DeviceIterator + Send>> {
    match kind {
        #[cfg(feature = "udev")]
        EnumeratorKind::Udev => Ok(Box::new(UdevIterator::new()?)),
        #[cfg(not(feature = "udev"))]
        EnumeratorKind::Udev => {
            tracing::warn!("udev support not built in, probing device paths instead");
            Ok(Box::new(PathProbeIterator::new()))
        }
        EnumeratorKind::PathProbe => Ok(Box::new(PathProbeIterator::new())),
    }
}

/// Drains an iterator into a list, in iteration order.
pub fn collect_devices(iter: &mut dyn DeviceIterator) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    while iter.advance() {
        if let Some(device) = iter.current() {
            devices.push(device.clone());
        }
    }
    devices
}
