// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Device nodes and capability probing.
//!
//! This module provides [`Device`], an open V4L2 node with its queried
//! capabilities, and [`probe_device`], which derives the formats a
//! memory-to-memory device accepts (OUTPUT queue) and produces (CAPTURE
//! queue).
//!
//! ## Memory-to-memory naming
//! V4L2 names queues from the application's point of view: raw frames are
//! *output* to an encoder and coded data is *captured* from it. The plugin
//! side calls the OUTPUT formats its sink and the CAPTURE formats its source.

use std::fs::OpenOptions;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use tracing::{debug, trace};

use crate::{Error, Fourcc, Result};

/// Queue direction of a memory-to-memory device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Data flowing into the device (raw frames for an encoder).
    Output,
    /// Data flowing out of the device (coded data for an encoder).
    Capture,
}

impl Direction {
    /// Returns the `v4l2_buf_type` for this direction.
    pub fn buf_type(self, multiplanar: bool) -> u32 {
        match (self, multiplanar) {
            (Direction::Output, false) => v4l2_sys::V4L2_BUF_TYPE_VIDEO_OUTPUT,
            (Direction::Output, true) => v4l2_sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE,
            (Direction::Capture, false) => v4l2_sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            (Direction::Capture, true) => v4l2_sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
        }
    }
}

/// Result of `VIDIOC_QUERYCAP`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Capability {
    /// Kernel driver name.
    pub driver: String,
    /// Human readable device name.
    pub card: String,
    /// Bus location of the device.
    pub bus_info: String,
    /// Capabilities of this node (`device_caps` when reported, otherwise
    /// the physical device capabilities).
    pub device_caps: u32,
}

impl Capability {
    fn from_raw(raw: &v4l2_sys::v4l2_capability) -> Self {
        let device_caps = if raw.capabilities & v4l2_sys::V4L2_CAP_DEVICE_CAPS != 0 {
            raw.device_caps
        } else {
            raw.capabilities
        };

        Capability {
            driver: v4l2_sys::c_bytes_to_string(&raw.driver),
            card: v4l2_sys::c_bytes_to_string(&raw.card),
            bus_info: v4l2_sys::c_bytes_to_string(&raw.bus_info),
            device_caps,
        }
    }

    /// True for single- or multi-planar memory-to-memory nodes.
    pub fn is_m2m(&self) -> bool {
        self.device_caps & (v4l2_sys::V4L2_CAP_VIDEO_M2M | v4l2_sys::V4L2_CAP_VIDEO_M2M_MPLANE) != 0
    }

    /// True when the node only speaks the multi-planar API.
    pub fn is_multiplanar(&self) -> bool {
        self.device_caps & v4l2_sys::V4L2_CAP_VIDEO_M2M == 0
            && self.device_caps & v4l2_sys::V4L2_CAP_VIDEO_M2M_MPLANE != 0
    }
}

/// One entry of `VIDIOC_ENUM_FMT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDesc {
    pub fourcc: Fourcc,
    pub description: String,
    pub compressed: bool,
}

/// An open V4L2 device node.
///
/// Every `open()` of a memory-to-memory node creates an independent device
/// context, so both directions of one element must share a single `Device`.
#[derive(Debug)]
pub struct Device {
    path: String,
    fd: OwnedFd,
    capability: Capability,
}

impl Device {
    /// Opens `path` non-blocking and queries its capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the node cannot be opened and
    /// [`Error::Ioctl`] if it does not answer `VIDIOC_QUERYCAP`.
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_owned(),
                source,
            })?;
        let fd = OwnedFd::from(file);

        let mut raw = v4l2_sys::v4l2_capability::default();
        unsafe { v4l2_sys::vidioc_querycap(fd.as_raw_fd(), &mut raw) }
            .map_err(Error::ioctl("VIDIOC_QUERYCAP"))?;
        let capability = Capability::from_raw(&raw);

        debug!(
            "Opened {} ({}, driver {}, caps {:#010x})",
            path, capability.card, capability.driver, capability.device_caps
        );

        Ok(Device {
            path: path.to_owned(),
            fd,
            capability,
        })
    }

    /// Returns the device node path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the queried capabilities.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Returns the buffer type used for `direction` on this device.
    pub fn buf_type(&self, direction: Direction) -> u32 {
        direction.buf_type(self.capability.is_multiplanar())
    }

    /// Enumerates the formats of one queue direction.
    pub fn enum_formats(&self, direction: Direction) -> Result<Vec<FormatDesc>> {
        let buf_type = self.buf_type(direction);
        let mut formats = Vec::new();

        for index in 0.. {
            let mut desc = v4l2_sys::v4l2_fmtdesc {
                index,
                type_: buf_type,
                ..Default::default()
            };

            match unsafe { v4l2_sys::vidioc_enum_fmt(self.as_raw_fd(), &mut desc) } {
                Ok(_) => {
                    let format = FormatDesc {
                        fourcc: Fourcc::from(desc.pixelformat),
                        description: v4l2_sys::c_bytes_to_string(&desc.description),
                        compressed: desc.flags & v4l2_sys::V4L2_FMT_FLAG_COMPRESSED != 0,
                    };
                    trace!("{} {:?} format {}: {:?}", self.path, direction, index, format);
                    formats.push(format);
                }
                // EINVAL marks the end of the list
                Err(nix::Error::EINVAL) => break,
                Err(source) => {
                    return Err(Error::Ioctl {
                        ioctl: "VIDIOC_ENUM_FMT",
                        source,
                    });
                }
            }
        }

        Ok(formats)
    }
}

impl AsRawFd for Device {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Formats of a memory-to-memory device, split by queue direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeviceFormats {
    /// Formats accepted on the OUTPUT queue.
    pub sink: Vec<Fourcc>,
    /// Formats produced on the CAPTURE queue.
    pub source: Vec<Fourcc>,
}

impl DeviceFormats {
    /// True if either direction reports no format at all.
    pub fn is_empty(&self) -> bool {
        self.sink.is_empty() || self.source.is_empty()
    }
}

/// Opens `path` and lists the formats of both queue directions.
///
/// # Errors
///
/// Returns [`Error::NotM2m`] for capture-only or output-only nodes, and the
/// open/ioctl error if the device cannot be queried. These are distinct from
/// a successful probe whose formats fit no element role.
pub fn probe_device(path: &str) -> Result<DeviceFormats> {
    let device = Device::open(path)?;

    if !device.capability().is_m2m() {
        return Err(Error::NotM2m(path.to_owned()));
    }

    let formats = DeviceFormats {
        sink: formats_of(&device, Direction::Output)?,
        source: formats_of(&device, Direction::Capture)?,
    };

    debug!(
        "Probed {}: sink {:?}, source {:?}",
        path, formats.sink, formats.source
    );

    Ok(formats)
}

fn formats_of(device: &Device, direction: Direction) -> Result<Vec<Fourcc>> {
    Ok(device
        .enum_formats(direction)?
        .into_iter()
        .map(|desc| desc.fourcc)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(device_caps: u32) -> Capability {
        let mut raw = v4l2_sys::v4l2_capability {
            capabilities: device_caps | v4l2_sys::V4L2_CAP_DEVICE_CAPS,
            device_caps,
            ..Default::default()
        };
        raw.driver[..7].copy_from_slice(b"vicodec");
        Capability::from_raw(&raw)
    }

    #[test]
    fn classifies_m2m_nodes() {
        let single = capability(v4l2_sys::V4L2_CAP_VIDEO_M2M | v4l2_sys::V4L2_CAP_STREAMING);
        assert!(single.is_m2m());
        assert!(!single.is_multiplanar());

        let mplane = capability(v4l2_sys::V4L2_CAP_VIDEO_M2M_MPLANE);
        assert!(mplane.is_m2m());
        assert!(mplane.is_multiplanar());

        let camera = capability(v4l2_sys::V4L2_CAP_VIDEO_CAPTURE);
        assert!(!camera.is_m2m());
    }

    #[test]
    fn buffer_types_follow_planarity() {
        assert_eq!(
            Direction::Output.buf_type(false),
            v4l2_sys::V4L2_BUF_TYPE_VIDEO_OUTPUT
        );
        assert_eq!(
            Direction::Capture.buf_type(true),
            v4l2_sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE
        );
    }

    #[test]
    fn one_sided_formats_count_as_empty() {
        let mut formats = DeviceFormats::default();
        assert!(formats.is_empty());

        formats.sink.push(Fourcc::NV12);
        assert!(formats.is_empty());

        formats.source.push(Fourcc::H264);
        assert!(!formats.is_empty());
    }

    #[test]
    fn probing_a_missing_node_is_an_open_error() {
        let err = probe_device("/nonexistent/video0").unwrap_err();
        assert!(matches!(err, Error::Open { .. }), "{err}");
    }
}
