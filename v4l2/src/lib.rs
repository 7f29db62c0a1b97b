// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # v4l2 - Video4Linux2 memory-to-memory devices
//!
//! Safe access to the V4L2 memory-to-memory (M2M) codec devices found on
//! Linux systems: stateful hardware encoders and decoders that consume
//! buffers on one queue and produce buffers on the other.
//!
//! ## Overview
//!
//! This crate wraps the raw kernel interface ([`v4l2_sys`]) with owned file
//! descriptors, RAII buffer mappings and error mapping.
//!
//! ### Key Concepts
//!
//! - **Enumeration**: finding candidate device nodes ([`DeviceIterator`])
//! - **Probing**: listing the formats a device accepts and produces ([`probe_device`])
//! - **Direction object**: one queue of an open device ([`V4l2Object`])
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ DeviceIterator │  (udev database or /dev path probing)
//! └───────┬────────┘
//!         │ DeviceDescriptor
//!         ├─► probe_device ──► DeviceFormats { sink, source }
//!         │
//!         └─► Device (Arc) ──► V4l2Object (OUTPUT)   raw frames in
//!                          └─► V4l2Object (CAPTURE)  coded data out
//! ```
//!
//! ## Examples
//!
//! ### Listing codec devices
//!
//! ```no_run
//! use v4l2::{EnumeratorKind, open_iterator, probe_device};
//!
//! # fn main() -> Result<(), v4l2::Error> {
//! let mut devices = open_iterator(EnumeratorKind::from_env())?;
//! while devices.advance() {
//!     let Some(device) = devices.current() else { continue };
//!     match probe_device(&device.device_path) {
//!         Ok(formats) => println!("{}: {:?}", device.device_path, formats),
//!         Err(err) => println!("{}: {}", device.device_path, err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`Device`] is `Send + Sync`; direction objects share it through an `Arc`
//! - [`V4l2Object`] is `Send` and must be driven from one thread at a time
//!
//! ## Feature Flags
//!
//! - `udev`: enumerate devices through libudev instead of probing `/dev` paths

mod buffer;
mod device;
mod enumerator;
mod error;
mod fourcc;
mod object;

pub mod config;

pub use config::EnumeratorKind;
pub use device::{Capability, Device, DeviceFormats, Direction, FormatDesc, probe_device};
#[cfg(feature = "udev")]
pub use enumerator::UdevIterator;
pub use enumerator::{
    DeviceDescriptor, DeviceIterator, PathProbeIterator, collect_devices, open_iterator,
};
pub use error::{Error, Result};
pub use fourcc::Fourcc;
pub use object::{DequeuedBuffer, Format, V4l2Object};
