//! GStreamer Plugin for V4L2 Memory-to-Memory Codecs
//!
//! This crate implements the `v4l2codec` plugin. At load time it discovers
//! the memory-to-memory codec devices of the system and registers one
//! element type per device and role, e.g. `v4l20h264enc` for an H.264
//! encoder on `/dev/video0`.
//!
//! ## Roles
//! A role is recognized from the formats a device accepts and produces:
//! - **videodec**: a known codec in, raw video out (`V4l2VideoDec`)
//! - **h264enc**: raw video in, H.264 out (`V4l2H264Enc`)
//!
//! Roles are tried in that order and the first match wins, so every device
//! yields at most one element type.
//!
//! ## Generated Types
//! Each generated type derives from the role's abstract base, carries the
//! device node as its default device and has pad templates with exactly
//! the caps probed from the device. It is registered at rank
//! `PRIMARY + 1` so autoplugging prefers hardware codecs.
//!
//! ## Configuration
//! - `GST_V4L2_DEVICE_ENUMERATOR=udev|path` selects how devices are found
//!   (udev needs the `udev` cargo feature).
//! - `GST_DEBUG=v4l2codec:5` logs every probed device.
//!
//! ```bash
//! gst-launch-1.0 videotestsrc num-buffers=100 ! video/x-raw,format=NV12 ! \
//!     v4l20h264enc ! h264parse ! mp4mux ! filesink location=out.mp4
//! ```

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

#![allow(clippy::non_send_fields_in_send_ty, unused_doc_comments)]

use gst::glib;
use gstreamer as gst;

/// V4L2 fourcc to caps mapping and the raw/codec universes
pub mod caps;

/// Per-device element type synthesis
pub mod factory;

/// Frame layouts and restriding
pub mod layout;

/// Output and capture direction objects of one element
pub mod objects;

/// Device discovery at plugin load
pub mod probe;

/// Role predicates and the role registry
pub mod roles;

/// H.264 encoder base class
pub mod v4l2h264enc;

/// Decoder base class
pub mod v4l2videodec;

/// Encoder base class
pub mod v4l2videoenc;

pub use factory::{register_all_matching_roles, register_h264_encoder};

/// Registers an element type for every capable device.
///
/// Devices that cannot be probed or fit no role are skipped, so loading
/// never fails because of a single device.
fn plugin_init(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::filter::LevelFilter;
        use tracing_subscriber::util::SubscriberInitExt;

        let _ = tracing_subscriber::fmt()
            .compact()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(false)
            .with_max_level(LevelFilter::TRACE)
            .with_ansi(true)
            .finish()
            .try_init();
    }

    // Rescan when device nodes come and go
    plugin.add_dependency(
        &[v4l2::config::ENUMERATOR_ENV],
        &["/dev", "/dev/v4l2"],
        &["video"],
        gst::PluginDependencyFlags::FILE_NAME_IS_PREFIX,
    );

    probe::register_devices(plugin);

    Ok(())
}

gst::plugin_define!(
    v4l2codec,
    env!("CARGO_PKG_DESCRIPTION"),
    plugin_init,
    concat!(env!("CARGO_PKG_VERSION"), "-", env!("COMMIT_ID")),
    "Apache-2.0",
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_NAME"),
    "Unknown package origin",
    env!("BUILD_REL_DATE")
);
