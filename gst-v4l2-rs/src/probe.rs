//! Device Discovery
//!
//! Walks the candidate device nodes at plugin load, probes the formats of
//! each memory-to-memory device and registers one element type per device
//! whose formats fit a known role.
//!
//! The enumeration strategy follows `GST_V4L2_DEVICE_ENUMERATOR`. A device
//! that cannot be probed is skipped with a warning; it never prevents the
//! remaining devices from being registered.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gstreamer as gst;

use v4l2::{DeviceDescriptor, DeviceFormats, EnumeratorKind};

use crate::caps::caps_from_fourccs;
use crate::factory::{CAT, basename_from_path, register_first_match};
use crate::roles::RoleRegistry;

/// Template caps of a probed device, as (sink, src).
pub fn device_caps(formats: &DeviceFormats) -> (gst::Caps, gst::Caps) {
    (
        caps_from_fourccs(&formats.sink),
        caps_from_fourccs(&formats.source),
    )
}

/// Registers element types for every device found by the configured
/// enumerator. Returns the number of types registered.
pub fn register_devices(plugin: &gst::Plugin) -> usize {
    let kind = EnumeratorKind::from_env();
    gst::debug!(CAT, "Enumerating devices with {:?}", kind);

    let mut iter = match v4l2::open_iterator(kind) {
        Ok(iter) => iter,
        Err(err) => {
            gst::warning!(CAT, "Failed to enumerate devices: {}", err);
            return 0;
        }
    };

    let registry = RoleRegistry::builtin();
    let mut registered = 0;
    while iter.advance() {
        let Some(device) = iter.current() else {
            break;
        };
        if register_device(Some(plugin), &registry, device) {
            registered += 1;
        }
    }

    gst::info!(CAT, "Registered {} element types", registered);

    registered
}

fn register_device(
    plugin: Option<&gst::Plugin>,
    registry: &RoleRegistry,
    device: &DeviceDescriptor,
) -> bool {
    let path = device.device_path.as_str();

    let formats = match v4l2::probe_device(path) {
        Ok(formats) => formats,
        Err(err @ v4l2::Error::NotM2m(_)) => {
            gst::debug!(CAT, "Skipping {}: {}", path, err);
            return false;
        }
        Err(err) => {
            gst::warning!(CAT, "Failed to probe {}: {}", path, err);
            return false;
        }
    };

    if formats.is_empty() {
        gst::debug!(CAT, "Skipping {}: no format on one of its queues", path);
        return false;
    }

    let (sink_caps, src_caps) = device_caps(&formats);
    gst::debug!(
        CAT,
        "{} ({}): sink {}, src {}",
        path,
        device.device_name.as_deref().unwrap_or("unknown"),
        sink_caps,
        src_caps
    );

    let basename = basename_from_path(path);
    match register_first_match(registry, plugin, &basename, path, &sink_caps, &src_caps) {
        Ok(registered) => registered.is_some(),
        Err(err) => {
            gst::warning!(CAT, "Failed to register {}: {}", path, err);
            false
        }
    }
}
