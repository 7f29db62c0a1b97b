// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::ffi::OsStr;

use tracing::{debug, trace};

use super::{DeviceDescriptor, DeviceIterator};
use crate::config::{DEVICE_NAME_PROPERTIES, VIDEO_SUBSYSTEM};
use crate::{Error, Result};

/// Enumerates `video4linux` nodes from the udev database.
///
/// The database is scanned once on creation; devices without a device node
/// are skipped.
#[derive(Debug)]
pub struct UdevIterator {
    devices: std::vec::IntoIter<DeviceDescriptor>,
    current: Option<DeviceDescriptor>,
}

impl UdevIterator {
    pub fn new() -> Result<Self> {
        let mut enumerator = udev::Enumerator::new()
            .map_err(|e| Error::Other(format!("Failed to create udev enumerator: {e}")))?;
        enumerator.match_subsystem(VIDEO_SUBSYSTEM)?;

        let devices: Vec<DeviceDescriptor> = enumerator
            .scan_devices()?
            .filter_map(|device| describe(&device))
            .collect();

        debug!("udev lists {} {} nodes", devices.len(), VIDEO_SUBSYSTEM);

        Ok(UdevIterator {
            devices: devices.into_iter(),
            current: None,
        })
    }
}

fn describe(device: &udev::Device) -> Option<DeviceDescriptor> {
    let device_path = device.devnode()?.to_string_lossy().into_owned();

    let device_name = DEVICE_NAME_PROPERTIES
        .iter()
        .find_map(|key| device.property_value(key))
        .map(os_to_string);

    let descriptor = DeviceDescriptor {
        device_path,
        device_name,
        sys_path: Some(device.syspath().to_string_lossy().into_owned()),
    };
    trace!("udev device {:?}", descriptor);

    Some(descriptor)
}

fn os_to_string(value: &OsStr) -> String {
    value.to_string_lossy().into_owned()
}

impl DeviceIterator for UdevIterator {
    fn advance(&mut self) -> bool {
        self.current = self.devices.next();
        self.current.is_some()
    }

    fn current(&self) -> Option<&DeviceDescriptor> {
        self.current.as_ref()
    }
}
