// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration and fixed limits.
//!
//! This module holds the device-path families probed by the path-probing
//! enumerator, the streaming constants used by direction objects and the
//! environment-driven choice of enumeration strategy.

use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Environment variable selecting the device enumeration strategy.
pub const ENUMERATOR_ENV: &str = "GST_V4L2_DEVICE_ENUMERATOR";

/// Device-path families probed in order by the path-probing enumerator.
pub const DEVICE_PATH_PREFIXES: &[&str] = &["/dev/video", "/dev/v4l2/video"];

/// Number of numeric suffixes (0..N) probed per path family.
pub const MAX_DEVICE_INDEX: u32 = 64;

/// udev subsystem of video device nodes.
pub const VIDEO_SUBSYSTEM: &str = "video4linux";

/// udev properties holding a human readable product name, by priority.
pub const DEVICE_NAME_PROPERTIES: &[&str] = &["ID_V4L_PRODUCT", "ID_MODEL_ENC", "ID_MODEL"];

/// Buffers requested per queue when streaming starts.
pub const BUFFER_COUNT: u32 = 4;

/// Lower bound for the coded buffer size handed to the driver.
pub const MIN_CODED_BUFFER_SIZE: u32 = 1024 * 1024;

/// How long a drain waits for the last buffer.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a frame submission waits for a free output buffer.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(100);

/// Strategy used to enumerate candidate device nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorKind {
    /// Query the udev device database for the `video4linux` subsystem.
    Udev,
    /// Test `/dev/video<N>` and `/dev/v4l2/video<N>` for existence.
    PathProbe,
}

impl EnumeratorKind {
    /// Returns the strategy compiled in as default.
    ///
    /// udev when the `udev` feature is enabled, path probing otherwise.
    pub fn default_kind() -> Self {
        if cfg!(feature = "udev") {
            EnumeratorKind::Udev
        } else {
            EnumeratorKind::PathProbe
        }
    }

    /// Reads [`ENUMERATOR_ENV`], falling back to [`Self::default_kind`]
    /// when the variable is unset or invalid.
    pub fn from_env() -> Self {
        match std::env::var(ENUMERATOR_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("Ignoring {}: {}", ENUMERATOR_ENV, err);
                Self::default_kind()
            }),
            Err(_) => Self::default_kind(),
        }
    }
}

impl FromStr for EnumeratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udev" => Ok(EnumeratorKind::Udev),
            "path" | "fs" => Ok(EnumeratorKind::PathProbe),
            other => Err(Error::Other(format!("unknown device enumerator '{other}'"))),
        }
    }
}
