// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use tracing::trace;

use super::{DeviceDescriptor, DeviceIterator};
use crate::config::{DEVICE_PATH_PREFIXES, MAX_DEVICE_INDEX};

type ExistsFn = Box<dyn Fn(&Path) -> bool + Send>;

/// Enumerates device nodes by testing well-known paths for existence.
///
/// Every prefix is probed with the suffixes `0..MAX_DEVICE_INDEX` before
/// moving to the next prefix. Only the path is reported.
pub struct PathProbeIterator {
    prefixes: Vec<String>,
    exists: ExistsFn,
    prefix_idx: usize,
    next_index: u32,
    current: Option<DeviceDescriptor>,
}

impl PathProbeIterator {
    /// Probes the standard `/dev` locations.
    pub fn new() -> Self {
        Self::with_prefixes(DEVICE_PATH_PREFIXES.iter().copied(), |path| path.exists())
    }

    /// Probes custom path prefixes with a custom existence test.
    pub fn with_prefixes<I, S, F>(prefixes: I, exists: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Path) -> bool + Send + 'static,
    {
        PathProbeIterator {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            exists: Box::new(exists),
            prefix_idx: 0,
            next_index: 0,
            current: None,
        }
    }
}

impl Default for PathProbeIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceIterator for PathProbeIterator {
    fn advance(&mut self) -> bool {
        self.current = None;

        while let Some(prefix) = self.prefixes.get(self.prefix_idx) {
            if self.next_index >= MAX_DEVICE_INDEX {
                self.prefix_idx += 1;
                self.next_index = 0;
                continue;
            }

            let candidate = format!("{prefix}{}", self.next_index);
            self.next_index += 1;

            if (self.exists)(Path::new(&candidate)) {
                trace!("Found device node {}", candidate);
                self.current = Some(DeviceDescriptor::new(candidate));
                return true;
            }
        }

        false
    }

    fn current(&self) -> Option<&DeviceDescriptor> {
        self.current.as_ref()
    }
}

impl std::fmt::Debug for PathProbeIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathProbeIterator")
            .field("prefixes", &self.prefixes)
            .field("prefix_idx", &self.prefix_idx)
            .field("next_index", &self.next_index)
            .field("current", &self.current)
            .finish()
    }
}
