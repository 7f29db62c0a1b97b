// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for device enumeration and probing.
//!
//! The path-probing enumerator is exercised against injected existence tests
//! and against a temporary directory tree standing in for `/dev`. No V4L2
//! hardware is required.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use v4l2::{
    DeviceIterator, EnumeratorKind, Error, PathProbeIterator, collect_devices, config,
    open_iterator, probe_device,
};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

fn init_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

/// RAII guard for a fake device directory.
///
/// Creates a unique directory under the system temp dir and removes it when
/// dropped.
struct FakeDevDirGuard {
    dir: PathBuf,
}

impl FakeDevDirGuard {
    fn new(test: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "v4l2_rust_tests_dev_{}_{}",
            test,
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap_or_else(|_| {
            panic!("Failed to create fake device directory \"{}\".", dir.display())
        });
        Self { dir }
    }

    /// Creates an empty file standing in for a device node.
    fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"").unwrap();
        path
    }

    fn prefix(&self, stem: &str) -> String {
        format!("{}/{}", self.dir.display(), stem)
    }
}

impl Drop for FakeDevDirGuard {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).unwrap_or_else(|_| {
            panic!("Failed to remove fake device directory \"{}\".", self.dir.display())
        });
    }
}

fn paths(iter: &mut dyn DeviceIterator) -> Vec<String> {
    collect_devices(iter)
        .into_iter()
        .map(|d| d.device_path)
        .collect()
}

#[test]
fn probes_prefixes_in_order_then_indices_ascending() {
    init_logging();

    let present: HashSet<&str> = ["/dev/video1", "/dev/video0", "/dev/v4l2/video0", "/dev/video63"]
        .into_iter()
        .collect();
    let mut iter = PathProbeIterator::with_prefixes(
        config::DEVICE_PATH_PREFIXES.iter().copied(),
        move |p: &Path| p.to_str().is_some_and(|s| present.contains(s)),
    );

    assert_eq!(
        paths(&mut iter),
        ["/dev/video0", "/dev/video1", "/dev/video63", "/dev/v4l2/video0"]
    );
}

#[test]
fn suffixes_stop_below_the_index_limit() {
    init_logging();

    let mut iter = PathProbeIterator::with_prefixes(["/dev/video"], |p: &Path| {
        p == Path::new("/dev/video64") || p == Path::new("/dev/video5")
    });

    assert_eq!(paths(&mut iter), ["/dev/video5"]);
}

#[test]
fn exhausted_iterator_stays_exhausted() {
    init_logging();

    let mut iter =
        PathProbeIterator::with_prefixes(["/dev/video"], |p: &Path| p == Path::new("/dev/video2"));
    assert!(iter.current().is_none());

    assert!(iter.advance());
    let current = iter.current().unwrap();
    assert_eq!(current.device_path, "/dev/video2");
    assert_eq!(current.device_name, None);
    assert_eq!(current.sys_path, None);

    assert!(!iter.advance());
    assert!(iter.current().is_none());
    assert!(!iter.advance());
}

#[test]
fn no_devices_yields_nothing() {
    init_logging();

    let mut iter =
        PathProbeIterator::with_prefixes(config::DEVICE_PATH_PREFIXES.iter().copied(), |_: &Path| {
            false
        });
    assert!(!iter.advance());
    assert!(iter.current().is_none());
}

#[test]
fn finds_nodes_on_the_filesystem() {
    init_logging();

    let dev = FakeDevDirGuard::new("fs");
    dev.touch("video3");
    dev.touch("video10");
    dev.touch("v4l2/video1");
    dev.touch("videoX");

    let prefixes = [dev.prefix("video"), dev.prefix("v4l2/video")];
    let mut iter = PathProbeIterator::with_prefixes(prefixes, |p: &Path| p.exists());

    assert_eq!(
        paths(&mut iter),
        [dev.prefix("video3"), dev.prefix("video10"), dev.prefix("v4l2/video1")]
    );
}

#[test]
fn probing_a_regular_file_fails_the_capability_query() {
    init_logging();

    let dev = FakeDevDirGuard::new("probe");
    let node = dev.touch("video0");

    let err = probe_device(node.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Ioctl { ioctl: "VIDIOC_QUERYCAP", .. }), "{err}");
}

#[test]
fn path_probe_iterator_can_be_opened_by_kind() {
    init_logging();

    // Walks the real /dev; only the iterator contract is checked.
    let mut iter = open_iterator(EnumeratorKind::PathProbe).unwrap();
    while iter.advance() {
        let device = iter.current().unwrap();
        assert!(Path::new(&device.device_path).exists());
    }
    assert!(iter.current().is_none());
}
