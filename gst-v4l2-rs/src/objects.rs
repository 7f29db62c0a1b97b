//! Direction object pairs.
//!
//! Every codec element drives one memory-to-memory device through two
//! direction objects: "output" for the data flowing into the device and
//! "capture" for the data flowing out. Both are created with the element
//! instance, bound to the class default device, and share one open file
//! descriptor once the element opens.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use v4l2::{DequeuedBuffer, Direction, V4l2Object};

/// Snapshot of one direction object's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSettings {
    pub device: Option<String>,
    pub no_initial_format: bool,
    pub keep_aspect: bool,
}

/// A queue that can be started and stopped.
pub(crate) trait Streaming {
    fn start(&mut self, count: u32) -> v4l2::Result<()>;
    fn stop(&mut self) -> v4l2::Result<()>;
}

impl Streaming for V4l2Object {
    fn start(&mut self, count: u32) -> v4l2::Result<()> {
        V4l2Object::start(self, count)
    }

    fn stop(&mut self) -> v4l2::Result<()> {
        V4l2Object::stop(self)
    }
}

/// Failure of [`start_streaming`].
#[derive(Debug)]
pub(crate) enum StartError<E> {
    /// A queue did not start.
    Start(v4l2::Error),
    /// The queues started but `negotiate` failed.
    Negotiate(E),
}

/// Starts `queues` in order with `count` buffers each, then runs
/// `negotiate`.
///
/// When a queue fails to start or `negotiate` fails, every queue is
/// stopped again, so streaming is only ever left running with a
/// negotiated format and a later call starts over.
pub(crate) fn start_streaming<T, E>(
    queues: &mut [&mut dyn Streaming],
    count: u32,
    negotiate: impl FnOnce() -> Result<T, E>,
) -> Result<T, StartError<E>> {
    let result = queues
        .iter_mut()
        .try_for_each(|queue| queue.start(count))
        .map_err(StartError::Start)
        .and_then(|()| negotiate().map_err(StartError::Negotiate));

    if result.is_err() {
        for queue in queues.iter_mut() {
            if let Err(err) = queue.stop() {
                tracing::warn!("Failed to stop a partially started queue: {}", err);
            }
        }
    }

    result
}

/// The output and capture objects of one element instance.
#[derive(Debug)]
pub(crate) struct ObjectPair {
    pub(crate) output: V4l2Object,
    pub(crate) capture: V4l2Object,
}

impl ObjectPair {
    /// Creates both objects for `device`.
    ///
    /// Neither assumes a format before negotiation nor preserves the aspect
    /// ratio.
    pub(crate) fn new(device: Option<&str>) -> Self {
        let mut output = V4l2Object::new(Direction::Output, device);
        let mut capture = V4l2Object::new(Direction::Capture, device);

        for object in [&mut output, &mut capture] {
            object.set_no_initial_format(true);
            object.set_keep_aspect(false);
        }

        ObjectPair { output, capture }
    }

    pub(crate) fn open(&mut self) -> v4l2::Result<()> {
        self.output.open()?;
        if let Err(err) = self.capture.open_shared(&self.output) {
            let _ = self.output.close();
            return Err(err);
        }
        Ok(())
    }

    /// Closes both objects, reporting the first failure.
    pub(crate) fn close(&mut self) -> v4l2::Result<()> {
        let output = self.output.close();
        let capture = self.capture.close();
        output.and(capture)
    }

    /// Stops streaming on both objects, capture first.
    pub(crate) fn stop(&mut self) -> v4l2::Result<()> {
        let capture = self.capture.stop();
        let output = self.output.stop();
        capture.and(output)
    }

    /// Appends every capture buffer available without blocking to `out`.
    pub(crate) fn collect(&mut self, out: &mut Vec<DequeuedBuffer>) -> v4l2::Result<()> {
        while let Some(buffer) = self.capture.dequeue()? {
            out.push(buffer);
        }
        Ok(())
    }

    /// Collects capture buffers until the driver flags the last one.
    ///
    /// A stop command must have been sent. Buffers dequeued before a
    /// failure or [`v4l2::Error::Timeout`] are still appended to `out`.
    pub(crate) fn drain(
        &mut self,
        timeout: Duration,
        out: &mut Vec<DequeuedBuffer>,
    ) -> v4l2::Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(buffer) = self.capture.dequeue()? {
                let last = buffer.last;
                out.push(buffer);
                if last {
                    return Ok(());
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(v4l2::Error::Timeout);
            }
            self.capture.wait(remaining)?;
        }
    }

    pub(crate) fn settings(&self, direction: Direction) -> ObjectSettings {
        let object = match direction {
            Direction::Output => &self.output,
            Direction::Capture => &self.capture,
        };

        ObjectSettings {
            device: object.device_path().map(str::to_owned),
            no_initial_format: object.no_initial_format(),
            keep_aspect: object.keep_aspect(),
        }
    }

    /// Descriptor of the open device, shared by both objects.
    pub(crate) fn device_fd(&self) -> Option<RawFd> {
        self.output.device().map(|device| device.as_raw_fd())
    }

    /// Card name reported by the open device.
    pub(crate) fn device_name(&self) -> Option<String> {
        self.output
            .device()
            .map(|device| device.capability().card.clone())
    }
}
