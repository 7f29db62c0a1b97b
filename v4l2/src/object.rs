// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Per-direction device objects.
//!
//! A [`V4l2Object`] owns one queue (OUTPUT or CAPTURE) of a memory-to-memory
//! device: its negotiated [`Format`], its MMAP buffers and its streaming
//! state. An element holds two of them, one per direction, sharing one
//! open [`Device`].
//!
//! # Examples
//!
//! ```no_run
//! # use v4l2::{Direction, Format, Fourcc, V4l2Object};
//! # fn example() -> Result<(), v4l2::Error> {
//! let mut output = V4l2Object::new(Direction::Output, Some("/dev/video0"));
//! let mut capture = V4l2Object::new(Direction::Capture, Some("/dev/video0"));
//! output.open()?;
//! capture.open_shared(&output)?;
//!
//! output.set_format(&Format::raw(Fourcc::NV12, 640, 480))?;
//! capture.set_format(&Format::coded(Fourcc::H264, 640, 480))?;
//! output.start(4)?;
//! capture.start(4)?;
//! # Ok(())
//! # }
//! ```

use std::os::fd::{AsFd, AsRawFd};
use std::sync::Arc;
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, trace};

use crate::buffer::MappedBuffer;
use crate::config::MIN_CODED_BUFFER_SIZE;
use crate::{Device, Direction, Error, Fourcc, Result};

/// Image format of one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Format {
    pub fourcc: Fourcc,
    pub width: u32,
    pub height: u32,
    /// Line stride of the first plane, 0 for coded formats.
    pub bytesperline: u32,
    /// Size of one buffer in bytes.
    pub sizeimage: u32,
}

impl Format {
    /// A raw format; the driver computes stride and size.
    pub fn raw(fourcc: Fourcc, width: u32, height: u32) -> Self {
        Format {
            fourcc,
            width,
            height,
            bytesperline: 0,
            sizeimage: 0,
        }
    }

    /// A coded format with a buffer size large enough for one access unit.
    pub fn coded(fourcc: Fourcc, width: u32, height: u32) -> Self {
        Format {
            fourcc,
            width,
            height,
            bytesperline: 0,
            sizeimage: MIN_CODED_BUFFER_SIZE,
        }
    }

    /// True once the driver reports a frame size.
    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn to_raw(self, buf_type: u32) -> v4l2_sys::v4l2_format {
        let mut raw = v4l2_sys::v4l2_format {
            type_: buf_type,
            ..Default::default()
        };

        if v4l2_sys::is_multiplanar(buf_type) {
            let mut plane_fmt =
                [v4l2_sys::v4l2_plane_pix_format::default(); v4l2_sys::VIDEO_MAX_PLANES];
            plane_fmt[0] = v4l2_sys::v4l2_plane_pix_format {
                sizeimage: self.sizeimage,
                bytesperline: self.bytesperline,
                reserved: [0; 6],
            };
            raw.fmt.pix_mp = v4l2_sys::v4l2_pix_format_mplane {
                width: self.width,
                height: self.height,
                pixelformat: self.fourcc.as_u32(),
                field: v4l2_sys::V4L2_FIELD_NONE,
                plane_fmt,
                num_planes: 1,
                ..Default::default()
            };
        } else {
            raw.fmt.pix = v4l2_sys::v4l2_pix_format {
                width: self.width,
                height: self.height,
                pixelformat: self.fourcc.as_u32(),
                field: v4l2_sys::V4L2_FIELD_NONE,
                bytesperline: self.bytesperline,
                sizeimage: self.sizeimage,
                ..Default::default()
            };
        }

        raw
    }

    fn from_raw(raw: &v4l2_sys::v4l2_format) -> Result<Self> {
        if v4l2_sys::is_multiplanar(raw.type_) {
            // Safety: the union was filled for a multi-planar buffer type.
            let mp = unsafe { raw.fmt.pix_mp };
            let num_planes = mp.num_planes;
            if num_planes > 1 {
                return Err(Error::Other(format!(
                    "{} uses {} memory planes, only contiguous formats are supported",
                    Fourcc::from(mp.pixelformat),
                    num_planes
                )));
            }
            let planes = mp.plane_fmt;
            let plane = planes[0];

            Ok(Format {
                fourcc: Fourcc::from(mp.pixelformat),
                width: mp.width,
                height: mp.height,
                bytesperline: plane.bytesperline,
                sizeimage: plane.sizeimage,
            })
        } else {
            // Safety: the union was filled for a single-planar buffer type.
            let pix = unsafe { raw.fmt.pix };

            Ok(Format {
                fourcc: Fourcc::from(pix.pixelformat),
                width: pix.width,
                height: pix.height,
                bytesperline: pix.bytesperline,
                sizeimage: pix.sizeimage,
            })
        }
    }
}

/// A buffer taken back from the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeuedBuffer {
    /// Payload copied out of the mapping.
    pub data: Vec<u8>,
    /// Timestamp in microseconds, as given to [`V4l2Object::queue`].
    pub timestamp_us: u64,
    /// The payload starts a keyframe.
    pub keyframe: bool,
    /// The driver flagged the last buffer of a drain.
    pub last: bool,
}

/// One direction of a memory-to-memory device.
#[derive(Debug)]
pub struct V4l2Object {
    direction: Direction,
    device_path: Option<String>,
    no_initial_format: bool,
    keep_aspect: bool,
    device: Option<Arc<Device>>,
    format: Option<Format>,
    buffers: Vec<MappedBuffer>,
    active: bool,
}

impl V4l2Object {
    /// Creates a closed object for `direction`.
    ///
    /// By default the current driver format is adopted on open and the
    /// pixel aspect ratio is preserved.
    pub fn new(direction: Direction, device_path: Option<&str>) -> Self {
        V4l2Object {
            direction,
            device_path: device_path.map(str::to_owned),
            no_initial_format: false,
            keep_aspect: true,
            device: None,
            format: None,
            buffers: Vec::new(),
            active: false,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn device_path(&self) -> Option<&str> {
        self.device_path.as_deref()
    }

    /// When set, opening does not adopt the driver's current format; the
    /// format stays unset until negotiated.
    pub fn set_no_initial_format(&mut self, no_initial_format: bool) {
        self.no_initial_format = no_initial_format;
    }

    pub fn no_initial_format(&self) -> bool {
        self.no_initial_format
    }

    /// Whether the pixel aspect ratio of the stream is preserved.
    pub fn set_keep_aspect(&mut self, keep_aspect: bool) {
        self.keep_aspect = keep_aspect;
    }

    pub fn keep_aspect(&self) -> bool {
        self.keep_aspect
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// True while the queue is streaming.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The last format set or adopted, if any.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    /// Opens the configured device node.
    pub fn open(&mut self) -> Result<()> {
        let path = self
            .device_path
            .clone()
            .ok_or_else(|| Error::Other("no device configured".into()))?;
        let device = Device::open(&path)?;

        if !device.capability().is_m2m() {
            return Err(Error::NotM2m(path));
        }

        self.attach(Arc::new(device))
    }

    /// Opens this object on the device already opened by `other`.
    ///
    /// Each `open()` of a memory-to-memory node is a separate context, so
    /// both directions of an element must go through one descriptor.
    pub fn open_shared(&mut self, other: &V4l2Object) -> Result<()> {
        let device = other.device.clone().ok_or(Error::NotOpen)?;
        self.device_path = Some(device.path().to_owned());
        self.attach(device)
    }

    fn attach(&mut self, device: Arc<Device>) -> Result<()> {
        self.device = Some(device);

        if !self.no_initial_format {
            let format = self.query_format()?;
            debug!("{:?}: adopted initial format {:?}", self.direction, format);
            self.format = Some(format);
        }

        Ok(())
    }

    /// Stops streaming and releases this object's reference on the device.
    pub fn close(&mut self) -> Result<()> {
        let res = self.stop();
        self.device = None;
        self.format = None;
        res
    }

    fn opened(&self) -> Result<&Device> {
        self.device.as_deref().ok_or(Error::NotOpen)
    }

    fn buf_type(&self) -> Result<u32> {
        Ok(self.opened()?.buf_type(self.direction))
    }

    /// Reads the driver's current format of this queue.
    pub fn query_format(&self) -> Result<Format> {
        let device = self.opened()?;
        let mut raw = v4l2_sys::v4l2_format {
            type_: device.buf_type(self.direction),
            ..Default::default()
        };
        unsafe { v4l2_sys::vidioc_g_fmt(device.as_raw_fd(), &mut raw) }
            .map_err(Error::ioctl("VIDIOC_G_FMT"))?;

        Format::from_raw(&raw)
    }

    /// Sets the format of this queue and returns what the driver applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] when the driver substitutes a
    /// different pixel format, and [`Error::Other`] while streaming.
    pub fn set_format(&mut self, format: &Format) -> Result<Format> {
        if self.active {
            return Err(Error::Other("cannot change the format while streaming".into()));
        }

        let device = self.opened()?;
        let mut raw = format.to_raw(device.buf_type(self.direction));
        unsafe { v4l2_sys::vidioc_s_fmt(device.as_raw_fd(), &mut raw) }
            .map_err(Error::ioctl("VIDIOC_S_FMT"))?;

        let applied = Format::from_raw(&raw)?;
        if applied.fourcc != format.fourcc {
            return Err(Error::UnsupportedFormat(format.fourcc));
        }

        debug!("{:?}: format set to {:?}", self.direction, applied);
        self.format = Some(applied);

        Ok(applied)
    }

    /// Allocates and maps `count` buffers and starts streaming.
    ///
    /// CAPTURE buffers are all handed to the driver immediately.
    pub fn start(&mut self, count: u32) -> Result<()> {
        if self.active {
            return Ok(());
        }

        let device = Arc::clone(self.device.as_ref().ok_or(Error::NotOpen)?);
        let fd = device.as_raw_fd();
        let buf_type = device.buf_type(self.direction);

        let mut req = v4l2_sys::v4l2_requestbuffers {
            count,
            type_: buf_type,
            memory: v4l2_sys::V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        unsafe { v4l2_sys::vidioc_reqbufs(fd, &mut req) }.map_err(Error::ioctl("VIDIOC_REQBUFS"))?;
        if req.count == 0 {
            return Err(Error::Other("driver allocated no buffers".into()));
        }

        let mut buffers = Vec::with_capacity(req.count as usize);
        for index in 0..req.count {
            let mut planes = [v4l2_sys::v4l2_plane::default(); 1];
            let mut raw = raw_buffer(buf_type, index, &mut planes);
            unsafe { v4l2_sys::vidioc_querybuf(fd, &mut raw) }
                .map_err(Error::ioctl("VIDIOC_QUERYBUF"))?;

            // Safety: the union member matches the planarity of `buf_type`.
            let (offset, length) = if v4l2_sys::is_multiplanar(buf_type) {
                (unsafe { planes[0].m.mem_offset }, planes[0].length)
            } else {
                (unsafe { raw.m.offset }, raw.length)
            };
            buffers.push(MappedBuffer::map(device.as_fd(), offset, length as usize)?);
        }
        self.buffers = buffers;

        if self.direction == Direction::Capture {
            for index in 0..self.buffers.len() {
                self.queue_index(index, 0, 0)?;
            }
        }

        let arg = buf_type as libc::c_int;
        unsafe { v4l2_sys::vidioc_streamon(fd, &arg) }.map_err(Error::ioctl("VIDIOC_STREAMON"))?;
        self.active = true;

        debug!(
            "{:?}: streaming with {} buffers",
            self.direction,
            self.buffers.len()
        );

        Ok(())
    }

    /// Stops streaming and frees all buffers. A no-op when inactive.
    pub fn stop(&mut self) -> Result<()> {
        if !self.active && self.buffers.is_empty() {
            return Ok(());
        }

        let buf_type = self.buf_type()?;
        let fd = self.opened()?.as_raw_fd();

        if self.active {
            let arg = buf_type as libc::c_int;
            unsafe { v4l2_sys::vidioc_streamoff(fd, &arg) }
                .map_err(Error::ioctl("VIDIOC_STREAMOFF"))?;
            self.active = false;
        }

        // Mappings must be gone before the driver frees the queue
        self.buffers.clear();

        let mut req = v4l2_sys::v4l2_requestbuffers {
            count: 0,
            type_: buf_type,
            memory: v4l2_sys::V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        unsafe { v4l2_sys::vidioc_reqbufs(fd, &mut req) }.map_err(Error::ioctl("VIDIOC_REQBUFS"))?;

        debug!("{:?}: stopped", self.direction);

        Ok(())
    }

    /// Copies `data` into a free OUTPUT buffer and hands it to the driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFreeBuffer`] when every buffer is still owned by
    /// the driver after reclaiming finished ones.
    pub fn queue(&mut self, data: &[u8], timestamp_us: u64) -> Result<()> {
        if !self.active {
            return Err(Error::NotActive);
        }

        let index = match self.free_index() {
            Some(index) => index,
            None => {
                self.reclaim()?;
                self.free_index().ok_or(Error::NoFreeBuffer)?
            }
        };

        let buffer = &mut self.buffers[index];
        if data.len() > buffer.len() {
            return Err(Error::Other(format!(
                "{} bytes do not fit a {} byte buffer",
                data.len(),
                buffer.len()
            )));
        }
        buffer.as_mut_slice()[..data.len()].copy_from_slice(data);

        self.queue_index(index, data.len() as u32, timestamp_us)
    }

    fn free_index(&self) -> Option<usize> {
        self.buffers.iter().position(|b| !b.queued)
    }

    fn queue_index(&mut self, index: usize, bytesused: u32, timestamp_us: u64) -> Result<()> {
        let buf_type = self.buf_type()?;
        let fd = self.opened()?.as_raw_fd();

        let mut planes = [v4l2_sys::v4l2_plane::default(); 1];
        let mut raw = raw_buffer(buf_type, index as u32, &mut planes);
        raw.timestamp = libc::timeval {
            tv_sec: (timestamp_us / 1_000_000) as libc::time_t,
            tv_usec: (timestamp_us % 1_000_000) as libc::suseconds_t,
        };
        if v4l2_sys::is_multiplanar(buf_type) {
            planes[0].bytesused = bytesused;
            planes[0].length = self.buffers[index].len() as u32;
        } else {
            raw.bytesused = bytesused;
            raw.length = self.buffers[index].len() as u32;
        }

        unsafe { v4l2_sys::vidioc_qbuf(fd, &mut raw) }.map_err(Error::ioctl("VIDIOC_QBUF"))?;
        self.buffers[index].queued = true;

        trace!("{:?}: queued buffer {} ({} bytes)", self.direction, index, bytesused);

        Ok(())
    }

    /// Returns the buffer index, the raw buffer and the payload as an
    /// (offset, length) pair within the mapping.
    fn dequeue_raw(&mut self) -> Result<Option<(usize, v4l2_sys::v4l2_buffer, (usize, usize))>> {
        let buf_type = self.buf_type()?;
        let fd = self.opened()?.as_raw_fd();

        let mut planes = [v4l2_sys::v4l2_plane::default(); 1];
        let mut raw = raw_buffer(buf_type, 0, &mut planes);

        match unsafe { v4l2_sys::vidioc_dqbuf(fd, &mut raw) } {
            Ok(_) => {}
            Err(nix::Error::EAGAIN) => return Ok(None),
            // EPIPE: the queue was drained and no buffer will follow
            Err(nix::Error::EPIPE) => return Ok(None),
            Err(source) => {
                return Err(Error::Ioctl {
                    ioctl: "VIDIOC_DQBUF",
                    source,
                });
            }
        }

        let index = raw.index as usize;
        let buffer = self
            .buffers
            .get_mut(index)
            .ok_or_else(|| Error::Other(format!("driver returned unknown buffer {index}")))?;
        buffer.queued = false;

        let payload = if v4l2_sys::is_multiplanar(buf_type) {
            payload_range(planes[0].data_offset, planes[0].bytesused, buffer.len())
        } else {
            payload_range(0, raw.bytesused, buffer.len())
        };

        Ok(Some((index, raw, payload)))
    }

    /// Takes finished OUTPUT buffers back from the driver.
    ///
    /// Returns how many buffers became free.
    pub fn reclaim(&mut self) -> Result<usize> {
        let mut freed = 0;
        while self.buffers.iter().any(|b| b.queued) {
            match self.dequeue_raw()? {
                Some(_) => freed += 1,
                None => break,
            }
        }
        Ok(freed)
    }

    /// Dequeues one filled CAPTURE buffer without blocking.
    ///
    /// The payload is copied out and the buffer is handed back to the
    /// driver, unless it is the last buffer of a drain.
    pub fn dequeue(&mut self) -> Result<Option<DequeuedBuffer>> {
        if !self.active {
            return Err(Error::NotActive);
        }

        let Some((index, raw, (offset, len))) = self.dequeue_raw()? else {
            return Ok(None);
        };

        let data = self.buffers[index].as_slice()[offset..offset + len].to_vec();

        let timestamp_us =
            raw.timestamp.tv_sec as u64 * 1_000_000 + raw.timestamp.tv_usec as u64;
        let dequeued = DequeuedBuffer {
            data,
            timestamp_us,
            keyframe: raw.flags & v4l2_sys::V4L2_BUF_FLAG_KEYFRAME != 0,
            last: raw.flags & v4l2_sys::V4L2_BUF_FLAG_LAST != 0,
        };

        trace!(
            "{:?}: dequeued buffer {} ({} bytes, keyframe {}, last {})",
            self.direction, index, len, dequeued.keyframe, dequeued.last
        );

        if !dequeued.last {
            self.queue_index(index, 0, 0)?;
        }

        Ok(Some(dequeued))
    }

    /// Waits until this queue is ready for I/O.
    ///
    /// OUTPUT is ready when a buffer can be reclaimed, CAPTURE when a filled
    /// buffer can be dequeued. Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        let device = self.opened()?;
        let events = match self.direction {
            Direction::Output => PollFlags::POLLOUT,
            Direction::Capture => PollFlags::POLLIN,
        };
        let timeout = PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX);

        let mut fds = [PollFd::new(device.as_fd(), events)];
        let ready = poll(&mut fds, timeout).map_err(std::io::Error::from)?;

        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        if revents.contains(PollFlags::POLLERR) {
            return Err(Error::Other("poll reported an error on the device".into()));
        }

        Ok(ready > 0 && revents.intersects(events))
    }

    /// Asks an encoder to finish the stream; the last CAPTURE buffer will
    /// carry the LAST flag.
    pub fn encoder_stop(&self) -> Result<()> {
        let device = self.opened()?;
        let mut cmd = v4l2_sys::v4l2_encoder_cmd {
            cmd: v4l2_sys::V4L2_ENC_CMD_STOP,
            ..Default::default()
        };
        unsafe { v4l2_sys::vidioc_encoder_cmd(device.as_raw_fd(), &mut cmd) }
            .map_err(Error::ioctl("VIDIOC_ENCODER_CMD"))?;
        Ok(())
    }

    /// Asks a decoder to finish the stream.
    pub fn decoder_stop(&self) -> Result<()> {
        let device = self.opened()?;
        let mut cmd = v4l2_sys::v4l2_decoder_cmd {
            cmd: v4l2_sys::V4L2_DEC_CMD_STOP,
            ..Default::default()
        };
        unsafe { v4l2_sys::vidioc_decoder_cmd(device.as_raw_fd(), &mut cmd) }
            .map_err(Error::ioctl("VIDIOC_DECODER_CMD"))?;
        Ok(())
    }
}

impl Drop for V4l2Object {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!("{:?}: failed to stop on drop: {}", self.direction, err);
        }
    }
}

/// Clamps a driver reported payload to the mapping of `len` bytes.
///
/// Multi-planar drivers count `data_offset` as part of `bytesused`.
fn payload_range(data_offset: u32, bytesused: u32, len: usize) -> (usize, usize) {
    let offset = (data_offset as usize).min(len);
    let end = (bytesused as usize).clamp(offset, len);
    (offset, end - offset)
}

fn raw_buffer(
    buf_type: u32,
    index: u32,
    planes: &mut [v4l2_sys::v4l2_plane; 1],
) -> v4l2_sys::v4l2_buffer {
    let mut raw = v4l2_sys::v4l2_buffer {
        index,
        type_: buf_type,
        memory: v4l2_sys::V4L2_MEMORY_MMAP,
        field: v4l2_sys::V4L2_FIELD_NONE,
        ..Default::default()
    };

    if v4l2_sys::is_multiplanar(buf_type) {
        raw.m.planes = planes.as_mut_ptr();
        raw.length = planes.len() as u32;
    }

    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_objects_are_closed_and_inactive() {
        let object = V4l2Object::new(Direction::Capture, Some("/dev/video9"));
        assert!(!object.is_open());
        assert!(!object.is_active());
        assert!(object.keep_aspect());
        assert!(!object.no_initial_format());
        assert_eq!(object.device_path(), Some("/dev/video9"));
        assert_eq!(object.format(), None);
    }

    #[test]
    fn io_on_a_closed_object_fails() {
        let mut object = V4l2Object::new(Direction::Output, None);
        assert!(matches!(object.open(), Err(Error::Other(_))));
        assert!(matches!(object.query_format(), Err(Error::NotOpen)));
        assert!(matches!(object.queue(&[0; 4], 0), Err(Error::NotActive)));
        assert!(object.stop().is_ok());
    }

    #[test]
    fn sharing_requires_an_open_peer() {
        let output = V4l2Object::new(Direction::Output, Some("/dev/video9"));
        let mut capture = V4l2Object::new(Direction::Capture, None);
        assert!(matches!(capture.open_shared(&output), Err(Error::NotOpen)));
    }

    #[test]
    fn formats_survive_both_layouts() {
        let format = Format {
            fourcc: Fourcc::NV12,
            width: 1280,
            height: 720,
            bytesperline: 1280,
            sizeimage: 1280 * 720 * 3 / 2,
        };

        for buf_type in [
            v4l2_sys::V4L2_BUF_TYPE_VIDEO_OUTPUT,
            v4l2_sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE,
        ] {
            let raw = format.to_raw(buf_type);
            assert_eq!(Format::from_raw(&raw).unwrap(), format);
        }
    }

    #[test]
    fn payload_skips_the_data_offset() {
        assert_eq!(payload_range(0, 100, 4096), (0, 100));
        assert_eq!(payload_range(64, 164, 4096), (64, 100));
        // Sizes beyond the mapping are clamped
        assert_eq!(payload_range(0, 8192, 4096), (0, 4096));
        assert_eq!(payload_range(5000, 6000, 4096), (4096, 0));
        // A data offset past bytesused is an empty payload
        assert_eq!(payload_range(200, 100, 4096), (200, 0));
    }

    #[test]
    fn coded_formats_reserve_room_for_an_access_unit() {
        let format = Format::coded(Fourcc::H264, 0, 0);
        assert_eq!(format.sizeimage, MIN_CODED_BUFFER_SIZE);
        assert!(!format.has_resolution());
        assert!(Format::raw(Fourcc::NV12, 320, 240).has_resolution());
    }
}
