//! V4L2 H.264 Encoder
//!
//! Abstract base of the H.264 encoder types generated for each capable
//! device. Until the device's capture queue streams, frames are encoded
//! with the byte-stream, access-unit aligned H.264 caps of
//! [`output_caps_override`] so downstream can negotiate early.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gstreamer as gst;
use gstreamer_video as gst_video;

use crate::caps::H264_MEDIA_TYPE;
use crate::v4l2videoenc::{V4l2VideoEnc, V4l2VideoEncExt};

mod imp;

glib::wrapper! {
    pub struct V4l2H264Enc(ObjectSubclass<imp::V4l2H264Enc>)
        @extends V4l2VideoEnc, gst_video::VideoEncoder, gst::Element, gst::Object;
}

impl V4l2H264Enc {
    /// Override caps the next frame is handed to the base encoder with.
    pub fn pending_output_caps(&self) -> Option<gst::Caps> {
        output_caps_override(self.is_capture_active())
    }
}

/// Caps to encode a frame with, given the state of the capture queue.
///
/// Returns provisional H.264 caps while capture is inactive and `None`
/// once the device format is authoritative.
pub fn output_caps_override(capture_active: bool) -> Option<gst::Caps> {
    if capture_active {
        return None;
    }

    Some(
        gst::Caps::builder(H264_MEDIA_TYPE)
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .build(),
    )
}
