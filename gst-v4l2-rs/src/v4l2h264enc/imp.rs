// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::LazyLock;

use gst::glib;
use gst::subclass::prelude::*;
use gst_video::subclass::prelude::*;
use gstreamer as gst;
use gstreamer_video as gst_video;

use crate::v4l2videoenc::{V4l2VideoEnc, V4l2VideoEncExt, V4l2VideoEncImpl};

static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "v4l2h264enc",
        gst::DebugColorFlags::empty(),
        Some("V4L2 H.264 Encoder"),
    )
});

#[derive(Default)]
pub struct V4l2H264Enc;

#[glib::object_subclass]
impl ObjectSubclass for V4l2H264Enc {
    const NAME: &'static str = "GstRsV4l2H264Enc";
    const ABSTRACT: bool = true;
    type Type = super::V4l2H264Enc;
    type ParentType = V4l2VideoEnc;
}

impl ObjectImpl for V4l2H264Enc {}

impl GstObjectImpl for V4l2H264Enc {}

impl ElementImpl for V4l2H264Enc {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: LazyLock<gst::subclass::ElementMetadata> = LazyLock::new(|| {
            gst::subclass::ElementMetadata::new(
                "V4L2 H.264 Encoder",
                "Codec/Encoder/Video",
                "Encode H.264 video streams via V4L2 API",
                "V4L2 codec plugin contributors",
            )
        });

        Some(&*ELEMENT_METADATA)
    }
}

impl VideoEncoderImpl for V4l2H264Enc {
    fn handle_frame(
        &self,
        frame: gst_video::VideoCodecFrame,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let obj = self.obj();
        let override_caps = obj.pending_output_caps();

        if let Some(caps) = &override_caps {
            gst::debug!(CAT, imp = self, "Capture inactive, using {}", caps);
        }

        obj.process_frame(frame, override_caps)
    }
}

impl V4l2VideoEncImpl for V4l2H264Enc {}
