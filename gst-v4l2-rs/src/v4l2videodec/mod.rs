//! V4L2 Video Decoder
//!
//! Abstract base of the decoder types generated for each memory-to-memory
//! device that turns a known codec into raw video. Coded data goes into
//! the output queue; the capture queue starts once the driver reports the
//! decoded resolution, and its frames are copied into the default layout
//! of the negotiated raw format.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gstreamer as gst;
use gstreamer_video as gst_video;

use v4l2::Direction;

use crate::objects::ObjectSettings;

mod imp;

glib::wrapper! {
    pub struct V4l2VideoDec(ObjectSubclass<imp::V4l2VideoDec>)
        @extends gst_video::VideoDecoder, gst::Element, gst::Object;
}

/// Methods available on `V4l2VideoDec` and the types derived from it.
pub trait V4l2VideoDecExt: IsA<V4l2VideoDec> {
    /// True once the device produces decoded frames.
    fn is_capture_active(&self) -> bool {
        self.upcast_ref::<V4l2VideoDec>().imp().is_capture_active()
    }

    /// Configuration of the direction object for `direction`.
    fn direction_settings(&self, direction: Direction) -> ObjectSettings {
        self.upcast_ref::<V4l2VideoDec>()
            .imp()
            .direction_settings(direction)
    }
}

impl<O: IsA<V4l2VideoDec>> V4l2VideoDecExt for O {}

/// Class struct for `V4l2VideoDec`.
#[repr(C)]
pub struct Class {
    parent: gst_video::ffi::GstVideoDecoderClass,

    pub(crate) default_device: Option<&'static str>,
}

unsafe impl ClassStruct for Class {
    type Type = imp::V4l2VideoDec;
}

impl std::ops::Deref for Class {
    type Target = glib::Class<<<Self as ClassStruct>::Type as ObjectSubclass>::ParentType>;

    fn deref(&self) -> &Self::Target {
        unsafe { &*(&self.parent as *const _ as *const _) }
    }
}
