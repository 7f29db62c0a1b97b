//! V4L2 Video Encoder Base Class
//!
//! `V4l2VideoEnc` is the abstract base of every encoder element backed by a
//! memory-to-memory device. It feeds raw frames into the device's output
//! queue and finishes frames with the coded data dequeued from its capture
//! queue.
//!
//! ## Class Data
//! The class struct carries the default device node. Abstract classes have
//! none; the per-device types generated at plugin load fill it in, and
//! every instance binds its direction objects to it.
//!
//! ## Subclassing
//! Subclasses implement [`V4l2VideoEncImpl`] and may override
//! `handle_frame` to pass override caps to
//! [`V4l2VideoEncExt::process_frame`], see `V4l2H264Enc`.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gst_video::subclass::prelude::*;
use gstreamer as gst;
use gstreamer_video as gst_video;

use v4l2::Direction;

use crate::objects::ObjectSettings;

mod imp;

glib::wrapper! {
    pub struct V4l2VideoEnc(ObjectSubclass<imp::V4l2VideoEnc>)
        @extends gst_video::VideoEncoder, gst::Element, gst::Object;
}

/// Methods available to `V4l2VideoEnc` subclasses.
pub trait V4l2VideoEncExt: IsA<V4l2VideoEnc> {
    /// Encodes `frame`.
    ///
    /// When the capture side is not streaming yet it is started first, and
    /// `override_caps` (if any) is used as the output caps instead of the
    /// format the device reports.
    fn process_frame(
        &self,
        frame: gst_video::VideoCodecFrame,
        override_caps: Option<gst::Caps>,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        self.upcast_ref::<V4l2VideoEnc>()
            .imp()
            .process_frame(frame, override_caps)
    }

    /// True once the device produces coded data.
    fn is_capture_active(&self) -> bool {
        self.upcast_ref::<V4l2VideoEnc>().imp().is_capture_active()
    }

    /// Configuration of the direction object for `direction`.
    fn direction_settings(&self, direction: Direction) -> ObjectSettings {
        self.upcast_ref::<V4l2VideoEnc>()
            .imp()
            .direction_settings(direction)
    }
}

impl<O: IsA<V4l2VideoEnc>> V4l2VideoEncExt for O {}

/// Trait to implement in `V4l2VideoEnc` subclasses.
pub trait V4l2VideoEncImpl:
    VideoEncoderImpl + ObjectSubclass<Type: IsA<V4l2VideoEnc>>
{
}

/// Class struct for `V4l2VideoEnc`.
#[repr(C)]
pub struct Class {
    parent: gst_video::ffi::GstVideoEncoderClass,

    pub(crate) default_device: Option<&'static str>,
}

unsafe impl ClassStruct for Class {
    type Type = imp::V4l2VideoEnc;
}

impl std::ops::Deref for Class {
    type Target = glib::Class<<<Self as ClassStruct>::Type as ObjectSubclass>::ParentType>;

    fn deref(&self) -> &Self::Target {
        unsafe { &*(&self.parent as *const _ as *const _) }
    }
}

unsafe impl<T: V4l2VideoEncImpl> IsSubclassable<T> for V4l2VideoEnc {
    fn class_init(class: &mut glib::Class<Self>) {
        Self::parent_class_init::<T>(class);

        let class = class.as_mut();
        class.default_device = None;
    }
}
