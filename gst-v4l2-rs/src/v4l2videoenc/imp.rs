//! V4L2 Video Encoder Implementation
//!
//! Drives the two queues of a memory-to-memory encoder:
//! - the output queue receives raw frames, restrided to the driver's line
//!   stride,
//! - the capture queue returns coded data, matched back to its frame via
//!   the buffer timestamp, which carries the frame's system frame number.
//!
//! The capture queue is started lazily on the first frame, so that the
//! coded format can follow either override caps given by a subclass or the
//! format the device reports.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{LazyLock, Mutex, MutexGuard};

use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gst_video::prelude::*;
use gst_video::subclass::prelude::*;
use gstreamer as gst;
use gstreamer_video as gst_video;

use v4l2::{DequeuedBuffer, Direction, Format, config};

use crate::caps;
use crate::layout::{FrameLayout, restride};
use crate::objects::{ObjectPair, ObjectSettings, StartError, start_streaming};

/// GStreamer debug category of V4L2 encoders.
///
/// Set GST_DEBUG=v4l2videoenc:6 to trace every queued frame.
pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "v4l2videoenc",
        gst::DebugColorFlags::empty(),
        Some("V4L2 Video Encoder"),
    )
});

/// Negotiated input of the encoder.
struct Input {
    codec_state: gst_video::VideoCodecState<'static, gst_video::video_codec_state::Readable>,
    /// Layout the driver expects in output buffers.
    driver_layout: FrameLayout,
}

struct State {
    objects: ObjectPair,
    input: Option<Input>,
}

pub struct V4l2VideoEnc {
    /// Device node of the class, `None` for abstract classes.
    default_device: Option<&'static str>,
    state: Mutex<State>,
}

#[glib::object_subclass]
impl ObjectSubclass for V4l2VideoEnc {
    const NAME: &'static str = "GstRsV4l2VideoEnc";
    const ABSTRACT: bool = true;
    type Type = super::V4l2VideoEnc;
    type ParentType = gst_video::VideoEncoder;
    type Class = super::Class;

    fn class_init(class: &mut Self::Class) {
        class.default_device = None;
    }

    fn with_class(class: &Self::Class) -> Self {
        let default_device = class.default_device;

        Self {
            default_device,
            state: Mutex::new(State {
                objects: ObjectPair::new(default_device),
                input: None,
            }),
        }
    }
}

impl ObjectImpl for V4l2VideoEnc {
    fn properties() -> &'static [glib::ParamSpec] {
        static PROPERTIES: LazyLock<Vec<glib::ParamSpec>> = LazyLock::new(|| {
            vec![
                glib::ParamSpecString::builder("device")
                    .nick("Device")
                    .blurb("Device location")
                    .read_only()
                    .build(),
                glib::ParamSpecString::builder("device-name")
                    .nick("Device name")
                    .blurb("Name of the device")
                    .read_only()
                    .build(),
                glib::ParamSpecInt::builder("device-fd")
                    .nick("File descriptor")
                    .blurb("File descriptor of the device")
                    .minimum(-1)
                    .default_value(-1)
                    .read_only()
                    .build(),
            ]
        });

        PROPERTIES.as_ref()
    }

    fn property(&self, _id: usize, pspec: &glib::ParamSpec) -> glib::Value {
        match pspec.name() {
            "device" => self.default_device.to_value(),
            "device-name" => self.state().objects.device_name().to_value(),
            "device-fd" => self.state().objects.device_fd().unwrap_or(-1).to_value(),
            other => {
                gst::error!(CAT, imp = self, "Unknown property {}", other);
                None::<String>.to_value()
            }
        }
    }
}

impl GstObjectImpl for V4l2VideoEnc {}

impl ElementImpl for V4l2VideoEnc {}

impl VideoEncoderImpl for V4l2VideoEnc {
    fn open(&self) -> Result<(), gst::ErrorMessage> {
        let mut state = self.state();
        state.objects.open().map_err(|err| {
            gst::error_msg!(
                gst::ResourceError::OpenReadWrite,
                ["Failed to open {:?}: {}", self.default_device, err]
            )
        })?;

        gst::info!(
            CAT,
            imp = self,
            "Opened {:?} ({:?})",
            self.default_device,
            state.objects.device_name()
        );

        Ok(())
    }

    fn close(&self) -> Result<(), gst::ErrorMessage> {
        if let Err(err) = self.state().objects.close() {
            gst::warning!(CAT, imp = self, "Failed to close device: {}", err);
        }

        Ok(())
    }

    fn stop(&self) -> Result<(), gst::ErrorMessage> {
        let mut state = self.state();
        state.input = None;
        state.objects.stop().map_err(|err| {
            gst::error_msg!(gst::ResourceError::Close, ["Failed to stop streaming: {}", err])
        })?;

        self.parent_stop()
    }

    fn set_format(
        &self,
        codec_state: &gst_video::VideoCodecState<'static, gst_video::video_codec_state::Readable>,
    ) -> Result<(), gst::LoggableError> {
        let info = codec_state.info();
        let fourcc = caps::fourcc_from_video_format(info.format())
            .ok_or_else(|| gst::loggable_error!(CAT, "Unsupported format {}", info.format()))?;

        let mut state = self.state();
        if let Err(err) = state.objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }

        let applied = state
            .objects
            .output
            .set_format(&Format::raw(fourcc, info.width(), info.height()))
            .map_err(|err| gst::loggable_error!(CAT, "Failed to set output format: {}", err))?;

        gst::debug!(CAT, imp = self, "Output format {:?}", applied);

        state.input = Some(Input {
            codec_state: codec_state.clone(),
            driver_layout: FrameLayout::from_driver(info, applied.bytesperline, applied.sizeimage),
        });
        drop(state);

        self.parent_set_format(codec_state)
    }

    fn handle_frame(
        &self,
        frame: gst_video::VideoCodecFrame,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        self.process_frame(frame, None)
    }

    fn flush(&self) -> bool {
        gst::debug!(CAT, imp = self, "Flushing");

        if let Err(err) = self.state().objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }

        true
    }

    fn finish(&self) -> Result<gst::FlowSuccess, gst::FlowError> {
        gst::debug!(CAT, imp = self, "Draining");

        let mut state = self.state();
        if !state.objects.capture.is_active() {
            return Ok(gst::FlowSuccess::Ok);
        }

        if let Err(err) = state.objects.output.encoder_stop() {
            gst::warning!(CAT, imp = self, "Failed to send stop command: {}", err);
        }

        let mut coded = Vec::new();
        if let Err(err) = state.objects.drain(config::DRAIN_TIMEOUT, &mut coded) {
            gst::warning!(CAT, imp = self, "Failed to drain the encoder: {}", err);
        }

        if let Err(err) = state.objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }
        drop(state);

        self.finish_coded(coded)
    }
}

impl V4l2VideoEnc {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            gst::warning!(CAT, imp = self, "State mutex poisoned");
            poisoned.into_inner()
        })
    }

    pub(super) fn is_capture_active(&self) -> bool {
        self.state().objects.capture.is_active()
    }

    pub(super) fn direction_settings(&self, direction: Direction) -> ObjectSettings {
        self.state().objects.settings(direction)
    }

    pub(super) fn process_frame(
        &self,
        frame: gst_video::VideoCodecFrame,
        override_caps: Option<gst::Caps>,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let mut state = self.state();

        if !state.objects.capture.is_active() {
            self.activate(&mut state, override_caps)?;
        }

        let input = state.input.as_ref().ok_or(gst::FlowError::NotNegotiated)?;
        let data = {
            let buffer = frame.input_buffer().ok_or(gst::FlowError::Error)?;
            let map = buffer.map_readable().map_err(|_| {
                gst::element_imp_error!(
                    self,
                    gst::CoreError::Failed,
                    ["Failed to map input buffer readable"]
                );
                gst::FlowError::Error
            })?;

            let info = input.codec_state.info();
            let src_layout = match buffer.meta::<gst_video::VideoMeta>() {
                Some(meta) => FrameLayout::from_meta(info, meta.offset(), meta.stride()),
                None => FrameLayout::from_info(info),
            };
            restride(map.as_slice(), &src_layout, &input.driver_layout)
        };

        let frame_number = frame.system_frame_number();
        drop(frame);

        gst::trace!(CAT, imp = self, "Queueing frame {}", frame_number);

        let mut coded = Vec::new();
        loop {
            match state.objects.output.queue(&data, frame_number as u64) {
                Ok(()) => break,
                Err(v4l2::Error::NoFreeBuffer) => {
                    self.collect_coded(&mut state, &mut coded)?;
                    match state.objects.output.wait(config::FRAME_TIMEOUT) {
                        Ok(true) => {}
                        Ok(false) => {
                            gst::element_imp_error!(
                                self,
                                gst::ResourceError::Failed,
                                ["Timed out waiting for a free buffer"]
                            );
                            return Err(gst::FlowError::Error);
                        }
                        Err(err) => {
                            gst::element_imp_error!(
                                self,
                                gst::ResourceError::Failed,
                                ["Failed to wait for a free buffer: {}", err]
                            );
                            return Err(gst::FlowError::Error);
                        }
                    }
                }
                Err(err) => {
                    gst::element_imp_error!(
                        self,
                        gst::ResourceError::Write,
                        ["Failed to queue frame {}: {}", frame_number, err]
                    );
                    return Err(gst::FlowError::Error);
                }
            }
        }

        self.collect_coded(&mut state, &mut coded)?;
        drop(state);

        self.finish_coded(coded)
    }

    /// Sets the capture format, starts both queues and negotiates the
    /// output state.
    fn activate(
        &self,
        state: &mut State,
        override_caps: Option<gst::Caps>,
    ) -> Result<(), gst::FlowError> {
        let input = state.input.as_ref().ok_or(gst::FlowError::NotNegotiated)?;
        let codec_state = input.codec_state.clone();
        let info = codec_state.info();

        let caps = match override_caps {
            Some(caps) => caps,
            None => {
                let format = state.objects.capture.query_format().map_err(|err| {
                    gst::element_imp_error!(
                        self,
                        gst::CoreError::Negotiation,
                        ["Failed to query capture format: {}", err]
                    );
                    gst::FlowError::NotNegotiated
                })?;
                let s = caps::structure_from_fourcc(format.fourcc).ok_or_else(|| {
                    gst::element_imp_error!(
                        self,
                        gst::CoreError::Negotiation,
                        ["Unknown coded format {}", format.fourcc]
                    );
                    gst::FlowError::NotNegotiated
                })?;
                gst::Caps::builder_full().structure(s).build()
            }
        };

        let fourcc = caps
            .structure(0)
            .and_then(caps::fourcc_from_structure)
            .ok_or_else(|| {
                gst::element_imp_error!(
                    self,
                    gst::CoreError::Negotiation,
                    ["No coded format for caps {}", caps]
                );
                gst::FlowError::NotNegotiated
            })?;

        gst::debug!(CAT, imp = self, "Activating capture with {}", caps);

        if let Err(err) = state
            .objects
            .capture
            .set_format(&Format::coded(fourcc, info.width(), info.height()))
        {
            gst::element_imp_error!(
                self,
                gst::ResourceError::Settings,
                ["Failed to set coded format: {}", err]
            );
            return Err(gst::FlowError::Error);
        }

        let obj = self.obj();
        let objects = &mut state.objects;
        let started = start_streaming(
            &mut [&mut objects.capture, &mut objects.output],
            config::BUFFER_COUNT,
            || {
                let output_state = obj
                    .set_output_state(caps, Some(&codec_state))
                    .map_err(|_| gst::FlowError::NotNegotiated)?;
                obj.negotiate(output_state).map_err(|err| {
                    gst::warning!(CAT, imp = self, "Failed to negotiate: {}", err);
                    gst::FlowError::NotNegotiated
                })
            },
        );

        match started {
            Ok(()) => Ok(()),
            Err(StartError::Start(err)) => {
                gst::element_imp_error!(
                    self,
                    gst::ResourceError::Settings,
                    ["Failed to start streaming: {}", err]
                );
                Err(gst::FlowError::Error)
            }
            Err(StartError::Negotiate(err)) => Err(err),
        }
    }

    fn collect_coded(
        &self,
        state: &mut State,
        coded: &mut Vec<DequeuedBuffer>,
    ) -> Result<(), gst::FlowError> {
        state.objects.collect(coded).map_err(|err| {
            gst::element_imp_error!(
                self,
                gst::ResourceError::Read,
                ["Failed to dequeue coded data: {}", err]
            );
            gst::FlowError::Error
        })
    }

    /// Finishes the frame of each coded buffer.
    fn finish_coded(&self, coded: Vec<DequeuedBuffer>) -> Result<gst::FlowSuccess, gst::FlowError> {
        let obj = self.obj();

        for buffer in coded {
            if buffer.data.is_empty() {
                continue;
            }

            let frame_number = buffer.timestamp_us as i32;
            let Some(mut frame) = obj.frame(frame_number) else {
                gst::warning!(CAT, imp = self, "No pending frame {}", frame_number);
                continue;
            };

            gst::trace!(
                CAT,
                imp = self,
                "Frame {}: {} bytes, keyframe {}",
                frame_number,
                buffer.data.len(),
                buffer.keyframe
            );

            if buffer.keyframe {
                frame.set_flags(gst_video::VideoCodecFrameFlags::SYNC_POINT);
            }
            frame.set_output_buffer(gst::Buffer::from_mut_slice(buffer.data));
            obj.finish_frame(frame)?;
        }

        Ok(gst::FlowSuccess::Ok)
    }
}
