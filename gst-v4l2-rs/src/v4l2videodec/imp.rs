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

use v4l2::{DequeuedBuffer, Direction, Format, Fourcc, config};

use crate::caps;
use crate::layout::{FrameLayout, restride};
use crate::objects::{ObjectPair, ObjectSettings, StartError, start_streaming};

/// GStreamer debug category of V4L2 decoders.
pub(crate) static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "v4l2videodec",
        gst::DebugColorFlags::empty(),
        Some("V4L2 Video Decoder"),
    )
});

struct Input {
    codec_state: gst_video::VideoCodecState<'static, gst_video::video_codec_state::Readable>,
    fourcc: Fourcc,
}

/// Negotiated raw output.
struct Output {
    driver_layout: FrameLayout,
    layout: FrameLayout,
}

struct State {
    objects: ObjectPair,
    input: Option<Input>,
    output: Option<Output>,
}

pub struct V4l2VideoDec {
    default_device: Option<&'static str>,
    state: Mutex<State>,
}

#[glib::object_subclass]
impl ObjectSubclass for V4l2VideoDec {
    const NAME: &'static str = "GstRsV4l2VideoDec";
    const ABSTRACT: bool = true;
    type Type = super::V4l2VideoDec;
    type ParentType = gst_video::VideoDecoder;
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
                output: None,
            }),
        }
    }
}

impl ObjectImpl for V4l2VideoDec {
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

impl GstObjectImpl for V4l2VideoDec {}

impl ElementImpl for V4l2VideoDec {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: LazyLock<gst::subclass::ElementMetadata> = LazyLock::new(|| {
            gst::subclass::ElementMetadata::new(
                "V4L2 Video Decoder",
                "Codec/Decoder/Video",
                "Decodes video streams via V4L2 API",
                "V4L2 codec plugin contributors",
            )
        });

        Some(&*ELEMENT_METADATA)
    }
}

impl VideoDecoderImpl for V4l2VideoDec {
    fn open(&self) -> Result<(), gst::ErrorMessage> {
        let mut state = self.state();
        state.objects.open().map_err(|err| {
            gst::error_msg!(
                gst::ResourceError::OpenReadWrite,
                ["Failed to open {:?}: {}", self.default_device, err]
            )
        })?;

        gst::info!(CAT, imp = self, "Opened {:?}", self.default_device);

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
        state.output = None;
        state.objects.stop().map_err(|err| {
            gst::error_msg!(gst::ResourceError::Close, ["Failed to stop streaming: {}", err])
        })?;

        self.parent_stop()
    }

    fn set_format(
        &self,
        codec_state: &gst_video::VideoCodecState<'static, gst_video::video_codec_state::Readable>,
    ) -> Result<(), gst::LoggableError> {
        let fourcc = codec_state
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(caps::fourcc_from_structure)
            .ok_or_else(|| gst::loggable_error!(CAT, "Unsupported input caps"))?;
        let info = codec_state.info();

        let mut state = self.state();
        if let Err(err) = state.objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }
        state.output = None;

        let applied = state
            .objects
            .output
            .set_format(&Format::coded(fourcc, info.width(), info.height()))
            .map_err(|err| gst::loggable_error!(CAT, "Failed to set coded format: {}", err))?;

        gst::debug!(CAT, imp = self, "Coded format {:?}", applied);

        state.input = Some(Input {
            codec_state: codec_state.clone(),
            fourcc,
        });
        drop(state);

        self.parent_set_format(codec_state)
    }

    fn handle_frame(
        &self,
        frame: gst_video::VideoCodecFrame,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let mut state = self.state();
        if state.input.is_none() {
            return Err(gst::FlowError::NotNegotiated);
        }

        if !state.objects.output.is_active() {
            if let Err(err) = state.objects.output.start(config::BUFFER_COUNT) {
                gst::element_imp_error!(
                    self,
                    gst::ResourceError::Settings,
                    ["Failed to start streaming: {}", err]
                );
                return Err(gst::FlowError::Error);
            }
        }

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
            map.as_slice().to_vec()
        };
        let frame_number = frame.system_frame_number();
        drop(frame);

        gst::trace!(CAT, imp = self, "Queueing {} bytes of frame {}", data.len(), frame_number);

        let mut decoded = Vec::new();
        loop {
            match state.objects.output.queue(&data, frame_number as u64) {
                Ok(()) => break,
                Err(v4l2::Error::NoFreeBuffer) => {
                    if state.objects.capture.is_active() {
                        self.collect_decoded(&mut state, &mut decoded)?;
                    }
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

        if state.output.is_none() {
            self.try_activate(&mut state)?;
        }
        if state.output.is_some() {
            self.collect_decoded(&mut state, &mut decoded)?;
        }

        let layouts = state
            .output
            .as_ref()
            .map(|output| (output.driver_layout.clone(), output.layout.clone()));
        drop(state);

        match layouts {
            Some((driver_layout, layout)) => self.finish_decoded(decoded, &driver_layout, &layout),
            None => Ok(gst::FlowSuccess::Ok),
        }
    }

    fn flush(&self) -> bool {
        gst::debug!(CAT, imp = self, "Flushing");

        let mut state = self.state();
        if let Err(err) = state.objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }
        state.output = None;

        true
    }

    fn finish(&self) -> Result<gst::FlowSuccess, gst::FlowError> {
        gst::debug!(CAT, imp = self, "Draining");

        let mut state = self.state();
        if !state.objects.capture.is_active() {
            return Ok(gst::FlowSuccess::Ok);
        }

        if let Err(err) = state.objects.output.decoder_stop() {
            gst::warning!(CAT, imp = self, "Failed to send stop command: {}", err);
        }

        let mut decoded = Vec::new();
        if let Err(err) = state.objects.drain(config::DRAIN_TIMEOUT, &mut decoded) {
            gst::warning!(CAT, imp = self, "Failed to drain the decoder: {}", err);
        }

        if let Err(err) = state.objects.stop() {
            gst::warning!(CAT, imp = self, "Failed to stop streaming: {}", err);
        }
        let output = state.output.take();
        drop(state);

        match output {
            Some(output) => self.finish_decoded(decoded, &output.driver_layout, &output.layout),
            None => Ok(gst::FlowSuccess::Ok),
        }
    }
}

impl V4l2VideoDec {
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

    /// Starts the capture queue once the driver knows the decoded
    /// resolution, and negotiates raw output.
    fn try_activate(&self, state: &mut State) -> Result<(), gst::FlowError> {
        let format = match state.objects.capture.query_format() {
            Ok(format) if format.has_resolution() => format,
            Ok(_) => return Ok(()),
            Err(err) => {
                gst::debug!(CAT, imp = self, "Decoded format not known yet: {}", err);
                return Ok(());
            }
        };

        let video_format = caps::video_format_from_fourcc(format.fourcc).ok_or_else(|| {
            gst::element_imp_error!(
                self,
                gst::CoreError::Negotiation,
                ["Unsupported decoded format {}", format.fourcc]
            );
            gst::FlowError::NotNegotiated
        })?;

        let input = state.input.as_ref().ok_or(gst::FlowError::NotNegotiated)?;
        gst::debug!(
            CAT,
            imp = self,
            "Activating capture: {} decodes to {:?}",
            input.fourcc,
            format
        );

        let obj = self.obj();
        let negotiate = || {
            let output_state = obj
                .set_output_state(
                    video_format,
                    format.width,
                    format.height,
                    Some(&input.codec_state),
                )
                .map_err(|_| gst::FlowError::NotNegotiated)?;
            let info = output_state.info().clone();
            obj.negotiate(output_state).map_err(|err| {
                gst::warning!(CAT, imp = self, "Failed to negotiate: {}", err);
                gst::FlowError::NotNegotiated
            })?;
            Ok(info)
        };
        let started =
            start_streaming(&mut [&mut state.objects.capture], config::BUFFER_COUNT, negotiate);

        let info = match started {
            Ok(info) => info,
            Err(StartError::Start(err)) => {
                gst::element_imp_error!(
                    self,
                    gst::ResourceError::Settings,
                    ["Failed to start streaming: {}", err]
                );
                return Err(gst::FlowError::Error);
            }
            Err(StartError::Negotiate(err)) => return Err(err),
        };

        state.output = Some(Output {
            driver_layout: FrameLayout::from_driver(&info, format.bytesperline, format.sizeimage),
            layout: FrameLayout::from_info(&info),
        });

        Ok(())
    }

    fn collect_decoded(
        &self,
        state: &mut State,
        decoded: &mut Vec<DequeuedBuffer>,
    ) -> Result<(), gst::FlowError> {
        state.objects.collect(decoded).map_err(|err| {
            gst::element_imp_error!(
                self,
                gst::ResourceError::Read,
                ["Failed to dequeue decoded frames: {}", err]
            );
            gst::FlowError::Error
        })
    }

    fn finish_decoded(
        &self,
        decoded: Vec<DequeuedBuffer>,
        driver_layout: &FrameLayout,
        layout: &FrameLayout,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let obj = self.obj();

        for buffer in decoded {
            if buffer.data.is_empty() {
                continue;
            }

            let frame_number = buffer.timestamp_us as i32;
            let Some(mut frame) = obj.frame(frame_number) else {
                gst::warning!(CAT, imp = self, "No pending frame {}", frame_number);
                continue;
            };

            let data = restride(&buffer.data, driver_layout, layout);
            frame.set_output_buffer(gst::Buffer::from_mut_slice(data));
            obj.finish_frame(frame)?;
        }

        Ok(gst::FlowSuccess::Ok)
    }
}
