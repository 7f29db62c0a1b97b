// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Instances of generated element types, without hardware.
//!
//! Capture only streams on a real memory-to-memory device, so the encoder
//! is observed in its inactive state here and the active branch of the
//! caps decision is covered through `output_caps_override`.

use std::str::FromStr;

use gst::prelude::*;
use gstreamer as gst;
use tracing_test::traced_test;

use gstv4l2codec::caps::caps_from_fourccs;
use gstv4l2codec::factory::subtype_name;
use gstv4l2codec::objects::ObjectSettings;
use gstv4l2codec::register_h264_encoder;
use gstv4l2codec::roles::{RoleRegistry, video_decoder_role};
use gstv4l2codec::v4l2h264enc::{V4l2H264Enc, output_caps_override};
use gstv4l2codec::v4l2videodec::{V4l2VideoDec, V4l2VideoDecExt};
use gstv4l2codec::v4l2videoenc::V4l2VideoEncExt;
use v4l2::{Direction, Fourcc};

fn h264_encoder(basename: &str, device: &str) -> V4l2H264Enc {
    gst::init().unwrap();

    let sink = caps_from_fourccs(&[Fourcc::NV12]);
    let src = caps_from_fourccs(&[Fourcc::H264]);
    assert!(register_h264_encoder(None, basename, device, &sink, &src));

    gst::ElementFactory::make(&subtype_name(basename, "h264enc"))
        .build()
        .unwrap()
        .downcast::<V4l2H264Enc>()
        .unwrap()
}

fn expected_settings(device: &str) -> ObjectSettings {
    ObjectSettings {
        device: Some(device.to_owned()),
        no_initial_format: true,
        keep_aspect: false,
    }
}

#[test]
#[traced_test]
fn inactive_capture_gets_byte_stream_h264_caps() {
    gst::init().unwrap();

    let caps = output_caps_override(false).unwrap();
    let expected =
        gst::Caps::from_str("video/x-h264, stream-format=(string)byte-stream, alignment=(string)au")
            .unwrap();
    assert_eq!(caps, expected);

    let s = caps.structure(0).unwrap();
    assert_eq!(s.name(), "video/x-h264");
    assert_eq!(s.get::<&str>("stream-format").unwrap(), "byte-stream");
    assert_eq!(s.get::<&str>("alignment").unwrap(), "au");
}

#[test]
#[traced_test]
fn active_capture_gets_no_override() {
    gst::init().unwrap();
    assert!(output_caps_override(true).is_none());
}

#[test]
#[traced_test]
fn fresh_encoder_uses_the_fallback_caps() {
    let enc = h264_encoder("elemfallback", "/dev/video20");

    assert!(!enc.is_capture_active());
    assert_eq!(enc.pending_output_caps(), output_caps_override(false));
}

#[test]
#[traced_test]
fn failed_open_keeps_the_fallback_caps() {
    let enc = h264_encoder("elemfailedopen", "/nonexistent/video1");

    assert!(enc.set_state(gst::State::Ready).is_err());
    assert!(!enc.is_capture_active());
    assert_eq!(enc.pending_output_caps(), output_caps_override(false));
    enc.set_state(gst::State::Null).unwrap();
}

#[test]
#[traced_test]
fn encoder_directions_share_the_class_device() {
    let enc = h264_encoder("elemsettings", "/dev/video21");

    assert_eq!(enc.direction_settings(Direction::Output), expected_settings("/dev/video21"));
    assert_eq!(enc.direction_settings(Direction::Capture), expected_settings("/dev/video21"));
    assert_eq!(enc.property::<Option<String>>("device").as_deref(), Some("/dev/video21"));
    assert_eq!(enc.property::<Option<String>>("device-name"), None);
    assert_eq!(enc.property::<i32>("device-fd"), -1);
}

#[test]
#[traced_test]
fn decoder_directions_share_the_class_device() {
    gst::init().unwrap();

    let sink = caps_from_fourccs(&[Fourcc::VP9]);
    let src = caps_from_fourccs(&[Fourcc::NV12]);
    let type_ = gstv4l2codec::factory::register_first_match(
        &RoleRegistry::new(vec![video_decoder_role()]),
        None,
        "elemdec",
        "/dev/video22",
        &sink,
        &src,
    )
    .unwrap()
    .unwrap();

    let dec = gst::ElementFactory::make(type_.name())
        .build()
        .unwrap()
        .downcast::<V4l2VideoDec>()
        .unwrap();

    assert!(!dec.is_capture_active());
    assert_eq!(dec.direction_settings(Direction::Output), expected_settings("/dev/video22"));
    assert_eq!(dec.direction_settings(Direction::Capture), expected_settings("/dev/video22"));
    assert_eq!(dec.property::<i32>("device-fd"), -1);
}

#[test]
#[traced_test]
fn missing_device_fails_to_open() {
    let enc = h264_encoder("elemmissing", "/nonexistent/video0");

    assert!(enc.set_state(gst::State::Ready).is_err());
    assert!(!enc.is_capture_active());
    enc.set_state(gst::State::Null).unwrap();
}
