// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Role predicates, role registry order and caps mapping.

mod common;

use gst::prelude::*;
use gstreamer as gst;

use gstv4l2codec::caps::{
    caps_from_fourccs, codec_caps, fourcc_from_structure, raw_caps, structure_from_fourcc,
};
use gstv4l2codec::roles::{
    RoleEntry, RoleKind, RoleRegistry, is_h264_encoder, is_video_decoder,
};
use gstv4l2codec::v4l2h264enc::V4l2H264Enc;
use gstv4l2codec::v4l2videodec::V4l2VideoDec;
use v4l2::Fourcc;

fn h264() -> gst::Caps {
    gst::Caps::new_empty_simple("video/x-h264")
}

#[test]
fn h264_encoder_needs_raw_input_and_h264_output() {
    common::init();

    let yuy2 = common::raw_caps("YUY2");
    assert!(is_h264_encoder(&yuy2, &h264()));
    assert!(is_h264_encoder(
        &caps_from_fourccs(&[Fourcc::NV12, Fourcc::YUV420]),
        &caps_from_fourccs(&[Fourcc::H264])
    ));

    // Producing more than H.264 still qualifies
    let h264_or_hevc = caps_from_fourccs(&[Fourcc::HEVC, Fourcc::H264]);
    assert!(is_h264_encoder(&yuy2, &h264_or_hevc));

    assert!(!is_h264_encoder(&yuy2, &caps_from_fourccs(&[Fourcc::HEVC])));
    assert!(!is_h264_encoder(&h264(), &h264()));
    // A format outside the raw universe
    assert!(!is_h264_encoder(&common::raw_caps("v210"), &h264()));
    // Unconstrained raw caps are not a subset of the universe
    assert!(!is_h264_encoder(&gst::Caps::new_empty_simple("video/x-raw"), &h264()));
}

#[test]
fn video_decoder_needs_codec_input_and_raw_output() {
    common::init();

    let coded = caps_from_fourccs(&[Fourcc::H264, Fourcc::VP8]);
    let raw = caps_from_fourccs(&[Fourcc::NV12]);
    assert!(is_video_decoder(&coded, &raw));

    assert!(!is_video_decoder(&raw, &coded));
    assert!(!is_video_decoder(&h264(), &gst::Caps::new_empty_simple("video/x-raw")));
}

#[test]
fn device_without_formats_matches_no_role() {
    common::init();

    let registry = RoleRegistry::builtin();
    let empty = gst::Caps::new_empty();

    assert!(registry.find_first_match(&empty, &h264()).is_none());
    assert!(registry.find_first_match(&common::raw_caps("NV12"), &empty).is_none());
}

#[test]
fn builtin_roles_are_scanned_decoder_first() {
    common::init();

    let registry = RoleRegistry::builtin();
    let suffixes: Vec<_> = registry.entries().iter().map(|e| e.name_suffix).collect();
    assert_eq!(suffixes, ["videodec", "h264enc"]);

    let role = registry
        .find_first_match(&common::raw_caps("YUY2"), &h264())
        .unwrap();
    assert_eq!(role.name_suffix, "h264enc");
    assert_eq!(role.kind, RoleKind::Encoder);
    assert_eq!((role.base_type)(), V4l2H264Enc::static_type());

    let role = registry
        .find_first_match(&caps_from_fourccs(&[Fourcc::MPEG2]), &caps_from_fourccs(&[Fourcc::NV12]))
        .unwrap();
    assert_eq!(role.name_suffix, "videodec");
    assert_eq!((role.base_type)(), V4l2VideoDec::static_type());

    let raw = gst::Caps::new_empty_simple("video/x-raw");
    assert!(registry.find_first_match(&h264(), &raw).is_none());
}

#[test]
fn first_of_overlapping_roles_wins() {
    common::init();

    fn always(_: &gst::Caps, _: &gst::Caps) -> bool {
        true
    }

    let entry = |name_suffix| RoleEntry {
        name_suffix,
        kind: RoleKind::Decoder,
        base_type: V4l2VideoDec::static_type,
        predicate: always,
    };
    let registry = RoleRegistry::new(vec![entry("first"), entry("second")]);

    for _ in 0..3 {
        let role = registry
            .find_first_match(&common::raw_caps("NV12"), &h264())
            .unwrap();
        assert_eq!(role.name_suffix, "first");
    }
}

#[test]
fn universes_cover_the_mapped_formats() {
    common::init();

    assert!(caps_from_fourccs(&[Fourcc::NV12, Fourcc::YUYV, Fourcc::GREY]).is_subset(raw_caps()));
    assert!(caps_from_fourccs(&[Fourcc::H264, Fourcc::VP9, Fourcc::JPEG]).is_subset(codec_caps()));
}

#[test]
fn structures_map_back_to_fourccs() {
    common::init();

    let fixed = gst::Structure::builder("video/x-h264")
        .field("stream-format", "byte-stream")
        .field("alignment", "au")
        .field("width", 640i32)
        .field("height", 480i32)
        .build();
    assert_eq!(fourcc_from_structure(&fixed), Some(Fourcc::H264));

    let nv12 = structure_from_fourcc(Fourcc::NV12).unwrap();
    assert_eq!(fourcc_from_structure(&nv12), Some(Fourcc::NV12));

    let avc = gst::Structure::builder("video/x-h264")
        .field("stream-format", "avc")
        .build();
    assert_eq!(fourcc_from_structure(&avc), None);
    assert_eq!(fourcc_from_structure(&gst::Structure::new_empty("audio/x-raw")), None);
}

#[test]
fn probed_caps_keep_order_and_skip_unknown_fourccs() {
    common::init();

    let caps = caps_from_fourccs(&[Fourcc::YUYV, Fourcc::new(b"ZZZZ"), Fourcc::NV12, Fourcc::YUYV]);
    assert_eq!(caps.size(), 2);
    assert_eq!(caps.structure(0).unwrap().get::<&str>("format").unwrap(), "YUY2");
    assert_eq!(caps.structure(1).unwrap().get::<&str>("format").unwrap(), "NV12");

    assert!(caps_from_fourccs(&[Fourcc::new(b"ZZZZ")]).is_empty());
}
