// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Registration of per-device element types.
//!
//! Types are registered without a plugin, as static elements of the test
//! process. GLib types cannot be unregistered, so every test uses its own
//! basenames.

mod common;

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;

use gstv4l2codec::caps::caps_from_fourccs;
use gstv4l2codec::factory::{register_first_match, register_role, subtype_name, subtype_rank};
use gstv4l2codec::roles::{RoleRegistry, h264_encoder_role};
use gstv4l2codec::v4l2h264enc::V4l2H264Enc;
use gstv4l2codec::v4l2videodec::V4l2VideoDec;
use gstv4l2codec::v4l2videoenc::V4l2VideoEnc;
use gstv4l2codec::{register_all_matching_roles, register_h264_encoder};
use v4l2::Fourcc;

#[test]
fn h264_encoder_device_yields_one_encoder_type() {
    common::init();

    let sink = common::raw_caps("YUY2");
    let src = gst::Caps::new_empty_simple("video/x-h264");

    assert!(register_all_matching_roles(None, "0", "/dev/video0", &sink, &src));

    let factory = gst::ElementFactory::find("v4l20h264enc").unwrap();
    assert_eq!(factory.rank(), gst::Rank::PRIMARY + 1);
    assert_eq!(factory.rank(), subtype_rank());
    assert_eq!(common::template_caps(&factory), (sink, src));
    assert!(gst::ElementFactory::find("v4l20videodec").is_none());

    let type_ = glib::Type::from_name("v4l20h264enc").unwrap();
    assert!(type_.is_a(V4l2H264Enc::static_type()));
    assert!(type_.is_a(V4l2VideoEnc::static_type()));
    assert!(!type_.is_a(V4l2VideoDec::static_type()));
}

#[test]
fn unmatched_device_registers_nothing_but_succeeds() {
    common::init();

    let basename = common::unique_basename("nomatch");
    let sink = gst::Caps::new_empty_simple("video/x-h264");
    let src = gst::Caps::new_empty_simple("video/x-raw");

    assert!(register_all_matching_roles(None, &basename, "/dev/video1", &sink, &src));

    for suffix in ["videodec", "h264enc"] {
        let name = subtype_name(&basename, suffix);
        assert!(gst::ElementFactory::find(&name).is_none());
        assert!(glib::Type::from_name(&name).is_none());
    }
}

#[test]
fn every_matching_device_gets_a_distinct_type() {
    common::init();

    let registry = RoleRegistry::builtin();
    let raw = caps_from_fourccs(&[Fourcc::NV12]);
    let h264 = caps_from_fourccs(&[Fourcc::H264]);
    let devices = [
        (common::unique_basename("multi"), &raw, &h264, "h264enc"),
        (common::unique_basename("multi"), &h264, &raw, "videodec"),
        (common::unique_basename("multi"), &raw, &h264, "h264enc"),
    ];

    let mut types = Vec::new();
    for (basename, sink, src, suffix) in &devices {
        let type_ = register_first_match(&registry, None, basename, "/dev/video9", sink, src)
            .unwrap()
            .unwrap();
        assert_eq!(type_.name(), subtype_name(basename, suffix));
        assert!(gst::ElementFactory::find(type_.name()).is_some());
        types.push(type_);
    }

    types.sort_by_key(|t| t.name().to_owned());
    types.dedup();
    assert_eq!(types.len(), devices.len());
}

#[test]
fn decoder_types_derive_from_the_decoder_base() {
    common::init();

    let basename = common::unique_basename("dec");
    let sink = caps_from_fourccs(&[Fourcc::H264, Fourcc::VP8]);
    let src = caps_from_fourccs(&[Fourcc::NV12, Fourcc::YUV420]);

    let registry = RoleRegistry::builtin();
    let type_ = register_first_match(&registry, None, &basename, "/dev/video3", &sink, &src)
        .unwrap()
        .unwrap();
    assert!(type_.is_a(V4l2VideoDec::static_type()));

    let factory = gst::ElementFactory::find(&subtype_name(&basename, "videodec")).unwrap();
    assert_eq!(
        factory.metadata(gst::ELEMENT_METADATA_KLASS),
        Some("Codec/Decoder/Video")
    );
    assert_eq!(common::template_caps(&factory), (sink, src));
}

#[test]
fn template_caps_survive_instantiation() {
    common::init();

    let basename = common::unique_basename("tmpl");
    let sink = caps_from_fourccs(&[Fourcc::NV12, Fourcc::YUYV]);
    let src = caps_from_fourccs(&[Fourcc::H264]);
    assert!(register_h264_encoder(None, &basename, "/dev/video4", &sink, &src));

    let name = subtype_name(&basename, "h264enc");
    for _ in 0..2 {
        let element = gst::ElementFactory::make(&name).build().unwrap();
        let sink_pad = element.static_pad("sink").unwrap();
        let src_pad = element.static_pad("src").unwrap();
        assert_eq!(sink_pad.pad_template_caps(), sink);
        assert_eq!(src_pad.pad_template_caps(), src);
    }

    let factory = gst::ElementFactory::find(&name).unwrap();
    assert_eq!(common::template_caps(&factory), (sink, src));
}

#[test]
fn h264_encoder_registration_skips_the_predicates() {
    common::init();

    // Nothing about these caps says H.264 encoder
    let basename = common::unique_basename("forced");
    let sink = caps_from_fourccs(&[Fourcc::VP8]);
    let src = caps_from_fourccs(&[Fourcc::NV12]);

    assert!(register_h264_encoder(None, &basename, "/dev/video5", &sink, &src));
    let factory = gst::ElementFactory::find(&subtype_name(&basename, "h264enc")).unwrap();
    assert_eq!(
        factory.metadata(gst::ELEMENT_METADATA_LONGNAME),
        Some("V4L2 H.264 Encoder")
    );
}

#[test]
fn taken_names_are_refused() {
    common::init();

    let basename = common::unique_basename("dup");
    let sink = common::raw_caps("NV12");
    let src = gst::Caps::new_empty_simple("video/x-h264");

    assert!(register_h264_encoder(None, &basename, "/dev/video6", &sink, &src));
    assert!(!register_h264_encoder(None, &basename, "/dev/v4l2/video6", &sink, &src));

    // The umbrella entry point still reports success
    assert!(register_all_matching_roles(None, &basename, "/dev/v4l2/video6", &sink, &src));

    let element = gst::ElementFactory::make(&subtype_name(&basename, "h264enc"))
        .build()
        .unwrap();
    assert_eq!(element.property::<Option<String>>("device").as_deref(), Some("/dev/video6"));
}

#[test]
fn invalid_type_names_are_refused() {
    common::init();

    let sink = common::raw_caps("NV12");
    let src = gst::Caps::new_empty_simple("video/x-h264");

    let err =
        register_role(None, "a.b", "/dev/a.b", &sink, &src, &h264_encoder_role()).unwrap_err();
    assert!(err.to_string().contains("v4l2a.bh264enc"), "{err}");
}
