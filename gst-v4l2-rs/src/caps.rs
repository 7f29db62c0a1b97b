//! V4L2 Format to Caps Mapping
//!
//! Translates between V4L2 fourccs and GStreamer caps. Every known fourcc
//! maps to one *bare* caps structure: a media type plus the fields that
//! identify the format, without width, height or framerate.
//!
//! ## Capability Universes
//! - [`raw_caps`]: every raw pixel format this plugin understands
//! - [`codec_caps`]: every coded format this plugin understands
//!
//! Role predicates test probed device caps against these universes.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use std::sync::LazyLock;

use gstreamer as gst;
use gstreamer_video as gst_video;
use gst_video::VideoFormat;

use v4l2::Fourcc;

/// Raw pixel formats, in preference order.
const RAW_FORMATS: &[(Fourcc, VideoFormat)] = &[
    (Fourcc::NV12, VideoFormat::Nv12),
    (Fourcc::NV21, VideoFormat::Nv21),
    (Fourcc::YUV420, VideoFormat::I420),
    (Fourcc::YVU420, VideoFormat::Yv12),
    (Fourcc::YUYV, VideoFormat::Yuy2),
    (Fourcc::UYVY, VideoFormat::Uyvy),
    (Fourcc::YVYU, VideoFormat::Yvyu),
    (Fourcc::YUV422P, VideoFormat::Y42b),
    (Fourcc::NV16, VideoFormat::Nv16),
    (Fourcc::NV61, VideoFormat::Nv61),
    (Fourcc::NV24, VideoFormat::Nv24),
    (Fourcc::RGB24, VideoFormat::Rgb),
    (Fourcc::BGR24, VideoFormat::Bgr),
    (Fourcc::XBGR32, VideoFormat::Bgrx),
    (Fourcc::ABGR32, VideoFormat::Bgra),
    (Fourcc::XRGB32, VideoFormat::Xrgb),
    (Fourcc::ARGB32, VideoFormat::Argb),
    (Fourcc::RGB565, VideoFormat::Rgb16),
    (Fourcc::GREY, VideoFormat::Gray8),
];

/// Coded formats. JPEG comes before MJPEG so that `image/jpeg` maps back
/// to the former.
const CODEC_FORMATS: &[Fourcc] = &[
    Fourcc::H264,
    Fourcc::HEVC,
    Fourcc::H263,
    Fourcc::MPEG2,
    Fourcc::MPEG4,
    Fourcc::VP8,
    Fourcc::VP9,
    Fourcc::JPEG,
    Fourcc::MJPEG,
    Fourcc::VC1_ANNEX_G,
];

/// Media type of coded H.264.
pub const H264_MEDIA_TYPE: &str = "video/x-h264";

/// Builds the bare caps structure of a coded fourcc.
fn codec_structure(fourcc: Fourcc) -> Option<gst::Structure> {
    let s = match fourcc {
        Fourcc::H264 => gst::Structure::builder(H264_MEDIA_TYPE)
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .build(),
        Fourcc::HEVC => gst::Structure::builder("video/x-h265")
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .build(),
        Fourcc::H263 => gst::Structure::builder("video/x-h263")
            .field("variant", "itu")
            .build(),
        Fourcc::MPEG2 => gst::Structure::builder("video/mpeg")
            .field("mpegversion", 2i32)
            .field("systemstream", false)
            .build(),
        Fourcc::MPEG4 => gst::Structure::builder("video/mpeg")
            .field("mpegversion", 4i32)
            .field("systemstream", false)
            .build(),
        Fourcc::VP8 => gst::Structure::new_empty("video/x-vp8"),
        Fourcc::VP9 => gst::Structure::new_empty("video/x-vp9"),
        Fourcc::JPEG | Fourcc::MJPEG => gst::Structure::new_empty("image/jpeg"),
        Fourcc::VC1_ANNEX_G => gst::Structure::builder("video/x-wmv")
            .field("wmvversion", 3i32)
            .field("format", "WVC1")
            .build(),
        _ => return None,
    };

    Some(s)
}

fn raw_structure(format: VideoFormat) -> gst::Structure {
    gst::Structure::builder("video/x-raw")
        .field("format", format.to_str())
        .build()
}

/// Returns the bare caps structure of `fourcc`, raw or coded.
pub fn structure_from_fourcc(fourcc: Fourcc) -> Option<gst::Structure> {
    match video_format_from_fourcc(fourcc) {
        Some(format) => Some(raw_structure(format)),
        None => codec_structure(fourcc),
    }
}

static RAW_CAPS: LazyLock<gst::Caps> = LazyLock::new(|| {
    let mut caps = gst::Caps::new_empty();
    for (_, format) in RAW_FORMATS {
        caps.make_mut().append_structure(raw_structure(*format));
    }
    caps
});

static CODEC_CAPS: LazyLock<gst::Caps> = LazyLock::new(|| {
    let mut caps = gst::Caps::new_empty();
    for s in CODEC_FORMATS.iter().copied().filter_map(codec_structure) {
        caps.make_mut().merge_structure(s);
    }
    caps
});

/// The raw video universe: one bare structure per known pixel format.
pub fn raw_caps() -> &'static gst::Caps {
    &RAW_CAPS
}

/// The coded video universe: one bare structure per known codec.
pub fn codec_caps() -> &'static gst::Caps {
    &CODEC_CAPS
}

/// Builds template caps from probed fourccs, in the order given.
///
/// Unknown fourccs are skipped and duplicates merged, so the result is
/// empty if no format is known.
pub fn caps_from_fourccs(fourccs: &[Fourcc]) -> gst::Caps {
    let mut caps = gst::Caps::new_empty();
    for s in fourccs.iter().copied().filter_map(structure_from_fourcc) {
        caps.make_mut().merge_structure(s);
    }
    caps
}

/// Maps a raw pixel fourcc to its video format.
pub fn video_format_from_fourcc(fourcc: Fourcc) -> Option<VideoFormat> {
    RAW_FORMATS
        .iter()
        .find(|(f, _)| *f == fourcc)
        .map(|(_, format)| *format)
}

/// Maps a video format to its raw pixel fourcc.
pub fn fourcc_from_video_format(format: VideoFormat) -> Option<Fourcc> {
    RAW_FORMATS
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(fourcc, _)| *fourcc)
}

/// Finds the fourcc of a (possibly fixed) caps structure.
pub fn fourcc_from_structure(s: &gst::StructureRef) -> Option<Fourcc> {
    if s.name() == "video/x-raw" {
        let format = s.get::<&str>("format").ok()?;
        return fourcc_from_video_format(VideoFormat::from_string(format));
    }

    CODEC_FORMATS.iter().copied().find(|fourcc| {
        codec_structure(*fourcc)
            .is_some_and(|codec| codec.name() == s.name() && codec.can_intersect(s))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        gst::init().unwrap();
    }

    #[test]
    fn universes_are_disjoint() {
        init();
        assert!(!raw_caps().is_empty());
        assert!(!codec_caps().is_empty());
        assert!(!raw_caps().can_intersect(codec_caps()));
    }

    #[test]
    fn jpeg_variants_merge() {
        init();
        let caps = caps_from_fourccs(&[Fourcc::JPEG, Fourcc::MJPEG]);
        assert_eq!(caps.size(), 1);
        assert_eq!(fourcc_from_structure(caps.structure(0).unwrap()), Some(Fourcc::JPEG));
    }
}
