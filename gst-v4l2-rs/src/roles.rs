//! Element Roles
//!
//! A role is what a memory-to-memory device can be exposed as: a video
//! decoder, an H.264 encoder, and so on. Roles are recognized purely from
//! the caps a device accepts (sink) and produces (source).
//!
//! The [`RoleRegistry`] holds the known roles in a fixed order; the first
//! role whose predicate holds wins, so a device maps to at most one role.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;

use crate::caps::{self, H264_MEDIA_TYPE};

/// Whether a role is exposed as an encoder or a decoder element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Decoder,
    Encoder,
}

/// Tests a (sink, source) caps pair.
pub type RolePredicate = fn(&gst::Caps, &gst::Caps) -> bool;

/// One known role.
#[derive(Debug, Clone, Copy)]
pub struct RoleEntry {
    /// Appended to `v4l2<basename>` to form element and type names.
    pub name_suffix: &'static str,
    pub kind: RoleKind,
    /// Abstract element type the generated subtype derives from.
    pub base_type: fn() -> glib::Type,
    pub predicate: RolePredicate,
}

impl RoleEntry {
    pub fn matches(&self, sink_caps: &gst::Caps, src_caps: &gst::Caps) -> bool {
        (self.predicate)(sink_caps, src_caps)
    }
}

/// True if the device decodes a known codec into raw video.
pub fn is_video_decoder(sink_caps: &gst::Caps, src_caps: &gst::Caps) -> bool {
    sink_caps.is_subset(caps::codec_caps()) && src_caps.is_subset(caps::raw_caps())
}

/// True if the device consumes raw video and can produce H.264.
pub fn is_h264_encoder(sink_caps: &gst::Caps, src_caps: &gst::Caps) -> bool {
    sink_caps.is_subset(caps::raw_caps())
        && src_caps.can_intersect(&gst::Caps::new_empty_simple(H264_MEDIA_TYPE))
}

/// Generic decoder of any known codec.
pub fn video_decoder_role() -> RoleEntry {
    RoleEntry {
        name_suffix: "videodec",
        kind: RoleKind::Decoder,
        base_type: crate::v4l2videodec::V4l2VideoDec::static_type,
        predicate: is_video_decoder,
    }
}

/// H.264 encoder.
pub fn h264_encoder_role() -> RoleEntry {
    RoleEntry {
        name_suffix: "h264enc",
        kind: RoleKind::Encoder,
        base_type: crate::v4l2h264enc::V4l2H264Enc::static_type,
        predicate: is_h264_encoder,
    }
}

/// Ordered table of known roles.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    entries: Vec<RoleEntry>,
}

impl RoleRegistry {
    /// A registry over custom entries, scanned in the given order.
    pub fn new(entries: Vec<RoleEntry>) -> Self {
        RoleRegistry { entries }
    }

    /// The roles implemented by this plugin: decoder first, then the H.264
    /// encoder.
    pub fn builtin() -> Self {
        RoleRegistry::new(vec![video_decoder_role(), h264_encoder_role()])
    }

    pub fn entries(&self) -> &[RoleEntry] {
        &self.entries
    }

    /// Returns the first entry matching the caps pair.
    ///
    /// A device reporting no known format in either direction matches
    /// nothing, since empty caps are a subset of every universe.
    pub fn find_first_match(
        &self,
        sink_caps: &gst::Caps,
        src_caps: &gst::Caps,
    ) -> Option<&RoleEntry> {
        if sink_caps.is_empty() || src_caps.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|entry| entry.matches(sink_caps, src_caps))
    }
}
