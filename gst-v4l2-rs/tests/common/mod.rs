// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Shared setup of the plugin integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use gstreamer as gst;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Initializes GStreamer and test logging.
pub fn init() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });

    gst::init().unwrap();
}

static NEXT_BASENAME: AtomicUsize = AtomicUsize::new(0);

/// A basename no other test of this process uses, so that generated type
/// names never collide.
pub fn unique_basename(tag: &str) -> String {
    format!("{tag}{}x", NEXT_BASENAME.fetch_add(1, Ordering::Relaxed))
}

pub fn raw_caps(format: &str) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("format", format)
        .build()
}

/// Pad template caps of a registered element factory, as (sink, src).
pub fn template_caps(factory: &gst::ElementFactory) -> (gst::Caps, gst::Caps) {
    let mut sink = None;
    let mut src = None;
    for templ in factory.static_pad_templates() {
        match templ.direction() {
            gst::PadDirection::Sink => sink = Some(templ.caps()),
            gst::PadDirection::Src => src = Some(templ.caps()),
            _ => {}
        }
    }

    (sink.unwrap(), src.unwrap())
}
