// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Checks the hand-written structures against the kernel ABI sizes.
//!
//! A size mismatch changes the ioctl request number computed by `nix`, so the
//! driver would reject every call with `ENOTTY`.

use std::mem::size_of;

use v4l2_sys::*;

#[test]
fn fixed_size_structures_match_kernel_abi() {
    assert_eq!(size_of::<v4l2_capability>(), 104);
    assert_eq!(size_of::<v4l2_fmtdesc>(), 64);
    assert_eq!(size_of::<v4l2_pix_format>(), 48);
    assert_eq!(size_of::<v4l2_plane_pix_format>(), 20);
    assert_eq!(size_of::<v4l2_pix_format_mplane>(), 192);
    assert_eq!(size_of::<v4l2_requestbuffers>(), 20);
    assert_eq!(size_of::<v4l2_timecode>(), 16);
    assert_eq!(size_of::<v4l2_encoder_cmd>(), 40);
    assert_eq!(size_of::<v4l2_decoder_cmd>(), 72);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn pointer_sized_structures_match_kernel_abi() {
    assert_eq!(size_of::<v4l2_format>(), 208);
    assert_eq!(size_of::<v4l2_plane>(), 64);
    assert_eq!(size_of::<v4l2_buffer>(), 88);
}

#[test]
fn capability_strings_stop_at_nul() {
    let mut cap = v4l2_capability::default();
    cap.card[..6].copy_from_slice(b"hantro");
    assert_eq!(c_bytes_to_string(&cap.card), "hantro");
    assert_eq!(c_bytes_to_string(b"full-width-name!"), "full-width-name!");
}

#[test]
fn multiplanar_buffer_types() {
    assert!(is_multiplanar(V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE));
    assert!(is_multiplanar(V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE));
    assert!(!is_multiplanar(V4L2_BUF_TYPE_VIDEO_OUTPUT));
    assert!(!is_multiplanar(V4L2_BUF_TYPE_VIDEO_CAPTURE));
}
