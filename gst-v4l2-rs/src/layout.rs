//! Frame Memory Layouts
//!
//! Drivers choose their own line stride for raw frames (`bytesperline`) and
//! often pad the number of lines (visible through `sizeimage`), which rarely
//! matches the tightly packed default GStreamer computes for a
//! [`gst_video::VideoInfo`]. A [`FrameLayout`] describes where each plane
//! of one frame lives in a contiguous buffer, and [`restride`] copies a
//! frame from one layout to another.

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use gstreamer_video as gst_video;

/// Position of one plane inside a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub offset: usize,
    pub stride: usize,
    /// Number of lines.
    pub height: usize,
}

impl PlaneLayout {
    fn end(&self) -> usize {
        self.offset + self.stride * self.height
    }
}

/// Plane positions of one frame in a contiguous buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    planes: Vec<PlaneLayout>,
}

impl FrameLayout {
    /// The default packed layout GStreamer uses for `info`.
    pub fn from_info(info: &gst_video::VideoInfo) -> Self {
        let offsets = info.offset();
        let strides = info.stride();
        let n_planes = info.n_planes() as usize;

        let planes = (0..n_planes)
            .map(|i| {
                let next = if i + 1 < n_planes {
                    offsets[i + 1]
                } else {
                    info.size()
                };
                let stride = strides[i].unsigned_abs() as usize;
                let height = if stride == 0 {
                    0
                } else {
                    (next - offsets[i]) / stride
                };
                PlaneLayout {
                    offset: offsets[i],
                    stride,
                    height,
                }
            })
            .collect();

        FrameLayout { planes }
    }

    /// The layout described by a buffer's video meta, with line counts
    /// taken from `info`.
    pub fn from_meta(info: &gst_video::VideoInfo, offsets: &[usize], strides: &[i32]) -> Self {
        let default = FrameLayout::from_info(info);
        let planes = default
            .planes
            .iter()
            .zip(offsets.iter().zip(strides))
            .map(|(plane, (&offset, &stride))| PlaneLayout {
                offset,
                stride: stride.unsigned_abs() as usize,
                height: plane.height,
            })
            .collect();

        FrameLayout { planes }
    }

    /// The layout a driver uses for `info`, given the `bytesperline` and
    /// `sizeimage` it reported for a single-buffer format.
    ///
    /// Strides of further planes scale with the first one. Lines beyond the
    /// visible height that `sizeimage` leaves room for are padding, and each
    /// plane starts after the padded lines of the previous one.
    pub fn from_driver(info: &gst_video::VideoInfo, bytesperline: u32, sizeimage: u32) -> Self {
        let default = FrameLayout::from_info(info);
        let Some(&first) = default.planes.first() else {
            return default;
        };
        if first.stride == 0 || first.height == 0 {
            return default;
        }

        let base = first.stride;
        let bytesperline = match bytesperline as usize {
            0 => base,
            bytesperline => bytesperline,
        };
        let padded_height = padded_height(&default, bytesperline, sizeimage as usize);
        if bytesperline == base && padded_height == first.height {
            return default;
        }

        let mut offset = 0;
        let planes = default
            .planes
            .iter()
            .map(|plane| {
                let stride = plane.stride * bytesperline / base;
                let layout = PlaneLayout {
                    offset,
                    stride,
                    height: plane.height,
                };
                offset += stride * (plane.height * padded_height).div_ceil(first.height);
                layout
            })
            .collect();

        FrameLayout { planes }
    }

    pub fn planes(&self) -> &[PlaneLayout] {
        &self.planes
    }

    /// Bytes needed to hold the frame.
    pub fn size(&self) -> usize {
        self.planes.iter().map(PlaneLayout::end).max().unwrap_or(0)
    }
}

/// Lines of the first plane including driver padding, never less than the
/// visible height.
fn padded_height(default: &FrameLayout, bytesperline: usize, sizeimage: usize) -> usize {
    let first = default.planes[0];
    let default_size = default.size();
    if sizeimage == 0 || default_size == 0 {
        return first.height;
    }

    // `sizeimage` expressed at the default stride, compared to the packed size
    let scaled = sizeimage as u64 * first.stride as u64 / bytesperline as u64;
    let padded = first.height as u64 * scaled / default_size as u64;

    (padded as usize).max(first.height)
}

/// Copies a frame from `src` laid out as `src_layout` into a new buffer laid
/// out as `dst_layout`.
///
/// Each line copies the smaller of both strides. Lines missing from `src`
/// are left zeroed.
pub fn restride(src: &[u8], src_layout: &FrameLayout, dst_layout: &FrameLayout) -> Vec<u8> {
    if src_layout == dst_layout {
        let mut out = src.to_vec();
        out.resize(dst_layout.size(), 0);
        return out;
    }

    let mut dst = vec![0u8; dst_layout.size()];
    for (from, to) in src_layout.planes.iter().zip(&dst_layout.planes) {
        let width = from.stride.min(to.stride);
        for line in 0..from.height.min(to.height) {
            let start = from.offset + line * from.stride;
            let Some(row) = src.get(start..start + width) else {
                break;
            };
            let dst_start = to.offset + line * to.stride;
            dst[dst_start..dst_start + width].copy_from_slice(row);
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use gst_video::VideoFormat;
    use gstreamer as gst;

    fn info(format: VideoFormat, width: u32, height: u32) -> gst_video::VideoInfo {
        gst::init().unwrap();
        gst_video::VideoInfo::builder(format, width, height)
            .build()
            .unwrap()
    }

    #[test]
    fn default_layout_matches_video_info() {
        let info = info(VideoFormat::Nv12, 64, 48);
        let layout = FrameLayout::from_info(&info);

        assert_eq!(
            layout.planes(),
            &[
                PlaneLayout { offset: 0, stride: 64, height: 48 },
                PlaneLayout { offset: 64 * 48, stride: 64, height: 24 },
            ]
        );
        assert_eq!(layout.size(), info.size());
    }

    #[test]
    fn driver_stride_scales_chroma_planes() {
        let info = info(VideoFormat::I420, 64, 48);
        let layout = FrameLayout::from_driver(&info, 128, 0);

        assert_eq!(
            layout.planes(),
            &[
                PlaneLayout { offset: 0, stride: 128, height: 48 },
                PlaneLayout { offset: 128 * 48, stride: 64, height: 24 },
                PlaneLayout { offset: 128 * 48 + 64 * 24, stride: 64, height: 24 },
            ]
        );
    }

    #[test]
    fn packed_stride_keeps_the_default_layout() {
        let info = info(VideoFormat::Yuy2, 32, 8);
        assert_eq!(FrameLayout::from_driver(&info, 64, 0), FrameLayout::from_info(&info));
        assert_eq!(FrameLayout::from_driver(&info, 0, 0), FrameLayout::from_info(&info));
        assert_eq!(FrameLayout::from_driver(&info, 64, 64 * 8), FrameLayout::from_info(&info));
    }

    #[test]
    fn padded_luma_height_moves_the_chroma_plane() {
        let info = info(VideoFormat::Nv12, 1920, 1080);
        let layout = FrameLayout::from_driver(&info, 1920, 1920 * 1088 * 3 / 2);

        assert_eq!(
            layout.planes(),
            &[
                PlaneLayout { offset: 0, stride: 1920, height: 1080 },
                PlaneLayout { offset: 1920 * 1088, stride: 1920, height: 540 },
            ]
        );
    }

    #[test]
    fn padding_accumulates_over_all_chroma_planes() {
        let info = info(VideoFormat::I420, 64, 48);
        let layout = FrameLayout::from_driver(&info, 64, 64 * 64 * 3 / 2);

        assert_eq!(
            layout.planes(),
            &[
                PlaneLayout { offset: 0, stride: 64, height: 48 },
                PlaneLayout { offset: 64 * 64, stride: 32, height: 24 },
                PlaneLayout { offset: 64 * 64 + 32 * 32, stride: 32, height: 24 },
            ]
        );
    }

    #[test]
    fn restride_skips_padded_lines() {
        let info = info(VideoFormat::Nv12, 4, 2);
        let packed = FrameLayout::from_info(&info);
        let padded = FrameLayout::from_driver(&info, 4, 4 * 4 * 3 / 2);

        let src: Vec<u8> = (1..=12).collect();
        let dst = restride(&src, &packed, &padded);
        assert_eq!(&dst[..8], &src[..8]);
        assert_eq!(&dst[8..16], &[0; 8]);
        assert_eq!(&dst[16..20], &src[8..12]);

        assert_eq!(restride(&dst, &padded, &packed), src);
    }

    #[test]
    fn restride_pads_and_unpads_lines() {
        let info = info(VideoFormat::Gray8, 4, 2);
        let packed = FrameLayout::from_info(&info);
        let padded = FrameLayout::from_driver(&info, 8, 0);

        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let wide = restride(&src, &packed, &padded);
        assert_eq!(wide, [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0]);

        let narrow = restride(&wide, &padded, &packed);
        assert_eq!(narrow, src);
    }
}
