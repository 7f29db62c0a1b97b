// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Four character codes identifying V4L2 pixel and coded formats.

use std::fmt;

/// A V4L2 pixel format code (`V4L2_PIX_FMT_*`).
///
/// Stored little-endian the way the kernel packs `v4l2_fourcc(a, b, c, d)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(into = "String")]
pub struct Fourcc(u32);

impl Fourcc {
    /// Builds a code from its four characters.
    pub const fn new(code: &[u8; 4]) -> Self {
        Fourcc(
            code[0] as u32
                | (code[1] as u32) << 8
                | (code[2] as u32) << 16
                | (code[3] as u32) << 24,
        )
    }

    /// Returns the raw value as passed to the kernel.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the four characters of the code.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const NV12: Fourcc = Fourcc::new(b"NV12");
    pub const NV21: Fourcc = Fourcc::new(b"NV21");
    pub const NV16: Fourcc = Fourcc::new(b"NV16");
    pub const NV61: Fourcc = Fourcc::new(b"NV61");
    pub const NV24: Fourcc = Fourcc::new(b"NV24");
    pub const YUYV: Fourcc = Fourcc::new(b"YUYV");
    pub const UYVY: Fourcc = Fourcc::new(b"UYVY");
    pub const YVYU: Fourcc = Fourcc::new(b"YVYU");
    pub const YUV420: Fourcc = Fourcc::new(b"YU12");
    pub const YVU420: Fourcc = Fourcc::new(b"YV12");
    pub const YUV422P: Fourcc = Fourcc::new(b"422P");
    pub const GREY: Fourcc = Fourcc::new(b"GREY");
    pub const RGB565: Fourcc = Fourcc::new(b"RGBP");
    pub const RGB24: Fourcc = Fourcc::new(b"RGB3");
    pub const BGR24: Fourcc = Fourcc::new(b"BGR3");
    pub const XBGR32: Fourcc = Fourcc::new(b"XR24");
    pub const ABGR32: Fourcc = Fourcc::new(b"AR24");
    pub const XRGB32: Fourcc = Fourcc::new(b"BX24");
    pub const ARGB32: Fourcc = Fourcc::new(b"BA24");

    pub const H264: Fourcc = Fourcc::new(b"H264");
    pub const HEVC: Fourcc = Fourcc::new(b"HEVC");
    pub const H263: Fourcc = Fourcc::new(b"H263");
    pub const MPEG2: Fourcc = Fourcc::new(b"MPG2");
    pub const MPEG4: Fourcc = Fourcc::new(b"MPG4");
    pub const VP8: Fourcc = Fourcc::new(b"VP80");
    pub const VP9: Fourcc = Fourcc::new(b"VP90");
    pub const JPEG: Fourcc = Fourcc::new(b"JPEG");
    pub const MJPEG: Fourcc = Fourcc::new(b"MJPG");
    pub const VC1_ANNEX_G: Fourcc = Fourcc::new(b"VC1G");
}

impl From<u32> for Fourcc {
    fn from(value: u32) -> Self {
        Fourcc(value)
    }
}

impl From<Fourcc> for u32 {
    fn from(value: Fourcc) -> Self {
        value.0
    }
}

impl From<Fourcc> for String {
    fn from(value: Fourcc) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fourcc({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_like_the_kernel_macro() {
        // v4l2_fourcc('H', '2', '6', '4')
        assert_eq!(Fourcc::H264.as_u32(), 0x3436_3248);
        assert_eq!(Fourcc::from(0x5659_5559), Fourcc::YUYV);
    }

    #[test]
    fn displays_printable_characters() {
        assert_eq!(Fourcc::NV12.to_string(), "NV12");
        assert_eq!(Fourcc::from(0x0032_3151).to_string(), "Q12.");
        assert_eq!(format!("{:?}", Fourcc::VP8), "Fourcc(VP80)");
    }
}
