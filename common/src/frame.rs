use bytes::Bytes;

/// Camera pixel encodings the engine can decode.
///
/// Tags follow the CoreVideo convention: packed RGB formats 24 and 32 use
/// their bit depth as the tag, everything else is a big-endian FourCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB, 3 bytes per pixel.
    Rgb24,
    /// BGR, 3 bytes per pixel.
    Bgr24,
    /// ARGB, 4 bytes per pixel.
    Argb32,
    /// BGRA, 4 bytes per pixel.
    Bgra32,
    /// ABGR, 4 bytes per pixel.
    Abgr32,
    /// RGBA, 4 bytes per pixel.
    Rgba32,
    /// 4:2:2 packed Cb Y0 Cr Y1, video range.
    Uyvy422,
    /// 4:2:2 packed Y0 Cb Y1 Cr, video range.
    Yuyv422,
    /// Bi-planar 4:2:0: Y plane then interleaved CbCr plane, video range.
    Nv12VideoRange,
    /// Bi-planar 4:2:0, full range.
    Nv12FullRange,
    /// Tri-planar 4:2:0: Y, Cb, Cr planes, video range.
    I420,
}

pub const ALL_PIXEL_FORMATS: [PixelFormat; 11] = [
    PixelFormat::Rgb24,
    PixelFormat::Bgr24,
    PixelFormat::Argb32,
    PixelFormat::Bgra32,
    PixelFormat::Abgr32,
    PixelFormat::Rgba32,
    PixelFormat::Uyvy422,
    PixelFormat::Yuyv422,
    PixelFormat::Nv12VideoRange,
    PixelFormat::Nv12FullRange,
    PixelFormat::I420,
];

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

impl PixelFormat {
    pub fn from_fourcc(code: u32) -> Option<Self> {
        ALL_PIXEL_FORMATS.into_iter().find(|f| f.fourcc() == code)
    }

    pub fn fourcc(self) -> u32 {
        match self {
            Self::Rgb24 => 24,
            Self::Bgr24 => fourcc(b"24BG"),
            Self::Argb32 => 32,
            Self::Bgra32 => fourcc(b"BGRA"),
            Self::Abgr32 => fourcc(b"ABGR"),
            Self::Rgba32 => fourcc(b"RGBA"),
            Self::Uyvy422 => fourcc(b"2vuy"),
            Self::Yuyv422 => fourcc(b"yuvs"),
            Self::Nv12VideoRange => fourcc(b"420v"),
            Self::Nv12FullRange => fourcc(b"420f"),
            Self::I420 => fourcc(b"y420"),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Rgb24 => "24-bit RGB",
            Self::Bgr24 => "24-bit BGR",
            Self::Argb32 => "32-bit ARGB",
            Self::Bgra32 => "32-bit BGRA",
            Self::Abgr32 => "32-bit ABGR",
            Self::Rgba32 => "32-bit RGBA",
            Self::Uyvy422 => "8-bit 4:2:2 Component Y'CbCr (2vuy)",
            Self::Yuyv422 => "8-bit 4:2:2 Component Y'CbCr (yuvs)",
            Self::Nv12VideoRange => "Bi-Planar 4:2:0 Y'CbCr, video range",
            Self::Nv12FullRange => "Bi-Planar 4:2:0 Y'CbCr, full range",
            Self::I420 => "Planar 4:2:0 Y'CbCr",
        }
    }

    /// Short printable tag: the FourCC characters, or the numeric tag for the
    /// two formats whose tag is not printable.
    pub fn tag(self) -> String {
        let code = self.fourcc();
        let chars = code.to_be_bytes();
        if chars.iter().all(|c| c.is_ascii_graphic() || *c == b' ') {
            String::from_utf8_lossy(&chars).into_owned()
        } else {
            code.to_string()
        }
    }

    /// Bytes needed for one row of the first (or only) plane.
    pub fn min_bytes_per_row(self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Rgb24 | Self::Bgr24 => width * 3,
            Self::Argb32 | Self::Bgra32 | Self::Abgr32 | Self::Rgba32 => width * 4,
            // Two bytes per pixel, padded to whole macropixels.
            Self::Uyvy422 | Self::Yuyv422 => width.div_ceil(2) * 4,
            Self::Nv12VideoRange | Self::Nv12FullRange | Self::I420 => width,
        }
    }
}

/// Parse a pixel format tag from config: "BGRA", "420v", "24", "0x34323076".
pub fn parse_fourcc(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }
    let bytes: [u8; 4] = text.as_bytes().try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Geometry of one frame. Fixed for the lifetime of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Stride of the first plane. Chroma plane strides derive from it.
    pub bytes_per_row: usize,
}

impl FrameDescriptor {
    /// Descriptor with no row padding.
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format,
            bytes_per_row: format.min_bytes_per_row(width),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn chroma_rows(&self) -> usize {
        (self.height as usize).div_ceil(2)
    }

    /// Stride of the chroma plane(s) of a planar buffer. An NV12 row holds a
    /// CbCr pair for every started 2-pixel block, so odd widths need one
    /// byte beyond a tight luma stride.
    pub fn chroma_bytes_per_row(&self) -> usize {
        match self.format {
            PixelFormat::I420 => self.bytes_per_row.div_ceil(2),
            _ => self
                .bytes_per_row
                .max((self.width as usize).div_ceil(2) * 2),
        }
    }

    /// Byte offset of the chroma plane(s) inside the buffer.
    pub fn luma_plane_len(&self) -> usize {
        self.bytes_per_row * self.height as usize
    }

    /// Total number of bytes a buffer with this descriptor must hold.
    pub fn required_len(&self) -> usize {
        let luma = self.luma_plane_len();
        match self.format {
            PixelFormat::Nv12VideoRange | PixelFormat::Nv12FullRange => {
                luma + self.chroma_bytes_per_row() * self.chroma_rows()
            }
            PixelFormat::I420 => luma + 2 * self.chroma_bytes_per_row() * self.chroma_rows(),
            _ => luma,
        }
    }

    /// Check that a buffer of `len` bytes can hold a frame with this layout.
    pub fn validate(&self, len: usize) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::EmptyDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let min_row = self.format.min_bytes_per_row(self.width);
        if self.bytes_per_row < min_row {
            return Err(FrameError::StrideTooShort {
                got: self.bytes_per_row,
                expected: min_row,
            });
        }
        let expected = self.required_len();
        if len < expected {
            return Err(FrameError::TooShort { got: len, expected });
        }
        Ok(())
    }
}

/// A raw frame buffer handed over by the capture side.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub descriptor: FrameDescriptor,
    pub data: Bytes,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl RawFrame {
    pub fn new(descriptor: FrameDescriptor, data: impl Into<Bytes>, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            descriptor,
            data: data.into(),
            captured_at_ms,
            seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame has empty dimensions {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("row stride too short: got {got} bytes, expected at least {expected}")]
    StrideTooShort { got: usize, expected: usize },
    #[error("frame buffer too short: got {got} bytes, expected at least {expected}")]
    TooShort { got: usize, expected: usize },
    #[error("frame is {got} but the stream decodes {expected}")]
    FormatMismatch { expected: String, got: String },
    #[error("frame is {got_width}x{got_height} but the stream is {width}x{height}")]
    DimensionsChanged {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_roundtrip_for_every_format() {
        for format in ALL_PIXEL_FORMATS {
            assert_eq!(PixelFormat::from_fourcc(format.fourcc()), Some(format));
        }
        assert_eq!(PixelFormat::from_fourcc(fourcc(b"v210")), None);
    }

    #[test]
    fn parse_fourcc_variants() {
        assert_eq!(parse_fourcc("BGRA"), Some(PixelFormat::Bgra32.fourcc()));
        assert_eq!(parse_fourcc("420v"), Some(PixelFormat::Nv12VideoRange.fourcc()));
        assert_eq!(parse_fourcc("24"), Some(24));
        assert_eq!(parse_fourcc("0x42475241"), Some(PixelFormat::Bgra32.fourcc()));
        assert_eq!(parse_fourcc("toolong"), None);
    }

    #[test]
    fn tag_is_printable() {
        assert_eq!(PixelFormat::Bgra32.tag(), "BGRA");
        assert_eq!(PixelFormat::Rgb24.tag(), "24");
        assert_eq!(PixelFormat::Uyvy422.tag(), "2vuy");
    }

    #[test]
    fn required_len_per_layout() {
        assert_eq!(FrameDescriptor::packed(PixelFormat::Bgra32, 4, 2).required_len(), 32);
        assert_eq!(FrameDescriptor::packed(PixelFormat::Rgb24, 3, 3).required_len(), 27);
        assert_eq!(FrameDescriptor::packed(PixelFormat::Uyvy422, 3, 2).required_len(), 16);
        assert_eq!(
            FrameDescriptor::packed(PixelFormat::Nv12FullRange, 4, 3).required_len(),
            12 + 8
        );
        assert_eq!(FrameDescriptor::packed(PixelFormat::I420, 4, 4).required_len(), 16 + 8);
    }

    #[test]
    fn odd_width_nv12_reserves_a_full_chroma_pair() {
        let desc = FrameDescriptor::packed(PixelFormat::Nv12FullRange, 3, 2);
        assert_eq!(desc.chroma_bytes_per_row(), 4);
        assert_eq!(desc.required_len(), 6 + 4);
        assert!(matches!(desc.validate(9), Err(FrameError::TooShort { got: 9, expected: 10 })));

        // A padded stride already covers the pairs.
        let padded = FrameDescriptor {
            bytes_per_row: 8,
            ..desc
        };
        assert_eq!(padded.chroma_bytes_per_row(), 8);

        let i420 = FrameDescriptor::packed(PixelFormat::I420, 3, 3);
        assert_eq!(i420.required_len(), 9 + 2 * 2 * 2);
    }

    #[test]
    fn validate_rejects_short_buffers() {
        let desc = FrameDescriptor::packed(PixelFormat::Bgra32, 4, 2);
        assert!(desc.validate(32).is_ok());
        assert_eq!(
            desc.validate(31),
            Err(FrameError::TooShort {
                got: 31,
                expected: 32
            })
        );
    }

    #[test]
    fn validate_rejects_bad_stride_and_empty() {
        let mut desc = FrameDescriptor::packed(PixelFormat::Rgb24, 4, 2);
        desc.bytes_per_row = 8;
        assert!(matches!(desc.validate(1024), Err(FrameError::StrideTooShort { .. })));

        let empty = FrameDescriptor::packed(PixelFormat::Rgb24, 0, 2);
        assert!(matches!(empty.validate(0), Err(FrameError::EmptyDimensions { .. })));
    }
}
