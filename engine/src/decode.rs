//! Pixel decoding.
//!
//! Each supported [`PixelFormat`] maps to one sampler function that reads the
//! RGB value of a single pixel position out of a raw buffer. Decoding a frame
//! walks every position in raster order and yields a [`DecodedPixel`].

use video_check_common::frame::{FrameDescriptor, FrameError, PixelFormat};

/// One pixel in canonical form. Produced and consumed per frame, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedPixel {
    /// Components in [0, 1].
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    /// Degrees in [0, 360). Zero for achromatic pixels.
    pub hue: f64,
    /// [0, 1]
    pub saturation: f64,
    /// [0, 1]
    pub brightness: f64,
}

impl DecodedPixel {
    pub fn from_rgb8([r, g, b]: [u8; 3]) -> Self {
        let red = r as f64 / 255.0;
        let green = g as f64 / 255.0;
        let blue = b as f64 / 255.0;

        let max = red.max(green).max(blue);
        let min = red.min(green).min(blue);
        let delta = max - min;

        let hue = if delta <= 0.0 {
            0.0
        } else if max == red {
            60.0 * ((green - blue) / delta).rem_euclid(6.0)
        } else if max == green {
            60.0 * ((blue - red) / delta + 2.0)
        } else {
            60.0 * ((red - green) / delta + 4.0)
        };
        let saturation = if max <= 0.0 { 0.0 } else { delta / max };

        Self {
            red,
            green,
            blue,
            hue: if hue >= 360.0 { hue - 360.0 } else { hue },
            saturation,
            brightness: max,
        }
    }

    /// Components on the 8-bit scale (0..=255).
    pub fn levels(&self) -> [f64; 3] {
        [self.red * 255.0, self.green * 255.0, self.blue * 255.0]
    }
}

type Sampler = fn(&[u8], &FrameDescriptor, usize, usize) -> [u8; 3];

/// Dispatch table from pixel format to its sampler.
fn sampler(format: PixelFormat) -> Sampler {
    match format {
        PixelFormat::Rgb24 => |d, f, x, y| packed(d, f, x, y, 3, [0, 1, 2]),
        PixelFormat::Bgr24 => |d, f, x, y| packed(d, f, x, y, 3, [2, 1, 0]),
        PixelFormat::Argb32 => |d, f, x, y| packed(d, f, x, y, 4, [1, 2, 3]),
        PixelFormat::Bgra32 => |d, f, x, y| packed(d, f, x, y, 4, [2, 1, 0]),
        PixelFormat::Abgr32 => |d, f, x, y| packed(d, f, x, y, 4, [3, 2, 1]),
        PixelFormat::Rgba32 => |d, f, x, y| packed(d, f, x, y, 4, [0, 1, 2]),
        // Macropixel byte offsets of Y0, Y1, Cb, Cr.
        PixelFormat::Uyvy422 => |d, f, x, y| packed_422(d, f, x, y, [1, 3, 0, 2]),
        PixelFormat::Yuyv422 => |d, f, x, y| packed_422(d, f, x, y, [0, 2, 1, 3]),
        PixelFormat::Nv12VideoRange => |d, f, x, y| {
            let (luma, cb, cr) = biplanar(d, f, x, y);
            ycbcr_video_range(luma, cb, cr)
        },
        PixelFormat::Nv12FullRange => |d, f, x, y| {
            let (luma, cb, cr) = biplanar(d, f, x, y);
            ycbcr_full_range(luma, cb, cr)
        },
        PixelFormat::I420 => |d, f, x, y| {
            let (luma, cb, cr) = triplanar(d, f, x, y);
            ycbcr_video_range(luma, cb, cr)
        },
    }
}

fn packed(data: &[u8], desc: &FrameDescriptor, x: usize, y: usize, bpp: usize, rgb: [usize; 3]) -> [u8; 3] {
    let base = y * desc.bytes_per_row + x * bpp;
    [data[base + rgb[0]], data[base + rgb[1]], data[base + rgb[2]]]
}

fn packed_422(data: &[u8], desc: &FrameDescriptor, x: usize, y: usize, layout: [usize; 4]) -> [u8; 3] {
    let base = y * desc.bytes_per_row + (x / 2) * 4;
    let luma = data[base + layout[x % 2]];
    ycbcr_video_range(luma, data[base + layout[2]], data[base + layout[3]])
}

fn biplanar(data: &[u8], desc: &FrameDescriptor, x: usize, y: usize) -> (u8, u8, u8) {
    let luma = data[y * desc.bytes_per_row + x];
    let chroma = desc.luma_plane_len() + (y / 2) * desc.chroma_bytes_per_row() + (x / 2) * 2;
    (luma, data[chroma], data[chroma + 1])
}

fn triplanar(data: &[u8], desc: &FrameDescriptor, x: usize, y: usize) -> (u8, u8, u8) {
    let luma = data[y * desc.bytes_per_row + x];
    let plane_len = desc.chroma_bytes_per_row() * desc.chroma_rows();
    let offset = (y / 2) * desc.chroma_bytes_per_row() + x / 2;
    let cb = desc.luma_plane_len() + offset;
    (luma, data[cb], data[cb + plane_len])
}

/// ITU-R BT.601, luma 16..=235 and chroma 16..=240.
fn ycbcr_video_range(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = 1.164_383 * (y as f64 - 16.0);
    let d = cb as f64 - 128.0;
    let e = cr as f64 - 128.0;
    [
        clamp8(c + 1.596_027 * e),
        clamp8(c - 0.391_762 * d - 0.812_968 * e),
        clamp8(c + 2.017_232 * d),
    ]
}

/// ITU-R BT.601 full range (JPEG).
fn ycbcr_full_range(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = y as f64;
    let d = cb as f64 - 128.0;
    let e = cr as f64 - 128.0;
    [
        clamp8(c + 1.402 * e),
        clamp8(c - 0.344_136 * d - 0.714_136 * e),
        clamp8(c + 1.772 * d),
    ]
}

fn clamp8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Stateless decoder bound to one pixel format.
#[derive(Clone, Copy)]
pub struct PixelDecoder {
    format: PixelFormat,
    sample: Sampler,
}

impl std::fmt::Debug for PixelDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelDecoder").field("format", &self.format).finish()
    }
}

impl PixelDecoder {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            sample: sampler(format),
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Check a buffer against a descriptor without touching any pixel.
    pub fn validate(&self, desc: &FrameDescriptor, data: &[u8]) -> Result<(), FrameError> {
        if desc.format != self.format {
            return Err(FrameError::FormatMismatch {
                expected: self.format.tag(),
                got: desc.format.tag(),
            });
        }
        desc.validate(data.len())
    }

    /// Decode every pixel of `data` in raster order.
    pub fn decode<'a>(&self, desc: &FrameDescriptor, data: &'a [u8]) -> Result<DecodedFrame<'a>, FrameError> {
        self.validate(desc, data)?;
        Ok(DecodedFrame {
            data,
            desc: *desc,
            sample: self.sample,
            index: 0,
            total: desc.pixel_count(),
        })
    }
}

/// Iterator over the decoded pixels of one frame.
pub struct DecodedFrame<'a> {
    data: &'a [u8],
    desc: FrameDescriptor,
    sample: Sampler,
    index: usize,
    total: usize,
}

impl Iterator for DecodedFrame<'_> {
    type Item = DecodedPixel;

    fn next(&mut self) -> Option<DecodedPixel> {
        if self.index >= self.total {
            return None;
        }
        let width = self.desc.width as usize;
        let (x, y) = (self.index % width, self.index / width);
        self.index += 1;
        Some(DecodedPixel::from_rgb8((self.sample)(self.data, &self.desc, x, y)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DecodedFrame<'_> {}
