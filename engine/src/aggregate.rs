use std::path::Path;

use image::RgbImage;

use crate::decode::DecodedPixel;

/// Per-position running mean (and variance) of every frame seen.
///
/// After `n` frames, `mean_at(p)` is the arithmetic mean of the `n` values at
/// position `p`, on the 8-bit scale.
#[derive(Debug, Clone)]
pub struct AggregateImage {
    width: u32,
    height: u32,
    frames: u64,
    mean: Vec<[f64; 3]>,
    m2: Vec<[f64; 3]>,
}

impl AggregateImage {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            frames: 0,
            mean: vec![[0.0; 3]; len],
            m2: vec![[0.0; 3]; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Start folding a new frame. Follow with one [`accumulate`](Self::accumulate)
    /// per pixel position.
    pub fn begin_frame(&mut self) {
        self.frames += 1;
    }

    pub fn accumulate(&mut self, index: usize, pixel: &DecodedPixel) {
        let (Some(mean), Some(m2)) = (self.mean.get_mut(index), self.m2.get_mut(index)) else {
            return;
        };
        let n = self.frames.max(1) as f64;
        for (c, x) in pixel.levels().into_iter().enumerate() {
            let delta = x - mean[c];
            mean[c] += delta / n;
            m2[c] += delta * (x - mean[c]);
        }
    }

    pub fn mean_at(&self, index: usize) -> Option<[f64; 3]> {
        self.mean.get(index).copied()
    }

    /// Population variance per channel at one position.
    pub fn variance_at(&self, index: usize) -> Option<[f64; 3]> {
        let n = self.frames.max(1) as f64;
        self.m2.get(index).map(|m2| m2.map(|v| (v / n).max(0.0)))
    }

    /// Mean image, rounded to RGB8.
    pub fn mean_view(&self) -> AggregateView {
        let pixels = self
            .mean
            .iter()
            .flat_map(|rgb| rgb.map(to_u8))
            .collect();
        AggregateView {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Per-channel standard deviation image, clamped to RGB8.
    pub fn variance_view(&self) -> AggregateView {
        let n = self.frames.max(1) as f64;
        let pixels = self
            .m2
            .iter()
            .flat_map(|m2| m2.map(|v| to_u8((v / n).max(0.0).sqrt())))
            .collect();
        AggregateView {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

fn to_u8(level: f64) -> u8 {
    level.round().clamp(0.0, 255.0) as u8
}

/// An RGB8 snapshot of the aggregate buffer, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateView {
    pub width: u32,
    pub height: u32,
    /// Row-major, 3 bytes per pixel.
    pub pixels: Vec<u8>,
}

impl AggregateView {
    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
    }

    /// Encode to `path`. The image format follows the file extension.
    pub fn save(self, path: &Path) -> image::ImageResult<()> {
        let (width, height) = (self.width, self.height);
        let image = self.into_image().ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        tracing::debug!(path = %path.display(), width, height, "saving aggregate image");
        image.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: &[[u8; 3]]) -> Vec<DecodedPixel> {
        values.iter().map(|v| DecodedPixel::from_rgb8(*v)).collect()
    }

    fn fold(aggregate: &mut AggregateImage, pixels: Vec<DecodedPixel>) {
        aggregate.begin_frame();
        for (index, pixel) in pixels.iter().enumerate() {
            aggregate.accumulate(index, pixel);
        }
    }

    #[test]
    fn mean_equals_batch_mean() {
        let frames = [
            [[0, 10, 20], [255, 0, 3]],
            [[10, 10, 20], [0, 0, 4]],
            [[20, 40, 20], [255, 1, 5]],
        ];
        let mut aggregate = AggregateImage::new(2, 1);
        for f in &frames {
            fold(&mut aggregate, frame(f));
        }
        assert_eq!(aggregate.frame_count(), 3);

        for pos in 0..2 {
            let mean = aggregate.mean_at(pos).unwrap();
            for c in 0..3 {
                let batch: f64 = frames.iter().map(|f| f[pos][c] as f64).sum::<f64>() / 3.0;
                assert!((mean[c] - batch).abs() < 1e-9, "pos {pos} channel {c}");
            }
        }
        let variance = aggregate.variance_at(0).unwrap();
        assert!((variance[0] - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(variance[2], 0.0);
    }

    #[test]
    fn views_round_to_rgb8() {
        let mut aggregate = AggregateImage::new(1, 1);
        fold(&mut aggregate, frame(&[[0, 0, 100]]));
        fold(&mut aggregate, frame(&[[255, 4, 100]]));

        let mean = aggregate.mean_view();
        assert_eq!((mean.width, mean.height), (1, 1));
        assert_eq!(mean.pixels, vec![128, 2, 100]);

        let spread = aggregate.variance_view();
        assert_eq!(spread.pixels, vec![128, 2, 0]);
    }

    #[test]
    fn view_converts_to_image() {
        let mut aggregate = AggregateImage::new(2, 2);
        fold(&mut aggregate, frame(&[[1, 2, 3]; 4]));
        let image = aggregate.mean_view().into_image().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [1, 2, 3]);
    }
}
