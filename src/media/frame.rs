use image::{ImageBuffer, Rgb, RgbImage, imageops};

/// Stream-level metadata reported by the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoInfo {
    /// Frame rate used when the container does not report a usable one.
    pub const FALLBACK_FPS: f64 = 30.0;
    /// Inputs narrower than this are upscaled before analysis.
    pub const MIN_ANALYSIS_WIDTH: u32 = 720;

    pub fn new(width: u32, height: u32, fps: Option<f64>) -> Self {
        let fps = fps
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(Self::FALLBACK_FPS);
        Self { width, height, fps }
    }

    pub fn is_undersized(&self) -> bool {
        self.width < Self::MIN_ANALYSIS_WIDTH
    }

    /// Byte length of one packed BGR24 frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[derive(Debug, thiserror::Error)]
#[error("frame {index}: buffer of {actual} bytes does not hold {width}x{height} BGR24 pixels")]
pub struct FrameLayoutError {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub actual: usize,
}

/// One decoded picture in packed BGR24, as the codec layer produces and consumes it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            data,
        }
    }

    fn check_layout(&self) -> Result<(), FrameLayoutError> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(FrameLayoutError {
                index: self.index,
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// BGR -> RGB for the detector and the overlay renderer.
    pub fn to_rgb(&self) -> Result<RgbImage, FrameLayoutError> {
        self.check_layout()?;
        let mut rgb = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        RgbImage::from_raw(self.width, self.height, rgb).ok_or(FrameLayoutError {
            index: self.index,
            width: self.width,
            height: self.height,
            actual: self.data.len(),
        })
    }

    /// RGB -> BGR, keeping the ordinal of the frame it came from.
    pub fn from_rgb(index: u64, image: &RgbImage) -> Self {
        let mut data = Vec::with_capacity(image.as_raw().len());
        for px in image.as_raw().chunks_exact(3) {
            data.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        Self::new(index, image.width(), image.height(), data)
    }

    /// Bilinear resize. Channel order is irrelevant here, so the packed bytes are
    /// viewed as three-channel pixels as-is.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame, FrameLayoutError> {
        self.check_layout()?;
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(self.width, self.height, &self.data[..])
            .ok_or(FrameLayoutError {
                index: self.index,
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            })?;
        let out = imageops::resize(&view, width, height, imageops::FilterType::Triangle);
        Ok(Frame::new(self.index, width, height, out.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(index: u64, w: u32, h: u32, bgr: [u8; 3]) -> Frame {
        let data = bgr.iter().copied().cycle().take((w * h * 3) as usize).collect();
        Frame::new(index, w, h, data)
    }

    #[test]
    fn fps_falls_back_when_missing_or_zero() {
        assert_eq!(VideoInfo::new(640, 480, None).fps, 30.0);
        assert_eq!(VideoInfo::new(640, 480, Some(0.0)).fps, 30.0);
        assert_eq!(VideoInfo::new(640, 480, Some(f64::NAN)).fps, 30.0);
        assert_eq!(VideoInfo::new(640, 480, Some(25.0)).fps, 25.0);
    }

    #[test]
    fn undersized_threshold_is_exclusive() {
        assert!(VideoInfo::new(719, 400, None).is_undersized());
        assert!(!VideoInfo::new(720, 400, None).is_undersized());
    }

    #[test]
    fn rgb_conversion_swaps_channels() {
        let frame = solid(3, 2, 2, [10, 20, 30]);
        let rgb = frame.to_rgb().unwrap();
        assert_eq!(rgb.get_pixel(1, 1).0, [30, 20, 10]);

        let back = Frame::from_rgb(3, &rgb);
        assert_eq!(back.index, 3);
        assert_eq!(back.data, frame.data);
    }

    #[test]
    fn short_buffer_fails_conversion() {
        let frame = Frame::new(7, 4, 4, vec![0; 10]);
        let err = frame.to_rgb().unwrap_err();
        assert_eq!(err.index, 7);
        assert_eq!(err.actual, 10);
    }

    #[test]
    fn resize_produces_requested_canvas() {
        let frame = solid(0, 64, 36, [1, 2, 3]);
        let out = frame.resized(1280, 720).unwrap();
        assert_eq!((out.width, out.height), (1280, 720));
        assert_eq!(out.data.len(), 1280 * 720 * 3);
        assert_eq!(&out.data[..3], &[1, 2, 3]);
    }
}
