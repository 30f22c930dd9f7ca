use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Decoded camera frame handed to the tracking stage.
///
/// Always RGBA, 8 bits per channel.
#[derive(Debug)]
pub struct FrameImage {
    pixels: RgbaImage,
}

impl FrameImage {
    pub const CHANNELS: u8 = 4;

    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn channels(&self) -> u8 {
        Self::CHANNELS
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Camera pose in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position (x, y, z)
    pub position: [i32; 3],

    /// Orientation angles (x, y, z)
    pub orientation: [f32; 3],
}

impl Pose {
    pub fn new(position: [i32; 3], orientation: [f32; 3]) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Output of one tracking call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingResult {
    pub pose: Pose,
    pub point_count: u32,
}
