//! Burns the skeleton and the posture readout into a frame.

use super::landmarks::{Landmarks, POSE_CONNECTIONS};
use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use std::sync::LazyLock;
use tracing::warn;

pub const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const BONE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const JOINT_RADIUS: i32 = 3;
const BONE_THICKNESS: i32 = 2;

/// Left edge and baseline of the angle readout.
pub const LABEL_ORIGIN: (i32, i32) = (30, 50);
/// Pixel height of the readout glyphs.
pub const LABEL_SCALE: f32 = 32.0;

static LABEL_FONT: LazyLock<Option<FontRef<'static>>> = LazyLock::new(|| {
    match FontRef::try_from_slice(include_bytes!("../../assets/fonts/DejaVuSans.ttf")) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Overlay font unusable, angle readout disabled: {}", e);
            None
        }
    }
});

pub fn angle_label(angle: f64) -> String {
    format!("Angle: {:.2}", angle)
}

pub fn draw_skeleton(image: &mut RgbImage, landmarks: &Landmarks) {
    let (w, h) = image.dimensions();

    for (from, to) in POSE_CONNECTIONS.iter() {
        if let (Some(a), Some(b)) = (landmarks.get(*from), landmarks.get(*to)) {
            draw_bone(image, a.to_pixel(w, h), b.to_pixel(w, h));
        }
    }

    for (_, landmark) in landmarks.iter() {
        draw_filled_circle_mut(image, landmark.to_pixel(w, h), JOINT_RADIUS, JOINT_COLOR);
    }
}

pub fn draw_angle(image: &mut RgbImage, angle: f64) {
    let Some(font) = LABEL_FONT.as_ref() else {
        return;
    };

    let scale = PxScale::from(LABEL_SCALE);
    let ascent = font.as_scaled(scale).ascent().round() as i32;
    let (x, baseline) = LABEL_ORIGIN;
    draw_text_mut(
        image,
        LABEL_COLOR,
        x,
        baseline - ascent,
        scale,
        font,
        &angle_label(angle),
    );
}

/// One-pixel segments laid side by side across the bone's minor axis.
fn draw_bone(image: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) {
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    let half = BONE_THICKNESS / 2;

    for offset in -half..BONE_THICKNESS - half {
        let (ox, oy) = if steep { (offset, 0) } else { (0, offset) };
        draw_line_segment_mut(
            image,
            ((x0 + ox) as f32, (y0 + oy) as f32),
            ((x1 + ox) as f32, (y1 + oy) as f32),
            BONE_COLOR,
        );
    }
}
