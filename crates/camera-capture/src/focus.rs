//! Touch-to-focus area mapping

use crate::params::{CameraArea, Rect};
use crate::CameraError;

/// Edge length in surface pixels of the square focused around a tap
pub const FOCUS_AREA_EDGE_LENGTH: f32 = 100.0;

/// Weight given to a tap-derived focus area
pub const FOCUS_AREA_WEIGHT: i32 = 1000;

const AREA_MIN: i32 = -1000;
const AREA_MAX: i32 = 1000;

/// Map a surface-relative tap into the driver's focus-area space.
///
/// A square of [`FOCUS_AREA_EDGE_LENGTH`] pixels centred on the tap is
/// clipped to the surface and scaled into -1000..=1000 on both axes.
pub fn focus_area_from_touch(
    x: f32,
    y: f32,
    surface_width: u32,
    surface_height: u32,
) -> Result<CameraArea, CameraError> {
    if surface_width == 0 || surface_height == 0 {
        return Err(CameraError::FocusArea(format!(
            "surface has no area ({}x{})",
            surface_width, surface_height
        )));
    }
    if !x.is_finite() || !y.is_finite() {
        return Err(CameraError::FocusArea(format!("touch at ({}, {}) is not finite", x, y)));
    }

    let (w, h) = (surface_width as f32, surface_height as f32);
    let half = FOCUS_AREA_EDGE_LENGTH / 2.0;
    let left = (x - half).clamp(0.0, w);
    let right = (x + half).clamp(0.0, w);
    let top = (y - half).clamp(0.0, h);
    let bottom = (y + half).clamp(0.0, h);

    Ok(CameraArea {
        rect: Rect {
            left: to_area_space(left, w),
            top: to_area_space(top, h),
            right: to_area_space(right, w),
            bottom: to_area_space(bottom, h),
        },
        weight: FOCUS_AREA_WEIGHT,
    })
}

fn to_area_space(value: f32, extent: f32) -> i32 {
    let scaled = (value / extent * 2000.0 - 1000.0).round() as i32;
    scaled.clamp(AREA_MIN, AREA_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_tap_maps_to_origin() {
        let area = focus_area_from_touch(500.0, 500.0, 1000, 1000).unwrap();
        assert_eq!(
            area.rect,
            Rect {
                left: -100,
                top: -100,
                right: 100,
                bottom: 100
            }
        );
        assert_eq!(area.weight, FOCUS_AREA_WEIGHT);
    }

    #[test]
    fn test_corner_tap_is_clipped() {
        let area = focus_area_from_touch(0.0, 0.0, 1000, 2000).unwrap();
        assert_eq!(area.rect.left, -1000);
        assert_eq!(area.rect.top, -1000);
        assert_eq!(area.rect.right, -900);
        assert_eq!(area.rect.bottom, -950);
    }

    #[test]
    fn test_empty_surface_is_an_error() {
        assert!(matches!(
            focus_area_from_touch(10.0, 10.0, 0, 480),
            Err(CameraError::FocusArea(_))
        ));
    }
}
