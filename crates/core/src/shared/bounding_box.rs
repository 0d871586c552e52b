use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_CROP_HEIGHT_SCALE, DEFAULT_CROP_WIDTH_SCALE};

/// A face bounding box in source-frame pixel coordinates.
///
/// `(x, y)` is the top-left corner. Coordinates are fractional because the
/// recognition model reports sub-pixel boxes; rounding is left to whoever
/// rasterises the crop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Pixel dimensions of the source video frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Scale factors applied to a face box when cutting the representative
/// thumbnail. Heads are taller than the detected face, hence the larger
/// vertical factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropExpansion {
    pub width_scale: f64,
    pub height_scale: f64,
}

impl Default for CropExpansion {
    fn default() -> Self {
        Self {
            width_scale: DEFAULT_CROP_WIDTH_SCALE,
            height_scale: DEFAULT_CROP_HEIGHT_SCALE,
        }
    }
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box area; negative extents count as zero.
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Scales the box around its own center.
    pub fn expanded(&self, expansion: CropExpansion) -> BoundingBox {
        let (cx, cy) = self.center();
        let width = self.width * expansion.width_scale;
        let height = self.height * expansion.height_scale;
        BoundingBox {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Clips the box to `[0, frame.width] × [0, frame.height]`.
    ///
    /// Without a known frame size only the lower bound at 0 is applied.
    pub fn clamped(&self, frame: Option<FrameSize>) -> BoundingBox {
        let (max_x, max_y) = frame
            .map(|f| (f.width as f64, f.height as f64))
            .unwrap_or((f64::INFINITY, f64::INFINITY));

        let x1 = self.x.clamp(0.0, max_x);
        let y1 = self.y.clamp(0.0, max_y);
        let x2 = (self.x + self.width).clamp(0.0, max_x);
        let y2 = (self.y + self.height).clamp(0.0, max_y);

        BoundingBox {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        }
    }

    /// Crop rectangle for the representative thumbnail: expanded around the
    /// face center, then clamped to the frame.
    pub fn crop_rect(&self, expansion: CropExpansion, frame: Option<FrameSize>) -> BoundingBox {
        self.expanded(expansion).clamped(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const FRAME: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    fn assert_box_eq(actual: BoundingBox, expected: BoundingBox) {
        assert_relative_eq!(actual.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(actual.y, expected.y, epsilon = 1e-9);
        assert_relative_eq!(actual.width, expected.width, epsilon = 1e-9);
        assert_relative_eq!(actual.height, expected.height, epsilon = 1e-9);
    }

    // ── Area ─────────────────────────────────────────────────────────

    #[rstest]
    #[case::square(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 100.0)]
    #[case::rectangle(BoundingBox::new(5.0, 5.0, 20.0, 15.0), 300.0)]
    #[case::zero_width(BoundingBox::new(0.0, 0.0, 0.0, 50.0), 0.0)]
    #[case::negative_height(BoundingBox::new(0.0, 0.0, 10.0, -4.0), 0.0)]
    fn test_area(#[case] bbox: BoundingBox, #[case] expected: f64) {
        assert_relative_eq!(bbox.area(), expected);
    }

    #[test]
    fn test_center() {
        let (cx, cy) = BoundingBox::new(10.0, 20.0, 40.0, 60.0).center();
        assert_relative_eq!(cx, 30.0);
        assert_relative_eq!(cy, 50.0);
    }

    // ── Crop geometry ────────────────────────────────────────────────

    #[test]
    fn test_expanded_keeps_center() {
        let bbox = BoundingBox::new(100.0, 100.0, 40.0, 40.0);
        let grown = bbox.expanded(CropExpansion::default());
        // 40 * 1.5 = 60 wide, 40 * 2.0 = 80 tall, centered on (120, 120)
        assert_box_eq(grown, BoundingBox::new(90.0, 80.0, 60.0, 80.0));
        let (cx, cy) = grown.center();
        assert_relative_eq!(cx, 120.0);
        assert_relative_eq!(cy, 120.0);
    }

    #[test]
    fn test_crop_rect_inside_frame_is_unclipped() {
        let bbox = BoundingBox::new(100.0, 100.0, 40.0, 40.0);
        let crop = bbox.crop_rect(CropExpansion::default(), Some(FRAME));
        assert_box_eq(crop, BoundingBox::new(90.0, 80.0, 60.0, 80.0));
    }

    #[test]
    fn test_crop_rect_clipped_at_top_left() {
        // Expanded: x=-10, y=-20, w=60, h=80 → clipped to [0,50]×[0,60]
        let bbox = BoundingBox::new(0.0, 0.0, 40.0, 40.0);
        let crop = bbox.crop_rect(CropExpansion::default(), Some(FRAME));
        assert_box_eq(crop, BoundingBox::new(0.0, 0.0, 50.0, 60.0));
    }

    #[test]
    fn test_crop_rect_clipped_at_bottom_right() {
        // Expanded: x=610, y=420, w=60, h=80 → clipped to [610,640]×[420,480]
        let bbox = BoundingBox::new(620.0, 440.0, 40.0, 40.0);
        let crop = bbox.crop_rect(CropExpansion::default(), Some(FRAME));
        assert_box_eq(crop, BoundingBox::new(610.0, 420.0, 30.0, 60.0));
    }

    #[test]
    fn test_crop_rect_without_frame_only_clamps_at_zero() {
        let bbox = BoundingBox::new(620.0, 0.0, 40.0, 40.0);
        let crop = bbox.crop_rect(CropExpansion::default(), None);
        assert_box_eq(crop, BoundingBox::new(610.0, 0.0, 60.0, 60.0));
    }

    #[test]
    fn test_crop_rect_custom_scales() {
        let bbox = BoundingBox::new(100.0, 100.0, 20.0, 20.0);
        let expansion = CropExpansion {
            width_scale: 1.0,
            height_scale: 1.0,
        };
        assert_box_eq(bbox.crop_rect(expansion, Some(FRAME)), bbox);
    }

    #[test]
    fn test_clamped_box_fully_outside_frame_is_empty() {
        let bbox = BoundingBox::new(700.0, 500.0, 10.0, 10.0);
        let clamped = bbox.clamped(Some(FRAME));
        assert_relative_eq!(clamped.area(), 0.0);
    }

    #[test]
    fn test_default_crop_expansion() {
        let expansion = CropExpansion::default();
        assert_relative_eq!(expansion.width_scale, 1.5);
        assert_relative_eq!(expansion.height_scale, 2.0);
    }
}
