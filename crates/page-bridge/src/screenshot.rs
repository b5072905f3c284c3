//! Full-page screenshot stitching (spec.md §4.2 step list). The slice plan
//! and output canvas sizing are pure geometry and fully native-testable;
//! actually capturing each slice and drawing it onto a canvas requires
//! `web_sys` and lives behind the `wasm32` bindings module.

/// One viewport-height slice to capture while walking down the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub scroll_y: f64,
    pub height: f64,
}

/// Plan the sequence of scroll positions to visit (step i) and capture at
/// in order to cover `page_height` in `viewport_height`-tall slices. The
/// final slice is clipped to the remaining page height so the stitched
/// canvas never exceeds `page_height`.
#[must_use]
pub fn plan_slices(page_height: f64, viewport_height: f64) -> Vec<Slice> {
    if viewport_height <= 0.0 || page_height <= 0.0 {
        return Vec::new();
    }
    let mut slices = Vec::new();
    let mut y = 0.0;
    while y < page_height {
        let remaining = page_height - y;
        let height = remaining.min(viewport_height);
        slices.push(Slice { scroll_y: y, height });
        y += viewport_height;
    }
    slices
}

/// The pixel dimensions of the canvas the stitched slices are drawn onto,
/// accounting for device pixel ratio (spec.md §4.2: "stitches slices...
/// accounting for device pixel ratio").
#[must_use]
pub fn canvas_size(
    viewport_width: f64,
    page_height: f64,
    device_pixel_ratio: f64,
) -> (u32, u32) {
    let width = (viewport_width * device_pixel_ratio).round().max(1.0) as u32;
    let height = (page_height * device_pixel_ratio).round().max(1.0) as u32;
    (width, height)
}

/// Where slice `index`'s capture should be drawn on the stitched canvas,
/// in device pixels.
#[must_use]
pub fn draw_offset(slice: &Slice, device_pixel_ratio: f64) -> (f64, f64) {
    (0.0, slice.scroll_y * device_pixel_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_exact_multiple_of_viewport_height() {
        let slices = plan_slices(2160.0, 720.0);
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.height == 720.0));
    }

    #[test]
    fn plan_clips_final_slice_to_remaining_height() {
        let slices = plan_slices(1000.0, 720.0);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].height, 720.0);
        assert_eq!(slices[1].height, 280.0);
        assert_eq!(slices[1].scroll_y, 720.0);
    }

    #[test]
    fn plan_empty_for_non_positive_dimensions() {
        assert!(plan_slices(0.0, 720.0).is_empty());
        assert!(plan_slices(1000.0, 0.0).is_empty());
    }

    #[test]
    fn canvas_size_scales_by_device_pixel_ratio() {
        let (w, h) = canvas_size(1280.0, 2160.0, 2.0);
        assert_eq!(w, 2560);
        assert_eq!(h, 4320);
    }

    #[test]
    fn draw_offset_tracks_scroll_position_scaled_by_dpr() {
        let slice = Slice {
            scroll_y: 720.0,
            height: 720.0,
        };
        assert_eq!(draw_offset(&slice, 2.0), (0.0, 1440.0));
    }
}
