//! Render projection: placements to draw calls.
//!
//! A pure function of (visible row range, layer) over the store; the only
//! state it reads is the placement set and the decoded bitmaps. Drawing
//! goes through the [`DrawSurface`] seam so the GPU pipeline (and tests)
//! can supply their own implementations.
//!
//! Layering follows the z-index sign: negative z renders in the
//! below-text pass, everything else in the above-text pass. Within a
//! pass, placements draw in ascending z order so higher layers land on
//! top.

use crate::codec::Bitmap;
use crate::store::{ImageStore, Placement};
use crate::CellMetrics;

/// A rectangle in pixel coordinates. Destination rectangles are relative
/// to the viewport origin and may extend past its edges; the surface is
/// expected to clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The visible slice of the scrollback buffer.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    /// Buffer row currently shown at the top of the screen.
    pub top_row: i64,
    /// Number of visible rows.
    pub rows: u32,
    /// Cell size in pixels.
    pub cell: CellMetrics,
}

/// Drawing seam implemented by the GPU renderer (or a test recorder).
pub trait DrawSurface {
    /// Draw `src` from the bitmap into `dest` on screen, scaling as
    /// needed. `image_id` identifies the bitmap for texture caching.
    fn draw_image(&mut self, image_id: u32, bitmap: &Bitmap, src: PixelRect, dest: PixelRect);
}

/// Draw every visible placement with a negative z-index (under text).
pub fn render_below_text(store: &ImageStore, viewport: &Viewport, surface: &mut dyn DrawSurface) {
    render_layer(store, viewport, surface, true);
}

/// Draw every visible placement with a z-index of zero or above.
pub fn render_above_text(store: &ImageStore, viewport: &Viewport, surface: &mut dyn DrawSurface) {
    render_layer(store, viewport, surface, false);
}

fn render_layer(
    store: &ImageStore,
    viewport: &Viewport,
    surface: &mut dyn DrawSurface,
    below_text: bool,
) {
    let end_row = viewport.top_row + i64::from(viewport.rows.max(1)) - 1;
    let mut visible = store.placements_in_range(viewport.top_row, end_row);
    visible.retain(|p| (p.z_index < 0) == below_text);
    // Ascending z; ties break on identity so output order is stable.
    visible.sort_by_key(|p| (p.z_index, p.image_id, p.placement_id));

    for placement in visible {
        let Some(image) = store.peek_image(placement.image_id) else {
            continue;
        };
        // No decoded pixels yet (or decode failed): skip, not an error.
        let Some(bitmap) = image.bitmap.as_ref() else {
            continue;
        };
        let src = source_rect(placement, bitmap);
        let dest = dest_rect(placement, viewport);
        surface.draw_image(placement.image_id, bitmap, src, dest);
    }
}

fn source_rect(placement: &Placement, bitmap: &Bitmap) -> PixelRect {
    let crop = placement.crop;
    let width = if crop.width == 0 {
        bitmap.width.saturating_sub(crop.x)
    } else {
        crop.width.min(bitmap.width.saturating_sub(crop.x))
    };
    let height = if crop.height == 0 {
        bitmap.height.saturating_sub(crop.y)
    } else {
        crop.height.min(bitmap.height.saturating_sub(crop.y))
    };
    PixelRect {
        x: crop.x as i32,
        y: crop.y as i32,
        width,
        height,
    }
}

fn dest_rect(placement: &Placement, viewport: &Viewport) -> PixelRect {
    let cell = viewport.cell;
    let screen_row = placement.row - viewport.top_row;
    let x = i64::from(placement.col) * i64::from(cell.width) + i64::from(placement.x_offset);
    let y = screen_row * i64::from(cell.height) + i64::from(placement.y_offset);
    PixelRect {
        x: x as i32,
        y: y as i32,
        width: placement.cols * cell.width,
        height: placement.rows * cell.height,
    }
}
