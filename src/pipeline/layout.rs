//! Image placement: fit one image inside a page's printable area.
//!
//! The image keeps its aspect ratio and is anchored at the top-left margin.
//! A single uniform scale factor is chosen so both edges fit:
//!
//! ```text
//! scale = min(printable_w / natural_w, printable_h / natural_h)
//! ```
//!
//! `natural_*` is the image's physical size at the configured pixel density.
//! Unless upscaling is allowed the factor is clamped to 1.0, so a small image
//! is placed at its natural size instead of being blown up to fill the page.

use crate::config::PageLayout;
use crate::error::LayoutError;

pub const MM_PER_INCH: f32 = 25.4;

/// PDF user-space units (points) per millimetre.
pub const PT_PER_MM: f32 = 72.0 / MM_PER_INCH;

/// Where an image lands on its page, in millimetres from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    /// Factor applied to the natural size.
    pub scale: f32,
}

impl Placement {
    /// Rectangle in PDF points with a bottom-left origin: `[x, y, width, height]`.
    pub fn pdf_rect(&self, layout: &PageLayout) -> [f32; 4] {
        let y_from_bottom = layout.height_mm - self.y_mm - self.height_mm;
        [
            self.x_mm * PT_PER_MM,
            y_from_bottom * PT_PER_MM,
            self.width_mm * PT_PER_MM,
            self.height_mm * PT_PER_MM,
        ]
    }
}

/// Compute the placement of a `width_px` × `height_px` image on `layout`.
pub fn fit_image(
    width_px: u32,
    height_px: u32,
    layout: &PageLayout,
    dpi: f32,
    allow_upscale: bool,
) -> Result<Placement, LayoutError> {
    if width_px == 0 || height_px == 0 {
        return Err(LayoutError::DegenerateImage {
            width: width_px,
            height: height_px,
        });
    }

    let max_w = layout.printable_width_mm();
    let max_h = layout.printable_height_mm();
    if max_w <= 0.0 || max_h <= 0.0 {
        return Err(LayoutError::NoPrintableArea {
            width_mm: layout.width_mm,
            height_mm: layout.height_mm,
            margin_mm: layout.margin_mm,
        });
    }

    let mm_per_px = MM_PER_INCH / dpi;
    let natural_w = width_px as f32 * mm_per_px;
    let natural_h = height_px as f32 * mm_per_px;

    let mut scale = (max_w / natural_w).min(max_h / natural_h);
    if !allow_upscale {
        scale = scale.min(1.0);
    }

    // Float rounding must never push an edge past the margin.
    let width_mm = (natural_w * scale).min(max_w);
    let height_mm = (natural_h * scale).min(max_h);

    Ok(Placement {
        x_mm: layout.margin_mm,
        y_mm: layout.margin_mm,
        width_mm,
        height_mm,
        scale,
    })
}
