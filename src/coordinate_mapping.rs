//! Mapping between document space (token boxes, page size) and the
//! drawing surface.
//!
//! Drawing happens in logical pixels. The surface is allocated at
//! `logical * device_pixel_ratio * zoom` physical pixels and every draw call
//! goes through a uniform `device_pixel_ratio * zoom` scale, so the
//! document → logical projection never depends on zoom or density. Zoom only
//! shows up in the surface resolution and in the inverse mapping of pointer
//! positions.

use crate::tokens::{BBox, PageSize, Token};

/// Axis-aligned rectangle in logical surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl SurfaceRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Inclusive on all edges
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn scaled(&self, factor: f32) -> SurfaceRect {
        SurfaceRect {
            left: self.left * factor,
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
        }
    }
}

/// Size and scale of the drawing surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub logical_width: f32,
    pub logical_height: f32,
    pub device_pixel_ratio: f32,
    pub zoom: f32,
}

impl SurfaceGeometry {
    pub fn new(logical_width: f32, logical_height: f32, device_pixel_ratio: f32, zoom: f32) -> Self {
        Self {
            logical_width,
            logical_height,
            device_pixel_ratio,
            zoom,
        }
    }

    /// Uniform scale applied to every logical draw call
    pub fn draw_scale(&self) -> f32 {
        self.device_pixel_ratio * self.zoom
    }

    /// Backing store size in physical pixels
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = self.draw_scale();
        (
            (self.logical_width * scale).round().max(1.0) as u32,
            (self.logical_height * scale).round().max(1.0) as u32,
        )
    }

    /// Project a document-space box onto the logical surface
    pub fn project(&self, bbox: &BBox, page: PageSize) -> SurfaceRect {
        project_bbox(bbox, page, self.logical_width, self.logical_height)
    }

    /// Pointer position as reported by the surface → logical pixels.
    /// The surface already reports density-independent units, so only the
    /// zoom factor is undone here.
    pub fn pointer_to_logical(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.zoom, y / self.zoom)
    }
}

/// `left = x0 / pdfWidth * logicalWidth`, and likewise for the other edges
pub fn project_bbox(bbox: &BBox, page: PageSize, logical_width: f32, logical_height: f32) -> SurfaceRect {
    SurfaceRect {
        left: bbox.x0 / page.width * logical_width,
        right: bbox.x1 / page.width * logical_width,
        top: bbox.y0 / page.height * logical_height,
        bottom: bbox.y1 / page.height * logical_height,
    }
}

/// First token in page order whose projected box contains the logical point.
/// Overlapping boxes resolve to the earlier token.
pub fn hit_test<'a>(
    tokens: &'a [Token],
    page: PageSize,
    geometry: &SurfaceGeometry,
    logical_x: f32,
    logical_y: f32,
) -> Option<&'a Token> {
    tokens.iter().find(|token| {
        let rect = geometry.project(&token.bbox, page);
        tracing::trace!(
            "Hit-test token {}: [{:.1}, {:.1}, {:.1}, {:.1}]",
            token.id,
            rect.left,
            rect.top,
            rect.right,
            rect.bottom
        );
        rect.contains(logical_x, logical_y)
    })
}
