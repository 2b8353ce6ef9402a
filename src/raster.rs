//! Headless rasterization of overlay frames into RGBA images.

use image::{imageops, DynamicImage, Rgba as Pixel, RgbaImage};
use std::path::Path;
use tracing::{debug, info};

use crate::coordinate_mapping::SurfaceRect;
use crate::error::{LedgerError, LedgerResult};
use crate::overlay::{Background, OverlayFrame, Rgba};

/// Draw `frame` at the surface's physical resolution. `page_image` is the
/// decoded background for `Background::PageImage`; it is ignored for
/// placeholder frames.
pub fn rasterize(frame: &OverlayFrame, page_image: Option<&DynamicImage>) -> RgbaImage {
    let (width, height) = frame.geometry.physical_size();
    let scale = frame.geometry.draw_scale();

    let mut canvas = match (&frame.background, page_image) {
        (Background::PageImage { .. }, Some(image)) => {
            imageops::resize(&image.to_rgba8(), width, height, imageops::FilterType::Triangle)
        }
        (Background::Placeholder { fill, message, .. }, _) => {
            // No font rasterizer in the headless path; the message goes to the log
            info!("Page {}: {}", frame.page, message);
            RgbaImage::from_pixel(width, height, opaque(*fill))
        }
        (Background::PageImage { page }, None) => {
            debug!("No decoded image supplied for page {}, using blank background", page);
            RgbaImage::from_pixel(width, height, Pixel([255, 255, 255, 255]))
        }
    };

    for highlight in &frame.highlights {
        fill_rounded_rect(
            &mut canvas,
            &highlight.rect.scaled(scale),
            highlight.corner_radius * scale,
            highlight.fill(),
        );
    }

    canvas
}

pub fn save_png(canvas: &RgbaImage, path: &Path) -> LedgerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::file_io(parent.display().to_string(), e))?;
    }
    canvas
        .save(path)
        .map_err(|e| LedgerError::resource(path.display().to_string(), e.to_string()))?;
    info!("Wrote overlay image {}", path.display());
    Ok(())
}

fn opaque(color: Rgba) -> Pixel<u8> {
    Pixel([color.r, color.g, color.b, 255])
}

/// Source-over blend of a rounded rectangle given in physical pixels
fn fill_rounded_rect(canvas: &mut RgbaImage, rect: &SurfaceRect, radius: f32, color: Rgba) {
    let (width, height) = canvas.dimensions();
    let left = rect.left.min(rect.right).max(0.0).floor() as u32;
    let top = rect.top.min(rect.bottom).max(0.0).floor() as u32;
    let right = (rect.left.max(rect.right).ceil() as u32).min(width);
    let bottom = (rect.top.max(rect.bottom).ceil() as u32).min(height);

    for y in top..bottom {
        for x in left..right {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            if inside_rounded(rect, radius, px, py) {
                blend(canvas.get_pixel_mut(x, y), color);
            }
        }
    }
}

fn inside_rounded(rect: &SurfaceRect, radius: f32, x: f32, y: f32) -> bool {
    if !rect.contains(x, y) {
        return false;
    }
    let cx = x.clamp(rect.left + radius, rect.right - radius);
    let cy = y.clamp(rect.top + radius, rect.bottom - radius);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

fn blend(pixel: &mut Pixel<u8>, color: Rgba) {
    let alpha = color.a.clamp(0.0, 1.0);
    let mix = |dst: u8, src: u8| (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8;
    let [r, g, b, a] = pixel.0;
    let out_alpha = (alpha * 255.0 + a as f32 * (1.0 - alpha)).round() as u8;
    *pixel = Pixel([mix(r, color.r), mix(g, color.g), mix(b, color.b), out_alpha]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate_mapping::SurfaceGeometry;
    use crate::overlay::{TokenHighlight, TokenState, PLACEHOLDER_FILL, PLACEHOLDER_TEXT};

    fn frame_with(highlights: Vec<TokenHighlight>, zoom: f32) -> OverlayFrame {
        OverlayFrame {
            page: 0,
            geometry: SurfaceGeometry::new(100.0, 50.0, 1.0, zoom),
            background: Background::PageImage { page: 0 },
            highlights,
        }
    }

    #[test]
    fn test_canvas_matches_physical_size() {
        let canvas = rasterize(&frame_with(Vec::new(), 2.0), None);
        assert_eq!(canvas.dimensions(), (200, 100));
    }

    #[test]
    fn test_highlight_blends_over_background() {
        let highlight = TokenHighlight {
            token_id: "1".into(),
            rect: SurfaceRect { left: 10.0, top: 10.0, right: 40.0, bottom: 30.0 },
            corner_radius: 10.0,
            state: TokenState::Highlighted,
        };
        let background = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 50, Pixel([0, 0, 0, 255])));
        let canvas = rasterize(&frame_with(vec![highlight], 1.0), Some(&background));

        // centre of the box: half gold over black
        let centre = canvas.get_pixel(25, 20).0;
        assert_eq!(&centre[..3], &[128, 108, 0]);
        // rounded corner stays untouched
        assert_eq!(canvas.get_pixel(10, 10).0, [0, 0, 0, 255]);
        // outside the box
        assert_eq!(canvas.get_pixel(60, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_placeholder_fills_surface() {
        let frame = OverlayFrame {
            page: 3,
            geometry: SurfaceGeometry::new(20.0, 20.0, 1.0, 1.0),
            background: Background::Placeholder {
                fill: PLACEHOLDER_FILL,
                text_color: PLACEHOLDER_TEXT,
                message: "Image unavailable".into(),
            },
            highlights: Vec::new(),
        };
        let canvas = rasterize(&frame, None);
        assert!(canvas.pixels().all(|p| p.0 == [240, 240, 240, 255]));
    }

    #[test]
    fn test_save_png_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/page0.png");
        save_png(&RgbaImage::new(4, 4), &path).unwrap();
        assert!(path.exists());
    }
}
