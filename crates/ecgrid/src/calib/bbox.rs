//! Content bounding box: minimal rectangle enclosing non-background ink.

use image::GrayImage;

/// Half-open rectangle `[x0, x1) x [y0, y1)` in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentBBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl ContentBBox {
    /// Full-image rectangle.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Whether `other` overlaps this rectangle with nonzero area.
    pub fn intersects(&self, other: &ContentBBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// Minimal rectangle containing every pixel darker than `background_threshold`.
///
/// Degenerates to the full image when no such pixel exists.
pub fn find_content_bbox(gray: &GrayImage, background_threshold: u8) -> ContentBBox {
    let (w, h) = gray.dimensions();
    let mut x_min = u32::MAX;
    let mut x_max = 0u32;
    let mut y_min = u32::MAX;
    let mut y_max = 0u32;
    let mut found = false;

    for (x, y, p) in gray.enumerate_pixels() {
        if p[0] < background_threshold {
            found = true;
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    if !found {
        return ContentBBox::full(w, h);
    }
    ContentBBox {
        x0: x_min,
        y0: y_min,
        x1: x_max + 1,
        y1: y_max + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn finds_single_dark_block() {
        let mut img = GrayImage::from_pixel(100, 80, Luma([255]));
        for y in 10..20 {
            for x in 30..50 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let bb = find_content_bbox(&img, 250);
        assert_eq!(
            bb,
            ContentBBox {
                x0: 30,
                y0: 10,
                x1: 50,
                y1: 20
            }
        );
        assert_eq!(bb.area(), 200);
    }

    #[test]
    fn blank_image_degenerates_to_full() {
        let img = GrayImage::from_pixel(64, 32, Luma([255]));
        assert_eq!(find_content_bbox(&img, 250), ContentBBox::full(64, 32));
    }
}
