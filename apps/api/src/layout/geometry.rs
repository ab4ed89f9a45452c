//! Physical page geometry shared by the preview sandbox and the PDF export.
//!
//! Everything that sizes a sheet (shell CSS, scale measurements, print options)
//! reads the same [`PAGE_GEOMETRY`] constant so the three rendering contexts agree.

use serde::Serialize;

/// CSS reference pixels per inch.
pub const CSS_PX_PER_INCH: f64 = 96.0;
pub const MM_PER_INCH: f64 = 25.4;

/// A fixed physical page format, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Name understood by the CSS `@page { size }` descriptor.
    pub name: &'static str,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// A4 portrait, the only supported sheet.
pub const PAGE_GEOMETRY: PageGeometry = PageGeometry {
    name: "A4",
    width_mm: 210.0,
    height_mm: 297.0,
};

impl PageGeometry {
    pub fn width_px(&self) -> f64 {
        mm_to_px(self.width_mm)
    }

    pub fn height_px(&self) -> f64 {
        mm_to_px(self.height_mm)
    }

    pub fn width_in(&self) -> f64 {
        self.width_mm / MM_PER_INCH
    }

    pub fn height_in(&self) -> f64 {
        self.height_mm / MM_PER_INCH
    }

    /// `210mm`
    pub fn css_width(&self) -> String {
        format!("{}mm", self.width_mm)
    }

    /// `297mm`
    pub fn css_height(&self) -> String {
        format!("{}mm", self.height_mm)
    }

    /// Value for `@page { size: ... }`.
    pub fn css_page_size(&self) -> String {
        format!("{} portrait", self.name)
    }

    /// Number of pages a sheet of `content_height_px` spills over (vertical growth only).
    pub fn pages_for_height(&self, content_height_px: f64) -> u32 {
        if !content_height_px.is_finite() || content_height_px <= 0.0 {
            return 1;
        }
        (content_height_px / self.height_px()).ceil().max(1.0) as u32
    }
}

pub fn mm_to_px(mm: f64) -> f64 {
    mm / MM_PER_INCH * CSS_PX_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_css_lengths() {
        assert_eq!(PAGE_GEOMETRY.css_width(), "210mm");
        assert_eq!(PAGE_GEOMETRY.css_height(), "297mm");
        assert_eq!(PAGE_GEOMETRY.css_page_size(), "A4 portrait");
    }

    #[test]
    fn test_a4_pixel_and_inch_sizes() {
        // 210mm at 96dpi ≈ 793.7px, 297mm ≈ 1122.5px
        assert!((PAGE_GEOMETRY.width_px() - 793.700_787).abs() < 1e-3);
        assert!((PAGE_GEOMETRY.height_px() - 1122.519_685).abs() < 1e-3);
        assert!((PAGE_GEOMETRY.width_in() - 8.267_716).abs() < 1e-5);
        assert!((PAGE_GEOMETRY.height_in() - 11.692_913).abs() < 1e-5);
    }

    #[test]
    fn test_pages_for_height_grows_vertically() {
        let page = PAGE_GEOMETRY.height_px();
        assert_eq!(PAGE_GEOMETRY.pages_for_height(0.0), 1);
        assert_eq!(PAGE_GEOMETRY.pages_for_height(page * 0.5), 1);
        assert_eq!(PAGE_GEOMETRY.pages_for_height(page), 1);
        assert_eq!(PAGE_GEOMETRY.pages_for_height(page + 1.0), 2);
        assert_eq!(PAGE_GEOMETRY.pages_for_height(f64::NAN), 1);
    }
}
