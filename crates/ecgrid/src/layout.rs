//! Named paper layouts and lead-region tiling.
//!
//! The supported layouts are a fixed vocabulary; an unknown name is a
//! configuration error, never silently remapped. Tiling is integer
//! row-major with a proportional per-cell margin, so regions never
//! overlap and their union covers the content box up to margins.

use std::fmt;
use std::str::FromStr;

use crate::calib::ContentBBox;
use crate::error::AnalyzeError;
use crate::lead::{Lead, STANDARD_12};

/// Fraction of page height reserved for the rhythm strip in `3x4+rhythm`.
const RHYTHM_STRIP_FRACTION: f64 = 0.15;

/// Known paper layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperLayout {
    /// 3 rows x 4 columns, standard ordering.
    ThreeByFour,
    /// Two stacked 1x6 bands: frontal leads on top, precordials below.
    SixByTwo,
    /// 3x4 over the top 85% plus a full-width lead-II rhythm strip.
    ThreeByFourRhythm,
}

/// Fixed priority order used when auto-selecting a layout.
pub const LAYOUT_PRIORITY: [PaperLayout; 3] = [
    PaperLayout::ThreeByFour,
    PaperLayout::SixByTwo,
    PaperLayout::ThreeByFourRhythm,
];

impl PaperLayout {
    pub fn name(&self) -> &'static str {
        match self {
            PaperLayout::ThreeByFour => "3x4",
            PaperLayout::SixByTwo => "6x2",
            PaperLayout::ThreeByFourRhythm => "3x4+rhythm",
        }
    }
}

impl fmt::Display for PaperLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperLayout {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3x4" => Ok(PaperLayout::ThreeByFour),
            "6x2" => Ok(PaperLayout::SixByTwo),
            "3x4+rhythm" => Ok(PaperLayout::ThreeByFourRhythm),
            other => Err(AnalyzeError::UnknownLayout(other.to_string())),
        }
    }
}

impl serde::Serialize for PaperLayout {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for PaperLayout {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One named lead and its rectangle on the page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeadRegion {
    pub lead: Lead,
    pub bbox: ContentBBox,
}

/// Tile `bbox` into `rows x cols` cells, each inset by a proportional margin.
fn grid_cells(bbox: &ContentBBox, rows: u32, cols: u32, margin: f64) -> Vec<ContentBBox> {
    let w = bbox.width() as u64;
    let h = bbox.height() as u64;
    let mx = (margin * w as f64) as u64;
    let my = (margin * h as f64) as u64;
    let mut cells = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows as u64 {
        for c in 0..cols as u64 {
            let cx0 = bbox.x0 as u64 + c * w / cols as u64 + mx;
            let cx1 = (bbox.x0 as u64 + (c + 1) * w / cols as u64).saturating_sub(mx);
            let cy0 = bbox.y0 as u64 + r * h / rows as u64 + my;
            let cy1 = (bbox.y0 as u64 + (r + 1) * h / rows as u64).saturating_sub(my);
            cells.push(ContentBBox {
                x0: cx0 as u32,
                y0: cy0 as u32,
                x1: cx1.max(cx0) as u32,
                y1: cy1.max(cy0) as u32,
            });
        }
    }
    cells
}

/// Partition the content box into named lead regions for `layout`.
///
/// `margin` is the proportional inset applied inside every cell
/// (default 0.02 through [`crate::AnalyzeConfig`]).
pub fn segment_layout(bbox: &ContentBBox, layout: PaperLayout, margin: f64) -> Vec<LeadRegion> {
    match layout {
        PaperLayout::ThreeByFour => STANDARD_12
            .iter()
            .zip(grid_cells(bbox, 3, 4, margin))
            .map(|(&lead, bbox)| LeadRegion { lead, bbox })
            .collect(),
        PaperLayout::SixByTwo => {
            let mid = bbox.y0 + bbox.height() / 2;
            let top = ContentBBox {
                x0: bbox.x0,
                y0: bbox.y0,
                x1: bbox.x1,
                y1: mid,
            };
            let bottom = ContentBBox {
                x0: bbox.x0,
                y0: mid,
                x1: bbox.x1,
                y1: bbox.y1,
            };
            let cells = grid_cells(&top, 1, 6, margin)
                .into_iter()
                .chain(grid_cells(&bottom, 1, 6, margin));
            STANDARD_12
                .iter()
                .zip(cells)
                .map(|(&lead, bbox)| LeadRegion { lead, bbox })
                .collect()
        }
        PaperLayout::ThreeByFourRhythm => {
            let base_h = ((bbox.height() as f64) * (1.0 - RHYTHM_STRIP_FRACTION)) as u32;
            let base = ContentBBox {
                x0: bbox.x0,
                y0: bbox.y0,
                x1: bbox.x1,
                y1: bbox.y0 + base_h,
            };
            let mut regions: Vec<LeadRegion> = STANDARD_12
                .iter()
                .zip(grid_cells(&base, 3, 4, margin))
                .map(|(&lead, bbox)| LeadRegion { lead, bbox })
                .collect();
            regions.push(LeadRegion {
                lead: Lead::IIRhythm,
                bbox: ContentBBox {
                    x0: bbox.x0,
                    y0: bbox.y0 + base_h,
                    x1: bbox.x1,
                    y1: bbox.y1,
                },
            });
            regions
        }
    }
}
