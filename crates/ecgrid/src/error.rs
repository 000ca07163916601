//! Configuration-level failures.
//!
//! Degraded inputs (no grid, no beats, missing boundaries) are expressed
//! in the result data model instead; only caller mistakes surface here.

use crate::lead::Lead;

/// Errors reported to the caller for invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzeError {
    /// Layout name outside the supported vocabulary.
    #[error("unsupported layout: {0:?} (expected one of \"3x4\", \"6x2\", \"3x4+rhythm\")")]
    UnknownLayout(String),

    /// Requested anchor lead (and every configured fallback) is absent
    /// from the segmented regions.
    #[error("anchor lead {requested} not present in layout; fallbacks tried: {fallbacks_tried:?}")]
    AnchorLeadMissing {
        requested: Lead,
        fallbacks_tried: Vec<Lead>,
    },

    /// Zero-sized input image.
    #[error("input image has zero width or height")]
    EmptyImage,
}
