//! Optional lead-label recognition inside the segmented regions.
//!
//! Labels are printed in the upper-left corner of each lead cell. Two
//! complementary paths feed the detection: normalized cross-correlation
//! against caller-supplied glyph templates, and an injected text
//! recognizer whose raw token is normalized and fuzzy-matched against the
//! twelve clinical names. Recognition never fails hard; an unreadable
//! label just stays `None`.

use image::imageops;
use image::GrayImage;
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};

use crate::layout::{LeadRegion, PaperLayout};
use crate::lead::{Lead, STANDARD_12};

/// Fraction of a lead cell (both axes) scanned for the printed label.
const LABEL_CORNER_FRACTION: f64 = 0.35;
/// Template score above which a recognizer token is not allowed to
/// override the template vote.
const TEMPLATE_TRUST: f32 = 0.6;
/// Minimum normalized similarity for a fuzzy token match.
const FUZZY_ACCEPT: f64 = 0.8;

/// Pluggable text recognizer over a label crop.
///
/// Returns the raw token and a confidence in `[0, 1]`, or `None` when
/// nothing legible is found.
pub trait LabelRecognizer {
    fn recognize(&self, crop: &GrayImage) -> Option<(String, f32)>;
}

/// Default recognizer: never reads anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecognizer;

impl LabelRecognizer for NoopRecognizer {
    fn recognize(&self, _crop: &GrayImage) -> Option<(String, f32)> {
        None
    }
}

/// Glyph-template bank, typically rendered at several sizes per lead.
#[derive(Debug, Clone, Default)]
pub struct TemplateRecognizer {
    templates: Vec<(Lead, Vec<GrayImage>)>,
}

impl TemplateRecognizer {
    pub fn new(templates: Vec<(Lead, Vec<GrayImage>)>) -> Self {
        Self { templates }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Best-scoring lead over all templates, by normalized
    /// cross-correlation maximum. Templates larger than the crop score 0.
    pub fn best_match(&self, crop: &GrayImage) -> Option<(Lead, f32)> {
        let mut best: Option<(Lead, f32)> = None;
        for (lead, glyphs) in &self.templates {
            for glyph in glyphs {
                if glyph.width() > crop.width()
                    || glyph.height() > crop.height()
                    || glyph.width() == 0
                    || glyph.height() == 0
                {
                    continue;
                }
                let res = match_template(
                    crop,
                    glyph,
                    MatchTemplateMethod::CrossCorrelationNormalized,
                );
                let score = res.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                if score.is_finite() && best.map_or(true, |(_, b)| score > b) {
                    best = Some((*lead, score));
                }
            }
        }
        best
    }
}

impl LabelRecognizer for TemplateRecognizer {
    fn recognize(&self, crop: &GrayImage) -> Option<(String, f32)> {
        self.best_match(crop)
            .map(|(lead, score)| (lead.name().to_string(), score))
    }
}

/// One label lookup result for a segmented region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDetection {
    /// Lead the layout assigned to this region.
    pub lead_hint: Lead,
    /// Lead actually read from the page, when legible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Lead>,
    pub score: f32,
}

/// Layout selection outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutChoice {
    pub layout: PaperLayout,
    /// Fraction of the first 12 regions whose label matched the layout's
    /// expected ordering.
    pub score: f64,
    pub labels: Vec<LabelDetection>,
}

/// Canonicalize a raw token: common glyph confusions become `I`,
/// whitespace is stripped.
pub fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'l' | '|' | '!' => 'I',
            other => other,
        })
        .collect()
}

/// Map a normalized token onto one of the twelve standard leads.
///
/// Exact case-insensitive matches win; otherwise the closest name by
/// normalized Levenshtein similarity, accepted at >= 0.8.
pub fn fuzzy_match_lead(token: &str) -> Option<Lead> {
    if token.is_empty() {
        return None;
    }
    for lead in STANDARD_12 {
        if token.eq_ignore_ascii_case(lead.name()) {
            return Some(lead);
        }
    }
    let upper = token.to_ascii_uppercase();
    let mut best: Option<(Lead, f64)> = None;
    for lead in STANDARD_12 {
        let sim = strsim::normalized_levenshtein(&upper, &lead.name().to_ascii_uppercase());
        if best.map_or(true, |(_, b)| sim > b) {
            best = Some((lead, sim));
        }
    }
    best.and_then(|(lead, sim)| (sim >= FUZZY_ACCEPT).then_some(lead))
}

fn label_crop(gray: &GrayImage, region: &LeadRegion) -> Option<GrayImage> {
    let b = &region.bbox;
    let w = ((b.width() as f64) * LABEL_CORNER_FRACTION) as u32;
    let h = ((b.height() as f64) * LABEL_CORNER_FRACTION) as u32;
    if w == 0 || h == 0 || b.x0 >= gray.width() || b.y0 >= gray.height() {
        return None;
    }
    let w = w.min(gray.width() - b.x0);
    let h = h.min(gray.height() - b.y0);
    Some(imageops::crop_imm(gray, b.x0, b.y0, w, h).to_image())
}

/// Read the label of every region.
///
/// The template vote is kept unless it is weak (< 0.6) and the text
/// recognizer produced a token that fuzzy-matches a lead name; such a
/// token is accepted at score 0.6.
pub fn identify_labels(
    gray: &GrayImage,
    regions: &[LeadRegion],
    templates: &TemplateRecognizer,
    recognizer: &dyn LabelRecognizer,
) -> Vec<LabelDetection> {
    regions
        .iter()
        .map(|region| {
            let Some(crop) = label_crop(gray, region) else {
                return LabelDetection {
                    lead_hint: region.lead,
                    label: None,
                    score: 0.0,
                };
            };
            let (mut label, mut score) = match templates.best_match(&crop) {
                Some((lead, s)) => (Some(lead), s),
                None => (None, 0.0),
            };
            if let Some((token, _)) = recognizer.recognize(&crop) {
                if let Some(lead) = fuzzy_match_lead(&normalize_token(&token)) {
                    if score < TEMPLATE_TRUST {
                        label = Some(lead);
                        score = score.max(TEMPLATE_TRUST);
                    }
                }
            }
            LabelDetection {
                lead_hint: region.lead,
                label,
                score,
            }
        })
        .collect()
}

/// Fraction of detections matching the standard ordering, over the first
/// 12 regions.
fn score_labels(labels: &[LabelDetection]) -> f64 {
    let total = labels.len().min(STANDARD_12.len());
    if total == 0 {
        return 0.0;
    }
    let ok = labels
        .iter()
        .zip(STANDARD_12)
        .filter(|(det, expected)| det.label == Some(*expected))
        .count();
    ok as f64 / total as f64
}

/// Pick the candidate layout whose detected labels best follow the
/// standard lead ordering. Ties keep the earlier candidate.
pub fn choose_layout(
    gray: &GrayImage,
    candidates: &[(PaperLayout, Vec<LeadRegion>)],
    templates: &TemplateRecognizer,
    recognizer: &dyn LabelRecognizer,
) -> Option<LayoutChoice> {
    let mut best: Option<LayoutChoice> = None;
    for (layout, regions) in candidates {
        let take = regions.len().min(STANDARD_12.len());
        let labels = identify_labels(gray, &regions[..take], templates, recognizer);
        let score = score_labels(&labels);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(LayoutChoice {
                layout: *layout,
                score,
                labels,
            });
        }
    }
    best
}
