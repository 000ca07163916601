//! Lead vocabulary: the standard 12-lead names plus the long rhythm strip.
//!
//! Lead orderings and the hexaxial reference angles are fixed clinical
//! conventions; the fallback priority lists are hand-tuned orderings kept
//! configurable through [`crate::AnalyzeConfig`].

use std::fmt;
use std::str::FromStr;

/// One ECG recording channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lead {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    /// Long lead-II rhythm strip at the bottom of a `3x4+rhythm` page.
    IIRhythm,
}

/// The fixed row-major ordering of a standard 12-lead printout.
pub const STANDARD_12: [Lead; 12] = [
    Lead::I,
    Lead::II,
    Lead::III,
    Lead::AVR,
    Lead::AVL,
    Lead::AVF,
    Lead::V1,
    Lead::V2,
    Lead::V3,
    Lead::V4,
    Lead::V5,
    Lead::V6,
];

/// The six frontal-plane leads used for axis estimation.
pub const FRONTAL_LEADS: [Lead; 6] = [
    Lead::I,
    Lead::II,
    Lead::III,
    Lead::AVR,
    Lead::AVL,
    Lead::AVF,
];

/// Default anchor-lead fallback order for beat detection.
pub const DEFAULT_ANCHOR_FALLBACK: [Lead; 4] = [Lead::II, Lead::V2, Lead::V5, Lead::I];

impl Lead {
    /// Clinical display name.
    pub fn name(&self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
            Lead::IIRhythm => "II_rhythm",
        }
    }

    /// Hexaxial reference angle in degrees, for the six frontal leads.
    ///
    /// aVR is taken at -150 deg (equivalently +210 deg).
    pub fn hexaxial_angle_deg(&self) -> Option<f64> {
        match self {
            Lead::I => Some(0.0),
            Lead::II => Some(60.0),
            Lead::III => Some(120.0),
            Lead::AVL => Some(-30.0),
            Lead::AVR => Some(-150.0),
            Lead::AVF => Some(90.0),
            _ => None,
        }
    }

    /// Whether this lead lies in the frontal plane.
    pub fn is_frontal(&self) -> bool {
        self.hexaxial_angle_deg().is_some()
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for lead names outside the known vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLead(pub String);

impl fmt::Display for UnknownLead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown lead name: {:?}", self.0)
    }
}

impl std::error::Error for UnknownLead {}

impl FromStr for Lead {
    type Err = UnknownLead;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(Lead::I),
            "II" => Ok(Lead::II),
            "III" => Ok(Lead::III),
            "aVR" => Ok(Lead::AVR),
            "aVL" => Ok(Lead::AVL),
            "aVF" => Ok(Lead::AVF),
            "V1" => Ok(Lead::V1),
            "V2" => Ok(Lead::V2),
            "V3" => Ok(Lead::V3),
            "V4" => Ok(Lead::V4),
            "V5" => Ok(Lead::V5),
            "V6" => Ok(Lead::V6),
            "II_rhythm" => Ok(Lead::IIRhythm),
            other => Err(UnknownLead(other.to_string())),
        }
    }
}

impl serde::Serialize for Lead {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Lead {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
