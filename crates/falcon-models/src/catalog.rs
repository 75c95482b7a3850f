//! Safety-equipment class catalog.
//!
//! The detector is trained on seven classes of space-station safety
//! equipment. Each class has a stable underscore key (as returned by the
//! detector), a spaced display name, an emoji and an overlay color. The
//! catalog is presentation-only: it never changes detection semantics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Emoji used for labels the catalog does not know.
pub const FALLBACK_EMOJI: &str = "🎯";

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS-style hex string (`#RRGGBB`).
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One of the seven safety-equipment classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SafetyClass {
    #[serde(rename = "Oxygen_Tank")]
    OxygenTank,
    #[serde(rename = "Nitrogen_Tank")]
    NitrogenTank,
    #[serde(rename = "First_Aid_Box")]
    FirstAidBox,
    #[serde(rename = "Fire_Alarm")]
    FireAlarm,
    #[serde(rename = "Safety_Switch_Panel")]
    SafetySwitchPanel,
    #[serde(rename = "Emergency_Phone")]
    EmergencyPhone,
    #[serde(rename = "Fire_Extinguisher")]
    FireExtinguisher,
}

impl SafetyClass {
    /// All classes in detector class-id order.
    pub const ALL: &'static [SafetyClass] = &[
        SafetyClass::OxygenTank,
        SafetyClass::NitrogenTank,
        SafetyClass::FirstAidBox,
        SafetyClass::FireAlarm,
        SafetyClass::SafetySwitchPanel,
        SafetyClass::EmergencyPhone,
        SafetyClass::FireExtinguisher,
    ];

    /// Detector key (underscore separated).
    pub fn key(&self) -> &'static str {
        match self {
            SafetyClass::OxygenTank => "Oxygen_Tank",
            SafetyClass::NitrogenTank => "Nitrogen_Tank",
            SafetyClass::FirstAidBox => "First_Aid_Box",
            SafetyClass::FireAlarm => "Fire_Alarm",
            SafetyClass::SafetySwitchPanel => "Safety_Switch_Panel",
            SafetyClass::EmergencyPhone => "Emergency_Phone",
            SafetyClass::FireExtinguisher => "Fire_Extinguisher",
        }
    }

    /// Human-readable name (space separated).
    pub fn display_name(&self) -> &'static str {
        match self {
            SafetyClass::OxygenTank => "Oxygen Tank",
            SafetyClass::NitrogenTank => "Nitrogen Tank",
            SafetyClass::FirstAidBox => "First Aid Box",
            SafetyClass::FireAlarm => "Fire Alarm",
            SafetyClass::SafetySwitchPanel => "Safety Switch Panel",
            SafetyClass::EmergencyPhone => "Emergency Phone",
            SafetyClass::FireExtinguisher => "Fire Extinguisher",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SafetyClass::OxygenTank => "🔴",
            SafetyClass::NitrogenTank => "💧",
            SafetyClass::FirstAidBox => "🏥",
            SafetyClass::FireAlarm => "🚨",
            SafetyClass::SafetySwitchPanel => "⚡",
            SafetyClass::EmergencyPhone => "📞",
            SafetyClass::FireExtinguisher => "🧯",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            SafetyClass::OxygenTank => Color::rgb(0xFF, 0x6B, 0x6B),
            SafetyClass::NitrogenTank => Color::rgb(0x4E, 0xCD, 0xC4),
            SafetyClass::FirstAidBox => Color::rgb(0x45, 0xB7, 0xD1),
            SafetyClass::FireAlarm => Color::rgb(0xFF, 0xA0, 0x7A),
            SafetyClass::SafetySwitchPanel => Color::rgb(0x98, 0xD8, 0xC8),
            SafetyClass::EmergencyPhone => Color::rgb(0xF7, 0xDC, 0x6F),
            SafetyClass::FireExtinguisher => Color::rgb(0xE7, 0x4C, 0x3C),
        }
    }

    /// Class for a detector class id, wrapping ids outside `0..7`.
    pub fn from_class_id(class_id: i64) -> SafetyClass {
        let len = Self::ALL.len() as i64;
        Self::ALL[class_id.rem_euclid(len) as usize]
    }
}

impl fmt::Display for SafetyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Label is neither a known key nor a known display name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown safety class: {0}")]
pub struct UnknownClass(pub String);

impl FromStr for SafetyClass {
    type Err = UnknownClass;

    /// Accepts both the underscore key and the spaced display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.key() == s || c.display_name() == s)
            .ok_or_else(|| UnknownClass(s.to_string()))
    }
}

/// Process-wide read-only lookups over [`SafetyClass`].
pub struct ClassCatalog;

impl ClassCatalog {
    /// Number of catalog entries (and palette length).
    pub const LEN: usize = 7;

    /// Overlay color for a class id: `palette[class_id mod len]`.
    pub fn color_for(class_id: i64) -> Color {
        SafetyClass::from_class_id(class_id).color()
    }

    /// Display name for a detector label.
    ///
    /// Unknown labels fall back to replacing underscores with spaces.
    pub fn display_name(label: &str) -> String {
        match label.parse::<SafetyClass>() {
            Ok(class) => class.display_name().to_string(),
            Err(_) => label.replace('_', " "),
        }
    }

    /// Emoji for a detector label or display name.
    pub fn emoji(label: &str) -> &'static str {
        label
            .parse::<SafetyClass>()
            .map(|c| c.emoji())
            .unwrap_or(FALLBACK_EMOJI)
    }
}
