//! Enum-to-visual lookup tables for report cards.
//!
//! Both maps are total: unrecognized risk labels resolve to the `Safe` entry
//! and unrecognized severities to the `none` entry.

use colored::{Color, Colorize};

use crate::entities::report::{RiskLabel, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Emerald,
    Yellow,
    Orange,
    Red,
    Crimson,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Emerald => Color::Green,
            Tone::Yellow => Color::Yellow,
            Tone::Orange => Color::TrueColor {
                r: 251,
                g: 146,
                b: 60,
            },
            Tone::Red => Color::BrightRed,
            Tone::Crimson => Color::Red,
        }
    }

    /// Wraps `text` in this tone's ANSI color when `enabled`.
    pub fn paint(self, text: &str, enabled: bool) -> String {
        if enabled {
            text.color(self.color()).bold().to_string()
        } else {
            text.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskStyle {
    pub tone: Tone,
    pub icon: &'static str,
    pub label: &'static str,
}

const SAFE: RiskStyle = RiskStyle {
    tone: Tone::Emerald,
    icon: "✅",
    label: "Safe",
};

pub fn map_risk(label: &RiskLabel) -> RiskStyle {
    match label {
        RiskLabel::Safe => SAFE,
        RiskLabel::AdjustDosage => RiskStyle {
            tone: Tone::Yellow,
            icon: "⚠️",
            label: "Adjust Dosage",
        },
        RiskLabel::Toxic => RiskStyle {
            tone: Tone::Red,
            icon: "☠️",
            label: "Toxic",
        },
        RiskLabel::Ineffective => RiskStyle {
            tone: Tone::Orange,
            icon: "🚫",
            label: "Ineffective",
        },
        RiskLabel::Unrecognized(_) => SAFE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityStyle {
    pub width_percent: u8,
    pub tone: Tone,
    pub label: &'static str,
}

const SEVERITY_NONE: SeverityStyle = SeverityStyle {
    width_percent: 10,
    tone: Tone::Emerald,
    label: "None",
};

pub fn map_severity(severity: &Severity) -> SeverityStyle {
    match severity {
        Severity::None => SEVERITY_NONE,
        Severity::Low => SeverityStyle {
            width_percent: 30,
            tone: Tone::Yellow,
            label: "Low",
        },
        Severity::Moderate => SeverityStyle {
            width_percent: 55,
            tone: Tone::Orange,
            label: "Moderate",
        },
        Severity::High => SeverityStyle {
            width_percent: 75,
            tone: Tone::Red,
            label: "High",
        },
        Severity::Critical => SeverityStyle {
            width_percent: 100,
            tone: Tone::Crimson,
            label: "Critical",
        },
        Severity::Unrecognized(_) => SEVERITY_NONE,
    }
}

/// Integer confidence percentage; the score is clamped to `[0, 1]` first and
/// a missing or non-finite score counts as zero.
pub fn confidence_percent(score: Option<f64>) -> u8 {
    let score = score.filter(|v| v.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0);
    (score * 100.0).round() as u8
}

pub const SEVERITY_BAR_CELLS: usize = 20;

/// Fixed-width text bar filled to the severity's width.
pub fn severity_bar(style: &SeverityStyle) -> String {
    let filled = (usize::from(style.width_percent) * SEVERITY_BAR_CELLS + 50) / 100;
    let filled = filled.min(SEVERITY_BAR_CELLS);
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(SEVERITY_BAR_CELLS - filled)
    )
}
