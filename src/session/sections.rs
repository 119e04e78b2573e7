use std::collections::HashSet;
use std::fmt;

use crate::error::PharmaGuardError;

/// Collapsible panel on a report card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Variants,
    Explanation,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Variants, Section::Explanation];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Variants => "variants",
            Section::Explanation => "explanation",
        }
    }

    pub fn parse(value: &str) -> Result<Self, PharmaGuardError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "variants" | "variant" => Ok(Section::Variants),
            "explanation" | "llm" | "ai" => Ok(Section::Explanation),
            other => Err(PharmaGuardError::InvalidArgument(format!(
                "Unknown section \"{other}\". Available: variants, explanation"
            ))),
        }
    }

    /// Parses a comma-separated list; `all` expands to every section.
    pub fn parse_list(value: &str) -> Result<Vec<Self>, PharmaGuardError> {
        let mut out = Vec::new();
        for raw in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            let parsed = if raw.eq_ignore_ascii_case("all") {
                Self::ALL.to_vec()
            } else {
                vec![Self::parse(raw)?]
            };
            for section in parsed {
                if !out.contains(&section) {
                    out.push(section);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open/closed state of every card's panels for the report on screen.
///
/// Keyed by `(record index, section)`, so toggling one card never touches
/// another. Everything starts closed.
#[derive(Debug, Clone, Default)]
pub struct SectionToggleStore {
    open: HashSet<(usize, Section)>,
}

impl SectionToggleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the section and returns whether it is now open.
    pub fn toggle(&mut self, record: usize, section: Section) -> bool {
        if self.open.remove(&(record, section)) {
            false
        } else {
            self.open.insert((record, section));
            true
        }
    }

    pub fn is_open(&self, record: usize, section: Section) -> bool {
        self.open.contains(&(record, section))
    }

    /// Opens `section` on records `0..records`.
    pub fn open_all(&mut self, records: usize, section: Section) {
        for record in 0..records {
            self.open.insert((record, section));
        }
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }
}
