//! Keyword tables and text patterns for permit profiling

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{Capacity, PermitDocumentType};
use std::collections::BTreeSet;

/// Sector keywords, Dutch and English
pub const SECTOR_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "livestock",
        &[
            "veehouderij",
            "melkrundvee",
            "varkens",
            "pluimvee",
            "kippen",
            "runderen",
            "dairy",
            "cattle",
            "pigs",
            "poultry",
        ],
    ),
    (
        "chemical",
        &[
            "chemisch",
            "chemie",
            "reactie",
            "destillatie",
            "chemical",
            "reaction",
            "distillation",
        ],
    ),
    (
        "energy",
        &[
            "energie",
            "verbranding",
            "biomassa",
            "warmte",
            "stoom",
            "energy",
            "combustion",
            "power",
        ],
    ),
    (
        "food",
        &[
            "voedsel",
            "melk",
            "zuivel",
            "slachterij",
            "food",
            "dairy",
            "slaughter",
        ],
    ),
    (
        "waste",
        &["afval", "waste", "recycling", "incineration", "verbranding"],
    ),
    (
        "metals",
        &["metaal", "staal", "ijzer", "metal", "steel", "iron", "aluminum"],
    ),
    (
        "manufacturing",
        &["productie", "fabricage", "manufacturing", "production"],
    ),
];

/// Headings that introduce the description of permitted activities
pub const ACTIVITY_HEADINGS: &[&str] = &[
    "activities of the installation",
    "activiteiten",
    "activiteit",
    "inrichting",
    "bedrijf",
    "project",
];

/// Lines taken after an activity heading
pub const MAX_ACTIVITY_LINES: usize = 4;

/// Capacity figures kept per permit
pub const MAX_CAPACITIES: usize = 5;

lazy_static! {
    /// Number followed by a capacity unit, e.g. "50 MW" or "2.500 dierplaatsen"
    static ref CAPACITY_PATTERN: Regex = Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(MW|kW|tonnes|ton|m3|m²|dierplaatsen|plaatsen|places|stuks|melkkoeien|runderen|varkens|kippen|head)(?:[^\w]|$)"
    )
    .unwrap();

    static ref WORD_PATTERN: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}

/// Whole-word, case-insensitive keyword presence
pub fn contains_keyword(text_lower: &str, keyword: &str) -> bool {
    text_lower.match_indices(keyword).any(|(start, matched)| {
        let before = text_lower[..start].chars().next_back();
        let after = text_lower[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Sectors whose keywords occur in the text
pub fn detect_sectors(text: &str) -> BTreeSet<String> {
    let text_lower = text.to_lowercase();
    SECTOR_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_keyword(&text_lower, k)))
        .map(|(sector, _)| sector.to_string())
        .collect()
}

/// Sector keywords that occur in the text, in table order
pub fn matched_keywords(text: &str) -> Vec<&'static str> {
    let text_lower = text.to_lowercase();
    let mut seen = BTreeSet::new();
    SECTOR_KEYWORDS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter().copied())
        .filter(|k| contains_keyword(&text_lower, k) && seen.insert(*k))
        .collect()
}

/// Lines following the first activity heading
pub fn extract_activity_lines(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    for (idx, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        let is_heading = ACTIVITY_HEADINGS
            .iter()
            .any(|heading| lower.starts_with(heading));
        if !is_heading {
            continue;
        }

        let mut found = Vec::new();
        // Inline form: "Activiteit: melkrundveehouderij"
        if let Some((_, rest)) = line.split_once(':') {
            let rest = rest.trim();
            if !rest.is_empty() {
                found.push(rest.to_string());
            }
        }
        found.extend(
            lines[idx + 1..]
                .iter()
                .take_while(|l| !l.is_empty())
                .take(MAX_ACTIVITY_LINES)
                .map(|l| l.to_string()),
        );
        if !found.is_empty() {
            found.truncate(MAX_ACTIVITY_LINES);
            return found;
        }
    }

    Vec::new()
}

/// Capacity figures in order of appearance
pub fn extract_capacities(text: &str) -> Vec<Capacity> {
    CAPACITY_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str();
            let unit = caps.get(2)?.as_str();
            let value = number.replace(',', ".").parse::<f64>().ok()?;
            Some(Capacity {
                value,
                unit: unit.to_string(),
                raw: format!("{} {}", number, unit),
            })
        })
        .take(MAX_CAPACITIES)
        .collect()
}

/// Classify a permit document from its title or file name
pub fn classify_document_type(name: &str) -> PermitDocumentType {
    let lower = name.to_lowercase();
    let words: Vec<&str> = WORD_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .collect();
    let has = |needles: &[&str]| {
        needles
            .iter()
            .any(|needle| words.iter().any(|w| w.starts_with(needle)))
    };

    if has(&["besluit", "beschikking", "decision"]) {
        PermitDocumentType::Decision
    } else if has(&["aanvraag", "application"]) {
        PermitDocumentType::Application
    } else if has(&["advies", "advice", "rapport", "report"]) {
        PermitDocumentType::Advice
    } else if words.iter().any(|w| *w == "mer" || *w == "eia")
        || lower.contains("milieueffectrapport")
    {
        PermitDocumentType::EnvironmentalImpactAssessment
    } else {
        PermitDocumentType::Other
    }
}

/// Cut text to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
