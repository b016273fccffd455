//! Free-text tag cleanup
//!
//! Tags written by misconfigured taggers often contain UTF-8 bytes that were
//! decoded as Latin-1 (`BeyoncÃ©`). [`clean_text`] repairs that case and then
//! collapses whitespace.

/// Markers that introduce a featured artist, matched case-insensitively.
const FEATURING_MARKERS: &[&str] = &[
    " (feat.",
    " (feat ",
    " (featuring ",
    " (ft.",
    " (ft ",
    " [feat.",
    " [feat ",
    " [ft.",
    " feat. ",
    " feat ",
    " featuring ",
    " ft. ",
    " ft ",
    " feat.",
    " ft.",
];

/// Repair, then normalize a tag value.
pub fn clean_text(text: &str) -> String {
    normalize_text(&repair_mojibake(text))
}

/// Collapse runs of whitespace, trim, and drop control characters.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Undo UTF-8 text that was decoded as Latin-1.
///
/// Only applies when every character fits in one Latin-1 byte and the
/// re-encoded bytes form valid UTF-8; anything else is returned unchanged.
pub fn repair_mojibake(text: &str) -> String {
    if text.is_ascii() || text.chars().any(|c| u32::from(c) > 0xFF) {
        return text.to_string();
    }

    let bytes: Vec<u8> = text.chars().map(|c| u32::from(c) as u8).collect();
    match String::from_utf8(bytes) {
        Ok(repaired) => repaired,
        Err(_) => text.to_string(),
    }
}

/// Leading number of a "N" or "N/total" value.
pub fn parse_leading_number(value: &str) -> Option<i32> {
    let head = value.split('/').next()?.trim();
    head.parse::<i32>().ok()
}

/// Artist with any featured-artist suffix removed.
///
/// `"Bob feat. X"`, `"Bob (ft. X)"` and `"Bob featuring X"` all become
/// `"Bob"`. Returns `None` when nothing is left.
pub fn primary_artist(artist: &str) -> Option<String> {
    let normalized = normalize_text(artist);
    let lowered = normalized.to_ascii_lowercase();

    let cut = FEATURING_MARKERS
        .iter()
        .filter_map(|marker| lowered.find(marker))
        .min()
        .unwrap_or(normalized.len());

    let primary = normalized[..cut].trim_end_matches([' ', ',', '-', '&']).trim();
    if primary.is_empty() {
        None
    } else {
        Some(primary.to_string())
    }
}
