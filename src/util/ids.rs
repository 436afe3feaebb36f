//! Identifier validation helpers

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern for Home Assistant entity ids (`light.porch`, `sensor.temp_2`)
static ENTITY_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+\.[a-z0-9_]+$").unwrap());

/// Check an entity id is `domain.object_id`
pub fn is_valid_entity_id(entity_id: &str) -> bool {
    ENTITY_ID_PATTERN.is_match(entity_id)
}

/// Truncate a response body to `limit` chars (char-boundary safe)
pub fn truncate_body(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
