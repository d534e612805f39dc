//! Resource identifier validation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Identifier meaning "unlimited" rather than a concrete resource.
pub const UNLIMITED_RESOURCE_ID: &str = "-1";

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|-1)$")
        .expect("identifier pattern is valid")
});

/// True if `id` is a lowercase UUID or the unlimited-resource sentinel.
///
/// Lets callers skip a lookup by id when the value obviously is a name.
pub fn is_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}
