//! Path normalization for rate-limit bucket keys

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder that replaces identifier segments
pub const ID_PLACEHOLDER: &str = ":id";

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("UUID_SEGMENT should compile - this is a bug")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("NUMERIC_SEGMENT should compile - this is a bug"));

/// Map a request path to its rate-limit bucket key
///
/// The query string and fragment are dropped, and every UUID-shaped or
/// purely numeric segment becomes `:id`, so `/bookings/123`,
/// `/bookings/<uuid>` and `/bookings/:id` share one bucket.
///
/// ```
/// use hubwire_common::rate_limit::normalize_path;
///
/// assert_eq!(normalize_path("/bookings/123?page=2"), "/bookings/:id");
/// ```
pub fn normalize_path(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = &path[..end];

    trimmed
        .split('/')
        .map(|segment| {
            if UUID_SEGMENT.is_match(segment) || NUMERIC_SEGMENT.is_match(segment) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `normalize_path` behavior for the identifier segments
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms numeric, UUID and placeholder paths share one key.
    #[test]
    fn test_identifier_segments_share_bucket() {
        let numeric = normalize_path("/bookings/123");
        let uuid = normalize_path("/bookings/550e8400-e29b-41d4-a716-446655440000");
        let placeholder = normalize_path("/bookings/:id");

        assert_eq!(numeric, "/bookings/:id");
        assert_eq!(numeric, uuid);
        assert_eq!(uuid, placeholder);
    }

    /// Validates `normalize_path` behavior for the query and fragment
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures query strings and fragments are dropped.
    #[test]
    fn test_strips_query_and_fragment() {
        assert_eq!(normalize_path("/services?category=hair&page=1"), "/services");
        assert_eq!(normalize_path("/services#top"), "/services");
        assert_eq!(normalize_path("/services/42/slots?date=2024-01-01"), "/services/:id/slots");
    }

    /// Validates `normalize_path` behavior for mixed segments.
    ///
    /// Assertions:
    /// - Ensures alphanumeric segments are left untouched.
    #[test]
    fn test_keeps_non_identifier_segments() {
        assert_eq!(normalize_path("/v1/users/abc123/profile"), "/v1/users/abc123/profile");
        assert_eq!(normalize_path("/users/7/bookings/8"), "/users/:id/bookings/:id");
        assert_eq!(normalize_path(""), "");
    }
}
