use chrono::{DateTime, SecondsFormat, Utc};

/// Canonical storage form for instants: RFC 3339, UTC, millisecond precision.
///
/// Example: 2026-10-20 10:00 UTC → "2026-10-20T10:00:00.000Z"
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp with any offset into UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Derive a person ID from an email address.
///
/// Example: "sarah.chen@acme.com" → "sarah-chen-acme-com"
pub fn person_id_from_email(email: &str) -> String {
    slugify(&email.trim().to_lowercase())
}

/// Derive a display name from an email address (best-effort).
///
/// Example: "sarah.chen@acme.com" → "Sarah Chen"
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local
        .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a display name to a URL-safe kebab-case slug.
///
/// Example: "Acme Corp" → "acme-corp"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
    }

    #[test]
    fn test_slugify_special_chars() {
        assert_eq!(slugify("Weekly Sync — Team Alpha"), "weekly-sync-team-alpha");
    }

    #[test]
    fn test_person_id_from_email() {
        assert_eq!(person_id_from_email("sarah.chen@acme.com"), "sarah-chen-acme-com");
        assert_eq!(person_id_from_email(" JOE@BIGCORP.IO "), "joe-bigcorp-io");
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("john.doe@acme.com"), "John Doe");
        assert_eq!(name_from_email("jane_smith@bigcorp.io"), "Jane Smith");
    }

    #[test]
    fn test_timestamp_format_is_millis_utc() {
        let dt = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "2026-10-20T10:00:00.000Z");
    }

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let dt = parse_timestamp("2026-10-20T15:30:00+05:30").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap());
        assert!(parse_timestamp("tomorrow at 10").is_err());
    }
}
