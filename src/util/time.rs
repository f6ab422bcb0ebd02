use chrono::NaiveDate;

// Vendor date layouts, tried in order. Slash dates are read month-first, the
// way the US-centric portals print them.
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// Parse a vendor date string like "2023-05-01", "03/04/2022" or "19.06.2023".
// Returns None if no supported layout matches.
pub fn parse_vendor_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() { return None; }
    DATE_LAYOUTS.iter().find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Canonical `YYYY-MM-DD` when parseable, otherwise the trimmed native text.
/// Blank input yields `None`; a date is never invented.
pub fn normalize_release_date(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() { return None; }
    match parse_vendor_date(trimmed) {
        Some(d) => Some(d.format("%Y-%m-%d").to_string()),
        None => Some(trimmed.to_string()),
    }
}

// Strict variant for positional parse patterns: only a parsed date counts as a match.
pub fn parse_iso(s: &str) -> Option<String> {
    parse_vendor_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}
