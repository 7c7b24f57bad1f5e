//! Page-selection normalisation.
//!
//! The page value is opaque to this service and normally reaches the
//! converter untouched. Some converter builds only understand comma-separated
//! page lists, so the service can optionally expand a single `A-B` range
//! into `A,A+1,…,B` first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Ranges spanning more pages than this are forwarded verbatim.
pub const MAX_EXPANDED_PAGES: u64 = 10_000;

static RE_PAGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*-\s*(\d+)\s*$").unwrap());

/// Return the page value to pass to the converter.
pub fn normalize_pages(raw: &str, expand_ranges: bool) -> String {
    if !expand_ranges {
        return raw.to_string();
    }
    expand_range(raw).unwrap_or_else(|| raw.to_string())
}

fn expand_range(raw: &str) -> Option<String> {
    let caps = RE_PAGE_RANGE.captures(raw)?;
    let start: u64 = caps[1].parse().ok()?;
    let end: u64 = caps[2].parse().ok()?;
    if start > end || end - start >= MAX_EXPANDED_PAGES {
        return None;
    }
    Some(
        (start..=end)
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}
