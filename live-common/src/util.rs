//! Small formatting helpers shared by the report and card code.

use regex::Regex;
use std::sync::LazyLock;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so CJK text and emoji are never split.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

static SECRET_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(app_secret|secret|token|bearer)\s*[=:]\s*\S{6,}").unwrap()
});

static TENANT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"t-[a-zA-Z0-9_]{20,}").unwrap());

/// Redact credential-looking substrings before a value is logged.
pub fn sanitize_for_log(s: &str) -> String {
    let result = SECRET_ASSIGNMENT.replace_all(s, "$1=***REDACTED***");
    TENANT_TOKEN
        .replace_all(&result, "***REDACTED_TOKEN***")
        .into_owned()
}

/// Group the integer digits of a decimal string with commas: "1234567.5" → "1,234,567.5".
fn group_digits(formatted: &str) -> String {
    let (sign, rest) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Format an integer with thousands separators: 1234567 → "1,234,567".
pub fn format_thousands(value: u64) -> String {
    group_digits(&value.to_string())
}

/// Format a float with thousands separators and a fixed number of decimals.
pub fn format_thousands_f64(value: f64, decimals: usize) -> String {
    group_digits(&format!("{value:.decimals$}"))
}

/// Format a fraction as a percentage with two decimals: 0.0123 → "1.23%".
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
