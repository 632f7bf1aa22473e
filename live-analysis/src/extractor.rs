//! Metric extraction from free-form chat text.
//!
//! Streamers paste numbers in whatever shape their dashboard produced, so the
//! patterns accept localized and ASCII labels, `=`/`:`/`：`/whitespace
//! separators, and comma thousands separators:
//!
//! ```text
//! GMV=1000, 观众=5000, 订单=50
//! 成交额：12,800.5 观众人数 3,200 订单数量 96
//! gmv: 500 viewers: 1,000 orders: 10
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::types::PartialMetrics;

/// Platform mention marker, e.g. `@_user_1 `.
static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@_user_\d+\s*").unwrap());

static GMV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:gmv|成交金额|成交额|销售额)[=：:\s]*(\d[\d,.]*)").unwrap()
});

static VIEWERS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"观众(?:人数|数|人)?[=：:\s]*(\d[\d,]*)").unwrap());
static VIEWERS_ASCII_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bviewers?\b[=：:\s]*(\d[\d,]*)").unwrap());

static ORDERS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"订单(?:数量|数|量)?[=：:\s]*(\d[\d,]*)").unwrap());
static ORDERS_ASCII_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\borders?\b[=：:\s]*(\d[\d,]*)").unwrap());

/// Remove every platform mention marker and trim the result.
///
/// Applied until nothing matches, so stripping is idempotent even for inputs
/// where removing one marker splices together another.
pub fn strip_mentions(text: &str) -> String {
    let mut current = text.to_string();
    while MENTION_PATTERN.is_match(&current) {
        current = MENTION_PATTERN.replace_all(&current, "").into_owned();
    }
    current.trim().to_string()
}

/// Extract whichever metrics the text mentions.
///
/// A field whose number cannot be parsed is left unset, the same as a field
/// that was never mentioned.
pub fn extract(text: &str) -> PartialMetrics {
    let metrics = PartialMetrics {
        gmv: first_capture(text, &[&GMV_PATTERN]).and_then(|raw| parse_decimal(raw, "gmv")),
        viewers: first_capture(text, &[&VIEWERS_PATTERN, &VIEWERS_ASCII_PATTERN])
            .and_then(|raw| parse_count(raw, "viewers")),
        orders: first_capture(text, &[&ORDERS_PATTERN, &ORDERS_ASCII_PATTERN])
            .and_then(|raw| parse_count(raw, "orders")),
    };

    tracing::debug!(
        gmv = ?metrics.gmv,
        viewers = ?metrics.viewers,
        orders = ?metrics.orders,
        "Extracted metrics"
    );
    metrics
}

/// First capture group of the first pattern that matches, in priority order.
fn first_capture<'t>(text: &'t str, patterns: &[&Regex]) -> Option<&'t str> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_decimal(raw: &str, field: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::debug!(field, raw, "Malformed number, field left unset");
            None
        }
    }
}

fn parse_count(raw: &str, field: &str) -> Option<u64> {
    let cleaned = raw.replace(',', "");
    match cleaned.parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(field, raw, error = %e, "Malformed number, field left unset");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use live_common::util::format_thousands;
    use proptest::prelude::*;
    use test_case::test_case;

    fn full(gmv: f64, viewers: u64, orders: u64) -> PartialMetrics {
        PartialMetrics {
            gmv: Some(gmv),
            viewers: Some(viewers),
            orders: Some(orders),
        }
    }

    #[test]
    fn test_basic_localized() {
        assert_eq!(extract("GMV=1000, 观众=5000, 订单=50"), full(1000.0, 5000, 50));
    }

    #[test_case("GMV=1000 观众数=5000 订单数=50" ; "equals")]
    #[test_case("GMV:1000 观众数:5000 订单数:50" ; "colon")]
    #[test_case("GMV：1000 观众数：5000 订单数：50" ; "fullwidth colon")]
    #[test_case("GMV 1000 观众数 5000 订单数 50" ; "whitespace")]
    #[test_case("gmv=1000 观众人数=5000 订单数量=50" ; "lowercase and long qualifiers")]
    #[test_case("成交额=1000 观众人=5000 订单量=50" ; "localized gmv")]
    #[test_case("gmv: 1000 viewers: 5000 orders: 50" ; "ascii")]
    #[test_case("GMV=1,000 Viewers=5,000 Orders=50" ; "ascii thousands")]
    fn test_separator_styles(text: &str) {
        assert_eq!(extract(text), full(1000.0, 5000, 50));
    }

    #[test]
    fn test_decimal_gmv() {
        let m = extract("成交金额：12,800.5 观众 3,200 订单 96");
        assert_eq!(m, full(12800.5, 3200, 96));
    }

    #[test]
    fn test_missing_orders() {
        let m = extract("GMV=1000, 观众=5000");
        assert_eq!(m.gmv, Some(1000.0));
        assert_eq!(m.viewers, Some(5000));
        assert_eq!(m.orders, None);
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extract("今天直播怎么样？"), PartialMetrics::default());
        assert_eq!(extract(""), PartialMetrics::default());
    }

    #[test]
    fn test_zero_is_not_missing() {
        assert_eq!(extract("GMV=0 观众=0 订单=0"), full(0.0, 0, 0));
    }

    #[test]
    fn test_malformed_gmv_only_drops_gmv() {
        let m = extract("GMV=1.2.3 观众=5000 订单=50");
        assert_eq!(m.gmv, None);
        assert_eq!(m.viewers, Some(5000));
        assert_eq!(m.orders, Some(50));
    }

    #[test]
    fn test_overflowing_count_dropped() {
        let m = extract("GMV=1 观众=99999999999999999999999 订单=1");
        assert_eq!(m.viewers, None);
        assert_eq!(m.orders, Some(1));
    }

    #[test]
    fn test_localized_takes_priority_over_ascii() {
        let m = extract("viewers=10 观众=20 GMV=1 订单=1");
        assert_eq!(m.viewers, Some(20));
    }

    #[test]
    fn test_first_gmv_wins() {
        assert_eq!(extract("GMV=100 GMV=200").gmv, Some(100.0));
    }

    #[test]
    fn test_trailing_period() {
        assert_eq!(extract("今天 GMV=1000.").gmv, Some(1000.0));
    }

    #[test]
    fn test_strip_mentions() {
        assert_eq!(
            strip_mentions("@_user_123 GMV=500 观众=1000 订单=10"),
            "GMV=500 观众=1000 订单=10"
        );
        assert_eq!(strip_mentions("  @_user_1 @_user_2  hi "), "hi");
        assert_eq!(strip_mentions("no mention"), "no mention");
    }

    #[test]
    fn test_strip_mentions_spliced_marker() {
        let once = strip_mentions("@_user_@_user_1 2 GMV=1");
        assert_eq!(strip_mentions(&once), once);
        assert!(!once.contains("@_user_"));
    }

    #[test]
    fn test_mention_does_not_change_extraction() {
        let with = extract(&strip_mentions("@_user_123 GMV=500 观众=1000 订单=10"));
        let without = extract("GMV=500 观众=1000 订单=10");
        assert_eq!(with, without);
        assert_eq!(with, full(500.0, 1000, 10));
    }

    fn separator() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["=", ":", "：", " ", "= ", ": "])
    }

    fn gmv_label() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["GMV", "gmv", "成交额", "成交金额"])
    }

    fn viewers_label() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["观众", "观众数", "观众人数", "viewers", "Viewers"])
    }

    fn orders_label() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["订单", "订单数", "订单数量", "orders", "Orders"])
    }

    fn count_text(value: u64, grouped: bool) -> String {
        if grouped {
            format_thousands(value)
        } else {
            value.to_string()
        }
    }

    proptest! {
        #[test]
        fn prop_recovers_exact_values(
            gmv_cents in 0u64..10_000_000_000,
            viewers in 0u64..1_000_000_000,
            orders in 0u64..100_000_000,
            grouped in any::<bool>(),
            sep in separator(),
            gl in gmv_label(),
            vl in viewers_label(),
            ol in orders_label(),
            order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        ) {
            let gmv_text = format!("{}.{:02}", count_text(gmv_cents / 100, grouped), gmv_cents % 100);
            let phrases = [
                format!("{gl}{sep}{gmv_text}"),
                format!("{vl}{sep}{}", count_text(viewers, grouped)),
                format!("{ol}{sep}{}", count_text(orders, grouped)),
            ];
            let text = order.iter().map(|&i| phrases[i].as_str()).collect::<Vec<_>>().join(", ");

            let m = extract(&text);
            prop_assert_eq!(m, full(gmv_cents as f64 / 100.0, viewers, orders));
        }

        #[test]
        fn prop_order_independent(
            gmv in 0u64..1_000_000,
            viewers in 0u64..1_000_000,
            orders in 0u64..1_000_000,
            order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        ) {
            let phrases = [
                format!("GMV={gmv}"),
                format!("观众={viewers}"),
                format!("订单={orders}"),
            ];
            let canonical = extract(&phrases.join(" "));
            let shuffled = order.iter().map(|&i| phrases[i].as_str()).collect::<Vec<_>>().join(" ");
            prop_assert_eq!(extract(&shuffled), canonical);
        }

        #[test]
        fn prop_strip_mentions_idempotent(s in "(@_user_[0-9]{0,3} ?|[a-z0-9 =@_]{0,4}){0,8}") {
            let once = strip_mentions(&s);
            prop_assert_eq!(strip_mentions(&once), once);
        }
    }
}
