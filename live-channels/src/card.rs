//! Feishu interactive card rendering for analysis reports.
//!
//! Pure: the same [`Report`] always renders to the same card JSON.

use live_analysis::{Rating, Report, Severity};
use live_common::config::Priority;
use live_common::util::{format_percent, format_thousands, format_thousands_f64};
use serde_json::{json, Value};

const CARD_TITLE: &str = "📊 直播数据智能分析";

/// Render a report as Feishu card JSON.
pub fn render_report(report: &Report) -> Value {
    let headline = &report.headline;
    let ratios = &report.ratios;
    let score = &report.score;

    let mut elements: Vec<Value> = vec![
        column_set(&[
            format!("**💰 GMV**\n¥{}", format_thousands_f64(headline.gmv, 2)),
            format!("**👀 观众数**\n{}", format_thousands(headline.viewers)),
            format!("**🛒 订单数**\n{}", format_thousands(headline.orders)),
        ]),
        column_set(&[
            format!("**🎯 转化率**\n{}", format_percent(ratios.conversion_rate)),
            format!(
                "**🧾 客单价**\n¥{}",
                format_thousands_f64(ratios.average_order_value, 2)
            ),
            format!(
                "**👤 观众价值**\n¥{}",
                format_thousands_f64(ratios.value_per_viewer, 2)
            ),
        ]),
        markdown(format!(
            "**综合评分: {:.1} / 100  评级: {}**\n{}",
            score.score, score.rating, report.comment
        )),
        json!({ "tag": "hr" }),
        markdown("**🔍 问题诊断**".to_string()),
    ];

    for issue in &report.diagnostics {
        let detail = issue.metric.as_deref().unwrap_or(&issue.description);
        elements.push(markdown(format!(
            "{} **{}**\n{}",
            severity_icon(issue.severity),
            issue.title,
            detail
        )));
    }

    if !report.insights.is_empty() {
        let lines: Vec<String> = report
            .insights
            .iter()
            .map(|insight| format!("• {}: {}", insight.title, insight.value))
            .collect();
        elements.push(json!({ "tag": "hr" }));
        elements.push(markdown(format!("**💡 数据洞察**\n{}", lines.join("\n"))));
    }

    elements.push(json!({ "tag": "hr" }));
    elements.push(markdown("**🚀 优化建议**".to_string()));
    for rec in &report.recommendations {
        elements.push(markdown(format!(
            "{} **{}**\n{}",
            priority_icon(rec.priority),
            rec.title,
            rec.description
        )));
    }

    let breakdown = &score.breakdown;
    elements.push(json!({
        "tag": "note",
        "elements": [
            {
                "tag": "plain_text",
                "content": format!(
                    "评分构成: 观众价值 {:.1} · 转化 {:.1} · 客单价 {:.1} · GMV {:.1}",
                    breakdown.viewer_value,
                    breakdown.conversion,
                    breakdown.order_value,
                    breakdown.gmv
                )
            }
        ]
    }));

    json!({
        "config": {
            "wide_screen_mode": true
        },
        "header": {
            "title": {
                "tag": "plain_text",
                "content": CARD_TITLE
            },
            "template": header_template(score.rating)
        },
        "elements": elements
    })
}

/// Header color by rating.
fn header_template(rating: Rating) -> &'static str {
    match rating {
        Rating::S => "green",
        Rating::A => "blue",
        Rating::B => "orange",
        Rating::C => "red",
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Severe => "🔴",
        Severity::Warning => "🟠",
        Severity::Positive => "✅",
    }
}

fn priority_icon(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "🔴",
        Priority::Medium => "🟡",
        Priority::Longterm => "🟢",
    }
}

fn markdown(content: String) -> Value {
    json!({
        "tag": "div",
        "text": {
            "tag": "lark_md",
            "content": content
        }
    })
}

fn column_set(cells: &[String]) -> Value {
    let columns: Vec<Value> = cells
        .iter()
        .map(|cell| {
            json!({
                "tag": "column",
                "width": "weighted",
                "weight": 1,
                "elements": [markdown(cell.clone())]
            })
        })
        .collect();

    json!({
        "tag": "column_set",
        "flex_mode": "none",
        "background_style": "grey",
        "columns": columns
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use live_analysis::{AnalysisPipeline, PipelineOutcome};

    fn report_for(text: &str) -> Report {
        match AnalysisPipeline::default().run(text) {
            PipelineOutcome::Report(report) => *report,
            other => panic!("expected a report, got {other:?}"),
        }
    }

    fn all_markdown(card: &Value) -> String {
        let mut out = String::new();
        collect_content(card, &mut out);
        out
    }

    fn collect_content(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(s)) = map.get("content") {
                    out.push_str(s);
                    out.push('\n');
                }
                map.values().for_each(|v| collect_content(v, out));
            }
            Value::Array(items) => items.iter().for_each(|v| collect_content(v, out)),
            _ => {}
        }
    }

    #[test]
    fn test_card_header() {
        let card = render_report(&report_for("GMV=1000, 观众=5000, 订单=50"));
        assert_eq!(card["header"]["title"]["tag"], "plain_text");
        assert_eq!(card["header"]["title"]["content"], CARD_TITLE);
        assert_eq!(card["header"]["template"], "red");
        assert_eq!(card["config"]["wide_screen_mode"], true);
    }

    #[test]
    fn test_card_headline_and_ratios() {
        let card = render_report(&report_for("GMV=12345.6 观众=5000 订单=50"));
        let elements = card["elements"].as_array().unwrap();
        assert_eq!(elements[0]["tag"], "column_set");
        assert_eq!(elements[0]["columns"].as_array().unwrap().len(), 3);

        let text = all_markdown(&card);
        assert!(text.contains("¥12,345.60"));
        assert!(text.contains("5,000"));
        assert!(text.contains("1.00%"));
    }

    #[test]
    fn test_card_positive_diagnostic() {
        let text = all_markdown(&render_report(&report_for("GMV=1000, 观众=5000, 订单=50")));
        assert!(text.contains("✅ **数据表现良好**"));
    }

    #[test]
    fn test_card_severe_diagnostic_shows_metric_line() {
        let text = all_markdown(&render_report(&report_for("GMV=100 观众=10000 订单=10")));
        assert!(text.contains("🔴 **转化率严重偏低**\n转化率: 0.10%"));
    }

    #[test]
    fn test_card_recommendations() {
        let text = all_markdown(&render_report(&report_for("GMV=1000, 观众=5000, 订单=50")));
        assert!(text.contains("🔴 **优化开场话术**"));
        assert!(text.contains("🟡 **提升互动频率**"));
        assert!(text.contains("🟢 **建立粉丝群**"));
    }

    #[test]
    fn test_card_omits_insights_when_empty() {
        let text = all_markdown(&render_report(&report_for("GMV=0 观众=0 订单=0")));
        assert!(!text.contains("数据洞察"));
    }

    #[test]
    fn test_card_breakdown_note() {
        let card = render_report(&report_for("GMV=1000, 观众=5000, 订单=50"));
        let note = card["elements"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["tag"] == "note")
            .expect("Should have note element");
        assert_eq!(
            note["elements"][0]["content"],
            "评分构成: 观众价值 10.0 · 转化 5.0 · 客单价 2.0 · GMV 20.0"
        );
    }

    #[test]
    fn test_header_template_by_rating() {
        let card = render_report(&report_for("GMV=100000 观众=1000 订单=200"));
        assert_eq!(card["header"]["template"], "green");
    }
}
