//! Presentation-agnostic analysis report.
//!
//! A [`Report`] carries everything a renderer needs to build a platform card,
//! without any platform markup. Recommendations are static configuration and
//! are attached unchanged to every report.

use live_common::config::{AnalysisConfig, RecommendationConfig};
use live_common::util::format_thousands_f64;
use serde::{Deserialize, Serialize};

use crate::types::{AnalysisResult, Issue, Rating, ScoreBreakdown, Severity};

/// Maximum diagnostics shown on a report.
pub const MAX_DIAGNOSTICS: usize = 3;
/// Maximum insights shown on a report.
pub const MAX_INSIGHTS: usize = 2;
/// Maximum recommendations shown on a report.
pub const MAX_RECOMMENDATIONS: usize = 3;

/// A static recommendation entry.
pub type Recommendation = RecommendationConfig;

/// Raw inputs, echoed back as the report headline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadlineMetrics {
    pub gmv: f64,
    pub viewers: u64,
    pub orders: u64,
}

/// Derived ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRatios {
    /// Fraction; renderers show it as a percentage
    pub conversion_rate: f64,
    pub average_order_value: f64,
    pub value_per_viewer: f64,
}

/// Composite score block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub score: f64,
    pub rating: Rating,
    pub breakdown: ScoreBreakdown,
}

/// A labelled value worth calling out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub value: String,
}

/// Structured report built from one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub headline: HeadlineMetrics,
    pub ratios: DerivedRatios,
    pub score: ScoreSummary,
    /// Never empty: a positive entry stands in when nothing was flagged
    pub diagnostics: Vec<Issue>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    /// One-sentence summary chosen by rating
    pub comment: String,
}

/// Builds [`Report`]s from analysis results.
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    recommendations: Vec<Recommendation>,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl ReportFormatter {
    /// Create a formatter with the default recommendations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a formatter with custom recommendations.
    pub fn with_recommendations(recommendations: Vec<Recommendation>) -> Self {
        Self { recommendations }
    }

    /// Create from the `analysis` config section.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::with_recommendations(config.recommendations.clone())
    }

    /// Build the report.
    pub fn format(&self, result: &AnalysisResult) -> Report {
        let mut diagnostics: Vec<Issue> =
            result.issues.iter().take(MAX_DIAGNOSTICS).cloned().collect();
        if diagnostics.is_empty() {
            diagnostics.push(Issue {
                severity: Severity::Positive,
                title: "数据表现良好".to_string(),
                description: "核心指标未发现明显问题".to_string(),
                metric: None,
            });
        }

        Report {
            headline: HeadlineMetrics {
                gmv: result.gmv,
                viewers: result.viewers,
                orders: result.orders,
            },
            ratios: DerivedRatios {
                conversion_rate: result.conversion_rate,
                average_order_value: result.average_order_value,
                value_per_viewer: result.value_per_viewer,
            },
            score: ScoreSummary {
                score: result.score,
                rating: result.rating,
                breakdown: result.breakdown,
            },
            diagnostics,
            insights: build_insights(result),
            recommendations: self
                .recommendations
                .iter()
                .take(MAX_RECOMMENDATIONS)
                .cloned()
                .collect(),
            comment: rating_comment(result.rating).to_string(),
        }
    }
}

fn build_insights(result: &AnalysisResult) -> Vec<Insight> {
    let mut insights = Vec::with_capacity(MAX_INSIGHTS);

    if result.orders > 0 {
        insights.push(Insight {
            title: "客单价".to_string(),
            value: format!("¥{}", format_thousands_f64(result.average_order_value, 2)),
        });
    }
    if result.viewers > 0 {
        insights.push(Insight {
            title: "观众价值".to_string(),
            value: format!("¥{}", format_thousands_f64(result.value_per_viewer, 2)),
        });
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

fn rating_comment(rating: Rating) -> &'static str {
    match rating {
        Rating::S => "综合表现优秀，流量承接与转化均处于高水平，保持当前节奏。",
        Rating::A => "整体表现良好，可在转化和客单价上继续挖掘空间。",
        Rating::B => "表现中等，建议重点优化转化链路和直播间互动。",
        Rating::C => "表现偏弱，需要从流量质量、话术和选品上系统调整。",
    }
}
