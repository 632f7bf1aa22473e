//! Metrics Analyzer.
//!
//! Derives the comparable ratios, the four-part composite score, the letter
//! rating, and conversion diagnostics from a complete set of metrics.

use live_common::config::{AnalysisConfig, DiagnosticConfig, ScoringConfig};
use live_common::util::format_percent;

use crate::types::{AnalysisResult, Issue, Rating, ScoreBreakdown, Severity, ValidatedMetrics};

/// Live-stream metrics analyzer.
#[derive(Debug, Clone, Default)]
pub struct MetricsAnalyzer {
    scoring: ScoringConfig,
    diagnostics: DiagnosticConfig,
}

impl MetricsAnalyzer {
    /// Create an analyzer with the default constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom constants.
    pub fn with_config(scoring: ScoringConfig, diagnostics: DiagnosticConfig) -> Self {
        Self {
            scoring,
            diagnostics,
        }
    }

    /// Create from the `analysis` config section.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::with_config(config.scoring.clone(), config.diagnostics.clone())
    }

    /// Analyze one set of metrics.
    pub fn analyze(&self, metrics: &ValidatedMetrics) -> AnalysisResult {
        let gmv = metrics.gmv();
        let viewers = metrics.viewers();
        let orders = metrics.orders();

        let conversion_rate = ratio(orders as f64, viewers);
        let average_order_value = ratio(gmv, orders);
        let value_per_viewer = ratio(gmv, viewers);

        let breakdown =
            self.calculate_breakdown(gmv, conversion_rate, average_order_value, value_per_viewer);
        let score = breakdown.total().min(self.scoring.max_score).max(0.0);
        let rating = self.determine_rating(score);
        let issues = self.diagnose(conversion_rate);

        tracing::debug!(
            gmv,
            viewers,
            orders,
            conversion_rate,
            score,
            rating = %rating,
            "Metrics analyzed"
        );

        AnalysisResult {
            gmv,
            viewers,
            orders,
            conversion_rate,
            average_order_value,
            value_per_viewer,
            breakdown,
            score,
            rating,
            issues,
        }
    }

    /// Compute the four capped sub-scores.
    fn calculate_breakdown(
        &self,
        gmv: f64,
        conversion_rate: f64,
        average_order_value: f64,
        value_per_viewer: f64,
    ) -> ScoreBreakdown {
        let s = &self.scoring;
        let cap = |raw: f64| raw.min(s.component_cap).max(0.0);

        ScoreBreakdown {
            viewer_value: cap(value_per_viewer * s.viewer_value_multiplier),
            conversion: cap(conversion_rate * s.conversion_multiplier),
            order_value: cap(average_order_value / s.order_value_divisor),
            gmv: cap((gmv / s.gmv_unit * 100.0) / s.gmv_divisor),
        }
    }

    /// Map a score to its rating band. Lower bounds are inclusive.
    pub fn determine_rating(&self, score: f64) -> Rating {
        if score >= self.scoring.rating_s {
            Rating::S
        } else if score >= self.scoring.rating_a {
            Rating::A
        } else if score >= self.scoring.rating_b {
            Rating::B
        } else {
            Rating::C
        }
    }

    /// Classify the conversion rate. Does not affect the score.
    pub fn diagnose(&self, conversion_rate: f64) -> Vec<Issue> {
        let pct = format_percent(conversion_rate);
        let metric = Some(format!("转化率: {pct}"));

        if conversion_rate < self.diagnostics.severe_conversion_rate {
            vec![Issue {
                severity: Severity::Severe,
                title: "转化率严重偏低".to_string(),
                description: format!("当前 {pct}，需立即优化"),
                metric,
            }]
        } else if conversion_rate < self.diagnostics.low_conversion_rate {
            vec![Issue {
                severity: Severity::Warning,
                title: "转化率有待提升".to_string(),
                description: format!("当前 {pct}，接近行业基准"),
                metric,
            }]
        } else {
            Vec::new()
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator / denominator as f64
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
