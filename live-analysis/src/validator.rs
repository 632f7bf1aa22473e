//! Completeness gate between extraction and analysis.

use crate::error::AnalysisError;
use crate::types::{MetricField, PartialMetrics, ValidatedMetrics};

/// True iff all three metrics are present.
pub fn is_complete(partial: &PartialMetrics) -> bool {
    partial.gmv.is_some() && partial.viewers.is_some() && partial.orders.is_some()
}

impl PartialMetrics {
    /// Fields the message did not provide, in display order.
    pub fn missing_fields(&self) -> Vec<MetricField> {
        MetricField::ALL
            .into_iter()
            .filter(|field| match field {
                MetricField::Gmv => self.gmv.is_none(),
                MetricField::Viewers => self.viewers.is_none(),
                MetricField::Orders => self.orders.is_none(),
            })
            .collect()
    }

    /// Promote to [`ValidatedMetrics`], or report what is missing.
    pub fn validate(self) -> Result<ValidatedMetrics, AnalysisError> {
        match (self.gmv, self.viewers, self.orders) {
            (Some(gmv), Some(viewers), Some(orders)) => ValidatedMetrics::new(gmv, viewers, orders),
            _ => Err(AnalysisError::IncompleteMetrics {
                missing: self.missing_fields(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete() {
        let partial = PartialMetrics {
            gmv: Some(1000.0),
            viewers: Some(5000),
            orders: Some(50),
        };
        assert!(is_complete(&partial));
        assert!(partial.missing_fields().is_empty());

        let validated = partial.validate().unwrap();
        assert_eq!(validated.gmv(), 1000.0);
        assert_eq!(validated.viewers(), 5000);
        assert_eq!(validated.orders(), 50);
    }

    #[test]
    fn test_missing_orders() {
        let partial = PartialMetrics {
            gmv: Some(1000.0),
            viewers: Some(5000),
            orders: None,
        };
        assert!(!is_complete(&partial));
        assert_eq!(
            partial.validate().unwrap_err(),
            AnalysisError::IncompleteMetrics {
                missing: vec![MetricField::Orders]
            }
        );
    }

    #[test]
    fn test_empty_reports_all_fields() {
        let partial = PartialMetrics::default();
        assert!(!is_complete(&partial));
        assert_eq!(partial.missing_fields(), MetricField::ALL.to_vec());
    }

    #[test]
    fn test_zeroes_are_complete() {
        let partial = PartialMetrics {
            gmv: Some(0.0),
            viewers: Some(0),
            orders: Some(0),
        };
        assert!(is_complete(&partial));
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_negative_gmv_rejected() {
        let partial = PartialMetrics {
            gmv: Some(-5.0),
            viewers: Some(1),
            orders: Some(1),
        };
        assert!(matches!(
            partial.validate(),
            Err(AnalysisError::InvalidValue { .. })
        ));
    }
}
