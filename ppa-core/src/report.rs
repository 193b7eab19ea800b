//! Turns a budget and a match into the report to submit.

use ppa_dap::one_hot;

use crate::model::{Budget, Impression};

/// What a single conversion will report.
///
/// A report is produced for every conversion, matched or not, so that the
/// submission cadence reveals nothing about budgets or matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub task_id: String,
    pub histogram_size: u32,
    pub index: u32,
    pub value: u8,
}

impl ConversionReport {
    /// Decide the report for a conversion.
    ///
    /// Only a match with budget remaining sets a bucket; anything else yields
    /// `index = 0, value = 0`.
    pub fn build(
        task_id: &str,
        histogram_size: u32,
        budget: &Budget,
        max_conversions: u32,
        impression: Option<&Impression>,
    ) -> Self {
        let (index, value) = match impression {
            Some(imp) if budget.conversions < max_conversions => (imp.index, 1),
            _ => (0, 0),
        };
        Self {
            task_id: task_id.to_string(),
            histogram_size,
            index,
            value,
        }
    }

    pub fn is_attributed(&self) -> bool {
        self.value == 1
    }

    /// Conversions this report charges against the budget.
    pub fn budget_delta(&self) -> u32 {
        u32::from(self.value)
    }

    /// The histogram with at most one bucket set.
    pub fn measurement(&self) -> Vec<u8> {
        one_hot(self.index, self.histogram_size, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imp(index: u32) -> Impression {
        Impression::new("a.com", "b.com", index)
    }

    #[test]
    fn test_match_with_budget_sets_bucket() {
        let report = ConversionReport::build("t", 10, &Budget::fresh(0), 2, Some(&imp(3)));

        assert!(report.is_attributed());
        assert_eq!(report.budget_delta(), 1);
        assert_eq!(report.measurement()[3], 1);
        assert_eq!(report.measurement().iter().map(|b| *b as u32).sum::<u32>(), 1);
    }

    #[test]
    fn test_exhausted_budget_reports_zero() {
        let spent = Budget {
            conversions: 2,
            next_reset: 0,
        };
        let report = ConversionReport::build("t", 10, &spent, 2, Some(&imp(3)));

        assert!(!report.is_attributed());
        assert_eq!(report.index, 0);
        assert_eq!(report.budget_delta(), 0);
        assert_eq!(report.measurement(), vec![0u8; 10]);
    }

    #[test]
    fn test_no_match_reports_zero() {
        let report = ConversionReport::build("t", 4, &Budget::fresh(0), 2, None);

        assert_eq!(report.index, 0);
        assert_eq!(report.value, 0);
        assert_eq!(report.measurement(), vec![0u8; 4]);
    }
}
