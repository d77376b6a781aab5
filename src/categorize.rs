use crate::config::RiskThresholds;
use crate::models::RiskCategory;

pub fn categorize(risk: f64, thresholds: &RiskThresholds) -> RiskCategory {
    if risk >= thresholds.high {
        RiskCategory::High
    } else if risk >= thresholds.medium {
        RiskCategory::Medium
    } else {
        RiskCategory::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_bands(risk: f64) -> RiskCategory {
        categorize(risk, &RiskThresholds::default())
    }

    #[test]
    fn boundaries_belong_to_the_higher_band() {
        assert_eq!(default_bands(0.0), RiskCategory::Low);
        assert_eq!(default_bands(0.2999), RiskCategory::Low);
        assert_eq!(default_bands(0.3), RiskCategory::Medium);
        assert_eq!(default_bands(0.6999), RiskCategory::Medium);
        assert_eq!(default_bands(0.7), RiskCategory::High);
        assert_eq!(default_bands(1.0), RiskCategory::High);
    }

    #[test]
    fn custom_thresholds_move_the_bands() {
        let thresholds = RiskThresholds {
            medium: 0.4,
            high: 0.8,
        };
        assert_eq!(categorize(0.35, &thresholds), RiskCategory::Low);
        assert_eq!(categorize(0.75, &thresholds), RiskCategory::Medium);
        assert_eq!(categorize(0.8, &thresholds), RiskCategory::High);
    }

    proptest! {
        #[test]
        fn category_agrees_with_band_definition(risk in 0.0f64..=1.0) {
            let expected = if risk >= 0.7 {
                RiskCategory::High
            } else if risk >= 0.3 {
                RiskCategory::Medium
            } else {
                RiskCategory::Low
            };
            prop_assert_eq!(default_bands(risk), expected);
        }
    }
}
