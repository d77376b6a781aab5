use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{DerivedRecord, MealCode, Recommendation, RiskCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Always,
    AbsentDaysAbove(u32),
    AcademicBelow(f64),
    MealCodeIn(Vec<MealCode>),
    PresentDaysBelow(u32),
}

impl Predicate {
    pub fn holds(&self, derived: &DerivedRecord) -> bool {
        let record = &derived.record;
        match self {
            Predicate::Always => true,
            Predicate::AbsentDaysAbove(days) => record.absent_days > *days,
            Predicate::AcademicBelow(score) => record.academic_performance < *score,
            Predicate::MealCodeIn(codes) => codes.contains(&record.meal_code),
            Predicate::PresentDaysBelow(days) => record.present_days < *days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub when: Predicate,
    pub intervention: String,
    pub reason: String,
}

impl Rule {
    fn new(when: Predicate, intervention: &str, reason: &str) -> Self {
        Self {
            when,
            intervention: intervention.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub high: Vec<Rule>,
    pub medium: Vec<Rule>,
    pub low: Vec<Rule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            high: vec![
                Rule::new(
                    Predicate::Always,
                    "counselor meeting",
                    "Risk is at or above the critical threshold; a counselor should review barriers to attendance",
                ),
                Rule::new(
                    Predicate::Always,
                    "48-hour family conference",
                    "Critical risk calls for contacting the family within two school days",
                ),
                Rule::new(
                    Predicate::AbsentDaysAbove(15),
                    "health checkup",
                    "More than 15 absences can point to an underlying health issue",
                ),
                Rule::new(
                    Predicate::AcademicBelow(60.0),
                    "academic tutor",
                    "Academic performance below 60% compounds attendance risk",
                ),
            ],
            medium: vec![
                Rule::new(
                    Predicate::Always,
                    "weekly check-ins",
                    "Elevated risk benefits from regular contact with a trusted adult",
                ),
                Rule::new(
                    Predicate::Always,
                    "attendance report to family",
                    "Families who see attendance data can intervene early",
                ),
                Rule::new(
                    Predicate::MealCodeIn(vec![MealCode::Free, MealCode::Reduced]),
                    "nutrition support",
                    "Meal assistance eligibility suggests socioeconomic barriers to attendance",
                ),
            ],
            low: vec![
                Rule::new(
                    Predicate::Always,
                    "positive reinforcement",
                    "Acknowledging good attendance helps sustain it",
                ),
                Rule::new(
                    Predicate::PresentDaysBelow(160),
                    "attendance improvement goal",
                    "Fewer than 160 days present leaves room for a concrete attendance target",
                ),
            ],
        }
    }
}

impl RuleTable {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let table: RuleTable = serde_json::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    /// Every tier needs an unconditional rule so no record goes without an
    /// intervention.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in RiskCategory::ALL {
            let has_base_action = self
                .rules_for(category)
                .iter()
                .any(|rule| rule.when == Predicate::Always);
            if !has_base_action {
                return Err(ConfigError::Invalid(format!(
                    "{category} rules need at least one unconditional intervention"
                )));
            }
        }
        Ok(())
    }

    pub fn rules_for(&self, category: RiskCategory) -> &[Rule] {
        match category {
            RiskCategory::High => &self.high,
            RiskCategory::Medium => &self.medium,
            RiskCategory::Low => &self.low,
        }
    }

    /// Interventions for a record in the given tier, in table order, keeping
    /// only the first occurrence of each intervention text.
    pub fn recommend(&self, category: RiskCategory, derived: &DerivedRecord) -> Vec<Recommendation> {
        let mut seen = HashSet::new();
        self.rules_for(category)
            .iter()
            .filter(|rule| rule.when.holds(derived))
            .filter(|rule| seen.insert(rule.intervention.as_str()))
            .map(|rule| Recommendation {
                intervention: rule.intervention.clone(),
                reason: rule.reason.clone(),
            })
            .collect()
    }
}

/// Human-readable account of why a record landed in its tier.
pub fn explain(category: RiskCategory, derived: &DerivedRecord) -> Vec<String> {
    let record = &derived.record;
    let mut lines = vec![match category {
        RiskCategory::High => "Critical risk level: chronic absenteeism is likely".to_string(),
        RiskCategory::Medium => "Elevated risk level: attendance needs monitoring".to_string(),
        RiskCategory::Low => "Low risk level: attendance patterns look healthy".to_string(),
    }];

    let attendance_pct = derived.attendance_rate * 100.0;
    if attendance_pct < 85.0 {
        lines.push(format!("Low attendance rate ({attendance_pct:.1}%)"));
    }
    if record.academic_performance < 65.0 {
        lines.push(format!(
            "Below-average academics ({:.1}%)",
            record.academic_performance
        ));
    }
    if record.meal_code.is_assisted() {
        lines.push("Eligible for meal assistance (potential socioeconomic factors)".to_string());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive;
    use crate::models::{Gender, StudentRecord};
    use proptest::prelude::*;

    fn student(present: u32, absent: u32, academic: f64, meal_code: MealCode) -> DerivedRecord {
        derive(StudentRecord {
            student_id: Some("S042".to_string()),
            school: "East Middle".to_string(),
            grade: 7,
            gender: Gender::Other,
            meal_code,
            present_days: present,
            absent_days: absent,
            academic_performance: academic,
            year: Some("2024".to_string()),
            extra: Default::default(),
        })
    }

    fn interventions(recommendations: &[Recommendation]) -> Vec<&str> {
        recommendations
            .iter()
            .map(|rec| rec.intervention.as_str())
            .collect()
    }

    #[test]
    fn high_tier_adds_conditional_actions_after_base_actions() {
        let table = RuleTable::default();
        let recs = table.recommend(RiskCategory::High, &student(80, 40, 45.0, MealCode::Paid));
        assert_eq!(
            interventions(&recs),
            vec![
                "counselor meeting",
                "48-hour family conference",
                "health checkup",
                "academic tutor"
            ]
        );

        let recs = table.recommend(RiskCategory::High, &student(150, 15, 60.0, MealCode::Paid));
        assert_eq!(
            interventions(&recs),
            vec!["counselor meeting", "48-hour family conference"]
        );
    }

    #[test]
    fn nutrition_support_requires_medium_tier_and_assisted_meals() {
        let table = RuleTable::default();
        let free = student(120, 40, 55.0, MealCode::Free);
        let medium = table.recommend(RiskCategory::Medium, &free);
        assert_eq!(
            interventions(&medium),
            vec!["weekly check-ins", "attendance report to family", "nutrition support"]
        );

        let high = table.recommend(RiskCategory::High, &free);
        assert!(!interventions(&high).contains(&"nutrition support"));

        let paid = table.recommend(RiskCategory::Medium, &student(120, 40, 55.0, MealCode::Paid));
        assert!(!interventions(&paid).contains(&"nutrition support"));
    }

    #[test]
    fn low_tier_sets_goal_below_160_present_days() {
        let table = RuleTable::default();
        let recs = table.recommend(RiskCategory::Low, &student(150, 10, 70.0, MealCode::Paid));
        assert_eq!(
            interventions(&recs),
            vec!["positive reinforcement", "attendance improvement goal"]
        );
        let recs = table.recommend(RiskCategory::Low, &student(170, 2, 90.0, MealCode::Paid));
        assert_eq!(interventions(&recs), vec!["positive reinforcement"]);
    }

    #[test]
    fn duplicate_interventions_keep_first_reason() {
        let mut table = RuleTable::default();
        table.low.push(Rule::new(
            Predicate::Always,
            "positive reinforcement",
            "second copy",
        ));
        let recs = table.recommend(RiskCategory::Low, &student(170, 2, 90.0, MealCode::Paid));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].reason, RuleTable::default().low[0].reason);
    }

    #[test]
    fn loaded_tables_need_base_actions() {
        let json = serde_json::to_string(&RuleTable::default()).unwrap();
        assert_eq!(RuleTable::from_json(&json).unwrap(), RuleTable::default());

        let mut table = RuleTable::default();
        table.medium.retain(|rule| rule.when != Predicate::Always);
        let json = serde_json::to_string(&table).unwrap();
        assert!(matches!(
            RuleTable::from_json(&json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn explanation_lists_contributing_factors() {
        let lines = explain(RiskCategory::Medium, &student(120, 40, 55.0, MealCode::Reduced));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("75.0%"));
        assert!(lines[2].contains("55.0%"));

        let lines = explain(RiskCategory::Low, &student(170, 2, 90.0, MealCode::Paid));
        assert_eq!(lines.len(), 1);
    }

    proptest! {
        #[test]
        fn recommendations_are_never_empty_or_duplicated(
            present in 0u32..250,
            absent in 0u32..250,
            academic in 0.0f64..=100.0,
            meal in prop::sample::select(vec![MealCode::Free, MealCode::Reduced, MealCode::Paid]),
            category in prop::sample::select(RiskCategory::ALL.to_vec()),
        ) {
            let recs = RuleTable::default().recommend(category, &student(present, absent, academic, meal));
            prop_assert!(!recs.is_empty());
            let unique: HashSet<&str> = recs.iter().map(|rec| rec.intervention.as_str()).collect();
            prop_assert_eq!(unique.len(), recs.len());
        }
    }
}
