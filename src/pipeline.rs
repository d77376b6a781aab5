use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::categorize::categorize;
use crate::config::{RiskThresholds, ScoringConfig};
use crate::error::{ExportError, ScoringError};
use crate::features::derive;
use crate::io::ExportTable;
use crate::models::{
    AssessedRow, BatchResult, CategorySummary, DerivedRecord, IssueKind, RawRecord,
    RiskAssessment, RiskCategory, RowIssue,
};
use crate::recommend::RuleTable;
use crate::scoring::Scorer;
use crate::validate::validate;

pub const EXPORT_COLUMNS: &[&str] = &[
    "Student_ID",
    "School",
    "Grade",
    "Gender",
    "Meal_Code",
    "Present_Days",
    "Absent_Days",
    "Academic_Performance",
    "Year",
    "Attendance_Rate",
    "CA_Risk",
    "Risk_Category",
    "Recommendations",
];

pub const DEFAULT_EXPORT_COLUMNS: &[&str] = &[
    "Student_ID",
    "School",
    "Grade",
    "Gender",
    "CA_Risk",
    "Risk_Category",
];

#[derive(Clone)]
pub struct Pipeline {
    thresholds: RiskThresholds,
    scorer: Scorer,
    rules: RuleTable,
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = ScoringConfig::default();
        Self::new(&config, Scorer::heuristic(&config), RuleTable::default())
    }
}

impl Pipeline {
    pub fn new(config: &ScoringConfig, scorer: Scorer, rules: RuleTable) -> Self {
        Self {
            thresholds: config.thresholds,
            scorer,
            rules,
        }
    }

    /// Scores, categorizes and recommends for a single derived record. Model
    /// inference is held to the configured timeout.
    pub async fn assess(
        &self,
        student_id: &str,
        derived: &DerivedRecord,
    ) -> Result<RiskAssessment, ScoringError> {
        let ca_risk = self.scorer.score_bounded(derived).await?;
        Ok(self.finish(student_id, derived, ca_risk))
    }

    fn finish(&self, student_id: &str, derived: &DerivedRecord, ca_risk: f64) -> RiskAssessment {
        let risk_category = categorize(ca_risk, &self.thresholds);
        RiskAssessment {
            student_id: student_id.to_string(),
            ca_risk,
            risk_category,
            recommendations: self.rules.recommend(risk_category, derived),
        }
    }

    /// Processes every row independently. Rows that fail validation or
    /// scoring are reported in `issues` and left out of `rows`.
    pub async fn run(&self, records: &[RawRecord]) -> BatchResult {
        info!(
            rows = records.len(),
            model = self.scorer.has_model(),
            "starting batch run"
        );

        let mut rows = Vec::with_capacity(records.len());
        let mut issues = Vec::new();

        for (row_index, raw) in records.iter().enumerate() {
            let raw_id = raw
                .get("Student_ID")
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty());

            let validated = match validate(raw) {
                Ok(validated) => validated,
                Err(err) => {
                    warn!(row = row_index + 1, error = %err, "excluding invalid row");
                    issues.push(RowIssue {
                        row_index,
                        student_id: raw_id,
                        kind: IssueKind::Error,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for warning in &validated.warnings {
                warn!(row = row_index + 1, %warning, "coerced value");
                issues.push(RowIssue {
                    row_index,
                    student_id: raw_id.clone(),
                    kind: IssueKind::Warning,
                    message: warning.to_string(),
                });
            }

            let derived = derive(validated.record);
            let student_id = raw_id
                .clone()
                .unwrap_or_else(|| format!("row-{}", row_index + 1));

            let ca_risk = match self.scorer.score_bounded(&derived).await {
                Ok(risk) => risk,
                Err(err) => {
                    warn!(row = row_index + 1, error = %err, "excluding unscored row");
                    issues.push(RowIssue {
                        row_index,
                        student_id: raw_id,
                        kind: IssueKind::Error,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let assessment = self.finish(&student_id, &derived, ca_risk);
            debug!(
                student_id = %assessment.student_id,
                ca_risk = assessment.ca_risk,
                category = %assessment.risk_category,
                "scored row"
            );
            rows.push(AssessedRow {
                row_index,
                assessment,
                source: derived,
            });
        }

        let summary = summarize(&rows);
        info!(
            assessed = rows.len(),
            excluded = records.len() - rows.len(),
            issues = issues.len(),
            "batch run complete"
        );

        BatchResult {
            total_rows: records.len(),
            rows,
            issues,
            summary,
        }
    }
}

pub fn summarize(rows: &[AssessedRow]) -> BTreeMap<RiskCategory, CategorySummary> {
    let total = rows.len();
    RiskCategory::ALL
        .into_iter()
        .map(|category| {
            let count = rows.iter().filter(|row| row.category() == category).count();
            let percentage = if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 1000.0).round() / 10.0
            };
            (category, CategorySummary { count, percentage })
        })
        .collect()
}

/// Post-hoc selection over computed results. An empty category list
/// matches every tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub school: Option<String>,
    pub categories: Vec<RiskCategory>,
}

impl ResultFilter {
    pub fn matches(&self, row: &AssessedRow) -> bool {
        let school_ok = self
            .school
            .as_deref()
            .map_or(true, |school| row.school() == school);
        let category_ok = self.categories.is_empty() || self.categories.contains(&row.category());
        school_ok && category_ok
    }
}

impl BatchResult {
    pub fn excluded(&self) -> impl Iterator<Item = &RowIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::Error)
    }

    pub fn filter<'a>(&'a self, filter: &ResultFilter) -> Vec<&'a AssessedRow> {
        self.rows.iter().filter(|row| filter.matches(row)).collect()
    }

    /// Rows sorted by descending risk; ties keep input order.
    pub fn ranked<'a>(&'a self, filter: &ResultFilter) -> Vec<&'a AssessedRow> {
        let mut rows = self.filter(filter);
        rows.sort_by(|a, b| {
            b.assessment
                .ca_risk
                .partial_cmp(&a.assessment.ca_risk)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    /// Row-oriented projection of the selected columns over rows in the
    /// selected tiers. Blank column names are ignored.
    pub fn export(
        &self,
        fields: &[String],
        categories: &[RiskCategory],
    ) -> Result<ExportTable, ExportError> {
        let fields: Vec<&str> = fields
            .iter()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        for field in &fields {
            let known = EXPORT_COLUMNS.contains(field)
                || self
                    .rows
                    .iter()
                    .any(|row| row.source.record.extra.contains_key(*field));
            if !known {
                return Err(ExportError::UnknownField(field.to_string()));
            }
        }

        let rows = self
            .rows
            .iter()
            .filter(|row| categories.contains(&row.category()))
            .map(|row| fields.iter().map(|field| column_value(row, field)).collect())
            .collect();

        Ok(ExportTable {
            headers: fields.iter().map(|field| field.to_string()).collect(),
            rows,
        })
    }
}

fn column_value(row: &AssessedRow, field: &str) -> String {
    let record = &row.source.record;
    match field {
        "Student_ID" => row.assessment.student_id.clone(),
        "School" => record.school.clone(),
        "Grade" => record.grade.to_string(),
        "Gender" => record.gender.to_string(),
        "Meal_Code" => record.meal_code.to_string(),
        "Present_Days" => record.present_days.to_string(),
        "Absent_Days" => record.absent_days.to_string(),
        "Academic_Performance" => record.academic_performance.to_string(),
        "Year" => record.year.clone().unwrap_or_default(),
        "Attendance_Rate" => format!("{:.4}", row.source.attendance_rate),
        "CA_Risk" => format!("{:.4}", row.assessment.ca_risk),
        "Risk_Category" => row.assessment.risk_category.to_string(),
        "Recommendations" => row
            .assessment
            .recommendations
            .iter()
            .map(|rec| rec.intervention.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        other => record.extra.get(other).cloned().unwrap_or_default(),
    }
}
