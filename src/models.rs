use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A raw input row keyed by column name, as read from an upload.
pub type RawRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealCode {
    Free,
    Reduced,
    Paid,
}

impl MealCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealCode::Free => "Free",
            MealCode::Reduced => "Reduced",
            MealCode::Paid => "Paid",
        }
    }

    pub fn is_assisted(&self) -> bool {
        matches!(self, MealCode::Free | MealCode::Reduced)
    }
}

impl FromStr for MealCode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(MealCode::Free),
            "reduced" => Ok(MealCode::Reduced),
            "paid" => Ok(MealCode::Paid),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MealCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk tiers, declared from most to least severe so that ordered maps
/// list `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    High,
    Medium,
    Low,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 3] = [RiskCategory::High, RiskCategory::Medium, RiskCategory::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::High => "High",
            RiskCategory::Medium => "Medium",
            RiskCategory::Low => "Low",
        }
    }
}

impl FromStr for RiskCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(RiskCategory::High),
            "medium" => Ok(RiskCategory::Medium),
            "low" => Ok(RiskCategory::Low),
            other => Err(format!("unknown risk category `{other}`")),
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: Option<String>,
    pub school: String,
    pub grade: u8,
    pub gender: Gender,
    pub meal_code: MealCode,
    pub present_days: u32,
    pub absent_days: u32,
    pub academic_performance: f64,
    pub year: Option<String>,
    /// Columns the validator does not know about, carried through untouched.
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub record: StudentRecord,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub intervention: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub student_id: String,
    pub ca_risk: f64,
    pub risk_category: RiskCategory,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedRow {
    pub row_index: usize,
    pub assessment: RiskAssessment,
    pub source: DerivedRecord,
}

impl AssessedRow {
    pub fn school(&self) -> &str {
        &self.source.record.school
    }

    pub fn category(&self) -> RiskCategory {
        self.assessment.risk_category
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_index: usize,
    pub student_id: Option<String>,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_rows: usize,
    pub rows: Vec<AssessedRow>,
    pub issues: Vec<RowIssue>,
    pub summary: BTreeMap<RiskCategory, CategorySummary>,
}
