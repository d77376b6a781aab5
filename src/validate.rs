use std::collections::BTreeMap;

use crate::error::{CoercionWarning, ValidationError};
use crate::models::{Gender, MealCode, RawRecord, StudentRecord};

pub const DEFAULT_GRADE: u8 = 9;
pub const DEFAULT_GENDER: Gender = Gender::Male;
pub const DEFAULT_MEAL_CODE: MealCode = MealCode::Paid;
pub const DEFAULT_SCHOOL: &str = "Unassigned";

const KNOWN_COLUMNS: &[&str] = &[
    "Student_ID",
    "School",
    "Grade",
    "Gender",
    "Meal_Code",
    "Present_Days",
    "Absent_Days",
    "Academic_Performance",
    "Academic_Perf",
    "Year",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub record: StudentRecord,
    pub warnings: Vec<CoercionWarning>,
}

/// `Academic_Perf` is accepted when `Academic_Performance` is absent.
pub fn validate(raw: &RawRecord) -> Result<Validated, ValidationError> {
    let mut warnings = Vec::new();

    let present_days = required_count(raw, "Present_Days")?;
    let absent_days = required_count(raw, "Absent_Days")?;

    let academic_text = field(raw, "Academic_Performance")
        .or_else(|| field(raw, "Academic_Perf"))
        .ok_or(ValidationError::MissingField("Academic_Performance"))?;
    let academic_performance = parse_number("Academic_Performance", academic_text)?;
    if !(0.0..=100.0).contains(&academic_performance) {
        return Err(ValidationError::OutOfRange {
            field: "Academic_Performance",
            value: academic_performance,
            expected: "0 to 100",
        });
    }

    let grade = match field(raw, "Grade") {
        Some(text) => {
            let value = parse_number("Grade", text)?;
            if value.fract() != 0.0 {
                return Err(ValidationError::NotNumeric {
                    field: "Grade",
                    value: text.to_string(),
                });
            }
            if !(1.0..=12.0).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: "Grade",
                    value,
                    expected: "1 to 12",
                });
            }
            value as u8
        }
        None => DEFAULT_GRADE,
    };

    let gender = match field(raw, "Gender") {
        Some(text) => text.parse().unwrap_or_else(|_| {
            warnings.push(CoercionWarning {
                field: "Gender",
                value: text.to_string(),
                substituted: DEFAULT_GENDER.as_str(),
            });
            DEFAULT_GENDER
        }),
        None => DEFAULT_GENDER,
    };

    let meal_code = match field(raw, "Meal_Code") {
        Some(text) => text.parse().unwrap_or_else(|_| {
            warnings.push(CoercionWarning {
                field: "Meal_Code",
                value: text.to_string(),
                substituted: DEFAULT_MEAL_CODE.as_str(),
            });
            DEFAULT_MEAL_CODE
        }),
        None => DEFAULT_MEAL_CODE,
    };

    let extra: BTreeMap<String, String> = raw
        .iter()
        .filter(|(key, _)| !KNOWN_COLUMNS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let record = StudentRecord {
        student_id: field(raw, "Student_ID").map(str::to_string),
        school: field(raw, "School").unwrap_or(DEFAULT_SCHOOL).to_string(),
        grade,
        gender,
        meal_code,
        present_days,
        absent_days,
        academic_performance,
        year: field(raw, "Year").map(str::to_string),
        extra,
    };

    Ok(Validated { record, warnings })
}

/// Returns the trimmed value of a column, treating blank cells as absent.
fn field<'a>(raw: &'a RawRecord, name: &str) -> Option<&'a str> {
    raw.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_number(name: &'static str, text: &str) -> Result<f64, ValidationError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::NotNumeric {
            field: name,
            value: text.to_string(),
        }),
    }
}

fn required_count(raw: &RawRecord, name: &'static str) -> Result<u32, ValidationError> {
    let text = field(raw, name).ok_or(ValidationError::MissingField(name))?;
    let value = parse_number(name, text)?;
    if value < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: name,
            value,
            expected: "a non-negative day count",
        });
    }
    // Spreadsheet exports often write whole numbers as `150.0`.
    if value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(ValidationError::NotNumeric {
            field: name,
            value: text.to_string(),
        });
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn minimal() -> RawRecord {
        raw(&[
            ("Present_Days", "150"),
            ("Absent_Days", "10"),
            ("Academic_Performance", "70"),
        ])
    }

    #[test]
    fn applies_defaults_for_missing_optional_columns() {
        let validated = validate(&minimal()).unwrap();
        let record = validated.record;
        assert_eq!(record.grade, DEFAULT_GRADE);
        assert_eq!(record.gender, Gender::Male);
        assert_eq!(record.meal_code, MealCode::Paid);
        assert_eq!(record.school, DEFAULT_SCHOOL);
        assert_eq!(record.student_id, None);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn reports_missing_required_fields() {
        let mut row = minimal();
        row.remove("Absent_Days");
        assert_eq!(
            validate(&row).unwrap_err(),
            ValidationError::MissingField("Absent_Days")
        );

        let mut row = minimal();
        row.insert("Present_Days".to_string(), "   ".to_string());
        assert_eq!(
            validate(&row).unwrap_err(),
            ValidationError::MissingField("Present_Days")
        );
    }

    #[test]
    fn accepts_short_academic_column_name() {
        let mut row = minimal();
        row.remove("Academic_Performance");
        row.insert("Academic_Perf".to_string(), "55.5".to_string());
        let record = validate(&row).unwrap().record;
        assert_eq!(record.academic_performance, 55.5);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut row = minimal();
        row.insert("Grade".to_string(), "13".to_string());
        assert!(matches!(
            validate(&row),
            Err(ValidationError::OutOfRange { field: "Grade", .. })
        ));

        let mut row = minimal();
        row.insert("Academic_Performance".to_string(), "100.5".to_string());
        assert!(matches!(
            validate(&row),
            Err(ValidationError::OutOfRange {
                field: "Academic_Performance",
                ..
            })
        ));

        let mut row = minimal();
        row.insert("Absent_Days".to_string(), "-2".to_string());
        assert!(matches!(
            validate(&row),
            Err(ValidationError::OutOfRange {
                field: "Absent_Days",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_numeric_counts() {
        let mut row = minimal();
        row.insert("Present_Days".to_string(), "lots".to_string());
        assert!(matches!(
            validate(&row),
            Err(ValidationError::NotNumeric {
                field: "Present_Days",
                ..
            })
        ));

        let mut row = minimal();
        row.insert("Present_Days".to_string(), "150.0".to_string());
        assert_eq!(validate(&row).unwrap().record.present_days, 150);
    }

    #[test]
    fn coerces_unknown_categoricals_with_warning() {
        let mut row = minimal();
        row.insert("Meal_Code".to_string(), "Scholarship".to_string());
        row.insert("Gender".to_string(), "female".to_string());
        let validated = validate(&row).unwrap();
        assert_eq!(validated.record.meal_code, MealCode::Paid);
        assert_eq!(validated.record.gender, Gender::Female);
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.warnings[0].field, "Meal_Code");
        assert_eq!(validated.warnings[0].value, "Scholarship");
    }

    #[test]
    fn passes_unknown_columns_through() {
        let mut row = minimal();
        row.insert("Attendance_Percentage".to_string(), "93.75".to_string());
        row.insert("Homeroom".to_string(), "B12".to_string());
        let record = validate(&row).unwrap().record;
        assert_eq!(record.extra.len(), 2);
        assert_eq!(record.extra["Homeroom"], "B12");
    }
}
