use std::io::Write;
use std::path::Path;

use anyhow::Context;
use uuid::Uuid;

use crate::error::ExportError;
use crate::models::RawRecord;

const SCHOOLS: &[&str] = &[
    "North High",
    "South High",
    "East Middle",
    "West Elementary",
    "Central Academy",
];
const GENDERS: &[&str] = &["Male", "Female", "Other"];
const MEAL_CODES: &[&str] = &["Free", "Reduced", "Paid"];

/// Reads a headed CSV into raw rows keyed by column name. Cells are trimmed,
/// and blank or missing trailing cells are left out so they read as missing.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", index + 1))?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.trim().to_string(), value.trim().to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// A column-selected, row-oriented table ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Writes a demo roster. Identifiers are random; attributes are spread by
/// row position so every tier is represented.
pub fn write_sample(path: &Path, count: usize) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record([
        "Student_ID",
        "School",
        "Grade",
        "Gender",
        "Meal_Code",
        "Present_Days",
        "Absent_Days",
        "Academic_Performance",
        "Year",
    ])?;

    for index in 0..count {
        let absent_days = (index * 7) % 60;
        let present_days = 180 - absent_days;
        let academic = 40 + (index * 13) % 61;
        let id = Uuid::new_v4().simple().to_string();
        writer.write_record([
            format!("STU-{}", &id[..8]),
            SCHOOLS[index % SCHOOLS.len()].to_string(),
            (1 + index % 12).to_string(),
            GENDERS[index % GENDERS.len()].to_string(),
            MEAL_CODES[(index / 2) % MEAL_CODES.len()].to_string(),
            present_days.to_string(),
            absent_days.to_string(),
            academic.to_string(),
            "2025".to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
