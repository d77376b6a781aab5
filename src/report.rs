use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{BatchResult, IssueKind, RiskCategory};
use crate::pipeline::ResultFilter;
use crate::recommend::explain;

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolSummary {
    pub school: String,
    pub count: usize,
    pub high_risk: usize,
    pub avg_risk: f64,
}

pub fn summarize_by_school(result: &BatchResult) -> Vec<SchoolSummary> {
    let mut map: std::collections::BTreeMap<&str, (usize, usize, f64)> =
        std::collections::BTreeMap::new();

    for row in &result.rows {
        let entry = map.entry(row.school()).or_insert((0, 0, 0.0));
        entry.0 += 1;
        if row.category() == RiskCategory::High {
            entry.1 += 1;
        }
        entry.2 += row.assessment.ca_risk;
    }

    let mut summaries: Vec<SchoolSummary> = map
        .into_iter()
        .map(|(school, (count, high_risk, total_risk))| SchoolSummary {
            school: school.to_string(),
            count,
            high_risk,
            avg_risk: if count == 0 {
                0.0
            } else {
                total_risk / count as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.high_risk.cmp(&a.high_risk).then(b.count.cmp(&a.count)));
    summaries
}

pub fn build_report(
    result: &BatchResult,
    source: &str,
    generated_at: DateTime<Utc>,
    top: usize,
) -> String {
    let schools = summarize_by_school(result);
    let ranked = result.ranked(&ResultFilter::default());

    let mut output = String::new();

    let _ = writeln!(output, "# Chronic Absenteeism Risk Report");
    let _ = writeln!(
        output,
        "Generated from {} on {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        output,
        "{} of {} rows assessed, {} excluded",
        result.rows.len(),
        result.total_rows,
        result.excluded().count()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");

    for (category, summary) in &result.summary {
        let _ = writeln!(
            output,
            "- {}: {} students ({:.1}%)",
            category, summary.count, summary.percentage
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Schools");

    if schools.is_empty() {
        let _ = writeln!(output, "No students assessed.");
    } else {
        for school in &schools {
            let _ = writeln!(
                output,
                "- {}: {} students, {} high risk (avg risk {:.2})",
                school.school, school.count, school.high_risk, school.avg_risk
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if ranked.is_empty() {
        let _ = writeln!(output, "No students assessed.");
    } else {
        for row in ranked.iter().take(top) {
            let _ = writeln!(
                output,
                "- {} ({}, grade {}) risk {:.2} [{}]",
                row.assessment.student_id,
                row.school(),
                row.source.record.grade,
                row.assessment.ca_risk,
                row.category()
            );
            for line in explain(row.category(), &row.source) {
                let _ = writeln!(output, "  > {}", line);
            }
            for rec in &row.assessment.recommendations {
                let _ = writeln!(output, "  - {}: {}", rec.intervention, rec.reason);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Issues");

    if result.issues.is_empty() {
        let _ = writeln!(output, "No issues found.");
    } else {
        for issue in &result.issues {
            let label = match issue.kind {
                IssueKind::Error => "excluded",
                IssueKind::Warning => "warning",
            };
            let _ = writeln!(
                output,
                "- row {} ({}) {}: {}",
                issue.row_index + 1,
                issue.student_id.as_deref().unwrap_or("no id"),
                label,
                issue.message
            );
        }
    }

    output
}
