use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ca_risk::config::ScoringConfig;
use ca_risk::features::derive;
use ca_risk::models::{RawRecord, RiskCategory};
use ca_risk::pipeline::{Pipeline, ResultFilter, DEFAULT_EXPORT_COLUMNS};
use ca_risk::recommend::{explain, RuleTable};
use ca_risk::scoring::{LogisticModel, Scorer};
use ca_risk::{io, report, validate};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ca-risk")]
#[command(about = "Chronic absenteeism risk scoring and intervention planning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScoringArgs {
    /// JSON file with weights, thresholds and model timeout
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file with a custom intervention rule table
    #[arg(long)]
    rules: Option<PathBuf>,
    /// JSON file with logistic model coefficients; heuristic scoring without it
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a roster and print the highest risk students
    Score {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        school: Option<String>,
        #[arg(long, value_delimiter = ',')]
        risk: Vec<RiskCategory>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Assess a single student
    Assess {
        #[arg(long)]
        present: String,
        #[arg(long)]
        absent: String,
        #[arg(long)]
        academic: String,
        #[arg(long)]
        student_id: Option<String>,
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        meal: Option<String>,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Export selected columns for selected risk tiers as CSV
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_delimiter = ',', default_values = DEFAULT_EXPORT_COLUMNS.iter().copied())]
        fields: Vec<String>,
        #[arg(long, value_delimiter = ',', default_values = ["High", "Medium", "Low"])]
        risk: Vec<RiskCategory>,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Write a demo roster
    Sample {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 50)]
        count: usize,
    },
}

fn build_pipeline(args: &ScoringArgs) -> anyhow::Result<Pipeline> {
    let config = match &args.config {
        Some(path) => ScoringConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ScoringConfig::default(),
    };
    let rules = match &args.rules {
        Some(path) => RuleTable::from_path(path)
            .with_context(|| format!("failed to load rules from {}", path.display()))?,
        None => RuleTable::default(),
    };
    let scorer = match &args.model {
        Some(path) => {
            let model = LogisticModel::from_path(path)
                .with_context(|| format!("failed to load model from {}", path.display()))?;
            info!(model = %path.display(), "using trained model");
            Scorer::with_model(&config, Arc::new(model))
        }
        None => Scorer::heuristic(&config),
    };
    Ok(Pipeline::new(&config, scorer, rules))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            csv,
            school,
            risk,
            limit,
            scoring,
        } => {
            let pipeline = build_pipeline(&scoring)?;
            let records = io::read_records(&csv)?;
            let result = pipeline.run(&records).await;

            println!(
                "Assessed {} of {} rows ({} excluded).",
                result.rows.len(),
                result.total_rows,
                result.excluded().count()
            );
            for (category, summary) in &result.summary {
                println!(
                    "- {}: {} ({:.1}%)",
                    category, summary.count, summary.percentage
                );
            }

            let filter = ResultFilter {
                school,
                categories: risk,
            };
            let ranked = result.ranked(&filter);
            if ranked.is_empty() {
                println!("No students match this filter.");
                return Ok(());
            }

            println!("Top students by risk:");
            for row in ranked.iter().take(limit) {
                println!(
                    "- {} ({}, grade {}, {}) risk {:.2} [{}]",
                    row.assessment.student_id,
                    row.school(),
                    row.source.record.grade,
                    row.source.record.gender,
                    row.assessment.ca_risk,
                    row.category()
                );
            }
        }
        Commands::Assess {
            present,
            absent,
            academic,
            student_id,
            school,
            grade,
            gender,
            meal,
            scoring,
        } => {
            let pipeline = build_pipeline(&scoring)?;
            let mut raw = RawRecord::new();
            raw.insert("Present_Days".to_string(), present);
            raw.insert("Absent_Days".to_string(), absent);
            raw.insert("Academic_Performance".to_string(), academic);
            for (key, value) in [
                ("Student_ID", student_id),
                ("School", school),
                ("Grade", grade),
                ("Gender", gender),
                ("Meal_Code", meal),
            ] {
                if let Some(value) = value {
                    raw.insert(key.to_string(), value);
                }
            }

            let validated = validate::validate(&raw)?;
            for warning in &validated.warnings {
                println!("Warning: {warning}");
            }
            let student_id = validated
                .record
                .student_id
                .clone()
                .unwrap_or_else(|| "student".to_string());
            let derived = derive(validated.record);
            let assessment = pipeline.assess(&student_id, &derived).await?;

            println!(
                "{}: risk {:.2} ({}), attendance {:.1}%",
                assessment.student_id,
                assessment.ca_risk,
                assessment.risk_category,
                derived.attendance_rate * 100.0
            );
            for line in explain(assessment.risk_category, &derived) {
                println!("  {line}");
            }
            println!("Recommended actions:");
            for rec in &assessment.recommendations {
                println!("- {}: {}", rec.intervention, rec.reason);
            }
        }
        Commands::Export {
            csv,
            out,
            fields,
            risk,
            scoring,
        } => {
            let pipeline = build_pipeline(&scoring)?;
            let records = io::read_records(&csv)?;
            let result = pipeline.run(&records).await;
            let table = result.export(&fields, &risk)?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            table.write_csv(file)?;
            println!("Exported {} rows to {}.", table.rows.len(), out.display());
        }
        Commands::Report {
            csv,
            out,
            top,
            scoring,
        } => {
            let pipeline = build_pipeline(&scoring)?;
            let records = io::read_records(&csv)?;
            let result = pipeline.run(&records).await;
            let source = csv.display().to_string();
            let report = report::build_report(&result, &source, chrono::Utc::now(), top);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Sample { out, count } => {
            io::write_sample(&out, count)?;
            println!("Wrote {count} sample students to {}.", out.display());
        }
    }

    Ok(())
}
