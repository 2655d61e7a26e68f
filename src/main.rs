use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use student_alert_engine::config::{self, EngineConfig};
use student_alert_engine::db::{self, AlertQuery};
use student_alert_engine::engine::AlertEngine;
use student_alert_engine::models::{
    AlertReport, Category, DomainData, ParticipationLevel, Priority, StudentSignals,
};
use student_alert_engine::{import, init_logging, insight, report};

#[derive(Parser)]
#[command(name = "student-alerts")]
#[command(about = "Prioritized student alerts and insights for parents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Generate alerts for one student
    Alerts {
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_id: String,
        #[arg(long)]
        attendance: f64,
        /// GPA (0-4.0) or marks (0-100)
        #[arg(long)]
        academic: f64,
        #[arg(long, default_value_t = ParticipationLevel::Medium)]
        participation: ParticipationLevel,
        #[arg(long, default_value = "")]
        behavior_notes: String,
        #[arg(long, default_value = "")]
        comments: String,
        /// Store the alerts for this owner
        #[arg(long, requires = "student")]
        owner: Option<String>,
        #[arg(long, requires = "owner")]
        student: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate alerts for every row of a CSV file
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Answer a parent question from per-domain data in a JSON file
    Insight {
        #[arg(long)]
        student: String,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        query: String,
        /// Store the insight and conversation for this owner
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Weekly summary insight for a student
    Weekly {
        #[arg(long)]
        student: String,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Insight focused on one subject
    Subject {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Stored insight counts and confidence for a student
    InsightSummary {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete the conversation log for a student
    ClearHistory {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        student: String,
    },
    /// Show one stored alert
    GetAlert {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// List stored alerts, highest priority first
    ListAlerts {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        unread: bool,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = db::DEFAULT_PAGE_SIZE)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
    /// Mark one stored alert as read
    MarkRead {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Mark every stored alert for an owner as read
    MarkAllRead {
        #[arg(long)]
        owner: String,
    },
    /// Delete one stored alert
    DeleteAlert {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Alert counts for an owner
    Stats {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove alerts past their expiry
    Cleanup,
    /// Show stored insights and the recent conversation for a student
    History {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        student: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = config::database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_alert_report(report: &AlertReport) {
    println!(
        "{} ({}): {} alerts via {}",
        report.student_name,
        report.roll_id,
        report.alerts.len(),
        report.source.as_str()
    );
    for alert in report.alerts.alerts() {
        println!(
            "- [{} {}] {}: {}",
            alert.priority, alert.category, alert.title, alert.message
        );
    }
}

async fn run_insight(
    student: &str,
    data: &Path,
    query: &str,
    owner: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = AlertEngine::from_config(&EngineConfig::from_env()?)?;
    let raw = std::fs::read_to_string(data)
        .with_context(|| format!("failed to read {}", data.display()))?;
    let domains: DomainData = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid domain data", data.display()))?;
    let insight = engine.generate_insight(student, &domains, query).await?;

    if json {
        print_json(&insight)?;
    } else {
        print!("{}", report::build_insight_report(&insight));
    }

    if let Some(owner) = owner {
        let pool = connect().await?;
        let id = db::save_insight(&pool, owner, query, &insight).await?;
        println!("Stored insight {id}.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Alerts {
            name,
            roll_id,
            attendance,
            academic,
            participation,
            behavior_notes,
            comments,
            owner,
            student,
            json,
        } => {
            let engine = AlertEngine::from_config(&EngineConfig::from_env()?)?;
            let signals = StudentSignals {
                student_name: name,
                roll_id,
                attendance_percentage: attendance,
                academic_performance: academic,
                behavior_notes,
                participation_level: participation,
                additional_comments: comments,
            };
            let report = engine.generate_alerts(&signals).await?;

            if json {
                print_json(&report)?;
            } else {
                print_alert_report(&report);
            }

            if let (Some(owner), Some(student)) = (owner, student) {
                let pool = connect().await?;
                let metadata = serde_json::json!({
                    "student_name": report.student_name,
                    "roll_id": report.roll_id,
                    "source": report.source.as_str(),
                });
                let ids =
                    db::save_alerts(&pool, &owner, &student, report.alerts.alerts(), &metadata)
                        .await?;
                println!("Stored {} alerts for {student}.", ids.len());
            }
        }
        Commands::Batch { csv, out } => {
            let engine = AlertEngine::from_config(&EngineConfig::from_env()?)?;
            let students = import::read_signals(&csv)?;
            let mut reports = Vec::with_capacity(students.len());

            for signals in &students {
                let report = engine
                    .generate_alerts(signals)
                    .await
                    .with_context(|| format!("student {} was rejected", signals.roll_id))?;
                reports.push(report);
            }

            std::fs::write(&out, report::build_alert_report(&reports))?;
            println!(
                "Report for {} students written to {}.",
                reports.len(),
                out.display()
            );
        }
        Commands::Insight {
            student,
            data,
            query,
            owner,
            json,
        } => {
            run_insight(&student, &data, &query, owner.as_deref(), json).await?;
        }
        Commands::Weekly {
            student,
            data,
            owner,
            json,
        } => {
            let query = insight::weekly_summary_query();
            run_insight(&student, &data, &query, owner.as_deref(), json).await?;
        }
        Commands::Subject {
            student,
            subject,
            data,
            owner,
            json,
        } => {
            let query = insight::subject_query(&subject);
            run_insight(&student, &data, &query, owner.as_deref(), json).await?;
        }
        Commands::InsightSummary {
            owner,
            student,
            json,
        } => {
            let pool = connect().await?;
            let summary = db::insight_summary(&pool, &owner, &student).await?;

            if json {
                print_json(&summary)?;
            } else {
                println!(
                    "{} insights for {student}, avg confidence {:.2}",
                    summary.total_insights, summary.average_confidence
                );
                for (insight_type, count) in &summary.insights_by_type {
                    println!("- {insight_type}: {count}");
                }
                if let Some(last) = summary.last_generated {
                    println!("Last generated {}", last.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }
        Commands::ClearHistory { owner, student } => {
            let pool = connect().await?;
            let removed = db::clear_conversation(&pool, &owner, &student).await?;
            println!("Removed {removed} messages for {student}.");
        }
        Commands::GetAlert { owner, id, json } => {
            let pool = connect().await?;
            let stored = db::get_alert(&pool, id, &owner)
                .await?
                .with_context(|| format!("no alert {id} for {owner}"))?;

            if json {
                print_json(&stored)?;
            } else {
                let alert = &stored.alert;
                println!(
                    "[{} {} {}] {} ({})",
                    alert.priority, alert.alert_type, alert.category, alert.title, stored.student_id
                );
                println!("{}", alert.message);
                for suggestion in &alert.suggestions {
                    println!("- {suggestion}");
                }
                println!("Read: {}", if stored.read { "yes" } else { "no" });
            }
        }
        Commands::ListAlerts {
            owner,
            unread,
            category,
            priority,
            skip,
            limit,
            json,
        } => {
            let pool = connect().await?;
            let query = AlertQuery {
                owner_id: owner,
                unread_only: unread,
                category,
                priority,
                skip,
                limit,
            };
            let alerts = db::list_alerts(&pool, &query).await?;

            if json {
                print_json(&alerts)?;
            } else if alerts.is_empty() {
                println!("No alerts found.");
            } else {
                for stored in &alerts {
                    println!(
                        "{} {} [{} {}] {} ({})",
                        stored.id,
                        if stored.read { " " } else { "*" },
                        stored.alert.priority,
                        stored.alert.category,
                        stored.alert.title,
                        stored.student_id
                    );
                }
            }
        }
        Commands::MarkRead { owner, id } => {
            let pool = connect().await?;
            if db::mark_read(&pool, id, &owner).await? {
                println!("Marked {id} as read.");
            } else {
                println!("No unread alert {id} for {owner}.");
            }
        }
        Commands::MarkAllRead { owner } => {
            let pool = connect().await?;
            let updated = db::mark_all_read(&pool, &owner).await?;
            println!("Marked {updated} alerts as read.");
        }
        Commands::DeleteAlert { owner, id } => {
            let pool = connect().await?;
            if db::delete_alert(&pool, id, &owner).await? {
                println!("Deleted {id}.");
            } else {
                anyhow::bail!("no alert {id} for {owner}");
            }
        }
        Commands::Stats { owner, json } => {
            let pool = connect().await?;
            let stats = db::alert_stats(&pool, &owner).await?;

            if json {
                print_json(&stats)?;
            } else {
                println!(
                    "{} alerts, {} unread, {} high priority unread",
                    stats.total_alerts, stats.unread_alerts, stats.high_priority_unread
                );
                for (category, count) in &stats.by_category {
                    println!("- {category}: {count}");
                }
            }
        }
        Commands::Cleanup => {
            let pool = connect().await?;
            let removed = db::cleanup_expired(&pool).await?;
            println!("Removed {removed} expired alerts.");
        }
        Commands::History {
            owner,
            student,
            limit,
            json,
        } => {
            let pool = connect().await?;
            let insights = db::list_insights(&pool, &owner, &student, 0, limit).await?;
            let messages = db::conversation_history(&pool, &owner, &student, limit).await?;

            if json {
                print_json(&serde_json::json!({
                    "insights": insights,
                    "conversation": messages,
                }))?;
            } else {
                println!("{} stored insights for {student}.", insights.len());
                for message in &messages {
                    println!(
                        "[{}] {}: {}",
                        message.created_at.format("%Y-%m-%d %H:%M"),
                        message.role,
                        message.content
                    );
                }
            }
        }
    }

    Ok(())
}
