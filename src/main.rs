use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod dataset;
mod db;
mod error;
mod forest;
mod models;
mod projection;
mod simulation;
mod trainer;

use error::PipelineError;
use models::UserProfile;
use trainer::ModelHandle;

#[derive(Parser)]
#[command(name = "finwell")]
#[command(about = "Financial wellness score pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProfileArgs {
    /// Monthly salary as an absolute amount
    #[arg(long, default_value_t = 0.0)]
    salary: f64,
    /// Percentage of salary saved
    #[arg(long = "savings", default_value_t = 0.0)]
    savings_percentage: f64,
    /// Percentage of salary invested
    #[arg(long = "investing", default_value_t = 0.0)]
    investing_rate: f64,
    /// Percentage of salary spent
    #[arg(long = "spending", default_value_t = 0.0)]
    spending_rate: f64,
    /// Debt load as a percentage of salary
    #[arg(long = "debt", default_value_t = 0.0)]
    debt_load: f64,
    /// Emergency buffer in months of expenses
    #[arg(long = "stability", default_value_t = 0.0)]
    stability_buffer: f64,
    /// JSON profile file; overrides the individual flags
    #[arg(long)]
    profile: Option<PathBuf>,
}

impl ProfileArgs {
    fn resolve(&self) -> anyhow::Result<UserProfile> {
        if let Some(path) = &self.profile {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("invalid profile JSON in {}", path.display()));
        }
        Ok(UserProfile {
            salary: self.salary,
            savings_percentage: self.savings_percentage,
            investing_rate: self.investing_rate,
            spending_rate: self.spending_rate,
            debt_load: self.debt_load,
            stability_buffer: self.stability_buffer,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the report storage schema
    InitDb,
    /// Aggregate the transaction ledger and fit the score model
    Train {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Train on the synthetic seed profiles when the ledger is missing
        #[arg(long)]
        allow_seed: bool,
    },
    /// Project an efficiency score for a user profile
    Project {
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Generate a financial health report, optionally saving it for a user
    Report {
        #[command(flatten)]
        profile: ProfileArgs,
        #[arg(long)]
        user: Option<String>,
    },
    /// List saved reports for a user, newest first
    ListReports {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show one saved report
    ShowReport {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user: String,
    },
    /// Delete a saved report
    DeleteReport {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();

    let dataset_path = PathBuf::from(
        std::env::var("FINWELL_DATASET").unwrap_or_else(|_| trainer::DEFAULT_DATASET_PATH.into()),
    );
    let model_path = PathBuf::from(
        std::env::var("FINWELL_MODEL").unwrap_or_else(|_| trainer::DEFAULT_MODEL_PATH.into()),
    );

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await.map_err(storage_failure)?;
            println!("Schema ready.");
        }
        Commands::Train { csv, allow_seed } => {
            let dataset = csv.unwrap_or(dataset_path);
            match trainer::train_from_dataset(&dataset, allow_seed) {
                Some(model) => {
                    trainer::save_model(&model, &model_path)?;
                    println!(
                        "Model trained on {} profiles (oob score {:.3}), saved to {}.",
                        model.trained_on(),
                        model.oob_score(),
                        model_path.display()
                    );
                }
                None => println!(
                    "No model produced. Check the ledger at {} or pass --allow-seed.",
                    dataset.display()
                ),
            }
        }
        Commands::Project { profile } => {
            let profile = profile.resolve()?;
            let handle = ready_model(&dataset_path, &model_path).await?;
            match handle.current() {
                Ok(model) => {
                    let projection = projection::project(&model, &profile);
                    println!("Predicted efficiency score: {}", projection.score);
                    println!("Estimated accuracy: {:.1}%", projection.accuracy);
                    println!("Chart values:");
                    for point in &projection.visualization {
                        println!("- {}: {:.2}", point.category, point.value);
                    }
                }
                Err(err) => println!("{err}; retry once training has completed."),
            }
        }
        Commands::Report { profile, user } => {
            let profile = profile.resolve()?;
            let handle = ready_model(&dataset_path, &model_path).await?;
            match handle.current() {
                Ok(model) => {
                    let report = simulation::analyze(&model, &profile);
                    println!("Primary issue: {}", report.primary_issue);
                    println!("Model accuracy: {:.1}%", report.accuracy);
                    println!("{}", report.recommendation);
                    println!("Metrics:");
                    for metric in &report.all_metrics {
                        println!(
                            "- {}: impact {:.2}, standing {:.2}",
                            metric.feature, metric.impact, metric.value
                        );
                    }

                    if let Some(user) = user {
                        let pool = connect().await?;
                        let stored = db::insert_report(&pool, &user, &report)
                            .await
                            .map_err(storage_failure)?;
                        println!("Report {} saved for {}.", stored.id, user);
                    }
                }
                Err(err) => println!("{err}; retry once training has completed."),
            }
        }
        Commands::ListReports { user, limit } => {
            let pool = connect().await?;
            let reports = db::list_reports(&pool, &user)
                .await
                .map_err(storage_failure)?;

            if reports.is_empty() {
                println!("No reports saved for {user}.");
            } else {
                for report in reports.iter().take(limit) {
                    println!(
                        "- {} ({}) {} [accuracy {:.1}%]",
                        report.id, report.created_at, report.primary_issue, report.accuracy
                    );
                }
            }
        }
        Commands::ShowReport { id, user } => {
            let pool = connect().await?;
            match db::get_report(&pool, id, &user)
                .await
                .map_err(storage_failure)?
            {
                Some(report) => {
                    println!("Report {} ({})", report.id, report.created_at);
                    println!("Primary issue: {}", report.primary_issue);
                    println!("Model accuracy: {:.1}%", report.accuracy);
                    println!("{}", report.recommendation);
                    for metric in &report.all_metrics {
                        println!(
                            "- {}: impact {:.2}, standing {:.2}",
                            metric.feature, metric.impact, metric.value
                        );
                    }
                }
                None => println!("Report not found."),
            }
        }
        Commands::DeleteReport { id, user } => {
            let pool = connect().await?;
            if db::delete_report(&pool, id, &user)
                .await
                .map_err(storage_failure)?
            {
                println!("Report {id} deleted.");
            } else {
                println!("Report not found.");
            }
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the report storage Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Loads the persisted model, or kicks off background training and waits for
/// it. The handle may still be empty afterwards (no ledger), in which case
/// inference reports "model not ready" instead of failing hard.
async fn ready_model(dataset_path: &Path, model_path: &Path) -> anyhow::Result<ModelHandle> {
    let handle = ModelHandle::new();

    if let Some(model) = trainer::load_model(model_path)? {
        handle.install(model);
        return Ok(handle);
    }

    println!(
        "No persisted model at {}; training from {}.",
        model_path.display(),
        dataset_path.display()
    );
    handle
        .spawn_training(dataset_path.to_path_buf(), model_path.to_path_buf(), false)
        .await
        .context("training task panicked")?;
    Ok(handle)
}

fn storage_failure(err: PipelineError) -> anyhow::Error {
    log::error!("report storage failure: {err:?}");
    anyhow::anyhow!("internal storage failure")
}
