//! League of Legends match prediction CLI
//!
//! Imports team statistics and fixtures, builds leakage-free feature tables
//! and scores fixtures with an exported classifier.

use clap::{Parser, Subcommand};
use lolpred::{Config, LolError, Result};

#[derive(Parser)]
#[command(name = "lolpred")]
#[command(about = "Point-in-time features for League of Legends match prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build train/validation feature tables from played fixtures
    Build {
        /// Trailing validation window, e.g. 2m or 45d
        #[arg(long)]
        validation: Option<String>,
        /// Output directory for data.csv, train.csv and val.csv
        #[arg(long)]
        out: Option<String>,
    },
    /// Show the feature row for one fixture
    Features {
        team_a: String,
        team_b: String,
        #[arg(long)]
        league: String,
        /// Fixture date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Predict fixtures with a logistic model exported as JSON
    Predict {
        #[arg(required_unless_present = "upcoming")]
        team_a: Option<String>,
        #[arg(required_unless_present = "upcoming")]
        team_b: Option<String>,
        #[arg(long, required_unless_present = "upcoming")]
        league: Option<String>,
        /// Fixture date (YYYY-MM-DD)
        #[arg(long, required_unless_present = "upcoming")]
        date: Option<String>,
        /// Score every stored fixture that has no result yet
        #[arg(long, conflicts_with_all = ["team_a", "team_b", "league", "date"])]
        upcoming: bool,
        /// First fixture date for --upcoming (default today)
        #[arg(long, requires = "upcoming")]
        from: Option<String>,
        /// Model weights file
        #[arg(long)]
        model: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Evaluate predicted probabilities against outcomes
    Evaluate {
        /// CSV with teamA_win and probability columns
        predictions: String,
        /// Probability at or above which team A is predicted to win
        #[arg(long, default_value = "0.5")]
        threshold: f64,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import daily team statistics from CSV
    ImportStats {
        path: String,
    },
    /// Import fixtures from CSV
    ImportFixtures {
        path: String,
    },
    /// List the latest stored fixtures
    Fixtures {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::ImportStats { path } => commands::import_stats(&config, &path),
            DataCommands::ImportFixtures { path } => commands::import_fixtures(&config, &path),
            DataCommands::Fixtures { limit } => commands::list_fixtures(&config, limit),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Build { validation, out } => commands::build(&config, validation, out),
        Commands::Features {
            team_a,
            team_b,
            league,
            date,
            format,
        } => commands::features(&config, &team_a, &team_b, &league, &date, format),
        Commands::Predict {
            team_a,
            team_b,
            league,
            date,
            upcoming,
            from,
            model,
            format,
        } => {
            if upcoming {
                commands::predict_upcoming(&config, from.as_deref(), &model, format)
            } else {
                match (team_a, team_b, league, date) {
                    (Some(a), Some(b), Some(league), Some(date)) => {
                        commands::predict(&config, &a, &b, &league, &date, &model, format)
                    }
                    _ => Err(LolError::Parse(
                        "predict needs <TEAM_A> <TEAM_B> --league --date, or --upcoming".to_string(),
                    )),
                }
            }
        }
        Commands::Evaluate {
            predictions,
            threshold,
        } => commands::evaluate(&predictions, threshold),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use lolpred::data::export::{write_features, FeatureLayout};
    use lolpred::data::ingest::{load_fixtures, load_scored_predictions, load_team_stats, parse_date};
    use lolpred::data::{build_training, Database, MetricSchema, TeamStatsStore};
    use lolpred::predict::{fixture_features, format_prediction, LogisticModel, Predictor};
    use lolpred::training::{recency_weights, ClassificationReport};
    use lolpred::{Fixture, Prediction};

    fn schema(config: &Config) -> Result<MetricSchema> {
        MetricSchema::new(config.schema.metrics.clone())
    }

    fn load_store(config: &Config) -> Result<TeamStatsStore> {
        let db = Database::open(&config.data.database_path)?;
        let store = db.load_store(&schema(config)?)?;
        if store.is_empty() {
            return Err(LolError::EmptyDataset(
                "no team statistics imported; run 'lolpred data import-stats <csv>'".to_string(),
            ));
        }
        Ok(store)
    }

    fn fixture_date(date: &str) -> Result<chrono::NaiveDate> {
        parse_date(date)
            .ok_or_else(|| LolError::Parse(format!("Invalid date '{}'. Use YYYY-MM-DD.", date)))
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        println!("Created data/ directory");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'lolpred data import-stats <csv>' to load team statistics");
        println!("  3. Run 'lolpred data import-fixtures <csv>' to load fixtures");
        println!("  4. Run 'lolpred build' to write train/val feature tables");

        Ok(())
    }

    pub fn import_stats(config: &Config, path: &str) -> Result<()> {
        let schema = schema(config)?;
        let store = load_team_stats(path, &schema)?;

        let db = Database::open(&config.data.database_path)?;
        let count = db.upsert_snapshots(&schema, store.snapshots())?;
        println!(
            "Stored {} statistics rows for {} teams in database",
            count,
            store.team_count()
        );
        Ok(())
    }

    pub fn import_fixtures(config: &Config, path: &str) -> Result<()> {
        let load = load_fixtures(path)?;
        for rejected in &load.rejected {
            println!("  Rejected line {}: {}", rejected.line, rejected.reason);
        }

        let db = Database::open(&config.data.database_path)?;
        let count = db.upsert_fixtures(&load.fixtures)?;
        println!(
            "Stored {} fixtures in database ({} rejected)",
            count,
            load.rejected.len()
        );
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:       {}", config.data.database_path);
        println!("  Teams:      {}", stats.team_count);
        println!("  Snapshots:  {}", stats.snapshot_count);
        println!(
            "  Fixtures:   {} ({} played)",
            stats.fixture_count, stats.played_count
        );
        if let (Some(earliest), Some(latest)) = (stats.earliest_snapshot, stats.latest_snapshot) {
            println!("  Range:      {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn list_fixtures(config: &Config, limit: usize) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let fixtures = db.get_fixtures()?;
        let shown = &fixtures[fixtures.len().saturating_sub(limit)..];

        println!("Latest {} of {} fixtures", shown.len(), fixtures.len());
        println!("───────────────────────────────");
        for fixture in shown {
            let result = match fixture.winner() {
                Some(winner) => format!("won by {}", winner),
                None => "upcoming".to_string(),
            };
            println!("  {}  {}", fixture, result);
        }
        Ok(())
    }

    pub fn build(config: &Config, validation: Option<String>, out: Option<String>) -> Result<()> {
        let mut pipeline = config.pipeline.clone();
        if let Some(window) = validation {
            pipeline.validation_window = window.parse()?;
        }
        let out = out.unwrap_or_else(|| config.data.output_dir.clone());

        let store = load_store(config)?;
        let db = Database::open(&config.data.database_path)?;
        let fixtures = db.get_played_fixtures()?;
        if fixtures.is_empty() {
            return Err(LolError::EmptyDataset(
                "no played fixtures; run 'lolpred data import-fixtures <csv>'".to_string(),
            ));
        }

        println!(
            "Building features for {} fixtures from {} statistics rows...",
            fixtures.len(),
            store.len()
        );
        let dataset = build_training(&store, &fixtures, &pipeline, &schema(config)?)?;
        dataset.save(&out)?;

        println!("\n{}", dataset.diagnostics);
        if let Some(start) = dataset.validation_start {
            println!("Validation from {} ({})", start, pipeline.validation_window);
        }
        println!("  Train rows: {} (mirrored)", dataset.train.len());
        println!("  Val rows:   {}", dataset.val.len());

        let weights = recency_weights(&dataset.train.dates());
        if !weights.is_empty() {
            let mean = weights.iter().sum::<f64>() / weights.len() as f64;
            println!("  Mean recency weight (train): {:.3}", mean);
        }
        println!("Wrote feature tables to {}", out);
        Ok(())
    }

    pub fn features(
        config: &Config,
        team_a: &str,
        team_b: &str,
        league: &str,
        date: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let store = load_store(config)?;
        let fixture = Fixture::new(team_a, team_b, league, fixture_date(date)?);
        let (table, confidence) = fixture_features(&store, &config.pipeline, &fixture)?;

        match format {
            OutputFormat::Table => {
                println!("{} [confidence: {}]", fixture, confidence);
                println!("───────────────────────────────");
                for (i, column) in table.column_names().iter().enumerate() {
                    println!("  {:<16} {:>12.4}", column, table.rows[0].values[i]);
                }
            }
            OutputFormat::Json => {
                let values: serde_json::Map<String, serde_json::Value> = table
                    .column_names()
                    .into_iter()
                    .zip(table.rows[0].values.iter().map(|v| serde_json::Value::from(*v)))
                    .collect();
                let json = serde_json::json!({
                    "teamA": fixture.team_a,
                    "teamB": fixture.team_b,
                    "league": fixture.league,
                    "date": fixture.date,
                    "confidence": confidence.to_string(),
                    "features": values,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                write_features(&table, std::io::stdout(), FeatureLayout::TRACED)?;
            }
        }
        Ok(())
    }

    fn print_csv(predictions: &[Prediction]) {
        println!("teamA,teamB,league,date,teamA_win_prob,confidence");
        for p in predictions {
            println!(
                "{},{},{},{},{:.4},{}",
                p.team_a, p.team_b, p.league, p.date, p.team_a_win_prob, p.confidence
            );
        }
    }

    pub fn predict(
        config: &Config,
        team_a: &str,
        team_b: &str,
        league: &str,
        date: &str,
        model_path: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let model = LogisticModel::load(model_path)?;
        let store = load_store(config)?;
        let predictor = Predictor::new(&store, model, config.pipeline.clone());
        let prediction = predictor.predict(team_a, team_b, league, fixture_date(date)?)?;

        match format {
            OutputFormat::Table => print!("{}", format_prediction(&prediction)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
            OutputFormat::Csv => print_csv(std::slice::from_ref(&prediction)),
        }
        Ok(())
    }

    pub fn predict_upcoming(
        config: &Config,
        from: Option<&str>,
        model_path: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let from = match from {
            Some(date) => fixture_date(date)?,
            None => chrono::Utc::now().date_naive(),
        };
        let model = LogisticModel::load(model_path)?;
        let store = load_store(config)?;
        let db = Database::open(&config.data.database_path)?;
        let fixtures = db.get_upcoming_fixtures(from)?;
        if fixtures.is_empty() {
            println!("No upcoming fixtures from {}", from);
            return Ok(());
        }

        let predictor = Predictor::new(&store, model, config.pipeline.clone());
        let batch = predictor.predict_many(&fixtures)?;

        let mut summary = vec![batch.diagnostics.to_string()];
        summary.extend(batch.dropped.iter().map(|d| format!("  Skipped {}", d)));
        match format {
            OutputFormat::Table => {
                println!("Predicting {} fixtures from {}...", fixtures.len(), from);
                for prediction in &batch.predictions {
                    print!("{}", format_prediction(prediction));
                }
                println!("\n{}", summary.join("\n"));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&batch.predictions)?);
                eprintln!("{}", summary.join("\n"));
            }
            OutputFormat::Csv => {
                print_csv(&batch.predictions);
                eprintln!("{}", summary.join("\n"));
            }
        }
        Ok(())
    }

    pub fn evaluate(path: &str, threshold: f64) -> Result<()> {
        let rows = load_scored_predictions(path)?;
        let labels: Vec<u8> = rows.iter().map(|r| r.label).collect();
        let probs: Vec<f64> = rows.iter().map(|r| r.probability).collect();

        let report = ClassificationReport::from_predictions(&labels, &probs, threshold)?;
        println!("Evaluated {} predictions from {}", rows.len(), path);
        println!("───────────────────────────────");
        println!("{}", report);
        Ok(())
    }
}
