use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use schemagrade_core::{Error as CoreError, GradingConfig, NameNormalizer, Schema, SchemaSource};
use schemagrade_embed::{GeminiProvider, SimilarityProvider};
use schemagrade_extract::{
    PostgresExtractor, PostgresRowCountProbe, RowCountProbe, SchemaExtractor,
};
use schemagrade_grade::{
    BatchEntry, GradeError, GradingEngine, Submission, export_result, grade_batch,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("grading error: {0}")]
    Grade(#[from] GradeError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("embedding client error: {0}")]
    Embed(#[from] schemagrade_embed::EmbedError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "schemagrade", version, about = "Database schema grading CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grade one student database against the answer database.
    Grade(GradeArgs),
    /// Grade a list of student databases against one answer database.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct GradeArgs {
    /// Answer database connection string. Falls back to the config file.
    #[arg(long, value_name = "CONNECTION_STRING")]
    answer_conn: Option<String>,
    /// Student database connection string.
    #[arg(long, value_name = "CONNECTION_STRING")]
    student_conn: String,
    /// Submission identifier used in artifacts.
    #[arg(long, default_value = "submission")]
    submission: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Answer database connection string. Falls back to the config file.
    #[arg(long, value_name = "CONNECTION_STRING")]
    answer_conn: Option<String>,
    /// File with one `id,connection_string` line per submission.
    #[arg(long, value_name = "FILE")]
    batch_file: PathBuf,
    /// Submissions graded at the same time.
    #[arg(long, default_value_t = 4)]
    max_concurrency: usize,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Output directory for grading artifacts.
    #[arg(long, default_value = "runs")]
    out: PathBuf,
    /// Database namespace to extract from.
    #[arg(long, default_value = "public")]
    db_schema: String,
    /// Disable the semantic similarity provider for this run.
    #[arg(long, default_value_t = false)]
    no_semantic: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct CliConfig {
    grading: GradingConfig,
    embedding: EmbeddingConfig,
    connections: ConnectionDefaults,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ConnectionDefaults {
    answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct EmbeddingConfig {
    api_key: Option<String>,
    max_in_flight: usize,
    timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_in_flight: 4,
            timeout_secs: 10,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Grade(args) => run_grade(args).await,
        Command::Batch(args) => run_batch(args).await,
    }
}

async fn run_grade(args: GradeArgs) -> Result<(), CliError> {
    let GradeArgs {
        answer_conn,
        student_conn,
        submission,
        common,
    } = args;
    let config = load_config(common.config.as_deref())?;
    let answer_conn = resolve_answer_conn(answer_conn, &config)?;
    detect_engine(&answer_conn)?;
    detect_engine(&student_conn)?;

    let mut grading = config.grading.clone();
    if common.no_semantic {
        grading.semantic_enabled = false;
    }
    let provider = build_provider(&grading, &config.embedding)?;
    let engine = GradingEngine::new(grading.clone(), provider)?;

    let timer = Instant::now();
    let normalizer = NameNormalizer::new(&grading.stage_markers);

    let answer_pool = connect(&answer_conn).await?;
    let student_pool = connect(&student_conn).await?;

    let answer = PostgresExtractor::new(answer_pool.clone(), normalizer.clone())
        .with_schema(&common.db_schema)
        .extract(SchemaSource::Answer)
        .await?;
    let student = PostgresExtractor::new(student_pool.clone(), normalizer)
        .with_schema(&common.db_schema)
        .extract(SchemaSource::Student)
        .await?;
    tracing::info!(
        event = "schemas_extracted",
        answer_tables = answer.tables.len(),
        student_tables = student.tables.len()
    );

    let answer_probe = PostgresRowCountProbe::new(answer_pool);
    let student_probe = PostgresRowCountProbe::new(student_pool);
    let result = engine
        .grade(&submission, &answer, &student, &answer_probe, &student_probe)
        .await?;

    let out_dir = common.out.join(&submission);
    let artifacts = export_result(&result, &out_dir)?;
    tracing::info!(
        event = "artifacts_written",
        score = %artifacts.score_path.display(),
        report = %artifacts.report_path.display()
    );
    tracing::info!(
        event = "run_finished",
        status = "success",
        overall = result.breakdown.overall_score,
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

struct RemoteSubmission {
    id: String,
    schema: Schema,
    probe: Arc<dyn RowCountProbe>,
}

impl Submission for RemoteSubmission {
    fn id(&self) -> &str {
        &self.id
    }

    fn student_schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count_probe(&self) -> Arc<dyn RowCountProbe> {
        Arc::clone(&self.probe)
    }
}

async fn run_batch(args: BatchArgs) -> Result<(), CliError> {
    let BatchArgs {
        answer_conn,
        batch_file,
        max_concurrency,
        common,
    } = args;
    let config = load_config(common.config.as_deref())?;
    let answer_conn = resolve_answer_conn(answer_conn, &config)?;
    detect_engine(&answer_conn)?;

    let mut grading = config.grading.clone();
    if common.no_semantic {
        grading.semantic_enabled = false;
    }
    let provider = build_provider(&grading, &config.embedding)?;
    let engine = Arc::new(GradingEngine::new(grading.clone(), provider)?);

    let timer = Instant::now();
    let normalizer = NameNormalizer::new(&grading.stage_markers);

    let answer_pool = connect(&answer_conn).await?;
    let answer = PostgresExtractor::new(answer_pool.clone(), normalizer.clone())
        .with_schema(&common.db_schema)
        .extract(SchemaSource::Answer)
        .await?;
    let answer = Arc::new(answer);
    let answer_probe: Arc<dyn RowCountProbe> = Arc::new(PostgresRowCountProbe::new(answer_pool));

    let mut submissions: Vec<Arc<dyn Submission>> = Vec::new();
    let mut failed_extractions: Vec<BatchEntry> = Vec::new();
    for (line_no, line) in std::fs::read_to_string(&batch_file)?.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((id, conn)) = line.split_once(',') else {
            return Err(CliError::InvalidConfig(format!(
                "{}:{}: expected `id,connection_string`",
                batch_file.display(),
                line_no + 1
            )));
        };
        let id = id.trim().to_string();
        let conn = conn.trim();
        detect_engine(conn)?;

        // Extraction failures stay in the batch output as errored entries.
        match extract_submission(conn, &common.db_schema, &normalizer).await {
            Ok((schema, probe)) => submissions.push(Arc::new(RemoteSubmission {
                id,
                schema,
                probe,
            })),
            Err(err) => {
                tracing::warn!(event = "extraction_failed", submission = %id, error = %err);
                failed_extractions.push(BatchEntry {
                    id,
                    outcome: Err(GradeError::Extract(err.to_string())),
                });
            }
        }
    }
    tracing::info!(
        event = "batch_loaded",
        submissions = submissions.len(),
        failed_extractions = failed_extractions.len()
    );

    let graded = grade_batch(
        Arc::clone(&engine),
        answer,
        answer_probe,
        submissions,
        max_concurrency,
    )
    .await;
    let entries = merge_entries(graded, failed_extractions);

    let mut failures = 0usize;
    for entry in &entries {
        match &entry.outcome {
            Ok(result) => {
                let out_dir = common.out.join(&entry.id);
                let artifacts = export_result(result, &out_dir)?;
                tracing::info!(
                    event = "submission_written",
                    submission = %entry.id,
                    overall = result.breakdown.overall_score,
                    score = %artifacts.score_path.display()
                );
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(event = "submission_failed", submission = %entry.id, error = %err);
                let out_dir = common.out.join(&entry.id);
                std::fs::create_dir_all(&out_dir)?;
                std::fs::write(out_dir.join("error.txt"), err.to_string())?;
            }
        }
    }
    tracing::info!(
        event = "run_finished",
        status = "success",
        graded = entries.len() - failures,
        failed = failures,
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

async fn extract_submission(
    conn: &str,
    db_schema: &str,
    normalizer: &NameNormalizer,
) -> Result<(Schema, Arc<dyn RowCountProbe>), CliError> {
    let pool = connect(conn).await?;
    let schema = PostgresExtractor::new(pool.clone(), normalizer.clone())
        .with_schema(db_schema)
        .extract(SchemaSource::Student)
        .await?;
    Ok((schema, Arc::new(PostgresRowCountProbe::new(pool))))
}

async fn connect(conn: &str) -> Result<sqlx::PgPool, CliError> {
    Ok(PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await?)
}

fn merge_entries(mut entries: Vec<BatchEntry>, failed: Vec<BatchEntry>) -> Vec<BatchEntry> {
    entries.extend(failed);
    entries.sort_by(|left, right| left.id.cmp(&right.id));
    entries
}

fn resolve_answer_conn(flag: Option<String>, config: &CliConfig) -> Result<String, CliError> {
    flag.or_else(|| config.connections.answer.clone())
        .ok_or_else(|| {
            CliError::InvalidConfig(
                "answer connection string required (--answer-conn or [connections] answer)"
                    .to_string(),
            )
        })
}

fn load_config(path: Option<&Path>) -> Result<CliConfig, CliError> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

fn build_provider(
    grading: &GradingConfig,
    embedding: &EmbeddingConfig,
) -> Result<Option<Arc<dyn SimilarityProvider>>, CliError> {
    if !grading.semantic_enabled {
        return Ok(None);
    }
    let api_key = embedding
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());
    let Some(api_key) = api_key else {
        tracing::warn!(
            event = "semantic_disabled",
            reason = "no API key configured; grading falls back to lexical similarity"
        );
        return Ok(None);
    };
    let provider = GeminiProvider::with_options(
        api_key,
        embedding.max_in_flight,
        Duration::from_secs(embedding.timeout_secs),
    )?;
    Ok(Some(Arc::new(provider)))
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(conn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_postgres_connection_strings() {
        assert!(detect_engine("postgres://localhost/db").is_ok());
        assert!(detect_engine("postgresql://localhost/db").is_ok());
        assert!(detect_engine("mysql://localhost/db").is_err());
    }

    #[test]
    fn parses_full_cli_config() {
        let config: CliConfig = toml::from_str(
            r#"
            [grading]
            table_match_threshold = 0.7
            semantic_enabled = false

            [grading.business_logic_tables]
            NhaCungCap = 1

            [embedding]
            max_in_flight = 2
            timeout_secs = 5

            [connections]
            answer = "postgres://localhost/answer_db"
            "#,
        )
        .expect("parse config");
        assert_eq!(config.grading.table_match_threshold, 0.7);
        assert!(!config.grading.semantic_enabled);
        assert_eq!(config.embedding.max_in_flight, 2);
        assert!(config.embedding.api_key.is_none());
        assert_eq!(
            config.connections.answer.as_deref(),
            Some("postgres://localhost/answer_db")
        );
    }

    #[test]
    fn extraction_failures_stay_in_the_batch_output() {
        let failed = vec![
            BatchEntry {
                id: "sv003".to_string(),
                outcome: Err(GradeError::Extract("connection refused".to_string())),
            },
            BatchEntry {
                id: "sv001".to_string(),
                outcome: Err(GradeError::Extract("relation not found".to_string())),
            },
        ];
        let entries = merge_entries(Vec::new(), failed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "sv001");
        assert_eq!(entries[1].id, "sv003");
        assert!(entries.iter().all(|entry| entry.outcome.is_err()));
    }

    #[test]
    fn flag_overrides_configured_answer_connection() {
        let config = CliConfig {
            connections: ConnectionDefaults {
                answer: Some("postgres://localhost/from_config".to_string()),
            },
            ..CliConfig::default()
        };
        let resolved = resolve_answer_conn(
            Some("postgres://localhost/from_flag".to_string()),
            &config,
        )
        .expect("resolves");
        assert_eq!(resolved, "postgres://localhost/from_flag");

        let fallback = resolve_answer_conn(None, &config).expect("resolves");
        assert_eq!(fallback, "postgres://localhost/from_config");

        assert!(resolve_answer_conn(None, &CliConfig::default()).is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: CliConfig = toml::from_str("").expect("parse empty config");
        assert_eq!(config.grading.max_total, 10.0);
        assert_eq!(config.embedding.max_in_flight, 4);
    }
}
