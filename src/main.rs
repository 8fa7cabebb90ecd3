use clap::{Parser, Subcommand};
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use quizmill::agents::{AnswerAgent, QuestionAgent, QuizPipeline};
use quizmill::config::{Config, PipelineMode};
use quizmill::db::{self, PgQuizStore};
use quizmill::embeddings::{DocumentProcessor, OllamaEmbedder};
use quizmill::llm::{CompletionSettings, LLMProviderConfig, LLM};
use quizmill::queue::{Job, RedisJobQueue, Worker, WorkerSettings};
use quizmill::utils::{init_logger, with_retry, BackoffPolicy};
use quizmill::{create_router, AppState};

/// Connection attempts made at startup before giving up.
const STARTUP_RETRIES: u32 = 5;

#[derive(Parser)]
#[command(name = "quizmill", version, about = "Generates quizzes from uploaded PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume jobs from the Redis queue (default)
    Worker,
    /// Run the pipeline once on a local file and print the quiz as JSON
    Generate {
        path: PathBuf,
    },
    /// Push a job onto the queue the way the web backend does
    Enqueue {
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        quiz_id: String,
        /// Defaults to a random UUID
        #[arg(long)]
        job_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);

    match cli.command.unwrap_or(Command::Worker) {
        Command::Worker => run_worker(config).await,
        Command::Generate { path } => generate(config, path).await,
        Command::Enqueue {
            file_name,
            quiz_id,
            job_id,
        } => {
            let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let job = Job {
                file_name,
                quiz_id,
                job_id: Some(job_id),
            };
            enqueue(config, job).await
        }
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<QuizPipeline> {
    let llm = Arc::new(LLM::new(
        LLMProviderConfig::from(&config.llm),
        CompletionSettings::from(&config.llm),
    ));
    info!(provider = llm.provider_name(), model = %config.llm.model, "LLM client ready");

    let answers = match config.pipeline.mode {
        PipelineMode::Rag => {
            let embedder = Arc::new(OllamaEmbedder::new(&config.embedding.base_url, &config.embedding.model));
            Some(AnswerAgent::new(llm.clone(), embedder, config.pipeline.retrieval_top_k))
        }
        PipelineMode::Mcq => None,
    };

    Ok(QuizPipeline::new(
        Arc::new(DocumentProcessor),
        QuestionAgent::new(llm),
        answers,
        config.pipeline.clone(),
    )?)
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let startup_policy = BackoffPolicy::from_millis(500, Some(8_000));

    let redis_url = config.redis.url.clone();
    let queue_name = config.redis.queue_name.clone();
    let queue = with_retry(
        move || {
            let url = redis_url.clone();
            let name = queue_name.clone();
            async move { RedisJobQueue::connect(&url, &name).await }.boxed()
        },
        STARTUP_RETRIES,
        &startup_policy,
    )
    .await?;

    // Connect to database
    let db_config = config.database.clone();
    let pool = with_retry(
        move || {
            let db_config = db_config.clone();
            async move { db::create_pool(&db_config).await }.boxed()
        },
        STARTUP_RETRIES,
        &startup_policy,
    )
    .await?;

    info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    let pipeline = Arc::new(build_pipeline(&config)?);
    let worker = Worker::new(
        Arc::new(queue),
        Arc::new(PgQuizStore::new(pool.clone())),
        pipeline,
        WorkerSettings::try_from(&config)?,
    );

    if let Some(port) = config.server.health_port {
        let state = AppState {
            pool,
            stats: worker.stats(),
        };
        let addr = format!("{}:{}", config.server.host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("Health endpoint listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, create_router(state)).await {
                error!(error = %e, "Health server stopped");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested, finishing current job"),
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}

async fn generate(config: Config, path: PathBuf) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config)?;
    let entries = pipeline.run(&path).await?;
    info!(path = %path.display(), entries = entries.len(), "Pipeline finished");

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

async fn enqueue(config: Config, job: Job) -> anyhow::Result<()> {
    job.validate()?;
    let queue = RedisJobQueue::connect(&config.redis.url, &config.redis.queue_name).await?;
    let len = queue.push(&job).await?;
    info!(
        job_id = job.job_id_or_unknown(),
        quiz_id = %job.quiz_id,
        queue = queue.queue_name(),
        len,
        "Job enqueued"
    );
    Ok(())
}
