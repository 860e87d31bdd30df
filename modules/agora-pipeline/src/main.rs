use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agora_core::{
    load_config, AnnounceBackend, AppConfig, ArticleFetcher, DisabledEmbedder, EmbeddingService,
    FileConfig, PipelineDeps, ScoringProvider,
};
use agora_domains::articles::FeedFetcher;
use agora_domains::discussions::notify::SlackWebhook;
use agora_domains::pipeline::{process_held, run_pipeline};
use agora_domains::scoring::{HeuristicProvider, LlmBackend, LlmScorer};
use agora_domains::sources::activities::seed_sources;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "News ingestion and deliberation pipeline")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "agora.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One full pipeline pass: ingest, score, cluster, advance, publish
    Run {
        /// Override the configured hold window for topics created this run
        #[arg(long)]
        hold_minutes: Option<i64>,
    },

    /// Advance elapsed holds and auto-publish, without ingesting
    Sweep {
        /// Override the configured sweep batch size
        #[arg(long)]
        batch_size: Option<i64>,
    },

    /// Sync the source registry from the config file
    SeedSources,
}

/// Adapts the OpenAI client to the pipeline's embedding seam. Provider
/// downtime reads as "unavailable", which downstream degrades to singleton
/// clusters and skipped dedup.
struct OpenAiEmbeddings {
    ai: Arc<ai_client::OpenAi>,
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Option<Vec<Vec<f32>>>> {
        match self.ai.embed_batch(texts).await {
            Ok(vectors) => Ok(Some(vectors)),
            Err(e) => {
                warn!(error = %e, "embedding request failed, continuing without vectors");
                Ok(None)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agora=info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Agora pipeline starting...");

    let config = AppConfig::from_env()?;
    let file_config = Arc::new(load_config(&cli.config)?);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations complete");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let deps = build_deps(pool, http_client, config, file_config.clone());

    match cli.command {
        Commands::Run { hold_minutes } => {
            let hold = hold_minutes.unwrap_or(file_config.pipeline.hold_minutes);
            run_pipeline(&deps, hold).await?;
        }
        Commands::Sweep { batch_size } => {
            let batch = batch_size.unwrap_or(file_config.pipeline.sweep_batch_size);
            process_held(&deps, batch).await?;
        }
        Commands::SeedSources => {
            seed_sources(&deps).await?;
        }
    }

    Ok(())
}

fn build_deps(
    pool: sqlx::PgPool,
    http_client: reqwest::Client,
    config: AppConfig,
    file_config: Arc<FileConfig>,
) -> PipelineDeps {
    let fetcher: Arc<dyn ArticleFetcher> = Arc::new(FeedFetcher::new(http_client.clone()));

    let openai = config.openai_api_key.as_ref().map(|key| {
        let mut ai = ai_client::OpenAi::new(key, &file_config.models.scoring)
            .with_embedding_model(&file_config.models.embedding);
        if let Some(url) = &config.openai_base_url {
            ai = ai.with_base_url(url);
        }
        Arc::new(ai)
    });

    let embeddings: Arc<dyn EmbeddingService> = match &openai {
        Some(ai) => Arc::new(OpenAiEmbeddings { ai: ai.clone() }),
        None => {
            info!("No OPENAI_API_KEY set, embeddings disabled (singleton clusters)");
            Arc::new(DisabledEmbedder)
        }
    };

    let scorer: Arc<dyn ScoringProvider> = if let Some(ai) = &openai {
        info!(model = %file_config.models.scoring, "Scoring with OpenAI");
        Arc::new(LlmScorer::new(
            LlmBackend::OpenAi(ai.clone()),
            &file_config.models.scoring,
            &file_config.models.statements,
        ))
    } else if let Some(key) = &config.anthropic_api_key {
        info!(model = %file_config.models.scoring, "Scoring with Claude");
        let claude = Arc::new(ai_client::Claude::new(key, &file_config.models.scoring));
        Arc::new(LlmScorer::new(
            LlmBackend::Claude(claude),
            &file_config.models.scoring,
            &file_config.models.statements,
        ))
    } else {
        info!("No model API key set, scoring with the heuristic");
        Arc::new(HeuristicProvider)
    };

    let announcers: Vec<Arc<dyn AnnounceBackend>> = match &config.slack_webhook_url {
        Some(url) => {
            info!("Slack announcements enabled");
            vec![Arc::new(SlackWebhook::new(
                url.clone(),
                http_client.clone(),
            ))]
        }
        None => {
            info!("No SLACK_WEBHOOK_URL set, announcements disabled");
            Vec::new()
        }
    };

    PipelineDeps::new(
        pool,
        http_client,
        fetcher,
        embeddings,
        scorer,
        announcers,
        config,
        file_config,
    )
}
