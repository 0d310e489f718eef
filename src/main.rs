use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use streamhive_media::app;
use streamhive_media::config::settings::AppConfig;
use streamhive_media::infrastructure::cache::CacheStore;
use streamhive_media::infrastructure::db::pool::connect_to_db;
use streamhive_media::infrastructure::queue::rabbitmq::RabbitMqService;
use streamhive_media::infrastructure::redis::client::RedisService;
use streamhive_media::infrastructure::storage::ObjectStore;
use streamhive_media::infrastructure::storage::s3::StorageService;
use streamhive_media::modules::playback::cache::SegmentCache;
use streamhive_media::modules::playback::purge::AssetPurger;
use streamhive_media::modules::playback::repository::PgVideoRepository;
use streamhive_media::modules::playback::resolver::{PlaybackBackend, PrivateResolver, PublicPassthrough};
use streamhive_media::modules::playback::service::PlaybackService;
use streamhive_media::modules::transcode::consumer::{JobConsumer, RetryPolicy};
use streamhive_media::modules::transcode::encoder::FfmpegEncoder;
use streamhive_media::modules::transcode::pipeline::TranscodePipeline;
use streamhive_media::modules::transcode::publisher::{ResultPublisher, UrlPolicy};
use streamhive_media::state::AppState;
use streamhive_media::workers;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::new();
    info!(mode = ?config.mode, "Starting StreamHive media service...");

    let processed = StorageService::from_config(
        &config.storage,
        &config.storage.processed_bucket,
        config.upstream_timeout,
    );
    match &processed {
        Some(s) => info!(bucket = %s.bucket, "🪣 Object storage configured"),
        None => warn!("Object storage credentials missing; playback falls back to public URLs"),
    }

    let cache = connect_cache(&config).await;

    let mut tasks = JoinSet::new();

    if config.mode.runs_worker() {
        let processed = processed
            .clone()
            .ok_or_else(|| anyhow!("The transcoder worker requires object storage credentials"))?;
        let raw = processed.with_bucket(&config.storage.raw_bucket);
        let processed: Arc<dyn ObjectStore> = Arc::new(processed);
        let raw: Arc<dyn ObjectStore> = Arc::new(raw);

        let queue = RabbitMqService::new(&config.queue.url).await?;
        let encoder = Arc::new(FfmpegEncoder::new(config.ffmpeg_bin.clone()));
        let publisher = ResultPublisher::new(
            processed.clone(),
            Arc::new(queue.clone()),
            encoder.clone(),
            UrlPolicy::from_config(&config.storage),
            config.queue.completion_queue.clone(),
        );
        let pipeline = Arc::new(TranscodePipeline::new(raw.clone(), encoder, publisher));
        let jobs = Arc::new(JobConsumer::new(pipeline, RetryPolicy::from_config(&config.queue)));

        tasks.spawn(workers::transcoder::start_transcoder_worker(
            queue.clone(),
            jobs,
            config.queue.clone(),
        ));

        let purger = Arc::new(AssetPurger::new(
            raw,
            processed.clone(),
            SegmentCache::new(cache.clone(), processed),
        ));
        tasks.spawn(workers::cleanup::start_cleanup_worker(
            queue,
            purger,
            config.queue.delete_queue.clone(),
        ));
    }

    if config.mode.runs_server() {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to run the playback server")?;
        let db = connect_to_db(database_url, Duration::from_secs(5)).await?;

        let backend = match processed {
            Some(storage) => {
                let bucket = storage.bucket.clone();
                let store: Arc<dyn ObjectStore> = Arc::new(storage);
                PlaybackBackend::Private(PrivateResolver::new(
                    store.clone(),
                    bucket,
                    SegmentCache::new(cache.clone(), store),
                ))
            }
            None => PlaybackBackend::Public(PublicPassthrough::new(config.upstream_timeout)?),
        };
        info!(mode = backend.mode(), "Playback backend selected");

        let playback = Arc::new(PlaybackService::new(Arc::new(PgVideoRepository::new(db)), backend));
        let app = app::create_app(AppState::new(playback));

        let addr = format!("0.0.0.0:{}", config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Server running on http://{}", addr);

        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(anyhow::Error::from)
        });
    }

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        Some(finished) = tasks.join_next() => match finished {
            Ok(Ok(())) => warn!("A service task exited"),
            Ok(Err(e)) => error!(error = %e, "A service task failed"),
            Err(e) => error!(error = %e, "A service task panicked"),
        },
    }

    tasks.shutdown().await;
    info!("👋 Stopped");
    Ok(())
}

/// Redis is optional: without it, playback reads go straight to storage.
async fn connect_cache(config: &AppConfig) -> Option<Arc<dyn CacheStore>> {
    let url = config.redis_url.as_deref()?;
    match RedisService::new(url, config.cache_ttl_secs).await {
        Ok(redis) => {
            info!(ttl_secs = config.cache_ttl_secs, "✅ Segment cache enabled");
            Some(Arc::new(redis))
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, continuing without segment cache");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
