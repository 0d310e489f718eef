use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_SECRETS_DIR: &str = "/mnt/secrets-store";

pub enum EnvKey {
    AppMode,
    ServerPort,
    DatabaseUrl,
    RedisUrl,
    RabbitMqUrl,
    SecretsDir,
    MinioEndpoint,
    MinioPort,
    MinioUseSsl,
    MinioAccessKey,
    MinioSecretKey,
    MinioRawBucket,
    MinioProcessedBucket,
    MinioPublicBase,
    AwsRegion,
    TranscodeQueue,
    CompletionQueue,
    DeleteQueue,
    WorkerConcurrency,
    JobMaxAttempts,
    JobBackoffBaseSecs,
    UpstreamTimeoutSecs,
    CacheTtlSecs,
    FfmpegBin,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::AppMode => "APP_MODE",
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::SecretsDir => "SECRETS_DIR",
            EnvKey::MinioEndpoint => "MINIO_ENDPOINT",
            EnvKey::MinioPort => "MINIO_PORT",
            EnvKey::MinioUseSsl => "MINIO_USE_SSL",
            EnvKey::MinioAccessKey => "MINIO_ACCESS_KEY",
            EnvKey::MinioSecretKey => "MINIO_SECRET_KEY",
            EnvKey::MinioRawBucket => "MINIO_RAW_BUCKET",
            EnvKey::MinioProcessedBucket => "MINIO_PROCESSED_BUCKET",
            EnvKey::MinioPublicBase => "MINIO_PUBLIC_BASE",
            EnvKey::AwsRegion => "AWS_REGION",
            EnvKey::TranscodeQueue => "TRANSCODE_QUEUE",
            EnvKey::CompletionQueue => "COMPLETION_QUEUE",
            EnvKey::DeleteQueue => "DELETE_QUEUE",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::JobMaxAttempts => "JOB_MAX_ATTEMPTS",
            EnvKey::JobBackoffBaseSecs => "JOB_BACKOFF_BASE_SECS",
            EnvKey::UpstreamTimeoutSecs => "UPSTREAM_TIMEOUT_SECS",
            EnvKey::CacheTtlSecs => "CACHE_TTL_SECS",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
        }
    }

    /// File name under the mounted secrets directory, for keys that may be
    /// delivered as secrets instead of plain environment variables.
    fn secret_file(&self) -> Option<&'static str> {
        match self {
            EnvKey::MinioEndpoint => Some("minio-endpoint"),
            EnvKey::MinioPort => Some("minio-port"),
            EnvKey::MinioAccessKey => Some("minio-access-key"),
            EnvKey::MinioSecretKey => Some("minio-secret-key"),
            EnvKey::MinioProcessedBucket => Some("minio-processed-bucket"),
            _ => None,
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Non-empty value or `None`.
pub fn get_opt(key: EnvKey) -> Option<String> {
    get(key).ok().filter(|v| !v.trim().is_empty())
}

/// Reads a secret from the mounted secrets directory, falling back to the
/// environment variable of the same key. Empty values count as unset.
pub fn get_secret(key: EnvKey) -> Option<String> {
    let dir = get_or(EnvKey::SecretsDir, DEFAULT_SECRETS_DIR);
    read_secret_from(Path::new(&dir), key)
}

fn read_secret_from(dir: &Path, key: EnvKey) -> Option<String> {
    if let Some(file) = key.secret_file() {
        if let Ok(data) = fs::read_to_string(dir.join(file)) {
            let trimmed = data.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    get_opt(key)
}
