//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::resolve_capacity;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "orderline";
const ENV_PREFIX: &str = "ORDERLINE";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
const DEFAULT_KAFKA_TOPIC: &str = "orders";
const DEFAULT_KAFKA_GROUP_ID: &str = "order-service-group";
const DEFAULT_PRODUCE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FEED_BUFFER: u64 = 100;
const DEFAULT_FEED_RETRY_BACKOFF_MS: u64 = 2_000;
const DEFAULT_PENDING_ACCESS_LIMIT: u64 = 64;

/// Command-line arguments for the orderline binary.
#[derive(Debug, Parser)]
#[command(name = "orderline", version, about = "Order ingestion and lookup service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ORDERLINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Consume the order feed and serve the HTTP API.
    Serve(Box<ServeArgs>),
    /// Publish generated test orders to the feed topic.
    Produce(ProduceArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct ProduceArgs {
    /// Number of orders to publish.
    #[arg(long, short = 'n', default_value_t = 3)]
    pub count: usize,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub kafka: KafkaOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct KafkaOverrides {
    /// Override the comma-separated Kafka bootstrap brokers.
    #[arg(long = "kafka-brokers", value_name = "HOST:PORT[,HOST:PORT]")]
    pub kafka_brokers: Option<String>,

    /// Override the orders topic.
    #[arg(long = "kafka-topic", value_name = "TOPIC")]
    pub kafka_topic: Option<String>,

    /// Override the consumer group id.
    #[arg(long = "kafka-group-id", value_name = "GROUP")]
    pub kafka_group_id: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub kafka: KafkaOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of decoded orders buffered ahead of ingestion.
    #[arg(long = "feed-buffer-size", value_name = "COUNT")]
    pub feed_buffer_size: Option<u64>,

    /// Override the pause after a failed feed read.
    #[arg(long = "feed-retry-backoff-ms", value_name = "MILLIS")]
    pub feed_retry_backoff_ms: Option<u64>,

    /// Override the cache capacity; zero or negative selects the default.
    #[arg(
        long = "cache-capacity",
        value_name = "COUNT",
        allow_negative_numbers = true
    )]
    pub cache_capacity: Option<i64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub kafka: KafkaSettings,
    pub feed: FeedSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
    pub produce_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub buffer: NonZeroUsize,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: NonZeroUsize,
    pub pending_access_limit: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Produce(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_kafka_overrides(&args.kafka);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    kafka: RawKafkaSettings,
    feed: RawFeedSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_kafka_overrides(&overrides.kafka);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(size) = overrides.feed_buffer_size {
            self.feed.buffer_size = Some(size);
        }
        if let Some(backoff) = overrides.feed_retry_backoff_ms {
            self.feed.retry_backoff_ms = Some(backoff);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_kafka_overrides(&mut self, overrides: &KafkaOverrides) {
        if let Some(brokers) = overrides.kafka_brokers.as_ref() {
            self.kafka.brokers = Some(brokers.clone());
        }
        if let Some(topic) = overrides.kafka_topic.as_ref() {
            self.kafka.topic = Some(topic.clone());
        }
        if let Some(group_id) = overrides.kafka_group_id.as_ref() {
            self.kafka.group_id = Some(group_id.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            kafka,
            feed,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            kafka: build_kafka_settings(kafka)?,
            feed: build_feed_settings(feed)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        max_connections: non_zero_u32(max_connections.into(), "database.max_connections")?,
    })
}

fn build_kafka_settings(kafka: RawKafkaSettings) -> Result<KafkaSettings, LoadError> {
    let brokers = parse_brokers(
        kafka
            .brokers
            .as_deref()
            .unwrap_or(DEFAULT_KAFKA_BROKERS),
    );
    if brokers.is_empty() {
        return Err(LoadError::invalid(
            "kafka.brokers",
            "at least one broker is required",
        ));
    }

    let topic = non_blank(kafka.topic, DEFAULT_KAFKA_TOPIC, "kafka.topic")?;
    let group_id = non_blank(kafka.group_id, DEFAULT_KAFKA_GROUP_ID, "kafka.group_id")?;

    let produce_timeout_ms = kafka
        .produce_timeout_ms
        .unwrap_or(DEFAULT_PRODUCE_TIMEOUT_MS);
    if produce_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "kafka.produce_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(KafkaSettings {
        brokers,
        topic,
        group_id,
        produce_timeout: Duration::from_millis(produce_timeout_ms),
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, LoadError> {
    let buffer = non_zero_usize(
        feed.buffer_size.unwrap_or(DEFAULT_FEED_BUFFER),
        "feed.buffer_size",
    )?;
    let retry_backoff =
        Duration::from_millis(feed.retry_backoff_ms.unwrap_or(DEFAULT_FEED_RETRY_BACKOFF_MS));

    Ok(FeedSettings {
        buffer,
        retry_backoff,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = resolve_capacity(cache.capacity.unwrap_or(0));

    let pending_access_limit = non_zero_usize(
        cache
            .pending_access_limit
            .unwrap_or(DEFAULT_PENDING_ACCESS_LIMIT),
        "cache.pending_access_limit",
    )?;

    Ok(CacheSettings {
        capacity,
        pending_access_limit,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKafkaSettings {
    brokers: Option<String>,
    topic: Option<String>,
    group_id: Option<String>,
    produce_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    buffer_size: Option<u64>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<i64>,
    pending_access_limit: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_brokers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>, default: &str, key: &'static str) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
