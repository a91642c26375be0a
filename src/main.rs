use clap::Parser;
use courier_algo::config::{CacheBackend, LoggingSettings, Settings};
use courier_algo::core::{AssignmentEngine, Haversine};
use courier_algo::output::{finish_run, OutputFormat};
use courier_algo::services::{
    DispatchError, Dispatcher, ErrorReporter, FileCache, KeyValueCache, PostgresClient,
    PostgresCourierRepository, PostgresOrderRepository, RedisCache, SystemClock, TtlCache,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Assign every pending order to its nearest eligible courier
#[derive(Debug, Parser)]
#[command(name = "courier-algo", version)]
struct Cli {
    /// Configuration file (defaults to config/default.toml + config/local.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format, overriding output.format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Read couriers straight from the database
    #[arg(long)]
    no_cache: bool,
}

fn init_logging(settings: &LoggingSettings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the assignment report
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

/// Report a fatal error and pick the failure exit code
fn fail<W: std::io::Write>(
    reporter: &ErrorReporter,
    err: &DispatchError,
    format: OutputFormat,
    out: &mut W,
) -> ExitCode {
    if let Err(e) = reporter.report_fatal(err, format, out) {
        tracing::error!("Failed to write failure notice: {}", e);
    }
    ExitCode::FAILURE
}

async fn build_cache(settings: &Settings) -> Option<TtlCache> {
    let backend: Arc<dyn KeyValueCache> = match settings.cache.backend {
        CacheBackend::File => {
            info!("Using file cache at {}", settings.cache.dir.display());
            Arc::new(FileCache::new(&settings.cache.dir, Arc::new(SystemClock)))
        }
        CacheBackend::Redis => {
            let Some(url) = settings.cache.redis_url.as_deref() else {
                warn!("cache.backend is redis but cache.redis_url is not set, running without cache");
                return None;
            };
            match RedisCache::new(url).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!("Failed to connect to Redis ({}), running without cache", e);
                    return None;
                }
            }
        }
    };

    Some(TtlCache::new(backend, settings.cache.lifetime()))
}

async fn build_dispatcher(settings: &Settings, use_cache: bool) -> Result<Dispatcher, DispatchError> {
    let client = PostgresClient::from_settings(
        &settings.database.url,
        settings.database.max_connections,
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.run_migrations,
    )
    .await?;
    client.health_check().await?;

    info!("PostgreSQL client initialized");

    let cache = if use_cache { build_cache(settings).await } else { None };

    let engine = AssignmentEngine::new(
        Haversine::new(settings.matching.earth_radius_km),
        settings.matching.engine_config(),
    );

    info!("Engine initialized with {:?}", engine.config());

    Ok(Dispatcher::new(
        Arc::new(PostgresCourierRepository::new(client.clone())),
        Arc::new(PostgresOrderRepository::new(client)),
        cache,
        engine,
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let logging = loaded
        .as_ref()
        .map(|s| s.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    let mut stdout = std::io::stdout().lock();

    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            let format = cli.format.unwrap_or_default();
            return fail(&ErrorReporter::default(), &DispatchError::Config(e), format, &mut stdout);
        }
    };

    let format = cli.format.unwrap_or(settings.output.format);
    let reporter = ErrorReporter::new(settings.matching.failure_policy);

    info!("Starting courier assignment run...");

    let dispatcher = match build_dispatcher(&settings, !cli.no_cache).await {
        Ok(dispatcher) => dispatcher,
        Err(e) => return fail(&reporter, &e, format, &mut stdout),
    };

    let run = match dispatcher.run().await {
        Ok(run) => run,
        Err(e) => return fail(&reporter, &e, format, &mut stdout),
    };

    let aborted = dispatcher.strict_failure(&run);

    if let Err(e) = finish_run(&run, aborted.as_ref(), &reporter, format, &mut stdout) {
        tracing::error!("Failed to write report: {}", e);
        return ExitCode::FAILURE;
    }

    if aborted.is_some() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
