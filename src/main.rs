use std::{future::IntoFuture, pin::pin, process, sync::Arc};

use orderline::{
    application::{error::AppError, orders::OrderService, repos::OrdersRepo},
    cache::{CacheConfig, OrderCache},
    config,
    feed::{FeedConfig, FeedConsumer},
    infra::{
        db::PgOrderStore,
        error::InfraError,
        http::{self, ApiState},
        kafka::{KafkaSource, OrderProducer},
        telemetry,
    },
    shutdown::Shutdown,
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Produce(args) => run_produce(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = PgOrderStore::connect(&settings.database).await?;
    let repo: Arc<dyn OrdersRepo> = Arc::new(store);
    let cache = Arc::new(OrderCache::new(&CacheConfig::from(&settings.cache)));
    let orders = Arc::new(OrderService::bootstrap(repo, cache).await);

    let shutdown = Shutdown::new();
    let source = KafkaSource::connect(&settings.kafka)?;
    let feed = FeedConsumer::new(source, FeedConfig::from(&settings.feed))
        .start(shutdown.subscribe());

    let ingestion = {
        let orders = Arc::clone(&orders);
        tokio::spawn(async move { orders.run(feed.into_stream()).await })
    };

    let served = serve_http(&settings, ApiState { orders }, &shutdown).await;

    shutdown.trigger();
    if let Err(err) = ingestion.await {
        warn!(error = %err, "Ingestion task ended abnormally");
    }
    info!("Shutdown complete");
    served
}

async fn serve_http(
    settings: &config::Settings,
    state: ApiState,
    shutdown: &Shutdown,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "HTTP server listening");

    let mut stopping = shutdown.subscribe();
    let server = axum::serve(listener, http::build_router(state))
        .with_graceful_shutdown(async move { stopping.requested().await });
    let mut server = pin!(server.into_future());

    tokio::select! {
        result = &mut server => return result.map_err(|err| InfraError::from(err).into()),
        () = termination_signal() => {
            info!(
                grace_period_secs = settings.server.graceful_shutdown.as_secs(),
                "Shutdown signal received; draining"
            );
            shutdown.trigger();
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(|err| InfraError::from(err).into()),
        Err(_) => {
            warn!("Graceful shutdown period elapsed; dropping open connections");
            Ok(())
        }
    }
}

async fn termination_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_produce(
    settings: config::Settings,
    args: config::ProduceArgs,
) -> Result<(), AppError> {
    if args.count == 0 {
        return Err(AppError::validation("--count must be greater than zero"));
    }

    let producer = OrderProducer::new(&settings.kafka)?;
    let sent = producer
        .send_test_orders(args.count)
        .await
        .map_err(|err| InfraError::kafka(err.to_string()))?;

    info!(sent, topic = %settings.kafka.topic, "Test orders published");
    Ok(())
}
