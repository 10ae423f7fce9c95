use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use omnect_network_orchestrator::{
    api::Api,
    command_executor::HostCommandExecutor,
    config::{ApiConfig, AppConfig},
    orchestrator::Orchestrator,
};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

type OrchestratorApi = Api<HostCommandExecutor>;

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;
    debug!("configuration: {config:?}");

    let executor = HostCommandExecutor::new(&config.command);
    let api = OrchestratorApi::new(Orchestrator::new(
        executor,
        &config.network,
        &config.timesync,
    ));

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let (server_handle, server_task) = run_server(&config.api, api)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    }

    info!("shutting down");
    server_handle.stop(true).await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!(
        "module version: {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHORT_REV")
    );
}

fn run_server(
    config: &ApiConfig,
    api: OrchestratorApi,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let address = format!("{}:{}", config.bind_address, config.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(api.clone()))
            .configure(OrchestratorApi::routes)
    })
    .bind(&address)
    .context(format!("failed to bind server to {address}"))?
    .disable_signals()
    .run();

    info!("listening on {address}");

    Ok((server.handle(), tokio::spawn(server)))
}
