use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use netanomaly_runtime::cli::{Command, InvokeArgs, ServeArgs, parse_cli};
use netanomaly_runtime::{Detector, InferenceHandler, XgbHandler, invoke, telemetry};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli();
    telemetry::install(cli.log_level.as_deref())?;

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Invoke(args) => run_invoke(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    // Refuse to bind until the model is usable.
    let detector = Detector::load(&args.model)?;
    let model = detector.info();
    info!(
        path = %args.model.display(),
        objective = %model.objective,
        num_feature = model.num_feature,
        num_trees = model.num_trees,
        "model ready"
    );

    let app = netanomaly_server::app(Arc::new(detector));
    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

fn run_invoke(args: InvokeArgs) -> anyhow::Result<()> {
    let body = match &args.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read request body from {}", path.display()))?,
        None => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("failed to read request body from stdin")?;
            body
        }
    };

    let handler = XgbHandler;
    let model = handler.load(&args.model_dir)?;
    let response = invoke(&handler, &model, &body, &args.content_type, &args.accept)?;
    println!("{response}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
