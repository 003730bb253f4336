use std::net::SocketAddr;
use std::sync::Arc;

use emorelay_classifier::{ClassifierConfig, HttpEmotionClassifier};
use emorelay_core::ffmpeg::FfmpegDecoder;
use emorelay_github::{GitHubClient, GitHubConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emorelay_api::config::ServerConfig;
use emorelay_api::router::build_app_router;
use emorelay_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "emorelay_api=debug,emorelay_core=debug,emorelay_github=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Emotion classifier ---
    let classifier_config = ClassifierConfig::from_env();
    let classifier =
        HttpEmotionClassifier::new(&classifier_config).expect("Failed to build classifier client");
    tracing::info!(url = %classifier_config.base_url, "Emotion classifier configured");

    // --- Remote runner ---
    let github_config = GitHubConfig::from_env().expect("Invalid GitHub configuration");
    tracing::info!(
        repo = %github_config.repo,
        branch = %github_config.branch,
        workflow = %github_config.workflow,
        "GitHub runner configured"
    );
    let runner = GitHubClient::new(github_config).expect("Failed to build GitHub client");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        classifier: Arc::new(classifier),
        video_decoder: Arc::new(FfmpegDecoder),
        runner: Arc::new(runner),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
