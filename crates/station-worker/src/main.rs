//! Broadcast bot binary: status server plus the selected orchestrator.

use std::sync::Arc;

use station_api::metrics::init_metrics;
use station_api::{create_router, ApiConfig, AppState};
use station_firestore::{CycleRepository, FirestoreClient};
use station_media::{check_ffmpeg, BrandingConfig, ProcessSupervisor, SupervisorConfig};
use station_models::default_slots;
use station_storage::publisher_from_env;
use station_worker::{
    AiContent, CentralApiCatalog, ChannelOrchestrator, Collaborators, CycleOrchestrator, CycleStore,
    FfmpegEngine, FirestoreCycleStore, MemoryCycleStore, PlaylistTracks, RunMode, StateBackend,
    StateRecorder, TrackSource, WorkerConfig, WorkerError, WorkerResult, YoutubeRegistrar,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("station=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting station-worker v{}", env!("CARGO_PKG_VERSION"));

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(mode = %config.mode, "Worker config: {:?}", config);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    if let Err(e) = run(config, ApiConfig::from_env(), cancel).await {
        error!("{}", e.describe());
        std::process::exit(1);
    }

    info!("Shutdown complete");
}

/// Build every collaborator for the configured mode and run it until `cancel` fires.
///
/// Only startup problems are returned; the orchestrators themselves never fail.
async fn run(config: WorkerConfig, api_config: ApiConfig, cancel: CancellationToken) -> WorkerResult<()> {
    let ffmpeg = check_ffmpeg(&config.ffmpeg_path)?;
    info!(path = %ffmpeg.display(), "Encoder found");
    tokio::fs::create_dir_all(&config.work_dir).await?;

    let supervisor = ProcessSupervisor::new(
        SupervisorConfig::default()
            .with_program(config.ffmpeg_path.clone())
            .with_startup_grace(config.ffmpeg_startup_grace),
    );

    let store: Arc<dyn CycleStore> = match config.state_backend {
        StateBackend::Memory => Arc::new(MemoryCycleStore::new()),
        StateBackend::Firestore => Arc::new(FirestoreCycleStore::new(CycleRepository::new(
            FirestoreClient::from_env()?,
        ))),
    };
    let (recorder, status_rx) = StateRecorder::new(config.mode.as_str(), store);
    recorder.load_history().await;

    let metrics_handle = if api_config.metrics_enabled {
        match init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to install metrics recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut state = AppState::new(api_config.clone(), status_rx);
    let mode_task: ModeRunner = match config.mode {
        RunMode::Live | RunMode::Shorts => {
            let collaborators = cycle_collaborators(&config, supervisor).await?;
            ModeRunner::Cycles(CycleOrchestrator::new(config, collaborators, recorder))
        }
        RunMode::Channels => {
            let base_url = config
                .api_central_url
                .clone()
                .ok_or_else(|| WorkerError::config_error("API_CENTRAL_URL not set"))?;
            let orchestrator = Arc::new(ChannelOrchestrator::new(
                config,
                default_slots(),
                Arc::new(CentralApiCatalog::new(base_url)),
                Arc::new(YoutubeRegistrar::from_env()?),
                supervisor,
                recorder,
            ));
            state = state.with_control(orchestrator.clone());
            ModeRunner::Channels(orchestrator)
        }
    };

    let router = create_router(state, metrics_handle);
    let api_cancel = cancel.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = station_api::serve(&api_config, router, api_cancel.clone()).await {
            error!("Status server failed: {}", e);
        }
    });

    match mode_task {
        ModeRunner::Cycles(orchestrator) => orchestrator.run(cancel.clone()).await,
        ModeRunner::Channels(orchestrator) => orchestrator.run(cancel.clone()).await,
    }

    cancel.cancel();
    if let Err(e) = api_task.await {
        warn!("Status server task ended abnormally: {}", e);
    }
    Ok(())
}

enum ModeRunner {
    Cycles(CycleOrchestrator),
    Channels(Arc<ChannelOrchestrator>),
}

async fn cycle_collaborators(config: &WorkerConfig, supervisor: ProcessSupervisor) -> WorkerResult<Collaborators> {
    let branding = BrandingConfig::default()
        .with_logo(config.branding_logo_path.clone())
        .with_font(config.branding_font_path.clone());

    let tracks: Option<Arc<dyn TrackSource>> = match (&config.mode, &config.lofi_playlist_url) {
        (RunMode::Shorts, Some(url)) => Some(Arc::new(PlaylistTracks::new(config.downloads_dir(), url.clone()))),
        _ => None,
    };

    Ok(Collaborators {
        content: Arc::new(AiContent::from_env()?),
        publisher: publisher_from_env().await?,
        registrar: Arc::new(YoutubeRegistrar::from_env()?),
        media: Arc::new(FfmpegEngine::new(supervisor, branding, config.stream_keepalive)),
        tracks,
    })
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal");
    cancel.cancel();
}
