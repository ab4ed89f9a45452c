mod compiler;
mod config;
mod errors;
mod export;
mod layout;
mod models;
mod routes;
mod sandbox;
mod scale;
mod session;
mod source;
mod state;

use anyhow::{Context, Result};
use reqwest::Url;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::export::{FsDownloadSink, Rasterizer};
use crate::layout::PAGE_GEOMETRY;
use crate::routes::build_router;
use crate::sandbox::{DocumentShell, SandboxHost, SandboxPolicy};
use crate::session::SessionRegistry;
use crate::source::{HttpResumeSource, ResumeSource};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("preview_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Preview API v{}", env!("CARGO_PKG_VERSION"));

    // Sandbox: privilege policy + document shell shared by preview and export
    let policy = SandboxPolicy::new(&config.runtime_scripts, &config.runtime_origins)?;
    info!(
        "Sandbox policy: {} runtime script(s), origins {:?}",
        policy.runtime_scripts().len(),
        policy.asset_origins()
    );
    let shell = Arc::new(DocumentShell::new(
        PAGE_GEOMETRY,
        policy,
        config.shell_extra_css.clone(),
    ));
    info!(
        "Page geometry: {} {}x{}mm",
        PAGE_GEOMETRY.name, PAGE_GEOMETRY.width_mm, PAGE_GEOMETRY.height_mm
    );

    // Export backend
    let export_timeout = Duration::from_secs(config.export_timeout_secs);
    let rasterizer = build_rasterizer(&config, export_timeout);
    info!("Rasterizer initialized ({})", rasterizer.name());
    let sink = Arc::new(FsDownloadSink::new(config.export_dir.clone()));

    // Resume persistence API (optional)
    let source: Option<Arc<dyn ResumeSource>> = match &config.resume_api_url {
        Some(raw) => {
            let base = Url::parse(raw).context("RESUME_API_URL must be a valid URL")?;
            info!("Resume source: {base}");
            Some(Arc::new(HttpResumeSource::new(base)))
        }
        None => {
            warn!("RESUME_API_URL not set; export requires inline content");
            None
        }
    };

    // Build app state
    let state = AppState {
        sessions: Arc::new(SessionRegistry::new(
            SandboxHost::new(shell),
            rasterizer,
            sink,
            export_timeout,
        )),
        source,
    };

    // Unmount previews whose page went away without a DELETE
    if config.session_idle_secs > 0 {
        let max_idle = Duration::from_secs(config.session_idle_secs);
        state.sessions.spawn_reaper(max_idle);
        info!("Idle previews are unmounted after {}s", config.session_idle_secs);
    } else {
        warn!("SESSION_IDLE_SECS=0; idle previews are never unmounted");
    }

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict to the editor origin once it is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "chrome")]
fn build_rasterizer(config: &Config, timeout: Duration) -> Arc<dyn Rasterizer> {
    if let Some(path) = config.chrome_path.as_ref().filter(|p| !p.exists()) {
        warn!("CHROME_PATH {} does not exist; PDF export disabled", path.display());
        return Arc::new(export::UnavailableRasterizer::new(format!(
            "Chrome binary not found at {}",
            path.display()
        )));
    }
    Arc::new(export::chrome::ChromeRasterizer::new(
        config.chrome_path.clone(),
        timeout,
    ))
}

#[cfg(not(feature = "chrome"))]
fn build_rasterizer(_config: &Config, _timeout: Duration) -> Arc<dyn Rasterizer> {
    Arc::new(export::UnavailableRasterizer::new(
        "built without the `chrome` feature",
    ))
}
