//! Development server with live reload
//!
//! Provides a local development server with:
//! - Upstream proxying (or static serving of the output directory)
//! - A WebSocket live reload channel
//! - Client script injection into HTML responses

pub mod proxy;
pub mod reload;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use colored::Colorize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::config::{Config, OpenMode};
use crate::utils::clean_path;

pub use reload::{inject_client, LiveReload, ReloadMessage};

/// Shared server state
pub struct ServerState {
    /// Live reload hub
    live: LiveReload,

    /// Upstream site, or `None` in static mode
    upstream: Option<String>,

    /// HTTP client used for proxying
    client: reqwest::Client,

    /// Directory served in static mode
    dist: PathBuf,

    /// Inject the client script into HTML
    inject: bool,

    /// In-page notifications in the client
    notify: bool,
}

/// Server options, from config with command-line overrides applied
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub bind: String,
    pub port: u16,
    pub host: String,
    pub open: OpenMode,
    pub notify: bool,
}

impl ServeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind: config.serve.bind.clone(),
            port: config.serve.port,
            host: config.public_host(),
            open: config.serve.open,
            notify: config.serve.notify,
        }
    }
}

/// Development server
pub struct DevServer {
    /// Project configuration
    config: Arc<Config>,

    /// Server options
    options: ServeOptions,

    /// Live reload hub shared with the tasks
    live: LiveReload,
}

/// A server accepting connections in the background
pub struct RunningServer {
    /// Address actually bound (resolves port 0)
    pub addr: SocketAddr,

    /// The serve loop
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl DevServer {
    /// Create a new development server
    pub fn new(config: Arc<Config>, options: ServeOptions, live: LiveReload) -> Self {
        Self {
            config,
            options,
            live,
        }
    }

    /// Build the router
    pub fn router(&self) -> Result<Router> {
        let upstream = self.config.upstream();

        // Redirects go back to the browser so cookies set alongside them stick
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create the upstream HTTP client")?;

        let state = Arc::new(ServerState {
            live: self.live.clone(),
            upstream: upstream.clone(),
            client,
            dist: self.config.dist_dir(),
            inject: true,
            notify: self.options.notify,
        });

        let router = Router::new()
            .route(reload::WS_ROUTE, get(reload::reload_websocket))
            .route(reload::CLIENT_ROUTE, get(reload::client_script))
            .route(reload::RELOAD_ROUTE, post(reload::remote_reload));

        let router = if upstream.is_some() {
            router.fallback(proxy::proxy_request)
        } else {
            router.fallback(serve_static)
        };

        Ok(router.layer(CorsLayer::permissive()).with_state(state))
    }

    /// Bind the listener and serve in the background.
    ///
    /// Returns once the socket is bound; the server runs until the process
    /// exits or the handle is aborted.
    pub async fn spawn(&self) -> Result<RunningServer> {
        let addr = format!("{}:{}", self.options.bind, self.options.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind dev server to {}", addr))?;
        let addr = listener.local_addr()?;

        let app = self.router()?;
        let handle = tokio::spawn(async move { axum::serve(listener, app).await });

        let local = format!("http://localhost:{}", addr.port());
        let external = format!("http://{}:{}", self.options.host, addr.port());

        info!("Server listening on {}", addr);
        match self.config.upstream() {
            Some(upstream) => eprintln!(
                "  {} Proxying {}",
                "•".dimmed(),
                upstream.cyan()
            ),
            None => eprintln!(
                "  {} Serving {}",
                "•".dimmed(),
                self.config.dist_dir().display().to_string().cyan()
            ),
        }
        eprintln!("  {} Local:    {}", "•".dimmed(), local.cyan().underline());
        eprintln!("  {} External: {}\n", "•".dimmed(), external.cyan().underline());

        let target = match self.options.open {
            OpenMode::Off => None,
            OpenMode::Local => Some(local),
            OpenMode::External => Some(external),
        };
        if let Some(url) = target {
            if let Err(e) = webbrowser_open(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        Ok(RunningServer { addr, handle })
    }
}

/// Serve a file from the output directory
async fn serve_static(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let relative = clean_path(uri.path());
    let mut file_path = state.dist.join(relative.trim_start_matches('/'));

    if file_path.is_dir() {
        file_path = file_path.join("index.html");
    }

    if !file_path.is_file() {
        return (StatusCode::NOT_FOUND, format!("File not found: {}", uri.path())).into_response();
    }

    let content_type = get_content_type(&file_path);

    if content_type.starts_with("text/html") {
        return match std::fs::read_to_string(&file_path) {
            Ok(content) if state.inject => Html(inject_client(&content)).into_response(),
            Ok(content) => Html(content).into_response(),
            Err(e) => {
                error!("Failed to read {}: {}", file_path.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    match std::fs::read(&file_path) {
        Ok(content) => ([(header::CONTENT_TYPE, content_type)], content).into_response(),
        Err(e) => {
            error!("Failed to read {}: {}", file_path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}

/// Get content type for a file
fn get_content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// Open URL in browser (simple implementation)
fn webbrowser_open(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()?;
    }

    Ok(())
}
