//! Development server.
//!
//! Serves the output root over HTTP. HTML pages get a small script that
//! listens on the reload endpoint and refreshes the page whenever the
//! watcher finishes a rebuild.

pub mod reload;

pub use reload::{inject_reload_script, ReloadHub, RELOAD_PATH, RELOAD_SCRIPT};

use crate::build::BuildContext;
use axum::body::Body;
use axum::extract::{FromRef, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

/// Error starting the development server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Other socket error
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    files: ServeDir,
    hub: ReloadHub,
}

impl FromRef<AppState> for ReloadHub {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}

/// Build the router serving `root` with live reload through `hub`.
pub fn router(root: PathBuf, hub: ReloadHub) -> Router {
    let state = AppState { files: ServeDir::new(root), hub };
    Router::new()
        .route(RELOAD_PATH, get(reload::reload_events))
        .fallback(static_files)
        .with_state(state)
}

async fn static_files(State(state): State<AppState>, req: Request) -> Response {
    let inject = req.method() == Method::GET;
    let res = match state.files.oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    };

    if inject && res.status() == StatusCode::OK && is_html(&res) {
        inject_into(res).await
    } else {
        res
    }
}

fn is_html(res: &Response) -> bool {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

async fn inject_into(res: Response) -> Response {
    let (mut parts, body) = res.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_reload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// A running development server.
#[derive(Debug)]
pub struct DevServer {
    /// Address actually bound (useful when the configured port is 0)
    pub addr: SocketAddr,
    /// Hub used to push reloads to the connected pages
    pub hub: ReloadHub,
    /// Server task
    pub handle: JoinHandle<()>,
}

/// Bind the configured address and start serving the output root.
pub async fn start(ctx: &BuildContext, hub: ReloadHub) -> Result<DevServer, ServeError> {
    let serve = &ctx.config().serve;
    let addr = format!("{}:{}", serve.host, serve.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind { addr: addr.clone(), source })?;
    let local = listener.local_addr()?;

    let root = ctx.out_dir();
    info!("Serving {} at http://{}", root.display(), local);

    let app = router(root, hub.clone());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Dev server stopped: {}", e);
        }
    });

    Ok(DevServer { addr: local, hub, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetflowConfig;
    use std::fs;
    use tempfile::TempDir;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn site() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body>hi</body></html>").unwrap();
        fs::create_dir_all(temp.path().join("stylesheets")).unwrap();
        fs::write(temp.path().join("stylesheets/styles.css"), "a{color:red}").unwrap();
        temp
    }

    #[tokio::test]
    async fn test_html_gets_reload_script() {
        let temp = site();
        let app = router(temp.path().to_path_buf(), ReloadHub::new());
        let (status, body) = get_body(app, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(RELOAD_PATH));
        assert!(body.ends_with("</script></body></html>"));
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let temp = site();
        let app = router(temp.path().to_path_buf(), ReloadHub::new());
        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<html><body>hi"));
    }

    #[tokio::test]
    async fn test_css_served_unchanged() {
        let temp = site();
        let app = router(temp.path().to_path_buf(), ReloadHub::new());
        let (status, body) = get_body(app, "/stylesheets/styles.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a{color:red}");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let temp = site();
        let app = router(temp.path().to_path_buf(), ReloadHub::new());
        let (status, _) = get_body(app, "/nope.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_binds_free_port() {
        let temp = site();
        let mut config = AssetflowConfig::default();
        config.serve.port = 0;
        config.project.out = temp.path().to_path_buf();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());

        let server = start(&ctx, ReloadHub::new()).await.unwrap();
        assert_ne!(server.addr.port(), 0);
        server.handle.abort();
    }

    #[tokio::test]
    async fn test_start_reports_bind_error() {
        let temp = site();
        let mut config = AssetflowConfig::default();
        config.serve.host = "256.0.0.1".to_string();
        let ctx = BuildContext::new(config, temp.path().to_path_buf());

        let err = start(&ctx, ReloadHub::new()).await.unwrap_err();
        assert!(matches!(err, ServeError::Bind { .. }));
    }
}
