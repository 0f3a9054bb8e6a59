//! Development server with live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::commands::generate;
use crate::helpers::decode_path;
use crate::Site;

const LIVE_RELOAD_PATH: &str = "/__livereload";

/// Injected before `</body>` of every HTML page when watching
const LIVE_RELOAD_SCRIPT: &str = r#"<script>
(function() {
    var ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
"#;

struct ServerState {
    public_dir: PathBuf,
    /// Site root with both slashes, e.g. `/blog/`
    root: String,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

/// Serve the public directory of an already generated site until
/// interrupted. With `watch`, content changes rebuild the site and reload
/// connected browsers.
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(ServerState {
        public_dir: site.public_dir.clone(),
        root: site.config.normalized_root(),
        reload_tx: reload_tx.clone(),
        live_reload: watch,
    });

    let app = Router::new()
        .route(LIVE_RELOAD_PATH, get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let url = format!("http://{}:{}{}", ip, port, state.root);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let site = site.clone();
        tokio::task::spawn_blocking(move || {
            let result = generate::watch_blocking(&site, |site| match generate::run(site, false) {
                Ok(Some(_)) => {
                    tracing::info!("Regenerated, reloading browsers");
                    let _ = reload_tx.send(());
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Generation failed, serving previous output: {:#}", e),
            });
            if let Err(e) = result {
                tracing::error!("File watcher stopped: {:#}", e);
            }
        });
    }

    axum::serve(listener, app).await?;
    Ok(())
}

async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            result = reload_rx.recv() => {
                match result {
                    Ok(()) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Request path relative to the public directory, still percent-encoded.
/// `None` for paths outside the site root.
fn site_relative<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    if root == "/" {
        return Some(path.trim_start_matches('/'));
    }
    match path.strip_prefix(root) {
        Some(rest) => Some(rest),
        None if path == root.trim_end_matches('/') => Some(""),
        None => None,
    }
}

/// HTML file answering a site-relative request path, if any
fn html_file(public_dir: &Path, relative: &str) -> Option<PathBuf> {
    let decoded = decode_path(relative);
    if decoded.split('/').any(|segment| segment == "..") {
        return None;
    }
    let candidate = public_dir.join(&decoded);
    let file = if decoded.is_empty() || candidate.is_dir() {
        candidate.join("index.html")
    } else if candidate.is_file() {
        candidate
    } else {
        public_dir.join(format!("{}.html", decoded.trim_end_matches('/')))
    };
    let is_html = file
        .extension()
        .is_some_and(|ext| ext == "html" || ext == "htm");
    (is_html && file.is_file()).then_some(file)
}

/// Serve files from the public directory, injecting the live reload script
/// into HTML pages
async fn fallback_handler(State(state): State<Arc<ServerState>>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let Some(relative) = site_relative(&state.root, &path) else {
        return not_found(&state).await;
    };

    if let Some(file) = html_file(&state.public_dir, relative) {
        return match tokio::fs::read_to_string(&file).await {
            Ok(html) if state.live_reload => Html(inject_live_reload(&html)).into_response(),
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}", file, e);
                not_found(&state).await
            }
        };
    }

    let (mut parts, body) = request.into_parts();
    parts.uri = match Uri::try_from(format!("/{}", relative)) {
        Ok(uri) => uri,
        Err(_) => return (StatusCode::BAD_REQUEST, "Bad request").into_response(),
    };
    let mut service = ServeDir::new(&state.public_dir);
    match service.try_call(Request::from_parts(parts, body)).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => not_found(&state).await,
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!("Failed to serve {}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}

/// The site's own `404.html` when it has one
async fn not_found(state: &ServerState) -> Response {
    match tokio::fs::read_to_string(state.public_dir.join("404.html")).await {
        Ok(html) if state.live_reload => {
            (StatusCode::NOT_FOUND, Html(inject_live_reload(&html))).into_response()
        }
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn inject_live_reload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], LIVE_RELOAD_SCRIPT, &html[pos..]),
        None => format!("{}{}", html, LIVE_RELOAD_SCRIPT),
    }
}

fn open_browser(url: &str) -> Result<()> {
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
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
