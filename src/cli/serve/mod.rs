//! Development server with file watching.

mod response;
mod watch;

use crate::{
    config::cfg,
    core::register_server,
    log,
};
use anyhow::Result;
use crossbeam::channel;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Request, Server};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop
///
/// This allows the caller to kick off the initial build in the
/// background while early requests get a loading response.
pub fn bind_server() -> Result<BoundServer> {
    let config = cfg();
    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);

    Ok(BoundServer {
        server,
        addr,
        shutdown_rx,
    })
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: std::net::IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

impl BoundServer {
    /// Get the bound address.
    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the request loop (blocking).
    pub fn run(self) -> Result<()> {
        let watcher = if cfg().serve.watch {
            watch::spawn_watcher(self.shutdown_rx)
        } else {
            None
        };

        run_request_loop(&self.server);
        wait_for_shutdown(watcher);
        Ok(())
    }
}

fn run_request_loop(server: &Server) {
    // Small pool so a slow disk read doesn't serialize all requests
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to create thread pool");

    for request in server.incoming_requests() {
        pool.spawn(move || {
            if let Err(e) = handle_request(request) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Wait for the watcher thread to stop (max 2 seconds).
fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(std::time::Duration::from_millis(50));
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    if !crate::core::is_serving() {
        return response::respond_loading(request);
    }

    let config = cfg();
    match resolve_path(request.url(), &config.build.output) {
        Some(path) => response::respond_file(request, &path),
        None => response::respond_not_found(request, &config),
    }
}

/// Map a request URL onto a file in the build tree.
///
/// - query strings and fragments are ignored
/// - directories resolve to their `index.html`
/// - extensionless URLs fall back to `<path>.html`
/// - `..` components are rejected
fn resolve_path(url: &str, output: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.trim_start_matches('/');

    if path.split('/').any(|seg| seg == "..") {
        return None;
    }

    let mut candidate = output.join(path);

    if candidate.is_dir() || path.is_empty() {
        candidate = candidate.join("index.html");
    } else if !candidate.exists() && candidate.extension().is_none() {
        candidate = candidate.with_extension("html");
    }

    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(dir: &TempDir) -> PathBuf {
        let output = dir.path().join("build");
        fs::create_dir_all(output.join("about")).unwrap();
        fs::create_dir_all(output.join("assets/stylesheets")).unwrap();
        fs::write(output.join("index.html"), "<html>home</html>").unwrap();
        fs::write(output.join("about/index.html"), "<html>about</html>").unwrap();
        fs::write(output.join("contact.html"), "<html>contact</html>").unwrap();
        fs::write(
            output.join("assets/stylesheets/site.min-9f8c1a2b.css"),
            "body{}",
        )
        .unwrap();
        output
    }

    #[test]
    fn test_resolve_root() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert_eq!(
            resolve_path("/", &output).unwrap(),
            output.join("index.html")
        );
    }

    #[test]
    fn test_resolve_directory_index() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert_eq!(
            resolve_path("/about", &output).unwrap(),
            output.join("about/index.html")
        );
        assert_eq!(
            resolve_path("/about/", &output).unwrap(),
            output.join("about/index.html")
        );
    }

    #[test]
    fn test_resolve_html_extension_fallback() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert_eq!(
            resolve_path("/contact", &output).unwrap(),
            output.join("contact.html")
        );
    }

    #[test]
    fn test_resolve_hashed_asset_with_query() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert_eq!(
            resolve_path("/assets/stylesheets/site.min-9f8c1a2b.css?cache=1", &output).unwrap(),
            output.join("assets/stylesheets/site.min-9f8c1a2b.css")
        );
    }

    #[test]
    fn test_resolve_rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert!(resolve_path("/../secret", &output).is_none());
        assert!(resolve_path("/about/../../secret", &output).is_none());
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let output = site(&dir);
        assert!(resolve_path("/nope.css", &output).is_none());
    }
}
