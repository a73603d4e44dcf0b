//! Marker responder: a static file server for one emulated host.
//!
//! Serves its root directory (`/` answers with `index.html`) and writes one
//! access line per request. The client is identified by its raw IP address;
//! names are never resolved, since hosts inside the lab have no resolver.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use chrono::{DateTime, Local};
use log::info;
use tower_http::services::ServeDir;

/// Build the responder router serving files from `root`.
pub fn create_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(log_request))
}

/// How a client shows up in the access log
pub fn address_string(peer: Option<IpAddr>) -> String {
    match peer {
        Some(ip) => ip.to_string(),
        None => "-".to_string(),
    }
}

/// One access log line in the common `http.server` shape
pub fn access_line(
    peer: Option<IpAddr>,
    request_line: &str,
    status: u16,
    at: DateTime<Local>,
) -> String {
    format!(
        "{} - - [{}] \"{}\" {}",
        address_string(peer),
        at.format("%d/%b/%Y %H:%M:%S"),
        request_line,
        status
    )
}

async fn log_request(request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let request_line = format!(
        "{} {} {:?}",
        request.method(),
        request.uri(),
        request.version()
    );

    let response = next.run(request).await;

    info!(
        "{}",
        access_line(peer, &request_line, response.status().as_u16(), Local::now())
    );
    response
}

/// Bind `bind:port` and serve `root` until the process is killed.
pub async fn serve(bind: IpAddr, port: u16, root: &Path) -> io::Result<()> {
    let addr = SocketAddr::new(bind, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving {} on http://{}", root.display(), addr);

    let router = create_router(root);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
