//! Async TCP server using Tokio.
//!
//! Accepts TCP connections, parses HTTP/1.1 requests and hands each one to a
//! shared [`Router`] via [`Router::respond`]. Supports HTTP/1.1 persistent
//! connections (keep-alive) out of the box.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// TCP transport for a [`Router`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use signpost::{Router, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new("http://127.0.0.1:8080")?;
///     router.get("/", "Web:home")?;
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(Arc::new(router)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and answering every request with
    /// [`Router::respond`].
    ///
    /// Runs until the process is terminated. Accept failures are logged and
    /// do not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run(self, router: Arc<Router>) -> Result<(), ServerError> {
        info!(
            address = %self.local_addr,
            base_url = %router.base_url(),
            routes = router.len(),
            "signpost listening"
        );

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let router = Arc::clone(&router);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// We loop, reading one request per iteration, until the peer closes the
/// connection or signals `Connection: close`.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        // A read may carry more than one pipelined request.
        while let Some(request) = next_request(&mut buf, &mut stream, peer_addr).await? {
            let keep_alive = request.is_keep_alive();

            debug!(
                peer = %peer_addr,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );

            let response = router.respond(&request).keep_alive(keep_alive);
            stream.write_all(&response.into_bytes()).await?;
            stream.flush().await?;

            if !keep_alive {
                debug!(peer = %peer_addr, "Connection: close, shutting down");
                return Ok(());
            }
        }
    }

    Ok(())
}

/// Split one complete request off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. A malformed request is
/// answered with `400`, one whose declared size exceeds
/// [`MAX_REQUEST_SIZE`] with `413`; both close the connection.
async fn next_request(
    buf: &mut BytesMut,
    stream: &mut TcpStream,
    peer_addr: SocketAddr,
) -> Result<Option<Request>, std::io::Error> {
    if buf.is_empty() {
        return Ok(None);
    }

    let (request, body_offset) = match Request::parse(&buf[..]) {
        Ok(pair) => pair,
        Err(RequestError::Incomplete) => return Ok(None),
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
            let response = Response::new(StatusCode::BadRequest)
                .body(format!("Bad Request: {e}"))
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            stream.shutdown().await?;
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
        }
    };

    let Some(total_needed) = body_offset
        .checked_add(request.content_length().unwrap_or(0))
        .filter(|total| *total <= MAX_REQUEST_SIZE)
    else {
        warn!(peer = %peer_addr, "declared body too large, sending 413");
        let response = Response::new(StatusCode::PayloadTooLarge)
            .body("Request entity too large")
            .keep_alive(false);
        stream.write_all(&response.into_bytes()).await?;
        stream.shutdown().await?;
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "declared Content-Length exceeds the request size limit",
        ));
    };

    // Wait for the full body to arrive if Content-Length is set.
    if buf.len() < total_needed {
        return Ok(None);
    }

    let raw = buf.split_to(total_needed).freeze();
    Ok(Some(request.with_body(raw.slice(body_offset..))))
}
