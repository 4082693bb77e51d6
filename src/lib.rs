//! # signpost
//!
//! A named-route HTTP request router with middleware gates, controller
//! dispatch, and reverse URL generation, plus the small HTTP/1.1 layer and
//! tokio transport needed to put it on a socket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use signpost::router::Handler;
//! use signpost::{Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new("http://127.0.0.1:8080")?;
//!     router
//!         .get("/hello/{name}", Handler::inline(|ctx| {
//!             let name = ctx.params().get("name").unwrap_or("world");
//!             Response::new(StatusCode::Ok).body(format!("Hello, {name}!"))
//!         }))?
//!         .name("hello");
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.run(Arc::new(router)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod controller;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
