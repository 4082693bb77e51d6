//! Small site wired through the router: a controller with three actions, a
//! guest-only middleware, and an error route under `/ops`.
//!
//! ```text
//! RUST_LOG=signpost=debug cargo run --example web
//! curl -i http://127.0.0.1:8040/cadastrar
//! curl -i http://127.0.0.1:8040/nowhere          # 302 → /ops/404
//! ```

use std::sync::Arc;

use signpost::config::RouterConfig;
use signpost::context::{Context, Parameters};
use signpost::controller::Controller;
use signpost::middleware::{Middleware, RequestLogger};
use signpost::{Method, Response, Router, Server, StatusCode};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "base_url": "http://127.0.0.1:8040",
    "namespace": "demo::controllers",
    "error_route": "web.error"
}"#;

struct Web {
    home_url: String,
    register_url: String,
}

impl Web {
    fn new(router: &Router) -> Self {
        Self {
            home_url: router.url("web.home").unwrap_or_default(),
            register_url: router.url("web.register").unwrap_or_default(),
        }
    }

    fn home(&self, _data: &Parameters) -> Response {
        Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(format!(
                "<h1>Home</h1><a href='{}'>Sign up</a>",
                self.register_url
            ))
    }

    fn register(&self, data: &Parameters) -> Response {
        let body = match data.get("id") {
            Some(id) => format!("<h1>Registered #{id}</h1><a href='{}'>Home</a>", self.home_url),
            None => format!(
                "<form method='post' action='{}/1'><input name='name'><button>Send</button></form>",
                self.register_url
            ),
        };
        Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    fn error(&self, data: &Parameters) -> Response {
        let code = data.get("errcode").unwrap_or("500");
        Response::new(StatusCode::Ok).body(format!("Oops, error {code}"))
    }
}

/// Lets a request through only when it carries no `Authorization` header.
#[derive(Default)]
struct Guest;

impl Middleware for Guest {
    fn handle(&self, ctx: &mut Context<'_>) -> bool {
        if ctx.request().headers().contains("authorization") {
            ctx.redirect("web.home", [("from", "guest")]);
            return false;
        }
        true
    }
}

fn build() -> Result<Router, Box<dyn std::error::Error>> {
    let mut router = Router::from_config(RouterConfig::from_json(CONFIG)?)?;

    router
        .controller(
            Controller::new("demo::controllers::Web", Web::new)
                .action("home", Web::home)
                .action("register", Web::register)
                .action("error", Web::error),
        )
        .middleware::<Guest>("guest")
        .middleware::<RequestLogger>("log");

    router.get("/", "Web:home")?.name("web.home");
    router
        .add_route(Method::Get, "/cadastrar", "Web:register", Some("web.register"), &["guest"])?;
    router
        .post("/cadastrar/{id}", "Web:register")?
        .name("web.register.post")
        .middleware("guest");

    router
        .group("/ops", &["log"])
        .get("/{errcode}", "Web:error")?
        .name("web.error");

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signpost=info")),
        )
        .init();

    let router = build()?;
    let server = Server::bind("127.0.0.1:8040").await?;
    server.run(Arc::new(router)).await?;
    Ok(())
}
