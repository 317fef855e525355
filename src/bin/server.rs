use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use cut_planner::config::SolverConfig;
use cut_planner::sheet::Sheet;
use cut_planner::solver::Solver;
use cut_planner::types::{Action, ItemRecord};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct ActionRequest {
    products: Vec<ItemRecord>,
    stocks: Vec<Sheet>,
    #[serde(default)]
    config: SolverConfig,
    /// Seed for random placement; fresh entropy when absent.
    #[serde(default)]
    seed: Option<u64>,
}

async fn action(Json(req): Json<ActionRequest>) -> Result<Json<Action>, (StatusCode, String)> {
    tracing::info!(
        products = req.products.len(),
        stocks = req.stocks.len(),
        config = serde_json::to_string(&req.config).unwrap_or_default(),
        "POST /action"
    );

    let decision = tokio::task::spawn_blocking(move || {
        let mut rng = match req.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Solver::new(req.config).decide(&req.products, &req.stocks, &mut rng)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match decision {
        Ok(action) => Ok(Json(action)),
        Err(e) if e.is_input_error() => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "decision failed");
            sentry::capture_error(&e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[tokio::main]
async fn main() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/action", post(action))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
