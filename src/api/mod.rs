//! HTTP surface: router, shared layers, and server startup.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::blob::MAX_BLOB_BYTES;
use crate::store;

pub mod error;
pub mod handlers;
pub mod notify;
pub mod state;
mod openapi;

pub use openapi::ApiDoc;
pub use state::{AppConfig, AppState};

/// Build the application router. Layers are attached by [`new`].
fn router() -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/v1/tokens", post(handlers::tokens::create))
        .route("/v1/tokens/refresh", post(handlers::tokens::refresh))
        .route(
            "/v1/members",
            post(handlers::members::signup).get(handlers::members::list),
        )
        .route("/v1/me", get(handlers::members::me))
        .route("/v1/me/password", put(handlers::members::change_password))
        .route("/v1/members/:uuid", delete(handlers::members::delete))
        .route(
            "/v1/members/:uuid/activation",
            post(handlers::members::toggle_activation),
        )
        .route(
            "/v1/members/:uuid/privilege",
            post(handlers::members::toggle_privilege),
        )
        .route(
            "/v1/password-resets",
            post(handlers::members::request_reset).put(handlers::members::confirm_reset),
        )
        .route(
            "/v1/boards",
            get(handlers::boards::list).post(handlers::boards::create),
        )
        .route(
            "/v1/boards/:id",
            put(handlers::boards::update).delete(handlers::boards::delete),
        )
        .route(
            "/v1/boards/:id/posts",
            get(handlers::posts::window).post(handlers::posts::create),
        )
        .route(
            "/v1/boards/:id/subscription",
            post(handlers::push::subscribe).delete(handlers::push::unsubscribe),
        )
        .route(
            "/v1/posts/:id",
            get(handlers::posts::get).delete(handlers::posts::delete),
        )
        .route("/v1/posts/:id/comments", post(handlers::comments::create))
        .route("/v1/comments/:id", delete(handlers::comments::delete))
        .route(
            "/v1/push-tokens",
            post(handlers::push::register).delete(handlers::push::deregister),
        )
        .route(
            "/files/:name",
            get(handlers::files::download)
                .post(handlers::files::upload)
                // Uploads are capped; leave room for multipart framing.
                .layer(DefaultBodyLimit::max(MAX_BLOB_BYTES + 16 * 1024)),
        )
}

/// Start the server.
///
/// # Errors
///
/// Returns an error if the database pool, listener, or server fail.
pub async fn new(port: u16, dsn: String, state: AppState) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    store::migrate(&pool)
        .await
        .context("Failed to prepare database schema")?;

    let frontend_origin = frontend_origin(state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let state = Arc::new(state);
    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() -> Result<()> {
        let origin = frontend_origin("https://agora.dev/app/")?;
        assert_eq!(origin, HeaderValue::from_static("https://agora.dev"));

        let origin = frontend_origin("http://localhost:5173")?;
        assert_eq!(origin, HeaderValue::from_static("http://localhost:5173"));
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
