use crate::api::handlers::{health, root};
use crate::desk::Desk;
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::{get, options},
};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

const DEFAULT_BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Deployment environment. Only `development` echoes internal error detail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn exposes_errors(self) -> bool {
        matches!(self, Self::Development)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("Unknown environment: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApiSettings {
    frontend_base_url: String,
    environment: Environment,
    body_limit: usize,
}

impl ApiSettings {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            environment: Environment::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Upper bound for any request body, multipart uploads included.
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Wire the documented routes, the undocumented extras and the shared layers.
/// # Errors
/// Return error if the frontend base URL is not a valid origin
pub fn app(desk: Arc<Desk>, settings: &ApiSettings) -> Result<Router> {
    let frontend_origin = frontend_origin(settings.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    // `/`, preflight-only `OPTIONS /health` and the `/api/health` alias stay out
    // of the OpenAPI document.
    let (router, _openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .route("/api/health", get(health::health).options(health::health))
        .layer(DefaultBodyLimit::max(settings.body_limit()))
        .layer(
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
                .layer(Extension(settings.environment()))
                .layer(Extension(desk)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, desk: Arc<Desk>, settings: ApiSettings) -> Result<()> {
    let app = app(desk, &settings)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!(
        environment = %settings.environment(),
        "Listening on [::]:{}", port
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
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
    use crate::desk::test_support::fixture;
    use axum::http::{StatusCode, header::ACCESS_CONTROL_ALLOW_ORIGIN};
    use tower::ServiceExt;

    fn test_app() -> Result<Router> {
        let fx = fixture();
        app(
            Arc::new(fx.desk),
            &ApiSettings::new("http://localhost:5173/admin".to_string()),
        )
    }

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://tickets.example.com:8443/register?x=1")?;
        assert_eq!(origin, "https://tickets.example.com:8443");
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("development".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
        assert!(Environment::Development.exposes_errors());
        assert!(!Environment::Production.exposes_errors());
    }

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() -> Result<()> {
        let response = test_app()?
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(Ulid::from_string(request_id).is_ok());

        let response = test_app()?
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "abc")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response.headers().get("x-request-id"),
            Some(&HeaderValue::from_static("abc"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn cors_allows_only_frontend_origin() -> Result<()> {
        for origin in ["http://localhost:5173", "https://evil.example"] {
            let response = test_app()?
                .oneshot(
                    Request::builder()
                        .uri("/api/event-details")
                        .header("origin", origin)
                        .body(Body::empty())?,
                )
                .await?;
            // The allowed origin is fixed, whoever asks.
            assert_eq!(
                response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN),
                Some(&HeaderValue::from_static("http://localhost:5173"))
            );
            assert_ne!(
                response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN),
                Some(&HeaderValue::from_static("https://evil.example"))
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn health_is_served_under_api_prefix() -> Result<()> {
        let response = test_app()?
            .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-app"));
        Ok(())
    }
}
