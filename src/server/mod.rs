//! JSON HTTP server
//!
//! Every response is `{ "success": true, "data": ... }` or
//! `{ "success": false, "error": "..." }`. The acting user is named by the
//! `X-Portal-User` header. Mutating routes also require `X-Portal-Csrf: 1`
//! and are rate limited per user.

pub mod error;
pub mod routes;
pub mod state;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use error::ApiError;
pub use state::AppState;

use routes::{CSRF_HEADER, USER_HEADER};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/dashboard", get(routes::dashboard))
        .route(
            "/applications",
            get(routes::list_applications).post(routes::submit_application),
        )
        .route("/applications/{id}", get(routes::show_application))
        .route("/applications/{id}/history", get(routes::history))
        .route("/applications/{id}/withdraw", post(routes::withdraw))
        .route(
            "/applications/{id}/instructor-review",
            post(routes::instructor_review),
        )
        .route("/applications/{id}/supervisor", post(routes::assign_supervisor))
        .route(
            "/applications/{id}/committee",
            get(routes::committee_status).post(routes::assign_committee),
        )
        .route(
            "/applications/{id}/committee/{member}",
            delete(routes::remove_committee_member),
        )
        .route("/applications/{id}/votes", post(routes::cast_vote))
        .route(
            "/applications/{id}/documents",
            get(routes::list_documents).post(routes::generate_document),
        )
        .route("/applications/{id}/send", post(routes::send_to_company))
        .route(
            "/applications/{id}/company-response",
            post(routes::company_response),
        )
        .route(
            "/applications/{id}/visits",
            get(routes::list_visits).post(routes::schedule_visit),
        )
        .route("/applications/{id}/complete", post(routes::complete_application))
        .route("/visits/{id}/complete", post(routes::complete_visit))
        .route("/visits/{id}/cancel", post(routes::cancel_visit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::guard_mutations,
        ));

    let mut app = Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &state.config().server.allowed_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([
                        CONTENT_TYPE,
                        HeaderName::from_static(USER_HEADER),
                        HeaderName::from_static(CSRF_HEADER),
                    ])
                    .max_age(Duration::from_secs(60 * 60));
                app = app.layer(cors);
            }
            Err(_) => warn!(origin = %origin, "ignoring invalid allowed_origin"),
        }
    }

    app.with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(
        address = %listener.local_addr()?,
        project = %state.project().root().display(),
        "portal server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("portal server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
