use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::JwtSecret;
use crate::messages::routes as message_routes;
use crate::realtime::handler as ws_handler;
use crate::state::AppState;
use crate::users::routes as user_routes;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on the send path: 1 token every 2 seconds, burst of 10
    // per IP. Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2)
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let send_routes = Router::new()
        .route(
            "/api/messages/send",
            axum::routing::post(message_routes::send_message),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Note: /api/messages/conversations must stay a distinct static route so
    // it is not swallowed by the /api/messages/{id} capture.
    let message_group = Router::new()
        .route(
            "/api/messages/conversations",
            axum::routing::get(message_routes::list_conversations),
        )
        .route(
            "/api/messages/read/{message_id}",
            axum::routing::put(message_routes::mark_message_read),
        )
        // GET {id} reads a conversation by counterpart user id; DELETE {id}
        // removes a single message by message id. Same path shape, so they
        // must share one route registration.
        .route(
            "/api/messages/{id}",
            axum::routing::get(message_routes::get_conversation)
                .delete(message_routes::delete_message),
        );

    let user_group = Router::new()
        .route("/api/users", axum::routing::get(user_routes::list_users))
        .route(
            "/api/users/{user_id}",
            axum::routing::get(user_routes::get_user),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(send_routes)
        .merge(message_group)
        .merge(user_group)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
