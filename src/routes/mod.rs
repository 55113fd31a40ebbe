use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod discussions;
pub mod events;
pub mod health;
pub mod quotes;
pub mod slots;
pub mod users;

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session));

    let discussion_routes = Router::new()
        .route("/", get(discussions::list_discussions))
        .route("/unread", get(discussions::unread_total))
        .route("/messages", post(discussions::ingest_message))
        .route(
            "/:key",
            get(discussions::get_discussion).delete(discussions::delete_discussion),
        )
        .route("/:key/messages", get(discussions::list_messages))
        .route(
            "/:key/handoff",
            get(discussions::get_handoff).put(discussions::set_handoff),
        )
        .route("/:key/reply", post(discussions::reply))
        .route("/:key/read", post(discussions::mark_read));

    let quote_routes = Router::new()
        .route("/", get(quotes::list_quotes).post(quotes::create_quote))
        .route(
            "/:id",
            get(quotes::get_quote)
                .patch(quotes::update_quote)
                .delete(quotes::delete_quote),
        )
        .route("/:id/status", put(quotes::set_quote_status));

    let slot_routes = Router::new()
        .route("/", get(slots::list_slots).post(slots::create_slot))
        .route(
            "/:id",
            get(slots::get_slot)
                .put(slots::reschedule_slot)
                .delete(slots::delete_slot),
        );

    let appointment_routes = Router::new()
        .route(
            "/",
            get(appointments::list_appointments).post(appointments::book_appointment),
        )
        .route(
            "/:id",
            get(appointments::get_appointment)
                .patch(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route("/:id/cancel", post(appointments::cancel_appointment));

    let user_routes = Router::new()
        .route("/", post(users::create_agent))
        .route("/me", patch(users::update_me));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/discussions", discussion_routes)
        .nest("/api/quotes", quote_routes)
        .nest("/api/slots", slot_routes)
        .nest("/api/appointments", appointment_routes)
        .nest("/api/users", user_routes)
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route("/api/events/:table", get(events::stream_table))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
