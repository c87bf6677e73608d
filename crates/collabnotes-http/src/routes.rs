//! Router assembly, mirroring the teacher's `routes::init(state)`
//! pattern: one function building the full `Router<App>`, CORS/
//! body-limit/rate-limit/request-id layered on from the outside in.

use axum::routing::{delete, get, patch, post, put};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use collabnotes_core::{rate_limit_middleware, request_id_middleware, App};

use crate::{handlers, websocket};

pub fn init(app: App) -> Router {
	let cors = build_cors_layer(&app);
	let body_limit = app.config.http_body_limit_bytes;
	let rate_limiter = app.rate_limiter.clone();

	Router::new()
		.route("/health", get(handlers::health))
		.route("/notes/share", post(handlers::share_note))
		.route("/notes", get(handlers::list_notes))
		.route("/notes/{id}", get(handlers::get_note))
		.route("/notes/{id}", put(handlers::put_note))
		.route("/notes/{id}", patch(handlers::patch_note))
		.route("/notes/{id}", delete(handlers::delete_note))
		.route("/ws/{id}", get(websocket::upgrade))
		.layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
		.layer(middleware::from_fn(request_id_middleware))
		.layer(RequestBodyLimitLayer::new(body_limit))
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

fn build_cors_layer(app: &App) -> CorsLayer {
	if app.config.cors_allowed_origins.is_empty() {
		return CorsLayer::new();
	}
	let origins: Vec<_> = app
		.config
		.cors_allowed_origins
		.iter()
		.filter_map(|origin| origin.parse().ok())
		.collect();
	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods(tower_http::cors::Any)
		.allow_headers(tower_http::cors::Any)
}

// vim: ts=4
