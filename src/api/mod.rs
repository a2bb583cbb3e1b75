//! HTTP surface
//!
//! - `/health`
//! - `/registration/...` provider registration wizard, `/providers/{name}/`
//! - `/pushed_data/...`, `/users/...` push endpoint (token auth)
//! - `/admin/...` registration review and user management (admin auth)

mod admin;
mod extract;
mod health;
mod push;
mod registration;
mod users;

use crate::config::Config;
use crate::oai::OaiClient;
use crate::registration::Registrar;
use crate::security::{admin_auth_middleware, token_auth_middleware, AdminAuthConfig};
use crate::store::Store;
use crate::validators::{DoiResolves, UrlResolves, ValidOaiUrl};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub registrar: Arc<Registrar>,
    pub doi_resolves: Arc<DoiResolves>,
    /// Window for `was_registered_recently` in views.
    pub recent_days: i64,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<Store>, http: Client) -> Self {
        let oai = OaiClient::new(http.clone(), config.oai_max_set_pages);
        let registrar = Registrar::new(
            store.clone(),
            oai.clone(),
            UrlResolves::new(http.clone()),
            ValidOaiUrl::new(oai),
            config.oai_property_lookback_days,
        );

        Self {
            store,
            registrar: Arc::new(registrar),
            doi_resolves: Arc::new(DoiResolves::new(http, &config.doi_resolver_url)),
            recent_days: config.recent_registration_days,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState, admin: AdminAuthConfig) -> Router {
    let admin_routes = Router::new()
        .route("/registrations", get(admin::list_registrations))
        .route(
            "/registrations/:id",
            get(admin::get_registration).put(admin::update_registration),
        )
        .route("/users", post(admin::create_user))
        .route("/users/:id/token", post(admin::rotate_token))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(admin),
            admin_auth_middleware,
        ));

    let push_routes = Router::new()
        .route(
            "/pushed_data/",
            get(push::list)
                .post(push::create)
                .put(push::bulk_update)
                .patch(push::partial_bulk_update),
        )
        .route(
            "/pushed_data/:id/",
            get(push::detail)
                .put(push::update)
                .patch(push::partial_update)
                .delete(push::destroy),
        )
        .route("/users/", get(users::list))
        .route("/users/:id/", get(users::detail))
        .route_layer(middleware::from_fn_with_state(
            state.store.clone(),
            token_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/registration/",
            get(registration::index).post(registration::contact_info),
        )
        .route(
            "/registration/:reg_id/metadata/",
            post(registration::metadata_questions),
        )
        .route(
            "/registration/:reg_id/provider/",
            post(registration::provider_information),
        )
        .route("/registration/:reg_id/oai/", post(registration::oai_provider))
        .route("/registration/:reg_id/other/", post(registration::other_provider))
        .route("/providers/:name/", get(registration::provider_detail))
        .merge(push_routes)
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    pub const ADMIN_TOKEN: &str = "admin-s3cret";

    pub fn state_with(config: &Config) -> AppState {
        AppState::new(config, Arc::new(Store::memory()), Client::new())
    }

    pub fn app(state: AppState) -> Router {
        router(
            state,
            AdminAuthConfig::new(Some(ADMIN_TOKEN.to_string()), Vec::new()),
        )
    }

    /// Sends one request from a loopback peer and decodes the JSON body (Null when empty).
    pub async fn send(
        app: Router,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|json| json.to_string());
        send_raw(app, method, uri, auth, body.as_deref()).await
    }

    /// Like `send`, with the body passed through untouched.
    pub async fn send_raw(
        app: Router,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let body = match body {
            Some(text) => {
                builder = builder.header("content-type", "application/json");
                Body::from(text.to_string())
            }
            None => Body::empty(),
        };
        let mut req = builder.body(body).unwrap();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));

        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
