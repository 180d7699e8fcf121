mod auth;
mod handlers;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

/// Route table without the rate limiter, which needs peer addresses and
/// therefore only makes sense on a real listener.
pub fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/summary", get(handlers::summary))
    .route("/api/history", get(handlers::history))
    .route("/api/payout", post(handlers::submit_payout))
    .route("/api/enroll", post(handlers::enroll))
    .route("/api/referral/capture", post(handlers::capture_referral))
    .route("/internal/sessions", post(handlers::create_session))
    .route("/internal/orders/completed", post(handlers::order_completed))
    .route("/internal/orders/reversed", post(handlers::order_reversed))
    .route("/admin/affiliates", get(handlers::admin_affiliates))
    .route("/admin/affiliates/{id}/rules", put(handlers::update_rules))
    .route("/admin/affiliates/{id}/adjust", post(handlers::adjust))
    .route("/admin/affiliates/{id}/active", post(handlers::set_active))
    .route("/admin/affiliates/{id}/reconcile", post(handlers::reconcile))
    .route("/admin/attributions", get(handlers::admin_attributions))
    .route("/admin/payouts", get(handlers::admin_payouts))
    .route("/admin/payouts/{id}/approve", post(handlers::approve_payout))
    .route("/admin/payouts/{id}/paid", post(handlers::mark_payout_paid))
    .route("/admin/payouts/{id}/reject", post(handlers::reject_payout))
    .layer(
      ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
          .allow_origin(Any)
          .allow_methods(Any)
          .allow_headers(Any),
      ),
    )
    .with_state(app)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let service = router(app)
      .layer(GovernorLayer::new(governor_conf))
      .into_make_service_with_connect_info::<SocketAddr>();

    info!("HTTP Server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .context("Failed to bind HTTP listener")?;
    axum::serve(listener, service).await.context("HTTP server exited")?;

    Ok(())
  }
}
