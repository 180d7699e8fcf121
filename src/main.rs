mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use std::{collections::HashSet, env, sync::Arc};

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "affiliate=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let admins: HashSet<i64> = env::var("ADMIN_IDS")
    .unwrap_or_default()
    .split(',')
    .filter(|s| !s.trim().is_empty())
    .map(|id| id.trim().parse().expect("Invalid Admin ID format"))
    .collect();
  if admins.is_empty() {
    warn!("No admins configured, admin endpoints will reject everyone");
  }

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:affiliate.db?mode=rwc".into());
  let service_token = env::var("SERVICE_TOKEN").expect("SERVICE_TOKEN not set");
  let config = Config::from_env();

  info!("Starting Affiliate Server v{}", env!("CARGO_PKG_VERSION"));

  let app_state =
    Arc::new(AppState::new(&db_url, &service_token, admins, config).await);

  plugins::App::new()
    .register(plugins::server::Plugin)
    .register(plugins::cron::LockSweep)
    .register(plugins::cron::SessionGc)
    .run(app_state)
    .await;

  tokio::signal::ctrl_c().await.expect("Failed to listen for shutdown");
  info!("Shutting down");
}
