use std::sync::Arc;

use async_trait::async_trait;

use crate::{plugins::Plugin, prelude::*, state::AppState};

/// Promotes `open` attributions past the return window to `locked`. The
/// cutoff trails `now` by the configured window, so commission only
/// becomes payable once the returns collaborator can no longer claw the
/// order back.
pub struct LockSweep;

#[async_trait]
impl Plugin for LockSweep {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let window = TimeDelta::from_std(app.config.return_window)
      .unwrap_or_else(|_| TimeDelta::days(14));

    info!(
      "lock sweep started (interval {:?}, window {:?})",
      app.config.sweep_interval, app.config.return_window
    );

    let mut interval = tokio::time::interval(app.config.sweep_interval);
    loop {
      interval.tick().await;

      let cutoff = Utc::now().naive_utc() - window;
      if let Err(err) = app.sv().attribution.lock_due(cutoff).await {
        error!("lock sweep failed: {err}");
      }
    }
  }
}

pub struct SessionGc;

#[async_trait]
impl Plugin for SessionGc {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
      interval.tick().await;
      app.gc_sessions();
    }
  }
}
