use crate::{prelude::*, sv};

pub struct Config {
  /// How long an attribution stays `open` before the lock sweep may
  /// promote it; mirrors the returns collaborator's return window.
  pub return_window: Duration,
  pub sweep_interval: Duration,
  pub session_ttl: Duration,
  pub port: u16,
}

impl Config {
  pub fn from_env() -> Self {
    Self {
      return_window: env_duration("RETURN_WINDOW", "14d"),
      sweep_interval: env_duration("LOCK_SWEEP_INTERVAL", "1h"),
      session_ttl: env_duration("SESSION_TTL", "24h"),
      port: std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000),
    }
  }
}

fn env_duration(key: &str, default: &str) -> Duration {
  let raw = std::env::var(key).unwrap_or_else(|_| default.into());
  humantime::parse_duration(&raw)
    .unwrap_or_else(|err| panic!("Invalid {key}: {err}"))
}

pub struct Session {
  pub user_id: i64,
  pub expires_at: DateTime,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub admins: HashSet<i64>,
  pub service_token: String,
  pub config: Config,
  /// Session tokens minted for the identity collaborator; GC'd on an
  /// interval by the cron plugin.
  pub sessions: DashMap<String, Session>,
}

impl AppState {
  pub async fn new(
    db_url: &str,
    service_token: &str,
    admins: HashSet<i64>,
    config: Config,
  ) -> Self {
    let db = Database::connect(db_url)
      .await
      .expect("Failed to connect to database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");

    Self::with_db(db, service_token, admins, config)
  }

  pub fn with_db(
    db: DatabaseConnection,
    service_token: &str,
    admins: HashSet<i64>,
    config: Config,
  ) -> Self {
    Self {
      db,
      admins,
      service_token: service_token.into(),
      config,
      sessions: DashMap::new(),
    }
  }

  pub fn sv(&self) -> Sv<'_> {
    Sv {
      user: sv::User::new(&self.db),
      affiliate: sv::Affiliate::new(&self.db),
      attribution: sv::Attribution::new(&self.db),
      payout: sv::Payout::new(&self.db),
    }
  }

  pub fn issue_session(&self, user_id: i64) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let ttl = TimeDelta::from_std(self.config.session_ttl)
      .unwrap_or_else(|_| TimeDelta::hours(24));
    let session =
      Session { user_id, expires_at: Utc::now().naive_utc() + ttl };
    self.sessions.insert(token.clone(), session);
    token
  }

  pub fn authenticate(&self, token: &str) -> Option<i64> {
    let session = self.sessions.get(token)?;
    (session.expires_at > Utc::now().naive_utc()).then_some(session.user_id)
  }

  pub fn is_admin(&self, user_id: i64) -> bool {
    self.admins.contains(&user_id)
  }

  pub fn gc_sessions(&self) {
    let now = Utc::now().naive_utc();
    self.sessions.retain(|_, session| session.expires_at > now);
  }
}

/// Per-request service bundle borrowing the shared connection.
pub struct Sv<'a> {
  pub user: sv::User<'a>,
  pub affiliate: sv::Affiliate<'a>,
  pub attribution: sv::Attribution<'a>,
  pub payout: sv::Payout<'a>,
}
