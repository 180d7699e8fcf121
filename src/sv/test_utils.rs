//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use migration::{Migrator, MigratorTrait};
  use sea_orm::{Database, DatabaseConnection};

  /// In-memory SQLite with the real migrations applied, so tests hit the
  /// same unique indexes the idempotency design depends on.
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }
}
