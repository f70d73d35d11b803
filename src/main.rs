use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use word_tutor::config::AppConfig;
use word_tutor::db::{self, LogOnError};
use word_tutor::state::AppState;
use word_tutor::{auth, routes};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "word_tutor=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::load();
  let pool = db::init_db(&config.database_path).expect("Failed to initialize database");

  {
    let conn = pool.lock().expect("Database lock failed during startup");
    db::seed::seed_content(&conn).expect("Failed to seed content");
    auth::bootstrap_admin(&conn, &config).log_warn("Could not create initial admin");
    auth::db::cleanup_expired_sessions(&conn).log_warn("Failed to clean up expired sessions");
    db::quota::prune_old_days(&conn, chrono::Utc::now()).log_warn("Failed to prune quota history");
  }

  let bind_addr = config.bind_addr();
  let app = routes::router(AppState::new(pool, config));

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://{}", bind_addr);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
