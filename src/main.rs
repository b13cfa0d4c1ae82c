use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use recipebook::cache::{RecipeCache, refresh, rewrite_after_load};
use recipebook::config::{Cli, Config, default_config_dir, default_config_path};
use recipebook::db::{Database, RecipeStore};
use recipebook::handler::AppState;
use recipebook::limiter::SlowDown;
use recipebook::routes::routes;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // With --config the database lives next to the config file,
    // otherwise both live in ~/.recipebook/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("recipebook.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let store: Arc<dyn RecipeStore> = Arc::new(Database::new(&cfg.store, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));
    let cache = Arc::new(RecipeCache::new());
    let limiter = Arc::new(SlowDown::new(&cfg.rate_limit));

    refresh(&cache, store.as_ref()).await;
    if args.rewrite_stored {
        rewrite_after_load(&cache, store.as_ref()).await;
    }

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();
    let mut background = tokio::task::JoinSet::new();

    // Reload the whole cache from the store on a fixed interval
    let reload_cache = cache.clone();
    let reload_store = store.clone();
    let reload_token = cancellation_token.clone();
    let reload_every = Duration::from_secs(cfg.app.reload_interval_seconds);
    background.spawn(async move {
        let mut interval = tokio::time::interval(reload_every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    refresh(&reload_cache, reload_store.as_ref()).await;
                }
                _ = reload_token.cancelled() => {
                    tracing::info!("cache reload task shutting down");
                    break;
                }
            }
        }
    });

    // Forget clients whose slow-down window has expired
    let cleanup_limiter = limiter.clone();
    let cleanup_token = cancellation_token.clone();
    let cleanup_every = Duration::from_secs(cfg.rate_limit.window_seconds.max(1));
    background.spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        loop {
            tokio::select! {
                _ = interval.tick() => cleanup_limiter.cleanup().await,
                _ = cleanup_token.cancelled() => break,
            }
        }
    });

    let app = routes(AppState {
        cache,
        store,
        limiter,
        password: Arc::from(cfg.app.get_password()),
        unauthorized_delay: Duration::from_millis(cfg.app.unauthorized_delay_ms),
    });

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("recipebook.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            cancellation_token.cancel();
        }
    }

    while background.join_next().await.is_some() {}
    tracing::info!("recipebook.svc going off, graceful shutdown complete");
}
