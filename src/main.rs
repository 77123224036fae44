use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use dish_scout::{api, AppState};

/// `--port 8080` or `--port=8080`.
fn port_from_args(args: &[String]) -> Option<u16> {
    args.iter().enumerate().find_map(|(i, arg)| match arg.strip_prefix("--port=") {
        Some(value) => value.parse().ok(),
        None if arg == "--port" => args.get(i + 1)?.parse().ok(),
        None => None,
    })
}

fn port_from_env() -> Option<u16> {
    ["DISH_SCOUT_PORT", "PORT"]
        .iter()
        .find_map(|key| env::var(key).ok()?.trim().parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,tower_http=warn,chromiumoxide=warn")
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting dish-scout");

    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(connect_timeout))
        .build()?;

    // The browser is launched by the first capture, not here.
    let state = Arc::new(AppState::new(http_client));
    let app = api::build_router(state.clone());

    let args: Vec<String> = env::args().collect();
    let port = port_from_args(&args).or_else(port_from_env).unwrap_or(5000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/DISH_SCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("dish-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

/// Ctrl-C or SIGTERM, then close the browser before axum drains.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                futures::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing browser");
    state.shutdown().await;
}
