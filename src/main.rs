mod captcha;
mod error;
mod handlers;
mod report;
mod session;
mod state;
mod store;
mod template;

use anyhow::Context;
use captcha::Turnstile;
use clap::Parser;
use report::{ReportGate, Visitor};
use session::SessionStore;
use state::AppState;
use std::path::PathBuf;
use std::time::Duration;
use store::NoteStore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "diary-server", about = "Note-sharing web app with a report bot")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Base URL the report bot's browser uses to reach this app
    #[arg(long, env = "PUBLIC_URL", default_value = "http://localhost:3000")]
    public_url: Url,

    /// WebDriver endpoint driving the headless browser
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: Url,

    /// Secret flag planted in the bot's cookie jar
    #[arg(long, env = "FLAG")]
    flag: Option<String>,

    /// File to read the flag from when FLAG is unset
    #[arg(long, env = "FLAG_FILE")]
    flag_file: Option<PathBuf>,

    /// Turnstile site key rendered into the shared viewer.
    /// If unset, no CAPTCHA widget is shown.
    #[arg(long, env = "TURNSTILE_SITE_KEY")]
    turnstile_site_key: Option<String>,

    /// Turnstile secret key. If unset, report requests skip CAPTCHA
    /// verification.
    #[arg(long, env = "TURNSTILE_SECRET_KEY")]
    turnstile_secret_key: Option<String>,

    /// Seconds a session must wait between report calls
    #[arg(long, env = "REPORT_COOLDOWN_SECS", default_value = "30")]
    report_cooldown_secs: u64,

    /// Seconds the bot lingers on the shared-note viewer
    #[arg(long, env = "VISIT_DWELL_SECS", default_value = "10")]
    visit_dwell_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present (silently ignored if absent).
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let flag = match (args.flag, &args.flag_file) {
        (Some(flag), _) => flag,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read flag file {}", path.display()))?
            .trim()
            .to_string(),
        (None, None) => anyhow::bail!("FLAG is not set (use --flag or --flag-file)"),
    };

    let captcha = match args.turnstile_secret_key {
        Some(secret) => {
            tracing::info!("Turnstile verification enabled for /report");
            Some(Turnstile::new(secret))
        }
        None => {
            tracing::info!("Turnstile verification disabled (TURNSTILE_SECRET_KEY not set)");
            None
        }
    };

    let visitor = Visitor::new(
        args.webdriver_url,
        args.public_url,
        flag,
        Duration::from_secs(args.visit_dwell_secs),
    );

    let state = AppState {
        store: NoteStore::new(),
        sessions: SessionStore::new(),
        reports: ReportGate::new(Duration::from_secs(args.report_cooldown_secs)),
        captcha,
        turnstile_site_key: args.turnstile_site_key,
        visitor,
    };

    // CatchPanicLayer is outermost so it recovers from panics anywhere in the stack.
    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result { tracing::error!("ctrl-c error: {}", e); }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("Shutting down gracefully");
}
