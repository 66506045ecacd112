use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use docvault::{ServiceConfig, create_app_state, create_router};

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "Document store with session-token authentication")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true, env = "DOCVAULT_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Server {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Overrides the configured database url
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Initialize the database schema
    Init {
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Register a user with the configured admin token
    Register {
        #[arg(long)]
        login: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        db_url: Option<String>,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("docvault=info".parse()?);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>, db_url: Option<String>) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(path.as_deref())?;
    if let Some(url) = db_url {
        config.database.url = url;
    }
    Ok(config)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        Commands::Server { port, bind, db_url } => {
            let config = load_config(cli.config, db_url)?;
            config.validate()?;
            info!("Using database url: {}", config.database.url);
            if config.database.is_in_memory() {
                warn!("In-memory database: users and documents are lost on shutdown");
            }

            let state = create_app_state(&config).await?;

            if let Some(secs) = config.session_sweep_seconds.filter(|s| *s > 0) {
                let auth = state.auth.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
                    loop {
                        ticker.tick().await;
                        match auth.purge_expired_sessions().await {
                            Ok(0) => {}
                            Ok(n) => info!("Purged {} expired sessions", n),
                            Err(e) => error!("Session sweep failed: {}", e),
                        }
                    }
                });
                info!("Session sweep every {}s", secs);
            }

            let app = create_router(state);
            let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
            info!("Server listening on http://{}:{}", bind, port);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            info!("Server stopped");
        }
        Commands::Init { db_url } => {
            let config = load_config(cli.config, db_url)?;
            config.database.require_persistent("init")?;
            info!("Using database url for initialization: {}", config.database.url);

            info!("Initializing database...");
            let db = docvault::create_connection(config.database.clone()).await?;
            docvault::ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::Register {
            login,
            password,
            db_url,
        } => {
            let config = load_config(cli.config, db_url)?;
            config.validate()?;
            config.database.require_persistent("register")?;

            let state = create_app_state(&config).await?;
            let login = state
                .auth
                .register(&config.admin_token, &login, &password)
                .await?;
            println!("Registered user '{}'", login);
        }
    }

    Ok(())
}
