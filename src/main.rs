use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kubebill::auth::TokenGenerator;
use kubebill::billing::BillingFactory;
use kubebill::config::ServerConfig;
use kubebill::server::{AppState, create_router};
use kubebill::store::{SqliteStore, Store};
use kubebill::types::User;

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'kubebill admin init' first to create the database and admin token.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "kubebill")]
#[command(about = "Billing API for a container hosting panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Database schema revisions
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// TOML file with server and billing provider settings
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Apply revisions up to the target (default: newest)
    Upgrade {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        revision: Option<String>,
    },

    /// Revert revisions down to, but excluding, the target (default: all)
    Downgrade {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        revision: Option<String>,
    },

    /// Print the revision the database is at
    Current {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// List known revisions, oldest first
    History,
}

fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let db_path = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    }
    .db_path();
    Ok(SqliteStore::new(db_path)?)
}

fn run_init(data_dir: &Path, non_interactive: bool) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    store.initialize()?;

    let token_file = data_dir.join(".admin_token");

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = generator.issue_admin()?;

    store.create_token(&token)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_default_user_prompt(&store, &generator)?;
    }

    Ok(())
}

fn create_default_user_prompt(store: &SqliteStore, generator: &TokenGenerator) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create a default user?")
        .with_default(false)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.clone(),
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user)?;

    let (user_token, raw_token) = generator.issue_for_user(&user, None)?;
    store.create_token(&user_token)?;

    println!();
    println!("========================================");
    println!("Created user '{username}' with token:");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}

fn run_db(command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Upgrade { data_dir, revision } => {
            let store = open_store(&data_dir)?;
            let applied = store.upgrade(revision.as_deref())?;
            if applied.is_empty() {
                println!("Already at the requested revision");
            }
            for rev in applied {
                println!("Upgraded to {rev}");
            }
        }
        DbCommands::Downgrade { data_dir, revision } => {
            let store = open_store(&data_dir)?;
            let reverted = store.downgrade(revision.as_deref())?;
            if reverted.is_empty() {
                println!("Nothing to revert");
            }
            for rev in reverted {
                println!("Reverted {rev}");
            }
        }
        DbCommands::Current { data_dir } => {
            let store = open_store(&data_dir)?;
            let head = store.migrator().head();
            match store.current_revision()? {
                Some(rev) if Some(rev.as_str()) == head => println!("{rev} (head)"),
                Some(rev) => println!("{rev}"),
                None => println!("<base>"),
            }
        }
        DbCommands::History => {
            let migrator = kubebill::store::Migrator::default();
            for (rev, down, description) in migrator.history() {
                println!("{} -> {rev}, {description}", down.unwrap_or("<base>"));
            }
        }
    }
    Ok(())
}

async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match &config_path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    let token_file = config.data_dir.join(".admin_token");
    if !token_file.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(config.db_path())?;
    if !store.has_admin_token()? {
        bail!(NOT_INITIALIZED);
    }

    let current = store.current_revision()?;
    if current.as_deref() != store.migrator().head() {
        bail!(
            "Database is at revision {}. Run 'kubebill db upgrade' first.",
            current.as_deref().unwrap_or("<base>")
        );
    }

    info!("Admin token available at {}", token_file.display());

    let billing = BillingFactory::from_config(&config.billing)?;
    info!("Billing providers available: {:?}", billing.names());

    let state = Arc::new(AppState::new(Arc::new(store), billing));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kubebill=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => run_init(&data_dir, non_interactive)?,
        },
        Commands::Db { command } => run_db(command)?,
        Commands::Serve {
            host,
            port,
            data_dir,
            config,
        } => run_serve(host, port, data_dir, config).await?,
    }

    Ok(())
}
