mod config;
mod desk;
mod serve;

use std::future::Future;
use std::io::BufRead;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::desk::Desk;

/// HOI approval desk.
#[derive(Parser)]
#[command(name = "hoi", version, about = "HOI approval desk server and admin tools")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "HOI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create the database schema and seed the configured users
    InitDb,

    /// Move overdue submissions to pending
    Promote,

    /// Print an argon2 hash for a `[[users]]` password_hash entry
    HashPassword {
        /// Password to hash; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Serve { port } => with_config(cli.config, |config| async move {
            let port = port.unwrap_or(config.server.port);
            serve::start_server(config, port).await
        }),
        Commands::InitDb => with_config(cli.config, cmd_init_db),
        Commands::Promote => with_config(cli.config, cmd_promote),
        Commands::HashPassword { password } => cmd_hash_password(password),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr; `HOI_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("HOI_LOG_JSON")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration and run one async command to completion.
fn with_config<F, Fut>(path: Option<PathBuf>, command: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Config) -> Fut,
    Fut: Future<Output = Result<(), Box<dyn std::error::Error>>>,
{
    let config = Config::load(path.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(command(config))
}

async fn cmd_init_db(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::from_config(&config)?;
    let seeded = desk.seed_users(&config).await?;
    println!(
        "database ready at {} ({} new of {} configured users)",
        config.store.path.display(),
        seeded,
        config.users.len()
    );
    if config.users.is_empty() {
        eprintln!("warning: no [[users]] configured; nobody can sign in");
    }
    Ok(())
}

async fn cmd_promote(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::from_config(&config)?;
    let moved = desk
        .lifecycle
        .promote_overdue(OffsetDateTime::now_utc())
        .await?;
    println!("promoted {} overdue submission(s) to pending", moved);
    Ok(())
}

fn cmd_hash_password(password: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let password = match password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err("password must not be empty".into());
    }
    println!("{}", hoi_workflow::hash_password(&password)?);
    Ok(())
}
