use clap::{
    Args,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use points_ledger::{
    config::{
        AppConfig,
        resolve_path,
    },
    encrypted::{
        self,
        DatabaseDocument,
        DatabaseUser,
    },
};
use rpassword::prompt_password;
use serde::Deserialize;
use std::{
    fs,
    path::Path,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_FILE_PREFIX: &str = "points-ledger.log";

#[derive(Parser, Debug)]
#[command(version, about = "View and adjust reward points", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the points dashboard
    Run(RunArgs),
    /// Encrypt a plaintext user list into a database file
    Seal(SealArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Spreadsheet script endpoint serving the user list and updates
    #[arg(long, conflicts_with = "database")]
    url: Option<String>,

    /// Sealed database file (read-only)
    #[arg(long)]
    database: Option<String>,

    /// Identity the operator may choose at login; repeat for each
    #[arg(long = "identity")]
    identities: Vec<String>,

    /// Identity to act as when no choice is offered
    #[arg(long)]
    default_identity: Option<String>,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<String>,
}

#[derive(Args, Debug)]
struct SealArgs {
    /// Plaintext JSON: {"users": [{"name": ..., "local_rewards": ..., ...}]}
    #[arg(short, long)]
    input: String,

    /// Where to write the sealed database
    #[arg(short, long)]
    output: String,
}

#[derive(Deserialize)]
struct PlainDatabase {
    users: Vec<DatabaseUser>,
}

fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log dir {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!(e))?;
    Ok(guard)
}

fn seal_database(args: &SealArgs) -> Result<()> {
    let input = resolve_path(&args.input);
    let output = resolve_path(&args.output);
    let raw = fs::read_to_string(&input)
        .wrap_err_with(|| format!("failed to read {}", input.display()))?;
    let plain: PlainDatabase =
        serde_json::from_str(&raw).wrap_err("input is not a valid user list")?;

    let passphrase =
        prompt_password("Database passphrase: ").wrap_err("failed to read passphrase")?;
    let confirm =
        prompt_password("Repeat passphrase: ").wrap_err("failed to read passphrase")?;
    if passphrase != confirm {
        return Err(eyre!("Passphrases do not match"));
    }

    let user_count = plain.users.len();
    let sealed = encrypted::seal(&DatabaseDocument::new(plain.users), &passphrase)?;
    fs::write(&output, sealed)
        .wrap_err_with(|| format!("failed to write {}", output.display()))?;
    println!("Sealed {user_count} users into {}", output.display());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let config = AppConfig::new(
                args.url,
                args.database.as_deref(),
                args.identities,
                args.default_identity,
                args.log_dir.as_deref(),
            )?;
            let _guard = init_tracing(&config.log_dir)?;
            tracing::info!("starting points-ledger client");
            client::run_app(config).await
        }
        Command::Seal(args) => seal_database(&args),
    }
}
