// gov-cli/src/main.rs
// ============================================================================
// Module: Governance CLI Entry Point
// Description: Command dispatcher for the `governd` binary: serve the HTTP
//              surface, or run admin-only product/capability/backup
//              operations directly against the embedded store (§3 "Products
//              and capabilities are admin-only via the engine or CLI").
// Purpose: Generalize the teacher's `decision-gate-cli::main` dispatcher
//          (serve + offline-tooling subcommands) into this system's serve +
//          admin-tooling subcommands.
// Dependencies: clap, gov-broker, gov-core, gov-http, gov-store-sqlite,
//               flate2, tar, tokio
// ============================================================================

//! ## Overview
//! `governd serve` bootstraps and runs the HTTP surface until terminated.
//! `governd product upsert` and `governd capability grant|revoke` write
//! directly through [`gov_store_sqlite::SqliteStore`], bypassing HTTP auth,
//! matching the spec's "admin-only via the engine or CLI" carve-out.
//! `governd backup` archives the store directory into a single
//! UTC-timestamped `.tar.gz` file (§6 "Persisted state layout").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use flate2::Compression;
use flate2::write::GzEncoder;
use gov_core::model::AccessLevel;
use gov_core::model::Capability;
use gov_core::model::GroupRegistry;
use gov_core::model::ProductStatus;
use gov_core::model::RiskLevel;
use gov_core::time::now_iso8601_ms;
use gov_http::config::ConfigError;
use gov_http::config::HttpConfig;
use gov_store_sqlite::SqliteStore;
use gov_store_sqlite::SqliteStoreConfig;
use gov_store_sqlite::SqliteStoreError;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition for the `governd` binary.
#[derive(Parser, Debug)]
#[command(name = "governd", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported `governd` subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the governance HTTP server.
    Serve(ServeArgs),
    /// Product administration.
    Product {
        /// Selected product subcommand.
        #[command(subcommand)]
        command: ProductCommand,
    },
    /// Capability administration.
    Capability {
        /// Selected capability subcommand.
        #[command(subcommand)]
        command: CapabilityCommand,
    },
    /// Archive the store directory into a timestamped tarball.
    Backup(BackupArgs),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeArgs {
    /// Overrides `GOV_HTTP_ADDR` for this run.
    #[arg(long, value_name = "HOST:PORT")]
    bind: Option<String>,
    /// Overrides `GOV_STORE_DIR` for this run.
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

/// Product administration subcommands.
#[derive(Subcommand, Debug)]
enum ProductCommand {
    /// Create or update a product (preserves `created_at` on update).
    Upsert(ProductUpsertArgs),
}

/// Arguments for `product upsert`.
#[derive(Args, Debug)]
struct ProductUpsertArgs {
    /// Product slug.
    #[arg(long)]
    id: String,
    /// Display name.
    #[arg(long)]
    name: String,
    /// Lifecycle status.
    #[arg(long, value_parser = parse_product_status, default_value = "active")]
    status: ProductStatus,
    /// Risk classification.
    #[arg(long, value_parser = parse_risk_level, default_value = "normal")]
    risk_level: RiskLevel,
    /// Path to the store directory (defaults to `GOV_STORE_DIR` or
    /// `./gov-data`).
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

/// Capability administration subcommands.
#[derive(Subcommand, Debug)]
enum CapabilityCommand {
    /// Grant (or re-grant/reactivate) a capability.
    Grant(CapabilityGrantArgs),
    /// Revoke an active capability.
    Revoke(CapabilityRevokeArgs),
}

/// Arguments for `capability grant`.
#[derive(Args, Debug)]
struct CapabilityGrantArgs {
    /// Group the capability is granted to.
    #[arg(long)]
    group: String,
    /// External provider identifier.
    #[arg(long)]
    provider: String,
    /// Numeric access level (0-3).
    #[arg(long, value_parser = parse_access_level)]
    access_level: AccessLevel,
    /// Actions this grant permits; empty means "all not denied".
    #[arg(long = "allow", value_delimiter = ',')]
    allowed_actions: Vec<String>,
    /// Actions this grant always denies, regardless of `--allow`.
    #[arg(long = "deny", value_delimiter = ',')]
    denied_actions: Vec<String>,
    /// Group or identity granting the capability.
    #[arg(long)]
    granted_by: String,
    /// Expiry timestamp (UTC ISO-8601 ms); required for L2/L3 (§3, ≤ 7
    /// days from grant time).
    #[arg(long, value_name = "ISO8601")]
    expires_at: Option<String>,
    /// Path to the store directory.
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

/// Arguments for `capability revoke`.
#[derive(Args, Debug)]
struct CapabilityRevokeArgs {
    /// Group the capability was granted to.
    #[arg(long)]
    group: String,
    /// External provider identifier.
    #[arg(long)]
    provider: String,
    /// Path to the store directory.
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

/// Arguments for the `backup` command.
#[derive(Args, Debug)]
struct BackupArgs {
    /// Store directory to archive (defaults to `GOV_STORE_DIR` or
    /// `./gov-data`).
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
    /// Directory the tarball is written into.
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,
}

// ============================================================================
// SECTION: CLI Error
// ============================================================================

/// Top-level `governd` error.
#[derive(Debug, Error)]
enum CliError {
    /// HTTP configuration could not be loaded from the environment.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// The HTTP server failed to start or serve.
    #[error("serve: {0}")]
    Serve(#[from] gov_http::server::ServeError),
    /// The embedded store could not be opened.
    #[error("store: {0}")]
    Store(#[from] SqliteStoreError),
    /// A filesystem operation failed.
    #[error("io: {0}")]
    Io(String),
}

/// Result alias for fallible `governd` operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning a process exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "governd: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the parsed CLI command.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Product { command: ProductCommand::Upsert(args) } => command_product_upsert(&args),
        Commands::Capability { command } => command_capability(command),
        Commands::Backup(args) => command_backup(&args),
    }
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Executes `governd serve`.
///
/// # Errors
///
/// Returns [`CliError::Config`] if `--bind` fails to parse or a required
/// environment variable is missing, or [`CliError::Serve`] if the server
/// fails to bind or run.
async fn command_serve(args: ServeArgs) -> CliResult<()> {
    let mut config = HttpConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.http_addr =
            bind.parse().map_err(|_err| ConfigError::InvalidValue { var: "--bind", value: bind })?;
    }
    if let Some(store_dir) = args.store_dir {
        config.store_dir = store_dir;
    }

    if config.secret_below_minimum_length {
        write_stderr_line(&format!(
            "governd: warning: OS_HTTP_SECRET is shorter than {} characters",
            gov_http::config::MIN_SECRET_LEN
        ));
    }
    gov_http::server::serve(config).await?;
    Ok(())
}

// ============================================================================
// SECTION: Product Administration
// ============================================================================

/// Executes `governd product upsert`.
///
/// # Errors
///
/// Returns [`CliError::Store`] if the embedded store cannot be opened or
/// written.
fn command_product_upsert(args: &ProductUpsertArgs) -> CliResult<()> {
    let store = open_store(args.store_dir.as_deref())?;
    let now = now_iso8601_ms();
    let product = store.upsert_product(&args.id, &args.name, args.status, args.risk_level, &now)?;
    write_stdout_line(&format!(
        "ok product={} status={} risk_level={}",
        product.id,
        product_status_text(product.status),
        risk_level_text(product.risk_level)
    ));
    Ok(())
}

// ============================================================================
// SECTION: Capability Administration
// ============================================================================

/// Dispatches capability subcommands.
///
/// # Errors
///
/// Returns [`CliError::Store`] if the embedded store cannot be opened or
/// written.
fn command_capability(command: CapabilityCommand) -> CliResult<()> {
    match command {
        CapabilityCommand::Grant(args) => command_capability_grant(&args),
        CapabilityCommand::Revoke(args) => command_capability_revoke(&args),
    }
}

/// Executes `governd capability grant`.
fn command_capability_grant(args: &CapabilityGrantArgs) -> CliResult<()> {
    let registry = GroupRegistry::default_groups();
    if !registry.contains(&args.group) {
        write_stderr_line(&format!("governd: warning: {} is not a known built-in group", args.group));
    }

    let store = open_store(args.store_dir.as_deref())?;
    let now = now_iso8601_ms();
    let capability = Capability {
        group_folder: args.group.clone(),
        provider: args.provider.clone(),
        access_level: args.access_level,
        allowed_actions: args.allowed_actions.clone(),
        denied_actions: args.denied_actions.clone(),
        granted_by: args.granted_by.clone(),
        granted_at: now,
        expires_at: args.expires_at.clone(),
        active: true,
    };

    if !gov_broker::capability::expiry_within_seven_days(&capability) {
        write_stderr_line("governd: warning: L2/L3 capability expires_at should be within 7 days of grant time");
    }

    store.grant_capability(&capability)?;
    write_stdout_line(&format!(
        "ok capability group={} provider={} access_level={}",
        capability.group_folder,
        capability.provider,
        capability.access_level.as_u8()
    ));
    Ok(())
}

/// Executes `governd capability revoke`.
fn command_capability_revoke(args: &CapabilityRevokeArgs) -> CliResult<()> {
    let store = open_store(args.store_dir.as_deref())?;
    store.revoke_capability(&args.group, &args.provider)?;
    write_stdout_line(&format!("ok revoked group={} provider={}", args.group, args.provider));
    Ok(())
}

// ============================================================================
// SECTION: Backup
// ============================================================================

/// Executes `governd backup`: archives the store directory into a single
/// gzip-compressed tarball named `gov-backup-<UTC-timestamp>.tar.gz`.
///
/// # Errors
///
/// Returns [`CliError::Io`] if the store directory does not exist or the
/// archive cannot be written.
fn command_backup(args: &BackupArgs) -> CliResult<()> {
    let store_dir = resolve_store_dir(args.store_dir.as_deref());
    if !store_dir.is_dir() {
        return Err(CliError::Io(format!("store directory {} does not exist", store_dir.display())));
    }

    let stamp = now_iso8601_ms().replace([':', '.'], "-");
    let archive_name = format!("gov-backup-{stamp}.tar.gz");
    let archive_path = args.output_dir.join(&archive_name);

    fs::create_dir_all(&args.output_dir).map_err(|err| CliError::Io(err.to_string()))?;
    let file = fs::File::create(&archive_path).map_err(|err| CliError::Io(err.to_string()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", &store_dir).map_err(|err| CliError::Io(err.to_string()))?;
    let encoder = builder.into_inner().map_err(|err| CliError::Io(err.to_string()))?;
    encoder.finish().map_err(|err| CliError::Io(err.to_string()))?;

    write_stdout_line(&format!("ok backup={}", archive_path.display()));
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the embedded store at `override_dir`, `GOV_STORE_DIR`, or the
/// default store directory.
///
/// # Errors
///
/// Returns [`CliError::Io`] if the store directory cannot be created, or
/// [`CliError::Store`] if the database cannot be opened.
fn open_store(override_dir: Option<&Path>) -> CliResult<SqliteStore> {
    let store_dir = resolve_store_dir(override_dir);
    fs::create_dir_all(&store_dir).map_err(|err| CliError::Io(err.to_string()))?;
    let config = SqliteStoreConfig::new(store_dir.join("governance.sqlite3"));
    Ok(SqliteStore::open(&config)?)
}

/// Resolves the store directory from an explicit override, `GOV_STORE_DIR`,
/// or the default (`./gov-data`).
fn resolve_store_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    std::env::var("GOV_STORE_DIR").map_or_else(|_| PathBuf::from("./gov-data"), PathBuf::from)
}

/// Parses a product status from its lowercase name.
fn parse_product_status(raw: &str) -> Result<ProductStatus, String> {
    match raw {
        "active" => Ok(ProductStatus::Active),
        "paused" => Ok(ProductStatus::Paused),
        "killed" => Ok(ProductStatus::Killed),
        other => Err(format!("invalid product status: {other} (expected active|paused|killed)")),
    }
}

/// Parses a risk level from its lowercase name.
fn parse_risk_level(raw: &str) -> Result<RiskLevel, String> {
    match raw {
        "low" => Ok(RiskLevel::Low),
        "normal" => Ok(RiskLevel::Normal),
        "high" => Ok(RiskLevel::High),
        other => Err(format!("invalid risk level: {other} (expected low|normal|high)")),
    }
}

/// Parses a numeric access level (0-3).
fn parse_access_level(raw: &str) -> Result<AccessLevel, String> {
    let value: u8 = raw.parse().map_err(|_err| format!("invalid access level: {raw} (expected 0-3)"))?;
    AccessLevel::from_u8(value).ok_or_else(|| format!("invalid access level: {raw} (expected 0-3)"))
}

/// Lowercase text for a [`ProductStatus`], used for CLI output without
/// reaching for `{:?}` debug formatting.
fn product_status_text(status: ProductStatus) -> &'static str {
    match status {
        ProductStatus::Active => "active",
        ProductStatus::Paused => "paused",
        ProductStatus::Killed => "killed",
    }
}

/// Lowercase text for a [`RiskLevel`], used for CLI output without reaching
/// for `{:?}` debug formatting.
fn risk_level_text(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Low => "low",
        RiskLevel::Normal => "normal",
        RiskLevel::High => "high",
    }
}

/// Writes a single line to stdout, swallowing write failures (matches the
/// teacher's `write_stdout_line` — a CLI that can't write its own stdout has
/// no useful failure path left).
fn write_stdout_line(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{message}");
}

/// Writes a single line to stderr, swallowing write failures.
fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "{message}");
}
