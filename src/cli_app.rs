//! Top-level CLI definition and dispatch.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use crossbeam_channel::RecvTimeoutError;
use serde_json::{Value, json};
use thiserror::Error;

use universal_adb_debloater::core::config::{Config, default_config_path};
use universal_adb_debloater::core::errors::UadError;
use universal_adb_debloater::core::logging::{self, Verbosity};
use universal_adb_debloater::executor::signals::install_interrupt_handler;
use universal_adb_debloater::executor::{ActionRequest, BatchReport, CancelToken, Operation};
use universal_adb_debloater::recommend::{RiskTier, normalize_manufacturer};
use universal_adb_debloater::scanner::{PackageOrigin, PackageRecord};
use universal_adb_debloater::session::{DeviceSession, Engine, SessionEvent};

/// Universal ADB Debloater: inventory, classify and debloat Android packages.
#[derive(Debug, Parser)]
#[command(
    name = "uad",
    author,
    version,
    about = "Universal ADB Debloater - per-manufacturer bloatware cleanup over adb",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Device serial; required when more than one device is attached.
    #[arg(short, long, global = true, value_name = "SERIAL")]
    serial: Option<String>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List attached devices that are ready for commands.
    Devices,
    /// Show manufacturer, model and OS version of the selected device.
    Info,
    /// Scan installed packages and classify them against the knowledge base.
    Scan(ScanArgs),
    /// Disable, uninstall or re-enable packages.
    Apply(ApplyArgs),
    /// Write re-enable scripts for packages without touching the device.
    Restore(RestoreArgs),
    /// Inspect the knowledge base resolved for a manufacturer.
    Kb(KbArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ScanArgs {
    /// Only show packages whose identifier or label contains this text.
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,
    /// Only show packages with an actionable recommendation.
    #[arg(long)]
    recommended: bool,
    /// Only show system or user packages.
    #[arg(long, value_enum)]
    origin: Option<OriginArg>,
    /// Also write the listed packages as CSV.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OriginArg {
    System,
    User,
}

impl OriginArg {
    const fn origin(self) -> PackageOrigin {
        match self {
            Self::System => PackageOrigin::System,
            Self::User => PackageOrigin::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OperationArg {
    Disable,
    Uninstall,
    Enable,
}

impl OperationArg {
    const fn operation(self) -> Operation {
        match self {
            Self::Disable => Operation::Disable,
            Self::Uninstall => Operation::Uninstall,
            Self::Enable => Operation::Enable,
        }
    }
}

/// Package selection shared by `apply` and `restore`.
#[derive(Debug, Clone, Args, Default)]
struct SelectionArgs {
    /// Package identifiers to act on.
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,
    /// Select every package the knowledge base does not mark `keep`.
    #[arg(long)]
    recommended: bool,
    /// Restrict bulk selection to packages matching this text.
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,
}

impl SelectionArgs {
    fn is_empty(&self) -> bool {
        self.packages.is_empty() && !self.recommended
    }
}

#[derive(Debug, Clone, Args)]
struct ApplyArgs {
    /// Operation to apply.
    #[arg(value_enum)]
    operation: OperationArg,
    #[command(flatten)]
    selection: SelectionArgs,
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,
    /// Write restore scripts for the targets before applying.
    #[arg(long)]
    restore_script: bool,
    /// Export the action history to this file afterwards.
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct RestoreArgs {
    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Debug, Clone, Args)]
struct KbArgs {
    /// Manufacturer name as the device reports it.
    manufacturer: String,
    /// Show only this package.
    package: Option<String>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    build: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// How often the apply loop re-checks a worker that went quiet.
const EVENT_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(String),
    /// A device command that had to succeed did not.
    #[error("{0}")]
    Connectivity(String),
    /// A command succeeded but returned nothing usable.
    #[error("{0}")]
    Empty(String),
    /// The device-management executable could not be started.
    #[error("{0}")]
    Launch(String),
    /// Some batch targets failed or were cancelled.
    #[error("{0}")]
    Partial(String),
    /// Internal bug or environment failure.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Config(_) => 2,
            Self::Connectivity(_) => 3,
            Self::Empty(_) => 4,
            Self::Launch(_) => 5,
            Self::Partial(_) => 6,
            Self::Internal(_) | Self::Json(_) | Self::Io(_) => 7,
        }
    }
}

impl From<UadError> for CliError {
    fn from(err: UadError) -> Self {
        let message = match err.hint() {
            Some(hint) => format!("{err}\n  hint: {hint}"),
            None => err.to_string(),
        };
        match err {
            UadError::InvalidConfig { .. }
            | UadError::MissingConfig { .. }
            | UadError::ConfigParse { .. } => Self::Config(message),
            UadError::LaunchFailure { .. } => Self::Launch(message),
            UadError::Connectivity { .. } => Self::Connectivity(message),
            UadError::EmptyResult { .. } => Self::Empty(message),
            UadError::InvalidIdentifier { .. } => Self::User(message),
            UadError::Serialization { .. }
            | UadError::Io { .. }
            | UadError::ChannelClosed { .. }
            | UadError::Runtime { .. } => Self::Internal(message),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Devices => run_devices(cli),
        Command::Info => run_info(cli),
        Command::Scan(args) => run_scan(cli, args),
        Command::Apply(args) => run_apply(cli, args),
        Command::Restore(args) => run_restore(cli, args),
        Command::Kb(args) => run_kb(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn load_engine(cli: &Cli) -> Result<Engine, CliError> {
    Ok(Engine::from_config(&load_config(cli)?))
}

/// The `--serial` device, or the only attached one.
fn select_device(cli: &Cli, engine: &Engine) -> Result<String, CliError> {
    let attached = engine.list_devices()?;
    if let Some(serial) = &cli.serial {
        if attached.iter().any(|s| s == serial) {
            return Ok(serial.clone());
        }
        return Err(CliError::Connectivity(format!(
            "device {serial} is not attached or not ready\n  hint: {}",
            no_device_hint()
        )));
    }
    match attached.as_slice() {
        [] => Err(CliError::Empty(format!(
            "no ready devices found\n  hint: {}",
            no_device_hint()
        ))),
        [only] => Ok(only.clone()),
        many => Err(CliError::User(format!(
            "{} devices attached ({}); pick one with --serial",
            many.len(),
            many.join(", ")
        ))),
    }
}

fn no_device_hint() -> &'static str {
    "connect a device with USB debugging enabled and accept the authorization prompt; \
     `adb devices` lists unauthorized or offline devices that uad ignores"
}

fn open_session(cli: &Cli, engine: &Engine) -> Result<DeviceSession, CliError> {
    let serial = select_device(cli, engine)?;
    let session = engine.open_device(&serial)?;
    if session.is_empty() {
        return Err(UadError::EmptyResult {
            serial,
            what: "package listing",
        }
        .into());
    }
    Ok(session)
}

fn run_devices(cli: &Cli) -> Result<(), CliError> {
    let engine = load_engine(cli)?;
    let serials = engine.list_devices()?;
    if serials.is_empty() {
        return Err(CliError::Empty(format!(
            "no ready devices found\n  hint: {}",
            no_device_hint()
        )));
    }
    let devices = serials
        .iter()
        .map(|serial| engine.profile(serial))
        .collect::<Result<Vec<_>, _>>()?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{:<24}  {:<14}  {:<20}  {:>4}", "Serial", "Manufacturer", "Model", "OS");
            println!("{}", "-".repeat(68));
            for device in &devices {
                println!(
                    "{:<24}  {:<14}  {:<20}  {:>4}",
                    truncate(&device.serial, 24),
                    truncate(&device.manufacturer, 14),
                    truncate(&device.model, 20),
                    device.os_version
                );
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "devices",
                "devices": devices,
            }))?;
        }
    }
    Ok(())
}

fn run_info(cli: &Cli) -> Result<(), CliError> {
    let engine = load_engine(cli)?;
    let serial = select_device(cli, &engine)?;
    let identity = engine.profile(&serial)?;
    let key = normalize_manufacturer(&identity.manufacturer);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", identity.display_name().bold());
            println!("  Serial:       {}", identity.serial);
            println!("  Manufacturer: {}", or_unknown(&identity.manufacturer));
            println!("  Model:        {}", or_unknown(&identity.model));
            println!("  Android:      {}", or_unknown(&identity.os_version));
            println!("  KB key:       {}", or_unknown(&key));
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "info",
                "device": identity,
                "display_name": identity.display_name(),
                "knowledge_base_key": key,
            }))?;
        }
    }
    Ok(())
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let engine = load_engine(cli)?;
    let start = Instant::now();
    let mut session = open_session(cli, &engine)?;
    if let Some(filter) = &args.filter {
        session.set_filter(filter);
    }

    let rows: Vec<&PackageRecord> = session
        .visible()
        .filter(|r| !args.recommended || r.is_recommended())
        .filter(|r| args.origin.is_none_or(|o| r.origin == o.origin()))
        .collect();

    if let Some(path) = &args.csv {
        write_file(path, &session.export_csv_rows(rows.iter().copied()))?;
    }

    let kb = session.knowledge_base();
    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{}\n  Packages: {} ({} shown) in {:.1}s\n  Knowledge base: {}\n",
                session.identity().display_name().bold(),
                session.records().len(),
                rows.len(),
                start.elapsed().as_secs_f64(),
                kb.source().map_or_else(
                    || "none for this manufacturer".to_string(),
                    |p| format!("{} ({} entries)", p.display(), kb.len())
                ),
            );
            print_package_table(&rows);
            if let Some(path) = &args.csv {
                println!("\n  CSV written to {}", path.display());
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "scan",
                "device": session.identity(),
                "knowledge_base": {
                    "source": kb.source(),
                    "digest": kb.digest(),
                    "entries": kb.len(),
                },
                "total": session.records().len(),
                "shown": rows.len(),
                "csv": args.csv,
                "packages": rows,
            }))?;
        }
    }
    Ok(())
}

fn print_package_table(rows: &[&PackageRecord]) {
    if rows.is_empty() {
        println!("  No packages match.");
        return;
    }
    println!(
        "  {:<48}  {:<18}  {:<6}  {:<6}  {:<10}",
        "Package", "Label", "Type", "Risk", "Recommended"
    );
    println!("  {}", "-".repeat(96));
    for record in rows {
        let risk = record.risk_tier.map_or("-", RiskTier::as_str);
        let risk = match record.risk_tier {
            Some(RiskTier::High) => format!("{risk:<6}").red().to_string(),
            Some(RiskTier::Medium) => format!("{risk:<6}").yellow().to_string(),
            Some(RiskTier::Low) => format!("{risk:<6}").green().to_string(),
            None => format!("{risk:<6}"),
        };
        let action = record
            .recommended_action
            .as_ref()
            .map_or("-", |action| action.as_str());
        println!(
            "  {:<48}  {:<18}  {:<6}  {}  {:<10}",
            truncate(&record.identifier, 48),
            truncate(&record.display_label, 18),
            record.origin.as_str(),
            risk,
            action
        );
    }
}

/// Apply the selection flags to a session; returns the chosen identifiers.
fn apply_selection(
    session: &mut DeviceSession,
    selection: &SelectionArgs,
) -> Result<Vec<String>, CliError> {
    if selection.is_empty() {
        return Err(CliError::User(
            "nothing selected: pass package names or --recommended".to_string(),
        ));
    }
    if let Some(filter) = &selection.filter {
        session.set_filter(filter);
    }
    if selection.recommended {
        session.select_recommended();
    }
    for package in &selection.packages {
        if !session.select(package, true) {
            return Err(CliError::User(format!(
                "package {package} is not installed on {}",
                session.serial()
            )));
        }
    }
    let targets = session.selected_identifiers();
    if targets.is_empty() {
        return Err(CliError::User(
            "no packages selected (the filter may hide them)".to_string(),
        ));
    }
    Ok(targets)
}

fn run_apply(cli: &Cli, args: &ApplyArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let engine = load_engine(cli)?;
    let mut session = open_session(cli, &engine)?;
    let targets = apply_selection(&mut session, &args.selection)?;
    let operation = args.operation.operation();
    let serial = session.serial().to_string();
    let high_risk = session.high_risk_selected();

    if !args.yes {
        if mode == OutputMode::Json || !io::stdin().is_terminal() {
            return Err(CliError::User(
                "confirmation required in non-interactive mode; pass --yes".to_string(),
            ));
        }
        if !confirm(&operation, targets.len(), high_risk)? {
            println!("Operation cancelled");
            return Ok(());
        }
    }

    let restore_dir = if args.restore_script {
        let dir = engine.generate_restore_scripts(&serial, &targets)?;
        if mode == OutputMode::Human {
            println!("Restore scripts written to {}", dir.display());
        }
        Some(dir)
    } else {
        None
    };

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;

    let events = engine.events().subscribe();
    let handle = engine.spawn_apply(
        ActionRequest::new(operation.clone(), serial.clone(), targets),
        cancel,
    )?;
    loop {
        let event = match events.recv_timeout(EVENT_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) if !handle.is_finished() => continue,
            Err(_) => break,
        };
        match event {
            SessionEvent::BatchProgress {
                index,
                total,
                identifier,
            } if mode == OutputMode::Human => {
                print!("  [{index}/{total}] {operation} {identifier} ... ");
                io::stdout().flush()?;
            }
            SessionEvent::OutcomeProduced { outcome, .. }
                if mode == OutputMode::Human && !outcome.cancelled =>
            {
                if outcome.succeeded {
                    println!("{}", "ok".green());
                } else {
                    println!("{} {}", "FAILED".red(), outcome.raw_result);
                }
            }
            SessionEvent::BatchFinished { .. } => break,
            _ => {}
        }
    }
    let report = handle.wait()?;

    if let Some(path) = &args.history {
        write_file(path, &engine.history().export_to_text())?;
    }

    match mode {
        OutputMode::Human => print_batch_summary(&report, args.history.as_deref()),
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "apply",
                "device": serial,
                "operation": report.operation,
                "succeeded": report.succeeded(),
                "failed": report.failed(),
                "cancelled": report.cancelled(),
                "outcomes": report.outcomes,
                "restore_dir": restore_dir,
                "history_file": args.history,
            }))?;
        }
    }

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(CliError::Partial(format!(
            "{} of {} targets did not complete ({} failed, {} cancelled)",
            report.outcomes.len() - report.succeeded(),
            report.outcomes.len(),
            report.failed(),
            report.cancelled()
        )))
    }
}

fn confirm(operation: &Operation, count: usize, high_risk: usize) -> Result<bool, CliError> {
    println!("Apply {operation} to {count} package(s)?");
    if high_risk > 0 {
        println!(
            "{}",
            format!(
                "WARNING: {high_risk} high-risk package(s) selected! \
                 Disabling these may cause system instability."
            )
            .red()
            .bold()
        );
    }
    print!("Proceed? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_batch_summary(report: &BatchReport, history: Option<&Path>) {
    println!(
        "\nApplied {} to {}/{} selected",
        report.operation,
        report.succeeded(),
        report.outcomes.len()
    );
    if report.failed() > 0 {
        println!("  {} failed", report.failed().to_string().red());
    }
    if report.cancelled() > 0 {
        println!(
            "  {} not attempted (cancelled)",
            report.cancelled().to_string().yellow()
        );
    }
    if let Some(path) = history {
        println!("  History exported to {}", path.display());
    }
}

fn run_restore(cli: &Cli, args: &RestoreArgs) -> Result<(), CliError> {
    let engine = load_engine(cli)?;
    let selection = &args.selection;
    let (serial, targets) = if selection.recommended || selection.filter.is_some() {
        let mut session = open_session(cli, &engine)?;
        let targets = apply_selection(&mut session, selection)?;
        (session.serial().to_string(), targets)
    } else if selection.packages.is_empty() {
        return Err(CliError::User(
            "nothing selected: pass package names or --recommended".to_string(),
        ));
    } else {
        (select_device(cli, &engine)?, selection.packages.clone())
    };

    let dir = engine.generate_restore_scripts(&serial, &targets)?;
    match output_mode(cli) {
        OutputMode::Human => {
            println!("Restore scripts for {} package(s) written to", targets.len());
            println!("  {}", dir.display());
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "restore",
                "device": serial,
                "packages": targets,
                "dir": dir,
            }))?;
        }
    }
    Ok(())
}

fn run_kb(cli: &Cli, args: &KbArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let engine = Engine::from_config(&config);
    let key = normalize_manufacturer(&args.manufacturer);
    let kb = engine.knowledge_base_for(&args.manufacturer);
    let entries: Vec<_> = kb
        .sorted_entries()
        .into_iter()
        .filter(|e| args.package.as_ref().is_none_or(|p| &e.identifier == p))
        .collect();
    let expected = engine.store().pack_path(&key, &config.knowledge_base.suffix);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("Manufacturer key: {}", or_unknown(&key));
            match kb.source() {
                Some(source) => {
                    println!("  Source: {}", source.display());
                    println!("  SHA-256: {}", kb.digest().unwrap_or("-"));
                    println!("  Entries: {}", kb.len());
                }
                None => println!("  No knowledge base at {}", expected.display()),
            }
            if !entries.is_empty() {
                println!();
            }
            for entry in &entries {
                println!(
                    "  {:<48}  {:<10}  {:<6}  {}",
                    truncate(&entry.identifier, 48),
                    or_dash(&entry.action),
                    or_dash(&entry.risk),
                    entry.rationale().unwrap_or("")
                );
            }
            if let Some(package) = &args.package {
                if entries.is_empty() {
                    println!("  No recommendation for {package}");
                }
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "command": "kb",
                "manufacturer": args.manufacturer,
                "key": key,
                "path": expected,
                "source": kb.source(),
                "digest": kb.digest(),
                "total": kb.len(),
                "entries": entries,
            }))?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().or_else(default_config_path);
            let exists = path.as_deref().is_some_and(Path::exists);

            match output_mode(cli) {
                OutputMode::Human => match &path {
                    Some(path) => {
                        println!("{}", path.display());
                        if !exists {
                            println!("  (file does not exist; defaults will be used)");
                        }
                    }
                    None => println!("(no config directory; defaults will be used)"),
                },
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path,
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", config.to_toml()?);
                    println!("# resolved adb: {}", config.resolved_adb_path());
                    println!("# restore dir:  {}", config.restore_dir().display());
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                        "resolved_adb": config.resolved_adb_path(),
                        "restore_dir": config.restore_dir(),
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(_) => {
                match output_mode(cli) {
                    OutputMode::Human => println!("Configuration is valid."),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": true,
                    }))?,
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                        "code": e.code(),
                    }))?,
                }
                Err(e.into())
            }
        },
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("uad {version}");
            if args.build {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            write_json_line(&json!({
                "binary": "uad",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            }))?;
        }
    }
    Ok(())
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "(unknown)"
    } else {
        value
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| UadError::io(path, e).into())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("UAD_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "uad",
            "--config",
            "/tmp/uad.toml",
            "--json",
            "--no-color",
            "-v",
            "-s",
            "R5CR1234",
            "info",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["uad", "info", "--json", "--serial", "R5CR1234", "-q"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_every_subcommand() {
        let cases = [
            vec!["uad", "devices"],
            vec!["uad", "info"],
            vec!["uad", "scan", "--filter", "samsung", "--recommended", "--origin", "system"],
            vec!["uad", "scan", "--csv", "/tmp/packages.csv"],
            vec!["uad", "apply", "disable", "com.a", "com.b", "--yes"],
            vec!["uad", "apply", "uninstall", "--recommended", "--restore-script", "-y"],
            vec!["uad", "apply", "enable", "com.a", "--history", "/tmp/history.txt"],
            vec!["uad", "restore", "com.a"],
            vec!["uad", "restore", "--recommended", "--filter", "facebook"],
            vec!["uad", "kb", "Samsung"],
            vec!["uad", "kb", "Samsung", "com.facebook.appmanager"],
            vec!["uad", "config", "path"],
            vec!["uad", "config", "show"],
            vec!["uad", "config", "validate"],
            vec!["uad", "version", "--build"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn apply_rejects_unknown_operations() {
        assert!(Cli::try_parse_from(["uad", "apply", "freeze", "com.a"]).is_err());
        assert!(Cli::try_parse_from(["uad", "apply"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["uad", "-v", "-q", "devices"]).is_err());
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["uad", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn exit_codes_follow_the_error_taxonomy() {
        let launch: CliError = UadError::LaunchFailure {
            program: "adb".to_string(),
            details: "not found".to_string(),
        }
        .into();
        assert_eq!(launch.exit_code(), 5);
        assert!(launch.to_string().contains("hint:"));

        let empty: CliError = UadError::EmptyResult {
            serial: "S1".to_string(),
            what: "package listing",
        }
        .into();
        assert_eq!(empty.exit_code(), 4);

        let connectivity: CliError = UadError::Connectivity {
            serial: "S1".to_string(),
            details: "exit 1".to_string(),
        }
        .into();
        assert_eq!(connectivity.exit_code(), 3);

        let config: CliError = UadError::InvalidConfig {
            details: "bad".to_string(),
        }
        .into();
        assert_eq!(config.exit_code(), 2);

        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Partial(String::new()).exit_code(), 6);
        assert_eq!(CliError::Internal(String::new()).exit_code(), 7);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("com.android.chrome", 40), "com.android.chrome");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("ääääääää", 5), "ää...");
    }
}
