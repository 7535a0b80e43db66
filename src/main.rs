use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flowscan::{
    config::Config,
    model::{FlowInfo, ScanReport, Severity},
    output::{export_report, format_report_to_string, print_flow_info, print_report, ExportFormat, OutputFormat},
    release::{ReleaseBuild, ReleaseOptions},
    salesforce::{Connection, MetadataLoader, PageSnapshot},
    scanner::{Dispatcher, BASIC_RULES},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const ERROR_FINDINGS: u8 = 2;
    pub const WARNING_FINDINGS: u8 = 3;
    pub const INFO_FINDINGS: u8 = 4;
}

#[derive(Parser)]
#[command(name = "flowscan")]
#[command(author, version, about = "Scan Salesforce Flows for best-practice issues")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FlowArgs {
    /// Salesforce instance host (e.g. acme.my.salesforce.com)
    #[arg(long, env = "SF_INSTANCE_URL")]
    host: Option<String>,

    /// FlowDefinition record id
    #[arg(long)]
    flow_def_id: Option<String>,

    /// Flow (version) record id
    #[arg(long)]
    flow_id: Option<String>,

    /// Session id / OAuth access token
    #[arg(long, env = "SF_ACCESS_TOKEN", hide_env_values = true)]
    session_id: Option<String>,

    /// Saved Flow Builder page used when the API is unavailable
    #[arg(long)]
    page: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a flow and scan it
    Scan {
        #[command(flatten)]
        flow: FlowArgs,

        /// Output format (table, json, csv, html)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also export results as a dated json or csv file
        #[arg(long)]
        export: Option<String>,

        /// Directory for --export files
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,

        /// Skip the external Flow Scanner engine and use the basic rules
        #[arg(long)]
        no_core: bool,

        /// Exit with error if findings at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,
    },

    /// Load a flow and show its metadata
    Info {
        #[command(flatten)]
        flow: FlowArgs,

        /// Print the flow as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in rules
    Rules,

    /// Package the browser extension into a release zip
    Release {
        /// Browser type (chrome, firefox, ...)
        browser: String,

        /// Extension source directory
        #[arg(long, default_value = "addon")]
        source: PathBuf,

        /// Build output root
        #[arg(long, default_value = "target")]
        target: PathBuf,

        /// Environment type; BETA marks the extension name
        #[arg(long, env = "ENVIRONMENT_TYPE")]
        environment: Option<String>,

        /// Zip file to write
        #[arg(long, env = "ZIP_FILE_NAME")]
        zip_file: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Error,
    Warning,
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();

    match cli.command {
        Commands::Scan {
            flow,
            format,
            output,
            export,
            export_dir,
            no_core,
            fail_on,
        } => {
            let format_str = format.unwrap_or(config.default_format.clone());
            let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
            let export = export
                .map(|e| ExportFormat::from_str(&e).map_err(|e| anyhow::anyhow!(e)))
                .transpose()?;

            let is_interactive = format == OutputFormat::Table && output.is_none();
            let flow_info = load_flow(&flow, &config, is_interactive).await?;
            let report = run_scan(&flow_info, &config, !no_core, is_interactive).await;

            if let Some(path) = output {
                let content = format_report_to_string(&report, format)?;
                std::fs::write(&path, content)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("Results written to: {}", path.display());
            } else {
                print_report(&report, format)?;
            }

            if let Some(export_format) = export {
                let path = export_report(&report, export_format, &export_dir)?;
                eprintln!("Exported results to: {}", path.display());
            }

            Ok(determine_exit_code(&report, fail_on))
        }
        Commands::Info { flow, json } => {
            let flow_info = load_flow(&flow, &config, !json).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&flow_info)?);
            } else {
                print_flow_info(&flow_info);
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Rules => {
            list_rules(&config);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Release {
            browser,
            source,
            target,
            environment,
            zip_file,
        } => {
            let mut options = ReleaseOptions::new(browser);
            options.source_dir = source;
            options.target_root = target;
            options.environment = environment.filter(|e| !e.is_empty());
            options.zip_file = zip_file;

            let build = ReleaseBuild::new(options);
            let zip_path = build.run()?;
            println!(
                "Completed {} release build: {}",
                build.options().browser,
                zip_path.display()
            );
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn spinner(enabled: bool, message: &'static str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    Some(pb)
}

async fn load_flow(args: &FlowArgs, config: &Config, interactive: bool) -> Result<FlowInfo> {
    let host = args
        .host
        .clone()
        .or_else(|| config.instance_url.clone())
        .unwrap_or_default();
    let conn = Connection::get_session(&host, args.session_id.clone(), config)?;
    debug!(instance = conn.instance_url(), api_version = conn.api_version(), "Session ready");

    let mut loader = MetadataLoader::new(&conn);
    if let Some(page) = &args.page {
        loader = loader.with_page(PageSnapshot::from_file(page)?);
    }

    let progress = spinner(interactive, "Loading flow metadata...");
    let result = loader
        .load(args.flow_def_id.as_deref(), args.flow_id.as_deref())
        .await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let flow = result.context("Failed to load flow information")?;
    info!(name = %flow.name, flow_type = %flow.flow_type, status = %flow.status, "Flow loaded");
    Ok(flow)
}

async fn run_scan(flow: &FlowInfo, config: &Config, use_core: bool, interactive: bool) -> ScanReport {
    let dispatcher = Dispatcher::from_config(config, use_core);

    let progress = spinner(interactive, "Scanning flow...");
    let report = dispatcher.scan(flow).await;
    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Found {} issues ({})",
            report.total_issues, report.scanner_version
        ));
    }

    report
}

/// Determine the exit code based on findings and --fail-on setting
fn determine_exit_code(report: &ScanReport, fail_on: Option<FailLevel>) -> u8 {
    let threshold = match fail_on {
        Some(FailLevel::Error) => Severity::Error,
        Some(FailLevel::Warning) => Severity::Warning,
        Some(FailLevel::Info) => Severity::Info,
        None => return exit_codes::SUCCESS,
    };

    match report.worst_severity() {
        Some(worst) if worst <= threshold => match worst {
            Severity::Error => exit_codes::ERROR_FINDINGS,
            Severity::Warning => exit_codes::WARNING_FINDINGS,
            _ => exit_codes::INFO_FINDINGS,
        },
        _ => exit_codes::SUCCESS,
    }
}

fn list_rules(config: &Config) {
    println!("Built-in rules (used when the Flow Scanner engine is unavailable):");
    println!();

    for rule in BASIC_RULES.iter() {
        let ignored = if config.ignore.should_ignore_rule(rule.name) {
            " [ignored]"
        } else {
            ""
        };
        println!("  {:<22} {:<8} {}{}", rule.name, rule.severity, rule.description, ignored);
    }

    println!();
    println!(
        "Engine command: {} (enabled: {})",
        config.core_command.join(" "),
        config.use_core
    );
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'flowscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
