use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use photo_organizer_core::{
    app_paths, load_config, normalize_mtimes, organize, save_config, validate_template,
    AppConfig, ExifTagReader, FsProbe, OrganizeOptions, PlanOptions, ReportLine,
    TimestampOptions, TimestampResolver, TransferMode,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "photo-organizer", version)]
#[command(about = "Sorts photos into date-named directories and fixes their mtimes")]
struct Cli {
    /// Diagnostics on stderr: -v info, -vv debug, -vvv trace. RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy or move files into directories named after their capture time
    Organize(OrganizeArgs),
    /// Set each file's mtime to its capture time
    Timestamp(TimestampArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct OrganizeArgs {
    /// Destination directory format, e.g. /archive/Photo%y/%y%m
    dst_format: String,
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short = 'n', long)]
    dry_run: bool,
    #[arg(short = 'm', long = "move")]
    move_files: bool,
    #[arg(short, long)]
    quiet: bool,
    #[arg(short = 'd', long)]
    dir_prefix: bool,
    #[arg(long, value_name = "SEP")]
    separator: Option<String>,
    #[arg(short = 'i', long)]
    ignore_errors: bool,
    #[arg(short, long)]
    recursive: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Lines)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct TimestampArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short = 'n', long)]
    dry_run: bool,
    #[arg(short, long)]
    quiet: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Lines)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Lines,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config()?;

    let quiet = config.quiet
        || match &cli.command {
            Commands::Organize(args) => args.quiet,
            Commands::Timestamp(args) => args.quiet,
            Commands::Config(_) => false,
        };
    init_logging(cli.verbose, quiet)?;
    debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Organize(args) => cmd_organize(args, &config),
        Commands::Timestamp(args) => cmd_timestamp(args, &config),
        Commands::Config(config_args) => match config_args.action {
            ConfigAction::Show => cmd_config_show(&config).map(|()| ExitCode::SUCCESS),
            ConfigAction::Init => cmd_config_init(&config).map(|()| ExitCode::SUCCESS),
        },
    }
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn cmd_organize(args: OrganizeArgs, config: &AppConfig) -> Result<ExitCode> {
    validate_template(&args.dst_format)
        .with_context(|| format!("invalid destination format: {}", args.dst_format))?;

    let mode = if args.move_files || config.move_files {
        TransferMode::Move
    } else {
        TransferMode::Copy
    };
    let options = OrganizeOptions {
        plan: PlanOptions {
            template: args.dst_format,
            include_dir_prefix: args.dir_prefix || config.include_dir_prefix,
            separator: args
                .separator
                .unwrap_or_else(|| config.dir_prefix_separator.clone()),
            mode,
        },
        dry_run: args.dry_run,
        ignore_errors: args.ignore_errors || config.ignore_errors,
        recursive: args.recursive || config.recursive,
    };

    let resolver = TimestampResolver::new(ExifTagReader);
    let report = organize(&args.files, &options, &resolver, &FsProbe)?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Lines => print_lines(&report.lines, args.quiet || config.quiet),
    }

    Ok(exit_code(report.has_errors()))
}

fn cmd_timestamp(args: TimestampArgs, config: &AppConfig) -> Result<ExitCode> {
    let resolver = TimestampResolver::new(ExifTagReader);
    let report = normalize_mtimes(
        &args.files,
        &resolver,
        &TimestampOptions {
            dry_run: args.dry_run,
        },
    );

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Lines => print_lines(&report.lines, args.quiet || config.quiet),
    }

    Ok(exit_code(report.has_errors()))
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn cmd_config_init(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config(config)?;
    println!("wrote {}", paths.config_path.display());
    Ok(())
}

fn print_lines(lines: &[ReportLine], quiet: bool) {
    for line in lines {
        if line.is_error {
            if !quiet {
                eprintln!("{line}");
            }
        } else if line.path.is_none() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

fn exit_code(has_errors: bool) -> ExitCode {
    if has_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
