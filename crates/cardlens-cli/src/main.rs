//! cardlens CLI: attach card names from an app package to a scanner export.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardlens_core::config::{parse_profile, ExportConfig, OutputFormat};
use cardlens_exec::Session;
use cardlens_io::archive::PackageArchive;
use cardlens_io::source::read_input;
use cardlens_io::sqlite::with_context;

#[derive(Parser)]
#[command(name = "cardlens")]
#[command(about = "Join card names from an app package onto a card scanner export", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a package archive with a scan export and write the table
    Run {
        /// Package archive (.apk) holding the card database
        #[arg(short, long)]
        package: Option<PathBuf>,

        /// Scanner export (.dlens)
        #[arg(short, long)]
        scan: Option<PathBuf>,

        /// Output file, or `-` for stdout [default: cards.csv, cards.jsonl for jsonl]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv or jsonl (overrides config)
        #[arg(short, long)]
        format: Option<String>,

        /// YAML profile with export settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Archive entry of the card database (overrides config)
        #[arg(long)]
        entry: Option<String>,

        /// Fail when a scanned card id has no name
        #[arg(long)]
        require_names: bool,

        /// Write the run manifest as JSON to this path
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// List the tables and row counts of the input databases
    Inspect {
        /// Package archive (.apk)
        #[arg(short, long)]
        package: Option<PathBuf>,

        /// Scanner export (.dlens)
        #[arg(short, long)]
        scan: Option<PathBuf>,

        /// Archive entry of the card database (overrides config)
        #[arg(long)]
        entry: Option<String>,

        /// YAML profile with export settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a YAML profile
    Validate {
        /// Path to the profile
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            package,
            scan,
            output,
            format,
            config,
            entry,
            require_names,
            manifest,
        } => {
            let overrides = RunOverrides {
                entry,
                format,
                require_names,
            };
            if let Err(e) = run_export(
                package,
                scan,
                output,
                config.as_deref(),
                &overrides,
                manifest.as_deref(),
            ) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Inspect {
            package,
            scan,
            entry,
            config,
        } => {
            if let Err(e) =
                inspect_inputs(package.as_deref(), scan.as_deref(), entry, config.as_deref())
            {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { config } => {
            if let Err(e) = validate_profile(&config) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Profile is valid");
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Flags of `run` that override the loaded configuration.
#[derive(Debug, Default)]
struct RunOverrides {
    entry: Option<String>,
    format: Option<String>,
    require_names: bool,
}

/// Defaults, then environment, then the profile (if any).
fn load_config(profile: Option<&Path>) -> Result<ExportConfig, Box<dyn std::error::Error>> {
    let mut cfg = ExportConfig::from_env()?;
    if let Some(path) = profile {
        let yaml = fs::read_to_string(path)?;
        cfg.apply_profile(&parse_profile(&yaml)?);
    }
    Ok(cfg)
}

fn apply_run_overrides(
    cfg: &mut ExportConfig,
    overrides: &RunOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(entry) = &overrides.entry {
        cfg.package_entry = entry.clone();
    }
    if let Some(format) = &overrides.format {
        cfg.output_format = format.parse::<OutputFormat>()?;
    }
    if overrides.require_names {
        cfg.require_names = true;
    }
    Ok(())
}

/// Explicit `--output`, else the default file for `format`.
fn resolve_output(output: Option<PathBuf>, format: OutputFormat) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(format.default_output_file()))
}

fn run_export(
    package: Option<PathBuf>,
    scan: Option<PathBuf>,
    output_path: Option<PathBuf>,
    profile: Option<&Path>,
    overrides: &RunOverrides,
    manifest_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = load_config(profile)?;
    apply_run_overrides(&mut cfg, overrides)?;
    let format = cfg.output_format;
    let output_path = resolve_output(output_path, format);
    let output_path = output_path.as_path();

    let mut session = Session::new(cfg)?;
    if let Some(path) = package {
        session.set_package(path);
    }
    if let Some(path) = scan {
        session.set_scan(path);
    }

    let output = session.run()?;
    let bytes = output.encode(format)?;
    let to_stdout = output_path == Path::new("-");
    if to_stdout {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
    } else {
        fs::write(output_path, &bytes)?;
        info!(path = %output_path.display(), bytes = bytes.len(), "wrote output");
    }

    if let Some(path) = manifest_path {
        fs::write(path, serde_json::to_vec_pretty(&output.manifest)?)?;
    }

    let manifest = &output.manifest;
    let summary = format!(
        "✓ Joined {} scanned row(s) against {} card name(s)\n  \
         Matched: {}, without name: {}\n  \
         Duration: {}ms\n  \
         Output digest: {}",
        manifest.scanned_rows,
        manifest.card_names,
        manifest.matched_rows,
        manifest.unmatched_rows,
        manifest.duration_ms(),
        manifest
            .output_digest
            .map(|d| d.to_hex())
            .unwrap_or_default(),
    );
    if to_stdout {
        eprintln!("{summary}");
    } else {
        println!("{summary}");
        println!("  Output: {}", output_path.display());
    }

    Ok(())
}

fn inspect_inputs(
    package: Option<&Path>,
    scan: Option<&Path>,
    entry: Option<String>,
    profile: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if package.is_none() && scan.is_none() {
        return Err("nothing to inspect: pass --package and/or --scan".into());
    }
    let mut cfg = load_config(profile)?;
    if let Some(entry) = entry {
        cfg.package_entry = entry;
    }

    if let Some(path) = package {
        let bytes = read_input(path)?;
        let mut archive = PackageArchive::from_bytes(&bytes)?;
        println!(
            "Package {} ({} entries)",
            path.display(),
            archive.entry_names().len()
        );
        let image = archive.entry_bytes(&cfg.package_entry)?;
        describe_image(&cfg.package_entry, image)?;
    }

    if let Some(path) = scan {
        let image = read_input(path)?;
        describe_image(&path.display().to_string(), image)?;
    }

    Ok(())
}

fn describe_image(label: &str, image: Vec<u8>) -> Result<(), cardlens_io::Error> {
    with_context(image, |ctx| {
        println!("Database {} ({} bytes)", label, ctx.image_len());
        for table in ctx.tables()? {
            println!("  {}: {} rows", table, ctx.count_rows(&table)?);
        }
        Ok(())
    })
}

fn validate_profile(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = fs::read_to_string(path)?;
    let mut cfg = ExportConfig::default();
    cfg.apply_profile(&parse_profile(&yaml)?);
    cfg.validate()?;
    Ok(())
}
