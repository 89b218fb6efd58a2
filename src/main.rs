//! assetkit CLI
//!
//! Entry point for the `assetkit` command-line tool.

use assetkit::compose::{ComposeOptions, Composer};
use assetkit::config::{user_config_path, EffectiveConfig, PROJECT_CONFIG_FILE};
use assetkit::mapping::{AssetMapper, PythonAssetMapping};
use assetkit::scaffold::{Scaffolder, TemplateScaffolder, PAYLOAD_RESOURCE_DIR};
use assetkit::Archiver;
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "assetkit")]
#[command(about = "Export and combine asset packages", version)]
struct Cli {
    /// Log debug output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Project config file (default: ./assetkit.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a package as a .tar.gz archive
    Export {
        /// Package directory, or the name of an installed package
        package: String,

        /// Archive path (default: ./<package-name>.tar.gz)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print the archive listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Combine packages into a new package
    Combine {
        /// Packages to vendor, in order
        #[arg(required = false)]
        packages: Vec<String>,

        /// Name of the combined package
        #[arg(long, short = 'o')]
        output: String,

        /// Directory to create the combined package in (default: temp dir)
        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Generate an assets.py accessor module
        #[arg(long)]
        gen_assets_py: bool,

        /// Install the combined package with pip
        #[arg(long)]
        install: bool,

        /// Python interpreter used for --install
        #[arg(long)]
        python: Option<String>,

        /// Print the composition result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new asset package
    New {
        /// Package name
        name: String,

        /// Directory to create the package in (default: current directory)
        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Generate an assets.py accessor module
        #[arg(long)]
        gen_assets_py: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Export {
            package,
            output,
            json,
        } => {
            run_export(cli.config, &package, output, json);
        }
        Commands::Combine {
            packages,
            output,
            target_dir,
            gen_assets_py,
            install,
            python,
            json,
        } => {
            let options = ComposeOptions {
                gen_mapping: gen_assets_py,
                install,
            };
            run_combine(cli.config, &packages, &output, target_dir, options, python, json);
        }
        Commands::New {
            name,
            target_dir,
            gen_assets_py,
        } => {
            run_new(&name, target_dir, gen_assets_py);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_config(config_path: Option<PathBuf>, cli_overrides: Option<serde_json::Value>) -> EffectiveConfig {
    if let Some(path) = config_path.as_ref().filter(|p| !p.exists()) {
        eprintln!("Config file not found: {}", path.display());
        process::exit(1);
    }
    let project = config_path.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let user = user_config_path();

    match EffectiveConfig::build(user.as_deref(), Some(project.as_path()), cli_overrides) {
        Ok(config) => {
            for source in &config.sources {
                debug!("config layer {}", source.describe());
            }
            config
        }
        Err(e) => fail("Error loading config", &e, 1),
    }
}

fn run_export(config_path: Option<PathBuf>, package: &str, output: Option<PathBuf>, json: bool) {
    let config = load_config(config_path, None);
    let policy = match config.settings.exclusion_policy() {
        Ok(p) => p,
        Err(e) => fail("Invalid exclusion rules", &e, 1),
    };

    let root = match config.settings.resolver().resolve(package) {
        Ok(r) => r,
        Err(e) => fail("Error", &e, 1),
    };
    let destination = output.unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", root.name)));

    let listing = match Archiver::new(policy).archive(&root.path, &destination) {
        Ok(l) => l,
        Err(e) => fail("Export failed", &e, 1),
    };

    if json {
        match listing.to_json() {
            Ok(j) => println!("{}", j),
            Err(e) => fail("Error serializing output", &e, 1),
        }
    } else {
        println!("Exported {} to {}", root.name, destination.display());
        println!(
            "  {} files, {} bytes, sha256 {}",
            listing.file_count(),
            listing.archive_size,
            listing.archive_sha256
        );
    }
}

fn run_combine(
    config_path: Option<PathBuf>,
    packages: &[String],
    output: &str,
    target_dir: Option<PathBuf>,
    options: ComposeOptions,
    python: Option<String>,
    json: bool,
) {
    let overrides = python.map(|p| serde_json::json!({ "install": { "python": p } }));
    let config = load_config(config_path, overrides);
    let settings = &config.settings;
    let policy = match settings.exclusion_policy() {
        Ok(p) => p,
        Err(e) => fail("Invalid exclusion rules", &e, 1),
    };

    let composer = Composer::new(settings.resolver(), Archiver::new(policy))
        .with_layout(settings.layout())
        .with_installer(Box::new(settings.installer()));
    let target_dir = target_dir.unwrap_or_else(std::env::temp_dir);

    let result = match composer.compose(packages, output, &target_dir, options) {
        Ok(r) => r,
        Err(e) => {
            if let Some(path) = e.leftover() {
                eprintln!("Partial output left at: {}", path.display());
            }
            let code = e.exit_code();
            fail("Combine failed", &e, code)
        }
    };

    if json {
        match result.to_json() {
            Ok(j) => println!("{}", j),
            Err(e) => fail("Error serializing output", &e, 1),
        }
    } else {
        print!("{}", result.to_human());
    }
}

fn run_new(name: &str, target_dir: Option<PathBuf>, gen_assets_py: bool) {
    let target_dir = target_dir.unwrap_or_else(|| PathBuf::from("."));
    let root = match TemplateScaffolder.bootstrap(name, &target_dir) {
        Ok(r) => r,
        Err(e) => fail("Error creating package", &e, 1),
    };

    if gen_assets_py {
        let payload = root.join(name);
        if let Err(e) = generate_mapping(&payload) {
            fail("Asset mapping failed", e.as_ref(), 1);
        }
    }

    println!("Created package {} at {}", name, root.display());
}

/// Map the payload resources and wire the module into the payload's `__init__.py`.
fn generate_mapping(payload: &Path) -> Result<(), Box<dyn Error>> {
    let count = PythonAssetMapping.generate(payload, PAYLOAD_RESOURCE_DIR, &payload.join("assets.py"))?;
    let mut init = OpenOptions::new().append(true).open(payload.join("__init__.py"))?;
    writeln!(init, "\nfrom .assets import assets")?;
    log::info!("mapped {} assets", count);
    Ok(())
}

/// Print `context` and the full error chain, then exit.
fn fail(context: &str, err: &dyn Error, code: i32) -> ! {
    eprintln!("{}: {}", context, err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    process::exit(code);
}
