//! immutablecheck binary.

use std::path::Path;

use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use immutablecheck::cli::{validate_cli_semantics, Cli};
use immutablecheck::config::{discover_and_load_config, AnalyzerConfig, FileConfig};
use immutablecheck::descriptor::load_descriptor_set;
use immutablecheck::error::{exit_code, CheckError};
use immutablecheck::output::{self, init_color, ColorMode, OutputFormat};

fn main() {
    let cli = Cli::parse();

    init_color(cli.color);

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(!matches!(cli.color, ColorMode::Never))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(exit_code::CONFIG_ERROR);
    }

    for warning in validate_cli_semantics(&cli) {
        eprintln!("{}", warning);
    }

    let file_config = load_file_config(&cli);

    let mut config = AnalyzerConfig::default();
    if let Some(ref file) = file_config {
        file.apply_to(&mut config);
    }
    cli.apply_to(&mut config);

    if let Some(ref path) = cli.dump_descriptor {
        std::process::exit(dump_descriptor(path, &config));
    }

    let format = cli
        .format
        .or_else(|| {
            file_config
                .as_ref()
                .and_then(|f| f.output.format.as_deref())
                .and_then(|s| s.parse::<OutputFormat>().ok())
        })
        .unwrap_or_default();

    let report = match immutablecheck::run(&cli.patterns, &config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("immutablecheck: {}", e);
            let code = match e {
                CheckError::Config(_) => exit_code::CONFIG_ERROR,
                _ => exit_code::LOAD_ERROR,
            };
            std::process::exit(code);
        }
    };

    if let Err(e) = output::print_report(&report, format) {
        eprintln!("immutablecheck: failed to write output: {}", e);
        std::process::exit(exit_code::LOAD_ERROR);
    }

    std::process::exit(report.exit_code());
}

/// Load the config named by `--config`, or discover one from the working
/// directory. Exits with the config error status on a bad file.
fn load_file_config(cli: &Cli) -> Option<FileConfig> {
    if let Some(ref path) = cli.config {
        return match FileConfig::load(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("immutablecheck: {}", e);
                std::process::exit(exit_code::CONFIG_ERROR);
            }
        };
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| ".".into());
    match discover_and_load_config(&cwd) {
        Ok(Some((config, path))) => {
            debug!("using config {}", path.display());
            Some(config)
        }
        Ok(None) => None,
        Err(e) => {
            eprintln!("immutablecheck: {}", e);
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    }
}

fn dump_descriptor(path: &Path, config: &AnalyzerConfig) -> i32 {
    let decoder = config.decoder.build(config.option_number);
    match load_descriptor_set(path, decoder.as_ref()) {
        Ok(index) => {
            let stdout = std::io::stdout();
            match output::print_descriptor_index(&mut stdout.lock(), &index) {
                Ok(()) => exit_code::CLEAN,
                Err(e) => {
                    eprintln!("immutablecheck: failed to write output: {}", e);
                    exit_code::LOAD_ERROR
                }
            }
        }
        Err(e) => {
            eprintln!("immutablecheck: {}", e);
            exit_code::LOAD_ERROR
        }
    }
}
