//! GeoCam CLI - seal photographs with signed capture metadata and verify them.

use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use geocam_core::SignatureAlgorithm;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "geocam")]
#[command(author, version, about = "Authenticated geotagged photographs", long_about = None)]
#[command(after_help = exit_codes::HELP_TEXT)]
struct Cli {
    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path of the device key store
    #[arg(
        long,
        global = true,
        env = "GEOCAM_KEYSTORE",
        default_value = "geocam.keystore",
        value_name = "PATH"
    )]
    keystore: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the device key pair if it does not exist yet
    Keygen {
        /// Signature algorithm for a new key
        #[arg(short, long, default_value = "ed25519")]
        algorithm: SignatureAlgorithm,

        /// Delete the existing key and generate a new one
        #[arg(long)]
        reset: bool,
    },

    /// Sign capture metadata and embed it into an image
    Seal {
        /// Path to the source image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Device model recorded in the metadata
        #[arg(long, value_name = "MODEL")]
        device_model: String,

        /// Capture time (defaults to now, RFC 3339 UTC)
        #[arg(long, value_name = "TIME")]
        time: Option<String>,

        /// Latitude in decimal degrees
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude in decimal degrees
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Extra metadata field, repeatable (key=value)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = utils::parse_field)]
        fields: Vec<(String, geocam_core::ExtensionValue)>,

        /// Output path (defaults to <IMAGE stem>.sealed.png)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Also write the payload into the image comment field
        #[arg(long)]
        comment: bool,

        /// Also write the payload into a <OUTPUT>.sig sidecar file
        #[arg(long)]
        sidecar: bool,

        /// Bits per alpha symbol (1-7)
        #[arg(short, default_value_t = geocam_core::stego::DEFAULT_T)]
        t: u8,
    },

    /// Verify an image's embedded capture metadata
    Verify {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Sidecar file (defaults to <IMAGE>.sig when present)
        #[arg(long, value_name = "PATH")]
        sidecar: Option<PathBuf>,

        /// Pinned device public key, base64
        #[arg(long, value_name = "B64")]
        trusted_key: Option<String>,

        /// Algorithm of the pinned key
        #[arg(long, default_value = "ed25519", requires = "trusted_key")]
        trusted_key_algorithm: SignatureAlgorithm,

        /// Verify through a remote decode service instead of locally
        #[arg(long, value_name = "URL", conflicts_with_all = ["trusted_key", "sidecar"])]
        remote: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Bits per alpha symbol (1-7)
        #[arg(short, default_value_t = geocam_core::stego::DEFAULT_T)]
        t: u8,
    },

    /// Show how many code units an image can hold
    Capacity {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Bits per alpha symbol (1-7)
        #[arg(short, default_value_t = geocam_core::stego::DEFAULT_T)]
        t: u8,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(exit_codes::USAGE_ERROR);
            }
        },
    };

    init_tracing(cli.verbose, cli.quiet);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Keygen { algorithm, reset } => {
            commands::keygen::execute(&cli.keystore, algorithm, reset, quiet)
        }
        Commands::Seal {
            image,
            device_model,
            time,
            lat,
            lon,
            fields,
            output,
            comment,
            sidecar,
            t,
        } => commands::seal::execute(
            commands::seal::SealArgs {
                image,
                device_model,
                time,
                location: lat.zip(lon),
                fields,
                output,
                comment,
                sidecar,
                t,
            },
            &cli.keystore,
            quiet,
        ),
        Commands::Verify {
            image,
            sidecar,
            trusted_key,
            trusted_key_algorithm,
            remote,
            json,
            t,
        } => {
            let args = commands::verify::VerifyArgs {
                image,
                sidecar,
                trusted_key: trusted_key.map(|key| (trusted_key_algorithm, key)),
                json,
                t,
            };
            match remote {
                Some(url) => commands::verify::execute_remote(args, url, quiet).await,
                None => commands::verify::execute(args, quiet),
            }
        }
        Commands::Capacity { image, t } => commands::capacity::execute(&image, t, quiet),
    }
}
