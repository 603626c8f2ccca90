//! Seal command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use geocam_core::{
    load_or_generate, seal_image, CaptureMetadata, ExtensionValue, FileKeyStore, KeyStore, SealOptions,
    SignatureAlgorithm, StegoParams,
};
use tracing::{debug, info};

use crate::utils::{build_output_path, load_image, short_fingerprint};

pub struct SealArgs {
    pub image: PathBuf,
    pub device_model: String,
    pub time: Option<String>,
    pub location: Option<(f64, f64)>,
    pub fields: Vec<(String, ExtensionValue)>,
    pub output: Option<PathBuf>,
    pub comment: bool,
    pub sidecar: bool,
    pub t: u8,
}

/// Execute the seal command.
pub fn execute(args: SealArgs, keystore_path: &Path, quiet: bool) -> Result<()> {
    let params = StegoParams::with_t(args.t)?;
    let image = load_image(&args.image)?;

    let mut builder = match args.time {
        Some(time) => CaptureMetadata::builder(args.device_model, time),
        None => CaptureMetadata::captured_now(args.device_model),
    };
    if let Some((latitude, longitude)) = args.location {
        builder = builder.location(latitude, longitude);
    }
    for (key, value) in args.fields {
        builder = builder.extension(key, value);
    }
    let metadata = builder.build()?;
    debug!(metadata = ?metadata, "Built capture metadata");

    let store = FileKeyStore::new(keystore_path);
    let stored = store
        .load()
        .with_context(|| format!("Failed to read key store: {}", keystore_path.display()))?;
    let keypair = match stored {
        Some(keypair) => keypair,
        None => load_or_generate(&store, SignatureAlgorithm::Ed25519)
            .with_context(|| format!("Failed to write key store: {}", keystore_path.display()))?,
    };

    let options = SealOptions {
        params,
        comment: args.comment,
        sidecar: args.sidecar,
    };
    let mut sealed = seal_image(image, &metadata, &keypair, &options)?;

    let output = args
        .output
        .unwrap_or_else(|| build_output_path(&args.image));
    sealed
        .image
        .persist(&output)
        .with_context(|| format!("Failed to write sealed image: {}", output.display()))?;

    info!(
        path = %output.display(),
        payload_len = sealed.payload_json.len(),
        "Sealed image saved"
    );

    if !quiet {
        println!();
        println!("{}", "Image sealed".green().bold());
        println!();
        println!("   {} {}", "Output:".dimmed(), output.display());
        println!("   {} {}", "Device:".dimmed(), metadata.device_model());
        println!("   {} {}", "Captured:".dimmed(), metadata.captured_at());
        if let Some(location) = metadata.location() {
            println!(
                "   {} {:.6}, {:.6}",
                "Location:".dimmed(),
                location.latitude,
                location.longitude
            );
        }
        println!(
            "   {} {} ({})",
            "Signed by:".dimmed(),
            short_fingerprint(&keypair.fingerprint()),
            keypair.algorithm()
        );
        println!(
            "   {} {} bytes",
            "Payload size:".dimmed(),
            sealed.payload_json.len()
        );
        if args.comment {
            println!("   {} {}", "Comment field:".dimmed(), "written".green());
        }
        if args.sidecar {
            println!(
                "   {} {}",
                "Sidecar:".dimmed(),
                geocam_core::sidecar_path(&output).display()
            );
        }
    }

    Ok(())
}
