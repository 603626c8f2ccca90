//! Keygen command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use geocam_core::{load_or_generate, FileKeyStore, KeyStore, SignatureAlgorithm};
use tracing::{info, warn};

use crate::utils::short_fingerprint;

/// Execute the keygen command.
pub fn execute(
    keystore_path: &Path,
    algorithm: SignatureAlgorithm,
    reset: bool,
    quiet: bool,
) -> Result<()> {
    let store = FileKeyStore::new(keystore_path);

    if reset {
        let deleted = store
            .delete()
            .with_context(|| format!("Failed to write key store: {}", keystore_path.display()))?;
        if deleted {
            warn!(path = %keystore_path.display(), "Device key deleted");
            if !quiet {
                eprintln!(
                    "{}",
                    "Previous key deleted: images sealed with it will no longer verify against the new key"
                        .yellow()
                );
            }
        }
    }

    let stored = store
        .load()
        .with_context(|| format!("Failed to read key store: {}", keystore_path.display()))?;
    let existing = stored.is_some();
    let keypair = match stored {
        Some(keypair) => keypair,
        None => load_or_generate(&store, algorithm)
            .with_context(|| format!("Failed to write key store: {}", keystore_path.display()))?,
    };

    info!(
        algorithm = %keypair.algorithm(),
        fingerprint = %keypair.fingerprint(),
        existing,
        "Device key ready"
    );

    if !quiet {
        println!();
        if existing {
            println!("{}", "Device key already exists".yellow().bold());
        } else {
            println!("{}", "Device key generated".green().bold());
        }
        println!();
        println!("   {} {}", "Key store:".dimmed(), keystore_path.display());
        println!("   {} {}", "Algorithm:".dimmed(), keypair.algorithm());
        println!(
            "   {} {}",
            "Fingerprint:".dimmed(),
            short_fingerprint(&keypair.fingerprint())
        );
        println!("   {} {}", "Installation:".dimmed(), keypair.installation_id());
        println!(
            "   {} {}",
            "Public key:".dimmed(),
            keypair.public_key().to_base64()
        );
    }

    Ok(())
}
