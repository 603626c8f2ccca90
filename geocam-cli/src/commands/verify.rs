//! Verify command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use geocam_core::{
    CaptureMetadata, PublicKey, RemoteVerifier, RemoteVerifierConfig, SignatureAlgorithm,
    StegoParams, VerificationEngine, VerificationResult, VerificationService, VerifyImageRequest,
};
use tracing::{debug, error, info};

use crate::utils::{load_image, short_fingerprint};

pub struct VerifyArgs {
    pub image: PathBuf,
    pub sidecar: Option<PathBuf>,
    pub trusted_key: Option<(SignatureAlgorithm, String)>,
    pub json: bool,
    pub t: u8,
}

/// Outcome shared by local and remote verification, for printing.
enum Verdict {
    Authentic,
    Tampered,
    NoPayload,
}

/// Execute the verify command against the local engine.
pub fn execute(args: VerifyArgs, quiet: bool) -> Result<()> {
    let mut image = load_image(&args.image)?;
    if let Some(sidecar) = &args.sidecar {
        let bytes = std::fs::read(sidecar)
            .with_context(|| format!("Failed to read sidecar: {}", sidecar.display()))?;
        image = image.with_sidecar_bytes(bytes);
    }

    let mut engine = VerificationEngine::with_params(StegoParams::with_t(args.t)?)?;
    if let Some((algorithm, encoded)) = &args.trusted_key {
        let key = PublicKey::from_base64(*algorithm, encoded).context("Invalid trusted key")?;
        debug!(fingerprint = %key.fingerprint(), "Using pinned device key");
        engine = engine.with_trusted_key(key);
    }

    let result = engine.verify(&image);
    let verdict = verdict_of(&result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        print_local(&result, &verdict);
    }
    finish(verdict, &result.message)
}

/// Execute the verify command through a remote decode service.
pub async fn execute_remote(args: VerifyArgs, url: String, quiet: bool) -> Result<()> {
    let image = load_image(&args.image)?;
    let verifier = RemoteVerifier::with_config(RemoteVerifierConfig {
        base_url: url,
        timeout: Duration::from_secs(30),
    })?;

    info!(service = verifier.service_name(), endpoint = verifier.endpoint(), "Verifying remotely");
    let response = verifier
        .verify_image(&VerifyImageRequest::from_image_bytes(image.bytes()))
        .await
        .context("Remote verification request failed")?;

    let (verdict, message, info) = match &response.verification_result {
        Some(inner) if inner.signature_valid => {
            (Verdict::Authentic, inner.message.clone(), Some(inner))
        }
        Some(inner) if response.success => (Verdict::Tampered, inner.message.clone(), None),
        Some(inner) => (Verdict::NoPayload, inner.message.clone(), None),
        None if response.success => (Verdict::Tampered, String::new(), None),
        None => (Verdict::NoPayload, String::new(), None),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if !quiet {
        print_banner(&verdict);
        println!("   {} {}", "Service:".dimmed(), verifier.endpoint());
        if !message.is_empty() {
            println!("   {} {}", "Message:".dimmed(), message);
        }
        if let Some(inner) = info {
            match inner.capture_metadata() {
                Some(metadata) => print_metadata(&metadata),
                None => print_decoded_info(inner.decoded_info.iter().flatten()),
            }
        }
    }
    finish(verdict, &message)
}

fn verdict_of(result: &VerificationResult) -> Verdict {
    if result.is_authentic() {
        Verdict::Authentic
    } else if result.payload_found {
        Verdict::Tampered
    } else {
        Verdict::NoPayload
    }
}

fn finish(verdict: Verdict, message: &str) -> Result<()> {
    match verdict {
        Verdict::Authentic => {
            info!("Verification successful");
            Ok(())
        }
        Verdict::Tampered => {
            error!(reason = %message, "Signature verification failed");
            bail!("Verification failed: {message}")
        }
        Verdict::NoPayload => {
            info!("No payload in any carrier");
            bail!("No payload found: {message}")
        }
    }
}

fn print_banner(verdict: &Verdict) {
    println!();
    match verdict {
        Verdict::Authentic => {
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!(
                "{}",
                "║              AUTHENTIC                 ║".green().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".green());
        }
        Verdict::Tampered => {
            println!("{}", "╔════════════════════════════════════════╗".red());
            println!(
                "{}",
                "║              TAMPERED                  ║".red().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".red());
        }
        Verdict::NoPayload => {
            println!("{}", "╔════════════════════════════════════════╗".yellow());
            println!(
                "{}",
                "║              NO PAYLOAD                ║".yellow().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".yellow());
        }
    }
    println!();
}

fn print_local(result: &VerificationResult, verdict: &Verdict) {
    print_banner(verdict);
    println!("   {} {}", "Carrier:".dimmed(), result.carrier_used);

    match verdict {
        Verdict::Authentic => println!("   {} {}", "Signature:".dimmed(), "Valid".green()),
        Verdict::Tampered => println!("   {} {}", "Signature:".dimmed(), result.message.red()),
        Verdict::NoPayload => println!("   {} {}", "Message:".dimmed(), result.message),
    }
    if let Some(algorithm) = result.algorithm {
        println!("   {} {}", "Algorithm:".dimmed(), algorithm);
    }
    if let Some(fingerprint) = &result.fingerprint {
        if !fingerprint.is_empty() {
            println!(
                "   {} {}",
                "Signed by:".dimmed(),
                short_fingerprint(fingerprint)
            );
        }
    }
    if let Some(metadata) = &result.decoded_metadata {
        print_metadata(metadata);
    }
}

fn print_decoded_info<'a>(fields: impl Iterator<Item = (&'a String, &'a serde_json::Value)>) {
    for (key, value) in fields {
        let label = format!("{key}:");
        match value {
            serde_json::Value::String(text) => println!("   {} {}", label.dimmed(), text),
            other => println!("   {} {}", label.dimmed(), other),
        }
    }
}

fn print_metadata(metadata: &CaptureMetadata) {
    println!("   {} {}", "Device:".dimmed(), metadata.device_model());
    println!("   {} {}", "Captured:".dimmed(), metadata.captured_at());
    if let Some(location) = metadata.location() {
        println!(
            "   {} {:.6}, {:.6}",
            "Location:".dimmed(),
            location.latitude,
            location.longitude
        );
        if let Ok(hash) = location.geohash(7) {
            println!("   {} {}", "Geohash:".dimmed(), hash);
        }
    }
    for (key, value) in metadata.extensions() {
        println!("   {} {}", format!("{key}:").dimmed(), value);
    }
}
