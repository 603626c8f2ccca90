//! Capacity command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use geocam_core::{StegoCodec, StegoParams};
use tracing::info;

/// Execute the capacity command.
pub fn execute(image: &Path, t: u8, quiet: bool) -> Result<()> {
    let codec = StegoCodec::new(StegoParams::with_t(t)?)?;
    let (width, height) = image::image_dimensions(image)
        .with_context(|| format!("Failed to read image: {}", image.display()))?;

    let capacity = codec.capacity(width, height);
    let params = codec.params();
    info!(width, height, t, capacity, "Computed capacity");

    if quiet {
        println!("{capacity}");
        return Ok(());
    }

    println!();
    println!("   {} {}x{}", "Image:".dimmed(), width, height);
    println!(
        "   {} t={}, prime={}, threshold={}",
        "Parameters:".dimmed(),
        params.t,
        params.prime(),
        params.threshold
    );
    println!(
        "   {} {} code units ({}-bit)",
        "Capacity:".dimmed(),
        capacity.to_string().green().bold(),
        params.code_unit_size
    );
    Ok(())
}
