//! Print the tensor shapes of the first items of a clean/noisy manifest pair.
//!
//! Usage:
//!     cargo run --features cli --bin inspect_dataset -- sample/clean.scp sample/noisy.scp
//!     cargo run --features cli --bin inspect_dataset -- dt05_clean.scp dt05_noisy.scp -m
//!     cargo run --features cli --bin inspect_dataset -- --config dataset.json --items 4

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ibm_dataset::{DatasetConfig, DEFAULT_CHANNELS};

/// Inspect PSD / ideal-binary-mask items built from utterance manifests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Clean manifest (`<utterance_id> <wav_path>` per line)
    clean: Option<PathBuf>,

    /// Noisy manifest, same utterances in the same order
    noisy: Option<PathBuf>,

    /// Dataset config JSON; positional manifests and flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Group consecutive rows into multichannel items
    #[arg(short, long)]
    multichannel: bool,

    /// Rows per multichannel item (implies --multichannel)
    #[arg(long)]
    channels: Option<usize>,

    /// Number of items to inspect
    #[arg(short, long, default_value_t = 2)]
    items: usize,

    /// FFT size
    #[arg(long)]
    n_fft: Option<usize>,

    /// Hop length between frames
    #[arg(long)]
    hop_length: Option<usize>,

    /// Memoize items after first access
    #[arg(long)]
    cache: bool,
}

fn dataset_config(args: &Args) -> Result<DatasetConfig> {
    let manifests = match (&args.clean, &args.noisy) {
        (Some(clean), Some(noisy)) => Some((clean, noisy)),
        (None, None) => None,
        _ => bail!("CLEAN and NOISY manifests must be given together"),
    };
    let mut config = match (&args.config, manifests) {
        (Some(path), _) => DatasetConfig::from_file(path)?,
        (None, Some((clean, noisy))) => DatasetConfig::new(clean, noisy),
        (None, None) => bail!("pass either --config or both CLEAN and NOISY manifests"),
    };

    if let Some((clean, noisy)) = manifests {
        config.clean_manifest = clean.clone();
        config.noisy_manifest = noisy.clone();
    }
    if let Some(channels) = args.channels {
        config.channels = channels;
    } else if args.multichannel {
        config.channels = DEFAULT_CHANNELS;
    }
    config.cache |= args.cache;

    let ibm = &mut config.ibm;
    if let Some(n_fft) = args.n_fft {
        ibm.n_fft = n_fft;
    }
    if let Some(hop_length) = args.hop_length {
        ibm.hop_length = hop_length;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let _profiling = ibm_dataset::profiling::init();
    if _profiling.is_none() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let args = Args::parse();
    let config = dataset_config(&args)?;
    let dataset = config.build()?;

    println!(
        "{} item(s), {} row(s) per item",
        dataset.len(),
        config.channels
    );

    for index in 0..args.items.min(dataset.len()) {
        let item = dataset.get(index)?;
        println!("item {index}:");
        println!("  psd:         {:?}", item.psd.dims());
        println!("  target_mask: {:?}", item.target_mask.dims());
        println!("  noise_mask:  {:?}", item.noise_mask.dims());
    }

    Ok(())
}
