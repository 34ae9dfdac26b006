// crates/netiso-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use netiso_core::{
    io::{read_store_auto, write_store_auto, PartitionKeyStore},
    FrameSiteMode, IsolationConfig, KeyError, Nonce, PartitionKey, SchemeRegistry,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "netiso-cli",
    about = "Network partition key tool",
    long_about = "Network partition key tool.\n\nUse this tool to inspect how a (top site, frame site) pair is keyed, and to persist or restore partition keys.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Isolation config file (JSON/CBOR); environment overrides still apply
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Collapse frame sites into top sites (overrides the config)
    #[arg(long, global = true, default_value_t = false)]
    collapse_frame_site: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show the cache string, debug string, transience and persisted form of a key
    Inspect {
        /// Top-level frame URL
        #[arg(long)]
        top: String,

        /// Frame URL
        #[arg(long)]
        frame: String,

        /// Optional nonce (32 hex digits)
        #[arg(long)]
        nonce: Option<Nonce>,
    },

    /// Persist a key into a key store (created if missing)
    Encode {
        /// Top-level frame URL
        #[arg(long)]
        top: String,

        /// Frame URL
        #[arg(long)]
        frame: String,

        /// Key store path (CBOR/JSON)
        #[arg(long, default_value = "keys.json")]
        out: PathBuf,
    },

    /// Restore and print every valid key in a key store
    Decode {
        /// Key store path (CBOR/JSON)
        #[arg(long)]
        input: PathBuf,
    },

    /// Mint transient keys and check that they are pairwise distinct
    Transient {
        /// Number of keys to mint (>0)
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = resolve_config(cli.config.as_deref(), cli.collapse_frame_site)?;
    let schemes = cfg.scheme_registry().context("building scheme registry")?;
    let mode = cfg.mode();
    info!(%mode, schemes = ?schemes.registered().collect::<Vec<_>>(), "isolation config resolved");

    match cli.cmd {
        Cmd::Inspect { top, frame, nonce } => inspect(&schemes, mode, &top, &frame, nonce),
        Cmd::Encode { top, frame, out } => encode(&schemes, mode, &top, &frame, &out),
        Cmd::Decode { input } => decode(&schemes, mode, &input),
        Cmd::Transient { count } => transient(mode, count),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// File (or defaults) + environment, then the command-line switch.
fn resolve_config(path: Option<&Path>, collapse: bool) -> Result<IsolationConfig> {
    let mut cfg = match path {
        Some(p) => IsolationConfig::load(p)?,
        None => IsolationConfig::from_env(),
    };
    if collapse {
        cfg.frame_site_mode = FrameSiteMode::CollapseIntoTopSite;
    }
    Ok(cfg)
}

fn inspect(
    schemes: &SchemeRegistry,
    mode: FrameSiteMode,
    top: &str,
    frame: &str,
    nonce: Option<Nonce>,
) -> Result<()> {
    let key = PartitionKey::with_nonce(schemes.site(top), schemes.site(frame), nonce);

    println!("debug:     {}", key.to_debug_string(mode));
    println!("cache:     {:?}", key.to_cache_string(mode));
    println!("transient: {}", key.is_transient(mode));
    match key.to_value(mode) {
        Ok(v) => println!("persisted: {v}"),
        Err(err) => println!("persisted: <{err}>"),
    }
    Ok(())
}

fn encode(
    schemes: &SchemeRegistry,
    mode: FrameSiteMode,
    top: &str,
    frame: &str,
    out: &Path,
) -> Result<()> {
    let key = PartitionKey::new(schemes.site(top), schemes.site(frame));

    let mut store = if out.exists() {
        read_store_auto(out)?
    } else {
        PartitionKeyStore::new()
    };

    let added = match store.insert(&key, mode) {
        Ok(added) => added,
        Err(KeyError::Transient) => bail!(
            "{} is transient and cannot be persisted",
            key.to_debug_string(mode)
        ),
        Err(err) => return Err(err.into()),
    };
    write_store_auto(out, &store)?;

    info!(out = %out.display(), added, entries = store.len(), "key store updated");
    println!(
        "{} {} → {} ({} entries)",
        if added { "Stored" } else { "Already present:" },
        key.to_cache_string(mode),
        out.display(),
        store.len()
    );
    Ok(())
}

fn decode(schemes: &SchemeRegistry, mode: FrameSiteMode, input: &Path) -> Result<()> {
    let store = read_store_auto(input)?;
    let keys = store.restore(schemes);
    let dropped = store.len() - keys.len();
    if dropped > 0 {
        warn!(dropped, "some persisted entries were invalid");
    }

    for key in &keys {
        println!("{}", key.to_debug_string(mode));
    }
    println!(
        "Restored {} of {} entries from {}",
        keys.len(),
        store.len(),
        input.display()
    );
    Ok(())
}

fn transient(mode: FrameSiteMode, count: u32) -> Result<()> {
    let keys: HashSet<_> = (0..count)
        .map(|_| PartitionKey::create_transient().effective(mode))
        .collect();
    let distinct = u32::try_from(keys.len()).context("key count overflow")?;
    if distinct != count {
        bail!("minted {count} transient keys but only {distinct} were distinct");
    }
    println!("Minted {count} pairwise-distinct transient keys");
    Ok(())
}
