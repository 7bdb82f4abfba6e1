//! Key setup CLI
//!
//! Runs the circuit-specific Groth16 setup and writes
//! `proving_key.bin` + `verifying_key.bin` (magic + u16 version +
//! ark-compressed key) into `--out` (default `./keys`).
//!
//! ```text
//! setup [--out DIR] [--seed N]
//! ```
//!
//! Without `--seed` the setup randomness comes from the OS. With it, the keys
//! are reproducible and therefore only fit for development.

#![forbid(unsafe_code)]

use std::{env, path::PathBuf};

use rand::rngs::OsRng;
use zkvc::{
    keys::{PROVING_KEY_FILE, VERIFYING_KEY_FILE},
    CircuitKeys, CommitmentHasher,
};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "zkvc=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let out = PathBuf::from(parse_flag(&args, "--out").unwrap_or_else(|| "keys".into()));
    let seed = parse_flag(&args, "--seed")
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("--seed must be a u64 (got `{s}`)"))
        })
        .transpose()?;

    let hasher = CommitmentHasher::new();
    let keys = match seed {
        Some(seed) => {
            eprintln!("WARNING: seeded setup ({seed}); anyone with the seed can forge proofs.");
            CircuitKeys::from_seed(&hasher, seed)?
        }
        None => CircuitKeys::generate(&hasher, &mut OsRng)?,
    };
    keys.save(&out)?;

    println!("wrote {}", out.join(PROVING_KEY_FILE).display());
    println!("wrote {}", out.join(VERIFYING_KEY_FILE).display());
    println!("public inputs: {}", keys.num_public_inputs());
    println!("vk digest:     {}", keys.vk_digest_hex());
    Ok(())
}
