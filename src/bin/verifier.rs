//! CLI verifier
//!
//! ```text
//! verifier [--proof proof.json] (--vk verifying_key.bin | --keys DIR | --seed N)
//! ```
//!
//! Reads the prover's JSON (`proof` + `publicSignals`; extra fields are
//! ignored), runs the pairing check and exits non-zero on rejection.

#![forbid(unsafe_code)]

use std::{env, fs, path::PathBuf, process::ExitCode, sync::Arc};

use zkvc::{
    keys::{KeySource, VERIFYING_KEY_FILE},
    CommitmentHasher, Groth16Verifier, KeyRing, ProofBundle, Verifier,
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

fn run() -> anyhow::Result<bool> {
    let args: Vec<String> = env::args().collect();

    let proof_path = parse_flag(&args, "--proof").unwrap_or_else(|| "proof.json".into());
    let text = fs::read_to_string(&proof_path)
        .map_err(|e| anyhow::anyhow!("read {proof_path}: {e}"))?;
    let bundle: ProofBundle = serde_json::from_str(&text)?;

    let source = if let Some(vk) = parse_flag(&args, "--vk") {
        KeySource::VerifyingOnly(PathBuf::from(vk))
    } else if let Some(dir) = parse_flag(&args, "--keys") {
        KeySource::VerifyingOnly(PathBuf::from(dir).join(VERIFYING_KEY_FILE))
    } else {
        let seed = match parse_flag(&args, "--seed") {
            Some(s) => s.parse::<u64>().map_err(|e| anyhow::anyhow!("--seed: {e}"))?,
            None => zkvc::config::DEFAULT_SETUP_SEED,
        };
        eprintln!("Note: no --vk/--keys given; regenerating dev keys from seed {seed}.");
        KeySource::Seeded(seed)
    };

    let ring = Arc::new(KeyRing::new(source, CommitmentHasher::new()));
    let keys = ring.get_or_init()?;
    eprintln!("vk digest: {}", keys.vk_digest_hex());

    let ok = Groth16Verifier::new(ring).verify(&bundle.proof, &bundle.public_signals)?;
    let s = &bundle.public_signals;
    println!("output:     {}", s.output_u8());
    println!("modelHash:  {}", zkvc::field::to_decimal(s.model_hash));
    println!("inputHash:  {}", zkvc::field::to_decimal(s.input_hash));
    println!("verdict:    {}", if ok { "ACCEPT" } else { "REJECT" });
    Ok(ok)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "zkvc=info".into()))
        .with_target(false)
        .compact()
        .init();

    Ok(if run()? { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
