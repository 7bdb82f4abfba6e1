//! CLI prover
//!
//! ```text
//! prover --model model.json --input input.json [--out proof.json]
//!        [--keys DIR | --seed N] [--mock]
//! ```
//!
//! Writes a `ProveResponse` JSON document (proof, publicSignals, output,
//! modelHash, inputHash). With no arguments it proves the reference vector
//! `w = [1..8], b = 0, x = [1,0,1,0,1,0,1,0]`, whose output is 1.

#![forbid(unsafe_code)]

use std::{env, fs, path::Path, sync::Arc};

use zkvc::{
    keys::KeySource, prover::generate_proof, CommitmentHasher, Groth16Prover, InputData, KeyRing,
    MockProver, ModelData, ModelKind, ProveResponse, Prover,
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

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "zkvc=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();

    let model: ModelData = match parse_flag(&args, "--model") {
        Some(p) => ModelKind::from_json(read_json(Path::new(&p))?)?.into_linear(),
        None => ModelData::from_ints(&[1, 2, 3, 4, 5, 6, 7, 8], 0),
    };
    let input: InputData = match parse_flag(&args, "--input") {
        Some(p) => InputData::from_json(read_json(Path::new(&p))?)?,
        None => InputData::from_ints(&[1, 0, 1, 0, 1, 0, 1, 0]),
    };

    let hasher = CommitmentHasher::new();
    let prover: Box<dyn Prover> = if args.iter().any(|a| a == "--mock") {
        eprintln!("(mock) emitting a placeholder proof; it will not pass a pairing check");
        Box::new(MockProver::new(hasher))
    } else {
        let source = match (parse_flag(&args, "--keys"), parse_flag(&args, "--seed")) {
            (Some(dir), _) => KeySource::Files(dir.into()),
            (None, seed) => KeySource::Seeded(
                seed.map(|s| s.parse::<u64>())
                    .transpose()
                    .map_err(|e| anyhow::anyhow!("--seed: {e}"))?
                    .unwrap_or(zkvc::config::DEFAULT_SETUP_SEED),
            ),
        };
        Box::new(Groth16Prover::new(Arc::new(KeyRing::new(source, hasher))))
    };

    let bundle = generate_proof(prover.as_ref(), &model, &input)?;
    let resp = ProveResponse::from(bundle);

    println!("output:     {}", resp.output);
    println!("modelHash:  {}", resp.model_hash);
    println!("inputHash:  {}", resp.input_hash);

    let out = parse_flag(&args, "--out").unwrap_or_else(|| "proof.json".into());
    fs::write(&out, serde_json::to_string_pretty(&resp)?)?;
    println!("wrote {out}");
    Ok(())
}
