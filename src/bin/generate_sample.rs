use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use phone_price_explorer::data::loader::{write_csv, write_parquet};
use phone_price_explorer::data::synthetic::generate_phones;

/// Write a synthetic phone dataset (train and test tables) in the Kaggle layout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = "data")]
    out: PathBuf,

    /// Labelled training rows
    #[arg(long, default_value_t = 2000)]
    train_rows: usize,

    /// Unlabelled test rows
    #[arg(long, default_value_t = 1000)]
    test_rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Also write train.parquet / test.parquet
    #[arg(long)]
    parquet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let train = generate_phones(args.train_rows, args.seed, true)?;
    let test = generate_phones(args.test_rows, args.seed.wrapping_add(1), false)?;

    write_csv(&train, &args.out.join("train.csv"))?;
    write_csv(&test, &args.out.join("test.csv"))?;
    if args.parquet {
        write_parquet(&train, &args.out.join("train.parquet"))?;
        write_parquet(&test, &args.out.join("test.parquet"))?;
    }

    println!(
        "Wrote {} training and {} test phones to {}",
        train.len(),
        test.len(),
        args.out.display()
    );
    Ok(())
}
