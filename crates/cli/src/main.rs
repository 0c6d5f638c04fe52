use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cdb", version, about = "Constant database utility")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a table from key<TAB>value lines
    Build {
        /// Path of the table to create
        db: PathBuf,
        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Print the value stored under a key
    Get {
        db: PathBuf,
        key: String,
        /// Which occurrence of the key to fetch (0-based)
        #[arg(long, default_value_t = 0)]
        record: u64,
    },
    /// Print how many values are stored under a key
    Count { db: PathBuf, key: String },
    /// Print every record as key<TAB>value lines, in insertion order
    Dump { db: PathBuf },
    /// Print summary statistics for a table
    Stats { db: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build { db, input } => {
            commands::build(&db, input.as_deref())?;
        }
        Command::Get { db, key, record } => {
            match commands::get(&db, key.as_bytes(), record)? {
                Some(value) => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    out.write_all(&value)?;
                    out.write_all(b"\n")?;
                }
                None => {
                    eprintln!("{}: not found", key);
                    std::process::exit(1);
                }
            }
        }
        Command::Count { db, key } => {
            println!("{}", commands::count(&db, key.as_bytes())?);
        }
        Command::Dump { db } => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            commands::dump(&db, &mut out)?;
            out.flush()?;
        }
        Command::Stats { db } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            commands::stats(&db, &mut out)?;
        }
    }
    Ok(())
}
