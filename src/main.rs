use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use rayon::prelude::*;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use crate::harness::TedCase;
use crate::ted::{edit_distance, zhang_shasha};

mod generator;
mod harness;
mod indexing;
mod parsing;
mod ted;

/// Tree edit distance utility for bracket-notation trees
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the JSON correctness harness over a test file
    Harness {
        /// Test file with {ID, t1, t2, d?} objects
        #[arg(long, value_name = "FILE", default_value = "tests/trees.json")]
        tests: PathBuf,
    },
    /// Computes the edit distance between two bracket-notation trees
    Compare {
        /// First tree
        t1: String,
        /// Second tree
        t2: String,
        /// Also print the Zhang-Shasha baseline distance
        #[arg(long)]
        zhang_shasha: bool,
    },
    /// Computes all-pairs distances over a dataset of trees
    Dataset {
        /// Dataset file of trees in bracket notation, one per line
        dataset_path: PathBuf,
        /// Output path for "i,j,distance" lines
        #[arg(long)]
        output: PathBuf,
    },
    /// Generates a random tree test file
    Generate {
        /// Depth bound for every generated tree
        #[arg(long, default_value_t = 3)]
        depth: u32,
        /// Number of tree pairs to generate
        #[arg(long, default_value_t = 3)]
        count: usize,
        /// RNG seed; random when absent
        #[arg(long)]
        seed: Option<u64>,
        /// Output path for the generated JSON
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let mut cmd = Cli::command();

    match cli.command {
        Commands::Harness { tests } => {
            if !tests.exists() || !tests.is_file() {
                cmd.error(
                    ErrorKind::InvalidValue,
                    "Test path does not exist or is not a valid file!",
                )
                .exit();
            }
            let failures = harness::run(&tests)?;
            if failures > 0 {
                eprintln!("{failures} case(s) FAILED");
                exit(1);
            }
        }
        Commands::Compare {
            t1,
            t2,
            zhang_shasha: with_baseline,
        } => {
            let tree1 = parsing::parse_tree(&t1)?;
            let tree2 = parsing::parse_tree(&t2)?;
            println!("apted: {}", edit_distance(&tree1, &tree2));
            if with_baseline {
                println!("zhang-shasha: {}", zhang_shasha::ted(&tree1, &tree2));
            }
        }
        Commands::Dataset {
            dataset_path,
            output,
        } => {
            if !dataset_path.exists() || !dataset_path.is_file() {
                cmd.error(
                    ErrorKind::InvalidValue,
                    "Path does not exists or is not a valid file!",
                )
                .exit();
            }
            let trees = match parsing::parse_dataset(&dataset_path) {
                Ok(trees) => trees,
                Err(e) => {
                    eprintln!("Got unexpected error: {e}");
                    exit(1);
                }
            };
            println!("Parsed {} trees", trees.len());

            let mut distances: Vec<(usize, usize, f64)> = (0..trees.len())
                .tuple_combinations::<(usize, usize)>()
                .collect_vec()
                .into_par_iter()
                .map(|(i, j)| (i, j, edit_distance(&trees[i], &trees[j])))
                .collect();
            distances.par_sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

            write_file(
                output,
                &distances
                    .iter()
                    .map(|(i, j, d)| format!("{i},{j},{d}"))
                    .collect_vec(),
            )?;
        }
        Commands::Generate {
            depth,
            count,
            seed,
            output,
        } => {
            let mut generator = match seed {
                Some(seed) => generator::TreeGenerator::with_seed(seed),
                None => generator::TreeGenerator::from_entropy(),
            };
            let cases = (0..count)
                .map(|i| TedCase {
                    id: i as u32 + 1,
                    t1: generator.bracket_tree(depth),
                    t2: generator.bracket_tree(depth),
                    d: None,
                })
                .collect_vec();

            let f = File::options()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&output)?;
            serde_json::to_writer_pretty(BufWriter::new(f), &cases)?;
            println!("Wrote {} generated pairs to {}", cases.len(), output.display());
        }
    }

    Ok(())
}

fn write_file<T>(file_name: impl AsRef<Path>, data: &[T]) -> Result<(), std::io::Error>
where
    T: Display,
{
    let f = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_name.as_ref())?;
    let mut w = BufWriter::new(f);

    for d in data.iter() {
        writeln!(w, "{d}")?;
    }
    Ok(())
}
