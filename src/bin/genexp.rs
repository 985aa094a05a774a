/// genexp - Gene-level expression from a transcript quantification table
///
/// Sums read counts and TPM of all transcripts of each gene, using the
/// transcript-to-gene assignment of a GTF annotation. Ids are matched and
/// printed exactly as written, versions included.
use anyhow::{bail, Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use log::info;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tnseval::paf::open_input;
use tnseval::reference::GeneMap;

#[derive(Parser)]
#[clap(
    name = "genexp",
    about = "Extract gene expression from a transcript quantification table"
)]
struct Args {
    /// Transcript quantification table (header, then ID, count, TPM columns)
    tpm: PathBuf,

    /// Annotation GTF
    gtf: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct GeneExpression {
    count: f64,
    tpm: f64,
}

fn aggregate<R: BufRead>(reader: R, genes: &GeneMap) -> Result<IndexMap<String, GeneExpression>> {
    let mut expression: IndexMap<String, GeneExpression> = IndexMap::new();

    // first line is the header
    for (i, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 3 {
            bail!("Quantification line {} has {} columns, expected 3", i + 1, cols.len());
        }
        let count: f64 = cols[1]
            .parse()
            .with_context(|| format!("Invalid count at line {}", i + 1))?;
        let tpm: f64 = cols[2]
            .parse()
            .with_context(|| format!("Invalid TPM at line {}", i + 1))?;
        let gene = genes.gene_of(cols[0])?;

        let entry = expression.entry(gene.to_string()).or_default();
        entry.count += count;
        entry.tpm += tpm;
    }

    Ok(expression)
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Parsing GTF file {}...", args.gtf.display());
    let genes = GeneMap::from_gtf_verbatim(open_input(&args.gtf)?)?;
    let expression = aggregate(open_input(&args.tpm)?, &genes)
        .with_context(|| format!("Failed to read {}", args.tpm.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "ID\tcount\tTPM")?;
    for (gene, expr) in &expression {
        writeln!(out, "{}\t{}\t{}", gene, expr.count, expr.tpm)?;
    }

    Ok(())
}
