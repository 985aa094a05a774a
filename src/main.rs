use anyhow::Result;
use clap::Parser;
use log::info;
use std::io;
use std::path::PathBuf;

use tnseval::classify::EvalConfig;
use tnseval::evaluate::{evaluate, EvalInputs};
use tnseval::report::write_summary;

/// Parse a number that may have metric suffix (k/K=1000, m/M=1e6, g/G=1e9)
fn parse_metric_number(s: &str) -> Result<u32, String> {
    if s.is_empty() {
        return Err("Empty string".to_string());
    }

    let (num_part, suffix) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - c.len_utf8()], Some(c)),
        _ => (s, None),
    };

    let base: f64 = num_part
        .parse()
        .map_err(|e| format!("Invalid number: {e}"))?;

    let multiplier = match suffix {
        Some('k') | Some('K') => 1000.0,
        Some('m') | Some('M') => 1_000_000.0,
        Some('g') | Some('G') => 1_000_000_000.0,
        Some(c) => {
            return Err(format!(
                "Unknown suffix '{c}'. Use k/K (1000), m/M (1e6), or g/G (1e9)"
            ))
        }
        None => 1.0,
    };

    let result = base * multiplier;

    if result < 0.0 {
        return Err(format!("Value {result} must not be negative"));
    }
    if result > u32::MAX as f64 {
        return Err(format!("Value {result} too large for u32"));
    }

    Ok(result as u32)
}

/// tnseval - Evaluate transcriptome assembly quality
///
/// Classifies every assembled contig from its alignments to the annotated
/// transcripts (PAF, sorted by contig) and tallies complete, partial and
/// missing truth transcripts.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Assembly FASTA file
    assembly: PathBuf,

    /// Contig-to-transcript alignments (PAF, grouped by contig)
    paf: PathBuf,

    /// Truth transcript IDs, one per line
    truth: PathBuf,

    /// Annotation GTF
    gtf: PathBuf,

    /// Output prefix, prepended verbatim to every output file name
    outprefix: String,

    /// Minimum length proportion for full-length transcripts
    #[clap(long = "full-prop", default_value = "0.95")]
    full_prop: f64,

    /// Minimum alignment percent identity
    #[clap(long = "aln-pid", default_value = "0.95")]
    aln_pid: f64,

    /// Minimum alignment block length
    #[clap(long = "aln-len", default_value = "100", value_parser = parse_metric_number)]
    aln_len: u32,

    /// Maximum alignment indel
    #[clap(long = "aln-indel", default_value = "70")]
    aln_indel: u32,

    /// Do not check alignment indel sizes
    #[clap(long = "no-indel-filter")]
    no_indel_filter: bool,

    /// Transcript expression TSV (with ID and TPM columns)
    #[clap(long = "tpm", value_name = "TSV")]
    tpm: Option<PathBuf>,

    /// Quiet mode (warnings and errors only)
    #[clap(long = "quiet")]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let config = EvalConfig {
        min_full_prop: args.full_prop,
        min_pid: args.aln_pid,
        min_aln_len: args.aln_len,
        max_indel: if args.no_indel_filter {
            None
        } else {
            Some(args.aln_indel)
        },
    };

    let inputs = EvalInputs {
        assembly: args.assembly,
        paf: args.paf,
        truth: args.truth,
        gtf: args.gtf,
        tpm: args.tpm,
        outprefix: args.outprefix,
    };

    let start = std::time::Instant::now();
    let report = evaluate(config, &inputs)?;
    write_summary(io::stdout().lock(), &report)?;
    info!("Elapsed time: {:.3?}", start.elapsed());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_number() {
        assert_eq!(parse_metric_number("150"), Ok(150));
        assert_eq!(parse_metric_number("1k"), Ok(1000));
        assert_eq!(parse_metric_number("1.5K"), Ok(1500));
        assert!(parse_metric_number("").is_err());
        assert!(parse_metric_number("10q").is_err());
        assert!(parse_metric_number("-5").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["tnseval", "asm.fa", "aln.paf", "truth.txt", "ref.gtf", "out_"]);
        assert_eq!(args.full_prop, 0.95);
        assert_eq!(args.aln_len, 100);
        assert_eq!(args.aln_indel, 70);
        assert!(!args.no_indel_filter);
        assert!(args.tpm.is_none());
    }
}
