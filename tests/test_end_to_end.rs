/// End-to-end evaluation tests
///
/// Runs the full pipeline on a small annotated fixture covering every
/// contig category and checks counts and written reports.
use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::process::Command;
use tempfile::TempDir;

use tnseval::classify::EvalConfig;
use tnseval::evaluate::{evaluate, EvalInputs};
use tnseval::tally::ContigCounts;

use test_utils::*;

fn inputs(fixture: &Fixture, with_tpm: bool) -> EvalInputs {
    EvalInputs {
        assembly: fixture.assembly.clone(),
        paf: fixture.paf.clone(),
        truth: fixture.truth.clone(),
        gtf: fixture.gtf.clone(),
        tpm: with_tpm.then(|| fixture.tpm.clone()),
        outprefix: fixture.outprefix.clone(),
    }
}

fn ids(list: &[(String, f64)]) -> Vec<&str> {
    list.iter().map(|(t, _)| t.as_str()).collect()
}

#[test]
fn test_contig_categories() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());
    let report = evaluate(EvalConfig::default(), &inputs(&fixture, false))?;

    assert_eq!(
        report.contigs,
        ContigCounts {
            complete: 2,
            partial: 1,
            misassembled: 1,
            false_positive: 1,
            low_quality: 1,
            large_indel: 1,
        }
    );
    assert_eq!(report.num_contigs, 9);
    assert_eq!(report.num_unclassified, 2);
    assert_eq!(
        report.contigs.total() + report.num_unclassified,
        report.num_contigs
    );
    assert_eq!(report.num_redundant, 1);
    Ok(())
}

#[test]
fn test_transcript_categories() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());
    let report = evaluate(EvalConfig::default(), &inputs(&fixture, false))?;
    let t = &report.transcripts;

    assert_eq!(ids(&t.complete.all), vec!["tA1"]);
    assert_eq!(ids(&t.complete.mtg), vec!["tA1"]);
    assert_eq!(ids(&t.partial.all), vec!["tB1"]);
    assert_eq!(ids(&t.partial.stg), vec!["tB1"]);
    assert_eq!(ids(&t.missing.all), vec!["tA2", "tC1"]);
    assert_eq!(ids(&t.missing.mtg), vec!["tA2"]);
    assert_eq!(ids(&t.missing.stg), vec!["tC1"]);
    assert_eq!(ids(&t.false_positive.all), vec!["fp1"]);
    assert_eq!(
        t.complete.len() + t.partial.len() + t.missing.len(),
        TRUTH.lines().count()
    );

    assert_eq!(t.misassemblies.intergene_mtg, 1);
    assert_eq!(t.misassemblies.total(), 1);
    assert!(t.quartiles.is_none());
    Ok(())
}

#[test]
fn test_written_reports() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());
    evaluate(EvalConfig::default(), &inputs(&fixture, false))?;

    assert_eq!(
        read_output(&fixture, "complete.tsv"),
        "transcript_id\tmax_reconstruction\ntA1\t1.0\n"
    );
    assert_eq!(
        read_output(&fixture, "partial.tsv"),
        "transcript_id\tmax_reconstruction\ntB1\t0.5\n"
    );
    assert_eq!(
        read_output(&fixture, "intergene_misassemblies.tsv"),
        "contig_id\ttranscript_id1\ttranscript_id2\nc4\ttA2\ttC1\n"
    );
    assert_eq!(
        read_output(&fixture, "intragene_misassemblies.tsv"),
        "contig_id\ttranscript_id1\ttranscript_id2\n"
    );
    assert_eq!(
        read_output(&fixture, "redundant.tsv"),
        "transcript_id\tnum_contigs\tcontig_ids\ntA1\t2\tc1 c2\n"
    );
    assert_eq!(
        read_output(&fixture, "largeindel.tsv"),
        "contig_id\ttranscript_id\tmax_indel\nc6\ttB1\t80\n"
    );
    assert_eq!(
        read_output(&fixture, "lowquality.tsv"),
        "contig_id\ttranscript_id\tpercent_identity\nc5\ttC1\t0.8\n"
    );
    assert_eq!(
        read_output(&fixture, "unclassified_contigs.fa"),
        ">c8\nACGTACGTAC\n>c9\nACGTACGTAC\n"
    );

    let reconstruction = read_output(&fixture, "reconstruction.tsv");
    let contigs: Vec<&str> = reconstruction
        .lines()
        .skip(1)
        .map(|l| l.split('\t').next().unwrap())
        .collect();
    assert_eq!(contigs, vec!["c1", "c2", "c3", "c7"]);
    Ok(())
}

#[test]
fn test_expression_quartiles() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());
    let report = evaluate(EvalConfig::default(), &inputs(&fixture, true))?;

    // truth TPMs 1, 2, 3, 4: q1 = 2, median = 3, q3 = 4
    let q = report.tpm_quantiles.unwrap();
    assert_eq!((q.min, q.q1, q.median, q.q3, q.max), (1.0, 2.0, 3.0, 4.0, 4.0));

    let quartiles = report.transcripts.quartiles.unwrap();
    assert_eq!(quartiles.complete.all, [1, 0, 0, 0]);
    assert_eq!(quartiles.partial.all, [0, 1, 0, 0]);
    assert_eq!(quartiles.missing.all, [1, 0, 1, 0]);
    assert_eq!(quartiles.missing.mtg, [1, 0, 0, 0]);
    assert_eq!(quartiles.missing.stg, [0, 0, 1, 0]);
    Ok(())
}

#[test]
fn test_lenient_thresholds() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());
    let config = EvalConfig {
        min_pid: 0.7,
        min_aln_len: 50,
        max_indel: None,
        ..EvalConfig::default()
    };
    let report = evaluate(config, &inputs(&fixture, false))?;

    // c5 passes identity, c6 is no longer indel-checked, c8 is long enough
    assert_eq!(report.contigs.low_quality, 0);
    assert_eq!(report.contigs.large_indel, 0);
    assert_eq!(report.num_unclassified, 1);
    assert_eq!(report.contigs.partial, 4);
    Ok(())
}

#[test]
fn test_gzipped_alignments() -> Result<()> {
    let dir = TempDir::new()?;
    let mut fixture = write_fixture(dir.path());

    let gz_path = dir.path().join("aln.paf.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    encoder.write_all((paf_records().join("\n") + "\n").as_bytes())?;
    encoder.finish()?;
    fixture.paf = gz_path;

    let report = evaluate(EvalConfig::default(), &inputs(&fixture, false))?;
    assert_eq!(report.contigs.total(), 7);
    Ok(())
}

#[test]
fn test_binary_summary() -> Result<()> {
    let dir = TempDir::new()?;
    let fixture = write_fixture(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_tnseval"))
        .arg(&fixture.assembly)
        .arg(&fixture.paf)
        .arg(&fixture.truth)
        .arg(&fixture.gtf)
        .arg(&fixture.outprefix)
        .arg("--tpm")
        .arg(&fixture.tpm)
        .arg("--quiet")
        .output()?;

    assert!(
        output.status.success(),
        "tnseval failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    for expected in [
        "total contigs\t9",
        "complete contigs\t2",
        "unclassified contigs\t2",
        "redundant reconstructions\t1",
        "complete transcripts\t1",
        "complete transcripts (Q1)\t1",
        "missing transcripts (Q3)\t1",
        "false-positive transcripts\t1",
        "inter-gene misassemblies\t1",
        "STG partial transcripts\t1",
        "STG total misassemblies\t0",
        "MTG inter-gene misassemblies\t1",
    ] {
        assert!(lines.contains(&expected), "missing '{expected}' in:\n{stdout}");
    }
    Ok(())
}
