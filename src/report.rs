/// Tab-separated output of per-contig classifications and final tallies
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::classify::Classification;
use crate::evaluate::EvaluationReport;
use crate::tally::{MisassemblyPair, Quartiles, ReconstructionState, TranscriptCategory};

/// `prefix` is prepended verbatim, so "out/run1_" gives "out/run1_complete.tsv"
pub fn output_path(prefix: &str, name: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}{name}"))
}

pub fn create_output(prefix: &str, name: &str) -> Result<BufWriter<File>> {
    let path = output_path(prefix, name);
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Side reports written while the alignment stream is classified
pub struct ClassificationWriter<W: Write> {
    reconstruction: W,
    low_quality: W,
    large_indel: W,
}

impl ClassificationWriter<BufWriter<File>> {
    pub fn create(prefix: &str) -> Result<Self> {
        Self::new(
            create_output(prefix, "reconstruction.tsv")?,
            create_output(prefix, "lowquality.tsv")?,
            create_output(prefix, "largeindel.tsv")?,
        )
    }
}

impl<W: Write> ClassificationWriter<W> {
    pub fn new(mut reconstruction: W, mut low_quality: W, mut large_indel: W) -> Result<Self> {
        writeln!(reconstruction, "contig_id\ttranscript_id\treconstruction\tpercent_identity")?;
        writeln!(low_quality, "contig_id\ttranscript_id\tpercent_identity")?;
        writeln!(large_indel, "contig_id\ttranscript_id\tmax_indel")?;
        Ok(ClassificationWriter {
            reconstruction,
            low_quality,
            large_indel,
        })
    }

    /// Misassemblies are not streamed; they are written after finalization
    pub fn write(&mut self, classification: &Classification) -> Result<()> {
        match classification {
            Classification::Reconstruction {
                contig,
                transcript,
                proportion,
                identity,
            } => writeln!(
                self.reconstruction,
                "{contig}\t{transcript}\t{proportion:?}\t{identity:?}"
            )?,
            Classification::LowQuality {
                contig,
                transcript,
                identity,
            } => writeln!(self.low_quality, "{contig}\t{transcript}\t{identity:?}")?,
            Classification::LargeIndel {
                contig,
                transcript,
                max_indel,
            } => writeln!(self.large_indel, "{contig}\t{transcript}\t{max_indel}")?,
            Classification::Misassembly { .. } => {}
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(W, W, W)> {
        self.reconstruction.flush()?;
        self.low_quality.flush()?;
        self.large_indel.flush()?;
        Ok((self.reconstruction, self.low_quality, self.large_indel))
    }
}

pub fn write_transcript_list<W: Write>(mut out: W, transcripts: &[(String, f64)]) -> Result<()> {
    writeln!(out, "transcript_id\tmax_reconstruction")?;
    for (t, p) in transcripts {
        writeln!(out, "{t}\t{p:?}")?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_misassemblies<W: Write>(mut out: W, pairs: &[MisassemblyPair]) -> Result<()> {
    writeln!(out, "contig_id\ttranscript_id1\ttranscript_id2")?;
    for m in pairs {
        writeln!(out, "{}\t{}\t{}", m.contig, m.transcript1, m.transcript2)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_redundant<W: Write>(mut out: W, state: &ReconstructionState) -> Result<()> {
    writeln!(out, "transcript_id\tnum_contigs\tcontig_ids")?;
    for (t, contigs) in state.redundant() {
        writeln!(out, "{}\t{}\t{}", t, contigs.len(), contigs.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_fasta<'a, W, I>(mut out: W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (id, seq) in records {
        writeln!(out, ">{id}\n{seq}")?;
    }
    out.flush()?;
    Ok(())
}

fn write_row<W: Write>(out: &mut W, label: &str, value: impl std::fmt::Display) -> Result<()> {
    writeln!(out, "{label}\t{value}")?;
    Ok(())
}

fn write_quartile_rows<W: Write>(out: &mut W, label: &str, sizes: Option<[usize; 4]>) -> Result<()> {
    if let Some(sizes) = sizes {
        for (q, n) in sizes.iter().enumerate() {
            write_row(out, &format!("{label} (Q{})", q + 1), n)?;
        }
    }
    Ok(())
}

/// Which gene-type subset a block of summary rows describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeneSubset {
    All,
    Stg,
    Mtg,
}

impl GeneSubset {
    fn label_prefix(self) -> &'static str {
        match self {
            GeneSubset::All => "",
            GeneSubset::Stg => "STG ",
            GeneSubset::Mtg => "MTG ",
        }
    }

    fn len(self, category: &TranscriptCategory) -> usize {
        match self {
            GeneSubset::All => category.all.len(),
            GeneSubset::Stg => category.stg.len(),
            GeneSubset::Mtg => category.mtg.len(),
        }
    }

    fn quartile(self, q: &Quartiles) -> [usize; 4] {
        match self {
            GeneSubset::All => q.all,
            GeneSubset::Stg => q.stg,
            GeneSubset::Mtg => q.mtg,
        }
    }
}

fn write_transcript_block<W: Write>(
    out: &mut W,
    report: &EvaluationReport,
    subset: GeneSubset,
) -> Result<()> {
    let summary = &report.transcripts;
    let prefix = subset.label_prefix();
    let quartiles = summary.quartiles.as_ref();

    let label = format!("{prefix}complete transcripts");
    write_row(out, &label, subset.len(&summary.complete))?;
    write_quartile_rows(out, &label, quartiles.map(|q| subset.quartile(&q.complete)))?;

    let label = format!("{prefix}partial transcripts");
    write_row(out, &label, subset.len(&summary.partial))?;
    write_quartile_rows(out, &label, quartiles.map(|q| subset.quartile(&q.partial)))?;

    let label = format!("{prefix}missing transcripts");
    write_row(out, &label, subset.len(&summary.missing))?;
    write_quartile_rows(out, &label, quartiles.map(|q| subset.quartile(&q.missing)))?;

    write_row(
        out,
        &format!("{prefix}false-positive transcripts"),
        subset.len(&summary.false_positive),
    )?;

    let mis = &summary.misassemblies;
    let (intra, inter) = match subset {
        GeneSubset::All => (mis.intragene(), mis.intergene()),
        GeneSubset::Stg => (mis.intragene_stg, mis.intergene_stg),
        GeneSubset::Mtg => (mis.intragene_mtg, mis.intergene_mtg),
    };
    write_row(out, &format!("{prefix}intra-gene misassemblies"), intra)?;
    write_row(out, &format!("{prefix}inter-gene misassemblies"), inter)?;
    write_row(out, &format!("{prefix}total misassemblies"), intra + inter)?;
    Ok(())
}

/// Human-readable `label<TAB>value` summary of an evaluation
pub fn write_summary<W: Write>(mut out: W, report: &EvaluationReport) -> Result<()> {
    let counts = &report.contigs;
    write_row(&mut out, "total contigs", report.num_contigs)?;
    write_row(&mut out, "complete contigs", counts.complete)?;
    write_row(&mut out, "partial contigs", counts.partial)?;
    write_row(&mut out, "misassembled contigs", counts.misassembled)?;
    write_row(&mut out, "false-positive contigs", counts.false_positive)?;
    write_row(&mut out, "large-indel contigs", counts.large_indel)?;
    write_row(&mut out, "low-quality contigs", counts.low_quality)?;
    write_row(&mut out, "unclassified contigs", report.num_unclassified)?;
    write_row(&mut out, "redundant reconstructions", report.num_redundant)?;

    for subset in [GeneSubset::All, GeneSubset::Stg, GeneSubset::Mtg] {
        write_transcript_block(&mut out, report, subset)?;
    }

    out.flush()?;
    Ok(())
}
