//! End-to-end evaluation: reference loading, alignment classification,
//! contig accounting, finalization and report writing.

use anyhow::{ensure, Context, Result};
use log::{debug, info};
use std::io::BufRead;
use std::path::PathBuf;

use crate::batch::BatchGrouper;
use crate::classify::{BatchClassifier, EvalConfig};
use crate::fasta::read_fasta;
use crate::paf::{open_input, PafReader};
use crate::reference::{GeneMap, Reference, TpmBins, TpmQuantiles, TruthSet};
use crate::report::{
    create_output, write_fasta, write_misassemblies, write_redundant, write_transcript_list,
    ClassificationWriter,
};
use crate::tally::{ContigCounts, TallyEngine, TranscriptSummary};

/// Input files of one evaluation run
#[derive(Debug, Clone)]
pub struct EvalInputs {
    pub assembly: PathBuf,
    pub paf: PathBuf,
    pub truth: PathBuf,
    pub gtf: PathBuf,
    pub tpm: Option<PathBuf>,
    /// Prepended verbatim to every output file name
    pub outprefix: String,
}

/// Counts produced by an evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub num_contigs: usize,
    pub num_unclassified: usize,
    pub num_redundant: usize,
    pub contigs: ContigCounts,
    pub transcripts: TranscriptSummary,
    pub tpm_quantiles: Option<TpmQuantiles>,
}

/// Load the gene map, truth set and optional expression quartiles
pub fn load_reference(inputs: &EvalInputs) -> Result<Reference> {
    info!("Parsing truth file {}...", inputs.truth.display());
    let truth = TruthSet::from_reader(open_input(&inputs.truth)?)
        .with_context(|| format!("Failed to read truth file {}", inputs.truth.display()))?;
    info!("{} truth transcripts", truth.len());

    let tpm_bins = match &inputs.tpm {
        Some(path) => {
            info!("Parsing abundance file {}...", path.display());
            let bins = TpmBins::from_tsv(open_input(path)?, &truth)
                .with_context(|| format!("Failed to read abundance file {}", path.display()))?;
            let q = bins.quantiles();
            info!("TPM quantiles:");
            info!("min\tq1\tM\tq3\tmax");
            info!(
                "{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
                q.min, q.q1, q.median, q.q3, q.max
            );
            Some(bins)
        }
        None => None,
    };

    info!("Parsing GTF file {}...", inputs.gtf.display());
    let genes = GeneMap::from_gtf(open_input(&inputs.gtf)?)
        .with_context(|| format!("Failed to read GTF {}", inputs.gtf.display()))?;
    info!(
        "{} transcripts in {} genes",
        genes.num_transcripts(),
        genes.num_genes()
    );

    Ok(Reference {
        genes,
        truth,
        tpm_bins,
    })
}

/// Runs the classifier and tally engine over one alignment stream
pub struct Evaluator {
    config: EvalConfig,
    reference: Reference,
}

impl Evaluator {
    pub fn new(config: EvalConfig, reference: Reference) -> Result<Self> {
        config.validate()?;
        Ok(Evaluator { config, reference })
    }

    /// Evaluate alignments (sorted by contig) against the reference and
    /// write all reports under `outprefix`
    pub fn run<P: BufRead, A: BufRead>(
        &self,
        paf: P,
        assembly: A,
        outprefix: &str,
    ) -> Result<EvaluationReport> {
        let classifier = BatchClassifier::new(&self.config, &self.reference);
        let mut tally = TallyEngine::new(self.config.min_full_prop, &self.reference);
        let mut writer = ClassificationWriter::create(outprefix)?;

        info!("Classifying alignments...");
        let mut num_batches = 0usize;
        for batch in BatchGrouper::new(PafReader::new(paf), self.config.min_aln_len) {
            let batch = batch?;
            num_batches += 1;
            let classification = classifier
                .classify(&batch)
                .with_context(|| format!("Failed to classify contig {}", batch.query_name()))?;
            if let Some(classification) = classification {
                debug!("{:?}", classification);
                writer.write(&classification)?;
                tally.record(&classification);
            }
        }
        writer.finish()?;
        info!(
            "Classified {} contigs from {} alignment batches",
            tally.num_classified(),
            num_batches
        );

        info!("Parsing assembly...");
        let assembly = read_fasta(assembly).context("Failed to read assembly")?;
        let mut unclassified: Vec<(&str, &str)> = assembly
            .iter()
            .filter(|(id, _)| !tally.is_classified(id))
            .map(|(id, seq)| (id.as_str(), seq.as_str()))
            .collect();
        unclassified.sort_unstable_by_key(|(id, _)| *id);

        let counts = tally.counts();
        ensure!(
            counts.total() + unclassified.len() == assembly.len(),
            "{} classified and {} unclassified contigs do not add up to {} assembly contigs; \
             are there alignments for contigs missing from the assembly, or is the PAF not sorted by contig?",
            counts.total(),
            unclassified.len(),
            assembly.len()
        );

        write_fasta(
            create_output(outprefix, "unclassified_contigs.fa")?,
            unclassified.iter().copied(),
        )?;

        let transcripts = tally.finalize()?;

        for (name, category) in [
            ("complete.tsv", &transcripts.complete),
            ("partial.tsv", &transcripts.partial),
            ("missing.tsv", &transcripts.missing),
            ("false_pos.tsv", &transcripts.false_positive),
        ] {
            write_transcript_list(create_output(outprefix, name)?, &category.all)?;
        }
        write_misassemblies(
            create_output(outprefix, "intergene_misassemblies.tsv")?,
            tally.intergene_misassemblies(),
        )?;
        write_misassemblies(
            create_output(outprefix, "intragene_misassemblies.tsv")?,
            tally.intragene_misassemblies(),
        )?;
        write_redundant(create_output(outprefix, "redundant.tsv")?, tally.state())?;
        info!("Wrote reports with prefix {}", outprefix);

        Ok(EvaluationReport {
            num_contigs: assembly.len(),
            num_unclassified: unclassified.len(),
            num_redundant: tally.state().num_redundant(),
            contigs: counts,
            transcripts,
            tpm_quantiles: self.reference.tpm_bins.as_ref().map(|b| b.quantiles()),
        })
    }
}

/// Load every input from disk and run a full evaluation
pub fn evaluate(config: EvalConfig, inputs: &EvalInputs) -> Result<EvaluationReport> {
    let reference = load_reference(inputs)?;
    let evaluator = Evaluator::new(config, reference)?;

    info!("Parsing PAF file {}...", inputs.paf.display());
    let paf = open_input(&inputs.paf)?;
    let assembly = open_input(&inputs.assembly)?;
    evaluator
        .run(paf, assembly, &inputs.outprefix)
        .with_context(|| format!("Failed to evaluate {}", inputs.paf.display()))
}
