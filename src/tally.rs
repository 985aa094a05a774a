//! Accumulation of per-contig classifications into per-transcript results.
//!
//! The [`TallyEngine`] owns all running state of an evaluation: the best
//! reconstruction proportion seen for every transcript, the contigs that
//! completely reconstruct each transcript, per-category contig counters and
//! the misassembly lists. Once the alignment stream is exhausted,
//! [`TallyEngine::finalize`] sorts every truth transcript into complete,
//! partial or missing, collects false positives, and splits each category
//! by single- vs multi-transcript gene and (optionally) expression quartile.

use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashSet;

use crate::classify::Classification;
use crate::reference::{Reference, TpmBins};

/// Best reconstruction per transcript, and who reconstructed it completely
#[derive(Debug, Clone, Default)]
pub struct ReconstructionState {
    best: IndexMap<String, f64>,
    complete_contigs: IndexMap<String, Vec<String>>,
    num_redundant: usize,
}

impl ReconstructionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `contig` reconstructs `proportion` of `transcript`.
    /// Stored proportions only ever grow.
    pub fn update(&mut self, transcript: &str, contig: &str, proportion: f64, min_full_prop: f64) {
        match self.best.get_mut(transcript) {
            None => {
                self.best.insert(transcript.to_string(), proportion);
            }
            Some(best) => {
                let previous = *best;
                if proportion > previous {
                    *best = proportion;
                }
                if proportion >= min_full_prop && previous >= min_full_prop {
                    self.num_redundant += 1;
                }
            }
        }

        if proportion >= min_full_prop {
            self.complete_contigs
                .entry(transcript.to_string())
                .or_default()
                .push(contig.to_string());
        }
    }

    pub fn best(&self, transcript: &str) -> Option<f64> {
        self.best.get(transcript).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.best.iter().map(|(t, p)| (t.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Contigs that reconstruct `transcript` completely, in stream order
    pub fn complete_contigs(&self, transcript: &str) -> &[String] {
        self.complete_contigs
            .get(transcript)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Transcripts completely reconstructed by more than one contig
    pub fn redundant(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.complete_contigs
            .iter()
            .filter(|(_, contigs)| contigs.len() > 1)
            .map(|(t, contigs)| (t.as_str(), contigs.as_slice()))
    }

    /// Number of complete reconstructions beyond the first per transcript
    pub fn num_redundant(&self) -> usize {
        self.num_redundant
    }
}

/// Number of contigs in each classification category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContigCounts {
    pub complete: usize,
    pub partial: usize,
    pub misassembled: usize,
    pub false_positive: usize,
    pub low_quality: usize,
    pub large_indel: usize,
}

impl ContigCounts {
    pub fn total(&self) -> usize {
        self.complete
            + self.partial
            + self.misassembled
            + self.false_positive
            + self.low_quality
            + self.large_indel
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisassemblyPair {
    pub contig: String,
    pub transcript1: String,
    pub transcript2: String,
}

/// Transcripts of one category with their best proportion, split by gene type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptCategory {
    pub all: Vec<(String, f64)>,
    pub stg: Vec<(String, f64)>,
    pub mtg: Vec<(String, f64)>,
}

impl TranscriptCategory {
    fn push(&mut self, transcript: &str, proportion: f64, is_mtg: bool) {
        let entry = (transcript.to_string(), proportion);
        if is_mtg {
            self.mtg.push(entry.clone());
        } else {
            self.stg.push(entry.clone());
        }
        self.all.push(entry);
    }

    fn sort_by_proportion(&mut self) {
        for list in [&mut self.all, &mut self.stg, &mut self.mtg] {
            list.sort_by_key(|(_, p)| Reverse(OrderedFloat(*p)));
        }
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    fn quartiles(&self, bins: &TpmBins) -> Result<Quartiles> {
        let ids = |list: &[(String, f64)]| -> Result<[usize; 4]> {
            bins.quartile_sizes(list.iter().map(|(t, _)| t.as_str()))
        };
        Ok(Quartiles {
            all: ids(&self.all)?,
            stg: ids(&self.stg)?,
            mtg: ids(&self.mtg)?,
        })
    }
}

/// Per-quartile transcript counts of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quartiles {
    pub all: [usize; 4],
    pub stg: [usize; 4],
    pub mtg: [usize; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryQuartiles {
    pub complete: Quartiles,
    pub partial: Quartiles,
    pub missing: Quartiles,
}

/// Misassembly counts split by gene type; a pair counts as MTG when either
/// transcript comes from a multi-transcript gene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MisassemblyCounts {
    pub intragene_stg: usize,
    pub intragene_mtg: usize,
    pub intergene_stg: usize,
    pub intergene_mtg: usize,
}

impl MisassemblyCounts {
    pub fn intragene(&self) -> usize {
        self.intragene_stg + self.intragene_mtg
    }

    pub fn intergene(&self) -> usize {
        self.intergene_stg + self.intergene_mtg
    }

    pub fn total(&self) -> usize {
        self.intragene() + self.intergene()
    }
}

/// Result of the finalization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSummary {
    pub complete: TranscriptCategory,
    pub partial: TranscriptCategory,
    pub missing: TranscriptCategory,
    pub false_positive: TranscriptCategory,
    pub misassemblies: MisassemblyCounts,
    pub quartiles: Option<CategoryQuartiles>,
}

/// Folds classifications into running counts and reconstruction state
pub struct TallyEngine<'a> {
    min_full_prop: f64,
    reference: &'a Reference,
    state: ReconstructionState,
    counts: ContigCounts,
    intragene: Vec<MisassemblyPair>,
    intergene: Vec<MisassemblyPair>,
    classified: HashSet<String>,
}

impl<'a> TallyEngine<'a> {
    pub fn new(min_full_prop: f64, reference: &'a Reference) -> Self {
        TallyEngine {
            min_full_prop,
            reference,
            state: ReconstructionState::new(),
            counts: ContigCounts::default(),
            intragene: Vec::new(),
            intergene: Vec::new(),
            classified: HashSet::new(),
        }
    }

    pub fn record(&mut self, classification: &Classification) {
        self.classified.insert(classification.contig().to_string());

        match classification {
            Classification::Misassembly {
                contig,
                transcript1,
                transcript2,
                same_gene,
            } => {
                self.counts.misassembled += 1;
                let pair = MisassemblyPair {
                    contig: contig.clone(),
                    transcript1: transcript1.clone(),
                    transcript2: transcript2.clone(),
                };
                if *same_gene {
                    self.intragene.push(pair);
                } else {
                    self.intergene.push(pair);
                }
            }
            Classification::LargeIndel { .. } => self.counts.large_indel += 1,
            Classification::LowQuality { .. } => self.counts.low_quality += 1,
            Classification::Reconstruction {
                contig,
                transcript,
                proportion,
                ..
            } => {
                debug_assert!((0.0..=1.0).contains(proportion));
                self.state
                    .update(transcript, contig, *proportion, self.min_full_prop);

                if !self.reference.truth.contains(transcript) {
                    self.counts.false_positive += 1;
                } else if *proportion >= self.min_full_prop {
                    self.counts.complete += 1;
                } else {
                    self.counts.partial += 1;
                }
            }
        }
    }

    pub fn counts(&self) -> ContigCounts {
        self.counts
    }

    pub fn state(&self) -> &ReconstructionState {
        &self.state
    }

    pub fn intragene_misassemblies(&self) -> &[MisassemblyPair] {
        &self.intragene
    }

    pub fn intergene_misassemblies(&self) -> &[MisassemblyPair] {
        &self.intergene
    }

    pub fn is_classified(&self, contig: &str) -> bool {
        self.classified.contains(contig)
    }

    pub fn num_classified(&self) -> usize {
        self.classified.len()
    }

    /// Classify every truth transcript and every matched non-truth transcript
    pub fn finalize(&self) -> Result<TranscriptSummary> {
        let genes = &self.reference.genes;
        let truth = &self.reference.truth;
        let mut summary = TranscriptSummary::default();

        for t in truth.iter() {
            let is_mtg = genes
                .is_multi_transcript(t)
                .with_context(|| format!("Truth transcript {t} has no gene assignment"))?;
            match self.state.best(t) {
                Some(p) if p >= self.min_full_prop => summary.complete.push(t, p, is_mtg),
                Some(p) => summary.partial.push(t, p, is_mtg),
                None => summary.missing.push(t, 0.0, is_mtg),
            }
        }

        for (t, p) in self.state.iter() {
            if !truth.contains(t) {
                let is_mtg = genes
                    .is_multi_transcript(t)
                    .with_context(|| format!("Matched transcript {t} has no gene assignment"))?;
                summary.false_positive.push(t, p, is_mtg);
            }
        }

        ensure!(
            summary.complete.len() + summary.partial.len() + summary.missing.len() == truth.len(),
            "Transcript categories do not add up to the {} truth transcripts",
            truth.len()
        );

        for category in [
            &mut summary.complete,
            &mut summary.partial,
            &mut summary.missing,
            &mut summary.false_positive,
        ] {
            category.sort_by_proportion();
        }

        summary.misassemblies = self.misassembly_counts()?;

        if let Some(bins) = &self.reference.tpm_bins {
            summary.quartiles = Some(CategoryQuartiles {
                complete: summary.complete.quartiles(bins)?,
                partial: summary.partial.quartiles(bins)?,
                missing: summary.missing.quartiles(bins)?,
            });
        }

        Ok(summary)
    }

    fn misassembly_counts(&self) -> Result<MisassemblyCounts> {
        let genes = &self.reference.genes;
        let involves_mtg = |m: &MisassemblyPair| -> Result<bool> {
            Ok(genes.is_multi_transcript(&m.transcript1)?
                || genes.is_multi_transcript(&m.transcript2)?)
        };

        let mut counts = MisassemblyCounts::default();
        for m in &self.intragene {
            if involves_mtg(m)? {
                counts.intragene_mtg += 1;
            } else {
                counts.intragene_stg += 1;
            }
        }
        for m in &self.intergene {
            if involves_mtg(m)? {
                counts.intergene_mtg += 1;
            } else {
                counts.intergene_stg += 1;
            }
        }
        Ok(counts)
    }
}
