use anyhow::{bail, Result};

use crate::batch::Batch;
use crate::mapping::PafRecord;
use crate::reference::Reference;

/// Evaluation thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub min_full_prop: f64, // --full-prop
    pub min_pid: f64,       // --aln-pid
    pub min_aln_len: u32,   // --aln-len
    /// --aln-indel; `None` disables the indel filter and the large-indel category
    pub max_indel: Option<u32>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            min_full_prop: 0.95,
            min_pid: 0.95,
            min_aln_len: 100,
            max_indel: Some(70),
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_full_prop) {
            bail!(
                "Full-length proportion must be within [0, 1], got {}",
                self.min_full_prop
            );
        }
        if !(0.0..=1.0).contains(&self.min_pid) {
            bail!(
                "Percent identity must be within [0, 1], got {}",
                self.min_pid
            );
        }
        Ok(())
    }

    /// Whether a record's largest indel exceeds the configured cutoff
    pub fn is_large_indel(&self, record: &PafRecord) -> bool {
        self.max_indel.map_or(false, |cutoff| record.max_indel > cutoff)
    }
}

/// Outcome of classifying one contig's alignments
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Reconstruction {
        contig: String,
        transcript: String,
        proportion: f64,
        identity: f64,
    },
    Misassembly {
        contig: String,
        transcript1: String,
        transcript2: String,
        same_gene: bool,
    },
    LowQuality {
        contig: String,
        transcript: String,
        identity: f64,
    },
    LargeIndel {
        contig: String,
        transcript: String,
        max_indel: u32,
    },
}

impl Classification {
    pub fn contig(&self) -> &str {
        match self {
            Classification::Reconstruction { contig, .. }
            | Classification::Misassembly { contig, .. }
            | Classification::LowQuality { contig, .. }
            | Classification::LargeIndel { contig, .. } => contig,
        }
    }
}

/// How a second query interval lies relative to a first one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOverlap {
    /// first starts before second, second runs past the end of first
    DovetailForward,
    /// second starts before first, first runs past the end of second
    DovetailBackward,
    Disjoint,
    /// second lies within first
    Contains,
    /// first lies within second
    ContainedIn,
}

impl QueryOverlap {
    pub fn of(start1: u32, end1: u32, start2: u32, end2: u32) -> Self {
        if start2 > end1 || end2 < start1 {
            QueryOverlap::Disjoint
        } else if start1 <= start2 && end2 <= end1 {
            QueryOverlap::Contains
        } else if start2 <= start1 && end1 <= end2 {
            QueryOverlap::ContainedIn
        } else if start1 < start2 {
            QueryOverlap::DovetailForward
        } else {
            QueryOverlap::DovetailBackward
        }
    }
}

/// Query length covered by two alignments taken together.
/// Overlapping intervals merge; disjoint ones add up.
pub fn combined_length(start1: u32, end1: u32, start2: u32, end2: u32) -> u32 {
    match QueryOverlap::of(start1, end1, start2, end2) {
        QueryOverlap::DovetailForward => end2 - start1,
        QueryOverlap::DovetailBackward => end1 - start2,
        QueryOverlap::Disjoint => (end1 - start1) + (end2 - start2),
        QueryOverlap::Contains => end1 - start1,
        QueryOverlap::ContainedIn => end2 - start2,
    }
}

/// Reduces a batch of alignments to at most one classification
pub struct BatchClassifier<'a> {
    config: &'a EvalConfig,
    reference: &'a Reference,
}

impl<'a> BatchClassifier<'a> {
    pub fn new(config: &'a EvalConfig, reference: &'a Reference) -> Self {
        BatchClassifier { config, reference }
    }

    pub fn classify(&self, batch: &Batch) -> Result<Option<Classification>> {
        let records = batch.records();

        // Alignments with oversized indels are skipped when choosing the best
        // record, unless nothing else is left; the contig is then reported as
        // a large-indel contig instead of being silently dropped.
        let best_idx = match self
            .select_best(records, true)
            .or_else(|| self.select_best(records, false))
        {
            Some(idx) => idx,
            None => return Ok(None),
        };
        let best = &records[best_idx];

        // A chimeric contig is reported as such even if its best half would
        // fail the quality checks below.
        if records.len() > 1 {
            if let Some(alt_idx) = self.find_misassembly_partner(records, best_idx) {
                let alt = &records[alt_idx];
                let same_gene = self
                    .reference
                    .genes
                    .same_gene(&alt.ref_name, &best.ref_name)?;
                return Ok(Some(Classification::Misassembly {
                    contig: batch.query_name().to_string(),
                    transcript1: best.ref_name.clone(),
                    transcript2: alt.ref_name.clone(),
                    same_gene,
                }));
            }
        }

        if self.config.is_large_indel(best) {
            return Ok(Some(Classification::LargeIndel {
                contig: batch.query_name().to_string(),
                transcript: best.ref_name.clone(),
                max_indel: best.max_indel,
            }));
        }

        let identity = best.percent_identity();
        if identity < self.config.min_pid {
            return Ok(Some(Classification::LowQuality {
                contig: batch.query_name().to_string(),
                transcript: best.ref_name.clone(),
                identity,
            }));
        }

        Ok(Some(Classification::Reconstruction {
            contig: batch.query_name().to_string(),
            transcript: best.ref_name.clone(),
            proportion: best.reconstruction_proportion()?,
            identity,
        }))
    }

    /// Index of the record with the most residue matches. Ties go to a truth
    /// transcript over a non-truth one, otherwise to the earlier record.
    fn select_best(&self, records: &[PafRecord], exclude_large_indels: bool) -> Option<usize> {
        let truth = &self.reference.truth;
        let mut best: Option<usize> = None;

        for (i, record) in records.iter().enumerate() {
            if exclude_large_indels && self.config.is_large_indel(record) {
                continue;
            }
            let Some(b) = best else {
                best = Some(i);
                continue;
            };
            let current = &records[b];
            if record.matches > current.matches
                || (record.matches == current.matches
                    && truth.contains(&record.ref_name)
                    && !truth.contains(&current.ref_name))
            {
                best = Some(i);
            }
        }

        best
    }

    /// The alternate record adding the most query coverage to the best one,
    /// provided it adds at least `min_aln_len` bases.
    fn find_misassembly_partner(&self, records: &[PafRecord], best_idx: usize) -> Option<usize> {
        let best = &records[best_idx];
        let span = best.query_span() as u64;
        let min_len = span + self.config.min_aln_len as u64;

        let mut merged_length = span;
        let mut alt = None;
        for (i, record) in records.iter().enumerate() {
            if i == best_idx {
                continue;
            }
            let m = combined_length(
                best.query_start,
                best.query_end,
                record.query_start,
                record.query_end,
            ) as u64;
            if m >= min_len && m > merged_length {
                alt = Some(i);
                merged_length = m;
            }
        }

        alt
    }
}
