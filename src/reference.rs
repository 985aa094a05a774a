//! Reference metadata: transcript-to-gene map, truth transcripts and
//! expression quartiles. Built once before the alignment stream is read.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use ordered_float::OrderedFloat;
use std::io::BufRead;

/// Strip the version suffix from Ensembl identifiers ("ENST0001.4" -> "ENST0001")
pub fn normalize_id(name: &str) -> &str {
    if name.starts_with("ENS") {
        name.split('.').next().unwrap_or(name)
    } else {
        name
    }
}

/// Extract (gene_id, transcript_id) from a GTF attribute column
fn parse_gtf_attributes(attributes: &str, normalize: bool) -> (Option<&str>, Option<&str>) {
    let mut gene = None;
    let mut transcript = None;

    for attr in attributes.split(';') {
        let Some((key, val)) = attr.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let val = val.trim().trim_matches('"');
        let val = if normalize { normalize_id(val) } else { val };
        match key {
            "gene_id" => gene = Some(val),
            "transcript_id" => transcript = Some(val),
            _ => {}
        }
        if gene.is_some() && transcript.is_some() {
            break;
        }
    }

    (gene, transcript)
}

/// Transcript -> gene assignment with per-gene transcript counts
#[derive(Debug, Clone, Default)]
pub struct GeneMap {
    transcript_to_gene: IndexMap<String, String>,
    gene_transcript_counts: IndexMap<String, usize>,
}

impl GeneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `transcript` and `exon` records of a GTF,
    /// with normalized ids
    pub fn from_gtf<R: BufRead>(reader: R) -> Result<Self> {
        Self::read_gtf(reader, true)
    }

    /// Like [`GeneMap::from_gtf`], keeping ids exactly as written
    pub fn from_gtf_verbatim<R: BufRead>(reader: R) -> Result<Self> {
        Self::read_gtf(reader, false)
    }

    fn read_gtf<R: BufRead>(reader: R, normalize: bool) -> Result<Self> {
        let mut map = GeneMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 9 {
                bail!(
                    "GTF line {} has {} columns, expected 9",
                    i + 1,
                    cols.len()
                );
            }
            if cols[2] != "transcript" && cols[2] != "exon" {
                continue;
            }

            if let (Some(gene), Some(transcript)) = parse_gtf_attributes(cols[8], normalize) {
                map.insert(transcript, gene);
            }
        }

        debug!(
            "GTF: {} transcripts in {} genes",
            map.num_transcripts(),
            map.num_genes()
        );
        Ok(map)
    }

    /// Assign a transcript to a gene. Re-assignments move the transcript.
    pub fn insert(&mut self, transcript: &str, gene: &str) {
        match self.transcript_to_gene.get(transcript) {
            Some(prev) if prev == gene => return,
            Some(prev) => {
                let prev = prev.clone();
                if let Some(count) = self.gene_transcript_counts.get_mut(&prev) {
                    *count -= 1;
                    if *count == 0 {
                        self.gene_transcript_counts.shift_remove(&prev);
                    }
                }
            }
            None => {}
        }
        self.transcript_to_gene
            .insert(transcript.to_string(), gene.to_string());
        *self
            .gene_transcript_counts
            .entry(gene.to_string())
            .or_insert(0) += 1;
    }

    pub fn gene_of(&self, transcript: &str) -> Result<&str> {
        self.transcript_to_gene
            .get(transcript)
            .map(|g| g.as_str())
            .ok_or_else(|| anyhow!("Transcript {} is not in the gene annotation", transcript))
    }

    pub fn transcript_count(&self, gene: &str) -> Option<usize> {
        self.gene_transcript_counts.get(gene).copied()
    }

    /// Whether the transcript belongs to a multi-transcript gene (MTG)
    pub fn is_multi_transcript(&self, transcript: &str) -> Result<bool> {
        let gene = self.gene_of(transcript)?;
        let count = self
            .transcript_count(gene)
            .ok_or_else(|| anyhow!("Gene {} has no transcripts", gene))?;
        debug_assert!(count > 0);
        Ok(count > 1)
    }

    pub fn same_gene(&self, t1: &str, t2: &str) -> Result<bool> {
        Ok(self.gene_of(t1)? == self.gene_of(t2)?)
    }

    pub fn num_transcripts(&self) -> usize {
        self.transcript_to_gene.len()
    }

    pub fn num_genes(&self) -> usize {
        self.gene_transcript_counts.len()
    }
}

/// Truth transcript ids in file order
#[derive(Debug, Clone, Default)]
pub struct TruthSet {
    ids: IndexSet<String>,
}

impl TruthSet {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut ids = IndexSet::new();
        for line in reader.lines() {
            let line = line?;
            let id = line.trim();
            if !id.is_empty() {
                ids.insert(normalize_id(id).to_string());
            }
        }
        Ok(TruthSet { ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TruthSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        TruthSet {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Five-number summary of truth transcript abundance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpmQuantiles {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Expression quartile (0-3) for each truth transcript
#[derive(Debug, Clone)]
pub struct TpmBins {
    bins: IndexMap<String, usize>,
    quantiles: TpmQuantiles,
}

impl TpmBins {
    /// Read an abundance table with `ID` and `TPM` header columns.
    /// Rows for transcripts outside `truth` are ignored.
    pub fn from_tsv<R: BufRead>(reader: R, truth: &TruthSet) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| anyhow!("Abundance table is empty"))?;
        let headers: Vec<&str> = header.trim().split('\t').collect();
        let id_col = headers
            .iter()
            .position(|h| *h == "ID")
            .ok_or_else(|| anyhow!("Abundance table header lacks an 'ID' column"))?;
        let tpm_col = headers
            .iter()
            .position(|h| *h == "TPM")
            .ok_or_else(|| anyhow!("Abundance table header lacks a 'TPM' column"))?;

        let mut tpm_map: IndexMap<String, f64> = IndexMap::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            let (Some(id), Some(tpm)) = (cols.get(id_col), cols.get(tpm_col)) else {
                bail!("Abundance table line {} is missing columns", i + 2);
            };
            let id = normalize_id(id);
            if truth.contains(id) {
                let tpm: f64 = tpm
                    .parse()
                    .with_context(|| format!("Invalid TPM '{}' at line {}", tpm, i + 2))?;
                tpm_map.insert(id.to_string(), tpm);
            }
        }

        Self::from_values(tpm_map)
    }

    /// Bin transcripts by quartile. Boundaries are taken by index into the
    /// sorted values, without interpolation.
    pub fn from_values(tpm_map: IndexMap<String, f64>) -> Result<Self> {
        if tpm_map.is_empty() {
            bail!("Abundance table contains no truth transcripts");
        }

        let mut tpms: Vec<f64> = tpm_map.values().copied().collect();
        tpms.sort_by_key(|&v| OrderedFloat(v));
        let n = tpms.len();
        let quantiles = TpmQuantiles {
            min: tpms[0],
            q1: tpms[n / 4],
            median: tpms[n / 2],
            q3: tpms[n * 3 / 4],
            max: tpms[n - 1],
        };

        let bins = tpm_map
            .into_iter()
            .map(|(id, tpm)| {
                let bin = if tpm <= quantiles.q1 {
                    0
                } else if tpm <= quantiles.median {
                    1
                } else if tpm <= quantiles.q3 {
                    2
                } else {
                    3
                };
                (id, bin)
            })
            .collect();

        Ok(TpmBins { bins, quantiles })
    }

    pub fn bin_of(&self, transcript: &str) -> Option<usize> {
        self.bins.get(transcript).copied()
    }

    pub fn quantiles(&self) -> TpmQuantiles {
        self.quantiles
    }

    /// Count transcripts per quartile; every transcript must have a bin
    pub fn quartile_sizes<'a, I>(&self, transcripts: I) -> Result<[usize; 4]>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sizes = [0usize; 4];
        for t in transcripts {
            let bin = self
                .bin_of(t)
                .ok_or_else(|| anyhow!("Transcript {} has no expression quartile", t))?;
            sizes[bin] += 1;
        }
        Ok(sizes)
    }
}

/// Everything the classifier and tally engine need to know about the reference
#[derive(Debug, Clone, Default)]
pub struct Reference {
    pub genes: GeneMap,
    pub truth: TruthSet,
    pub tpm_bins: Option<TpmBins>,
}
