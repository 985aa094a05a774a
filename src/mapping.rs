use anyhow::{bail, Result};

/// One contig-to-transcript alignment (a PAF line)
#[derive(Debug, Clone, PartialEq)]
pub struct PafRecord {
    pub query_name: String,
    pub query_len: u32,
    pub query_start: u32, // 0-based, half-open
    pub query_end: u32,
    pub strand: char,
    pub ref_name: String, // normalized transcript id
    pub ref_len: u32,
    pub ref_start: u32,
    pub ref_end: u32,
    pub matches: u32,
    pub block_len: u32,
    pub quality: u8,
    pub cigar: Option<String>,
    /// Largest single insertion/deletion in `cigar` (0 when there is no CIGAR)
    pub max_indel: u32,
}

impl PafRecord {
    /// Length of the aligned query interval
    pub fn query_span(&self) -> u32 {
        self.query_end - self.query_start
    }

    /// Residue matches over alignment block length
    pub fn percent_identity(&self) -> f64 {
        if self.block_len == 0 {
            return 0.0;
        }
        self.matches as f64 / self.block_len as f64
    }

    /// Fraction of the target transcript covered by this alignment.
    ///
    /// A value above 1.0 means the target coordinates disagree with the
    /// target length, which points at a reference mismatch upstream.
    pub fn reconstruction_proportion(&self) -> Result<f64> {
        if self.ref_len == 0 {
            bail!(
                "Target {} has zero length in alignment of {}",
                self.ref_name,
                self.query_name
            );
        }
        let prop = (self.ref_end - self.ref_start) as f64 / self.ref_len as f64;
        if prop > 1.0 {
            bail!(
                "Reconstruction proportion {prop} > 1 for {} on {} (target {}-{} of {})",
                self.query_name,
                self.ref_name,
                self.ref_start,
                self.ref_end,
                self.ref_len
            );
        }
        Ok(prop)
    }
}
