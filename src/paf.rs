use crate::mapping::PafRecord;
use crate::reference::normalize_id;
use anyhow::{anyhow, bail, Context, Result};
use flate2::read::MultiGzDecoder;
use nom::{
    character::complete::{digit1, one_of},
    combinator::{all_consuming, map_res},
    multi::many0,
    sequence::pair,
    IResult,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open a file, transparently decompressing gzip/bgzip, returning a boxed BufRead
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    // Check by file extension (faster than reading magic bytes)
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A single CIGAR operation: run length and op code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub len: u32,
    pub op: char,
}

impl CigarOp {
    pub fn is_indel(&self) -> bool {
        self.op == 'I' || self.op == 'D'
    }
}

fn cigar_op(input: &str) -> IResult<&str, CigarOp> {
    let (rest, (len, op)) = pair(
        map_res(digit1, |s: &str| s.parse::<u32>()),
        one_of("MIDNSHP=X"),
    )(input)?;
    Ok((rest, CigarOp { len, op }))
}

/// Parse a CIGAR string into its operations
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>> {
    let (_, ops) = all_consuming(many0(cigar_op))(cigar)
        .map_err(|e| anyhow!("Invalid CIGAR string '{}': {}", cigar, e))?;
    Ok(ops)
}

/// Length of the longest single insertion or deletion operation
pub fn max_indel_len(cigar: &str) -> Result<u32> {
    Ok(parse_cigar(cigar)?
        .iter()
        .filter(|op| op.is_indel())
        .map(|op| op.len)
        .max()
        .unwrap_or(0))
}

/// Streaming PAF reader yielding one record per non-blank line
pub struct PafReader<R: BufRead> {
    reader: R,
    line: String,
    line_no: usize,
}

impl<R: BufRead> PafReader<R> {
    pub fn new(reader: R) -> Self {
        PafReader {
            reader,
            line: String::new(),
            line_no: 0,
        }
    }

    pub fn read_record(&mut self) -> Result<Option<PafRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            let record = parse_paf_line(line)
                .with_context(|| format!("Malformed PAF record at line {}", self.line_no))?;
            return Ok(Some(record));
        }
    }
}

impl<R: BufRead> Iterator for PafReader<R> {
    type Item = Result<PafRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Parse one tab-separated PAF line
pub fn parse_paf_line(line: &str) -> Result<PafRecord> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() < 12 {
        bail!(
            "PAF line has {} fields, at least 12 are required",
            fields.len()
        );
    }

    let strand = match fields[4] {
        "+" => '+',
        "-" => '-',
        other => bail!("Invalid strand '{}'", other),
    };

    let mut paf = PafRecord {
        query_name: fields[0].to_string(),
        query_len: fields[1].parse().context("Invalid query length")?,
        query_start: fields[2].parse().context("Invalid query start")?,
        query_end: fields[3].parse().context("Invalid query end")?,
        strand,
        ref_name: normalize_id(fields[5]).to_string(),
        ref_len: fields[6].parse().context("Invalid target length")?,
        ref_start: fields[7].parse().context("Invalid target start")?,
        ref_end: fields[8].parse().context("Invalid target end")?,
        matches: fields[9].parse().context("Invalid match count")?,
        block_len: fields[10].parse().context("Invalid block length")?,
        quality: fields[11].parse().context("Invalid mapping quality")?,
        cigar: None,
        max_indel: 0,
    };

    if paf.query_start > paf.query_end {
        bail!(
            "Query start {} is past query end {}",
            paf.query_start,
            paf.query_end
        );
    }
    if paf.ref_start > paf.ref_end {
        bail!(
            "Target start {} is past target end {}",
            paf.ref_start,
            paf.ref_end
        );
    }

    // Optional typed tags (TAG:TYPE:VALUE); only the CIGAR is kept
    for field in &fields[12..] {
        if let Some(cigar) = field.strip_prefix("cg:Z:") {
            paf.cigar = Some(cigar.to_string());
        }
    }

    if let Some(ref cigar) = paf.cigar {
        paf.max_indel = max_indel_len(cigar)?;
    }

    Ok(paf)
}
