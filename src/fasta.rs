/// Minimal multi-record FASTA reading for assembly contigs
use anyhow::{bail, Result};
use indexmap::IndexMap;
use std::io::BufRead;

/// Read all records into an id -> sequence map, keeping file order.
/// The id is the first whitespace-delimited word of the header.
pub fn read_fasta<R: BufRead>(reader: R) -> Result<IndexMap<String, String>> {
    let mut sequences = IndexMap::new();
    let mut current: Option<(String, String)> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();

        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, seq)) = current.take() {
                sequences.insert(id, seq);
            }
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            current = Some((id, String::new()));
        } else if let Some((_, seq)) = current.as_mut() {
            seq.push_str(line.trim());
        } else if !line.trim().is_empty() {
            bail!("FASTA line {} precedes the first header", i + 1);
        }
    }

    if let Some((id, seq)) = current {
        sequences.insert(id, seq);
    }

    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_fasta() {
        let input = ">c1 len=8\nACGT\nACGT\n>c2\n\nGG\n>c3\n";
        let seqs = read_fasta(Cursor::new(input)).unwrap();
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs["c1"], "ACGTACGT");
        assert_eq!(seqs["c2"], "GG");
        assert_eq!(seqs["c3"], "");
        assert_eq!(seqs.keys().collect::<Vec<_>>(), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_sequence_before_header() {
        assert!(read_fasta(Cursor::new("ACGT\n>c1\nA\n")).is_err());
    }
}
