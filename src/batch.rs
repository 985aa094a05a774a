/// Grouping of a query-sorted alignment stream into per-contig batches
use crate::mapping::PafRecord;
use anyhow::Result;

/// All retained alignments of one contig
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    query_name: String,
    records: Vec<PafRecord>,
}

impl Batch {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            records: Vec::new(),
        }
    }

    pub fn from_records(query_name: impl Into<String>, records: Vec<PafRecord>) -> Self {
        Self {
            query_name: query_name.into(),
            records,
        }
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn records(&self) -> &[PafRecord] {
        &self.records
    }

    pub fn push(&mut self, record: PafRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Splits a record stream into batches at every change of query name.
///
/// The input is expected to be sorted (or at least grouped) by query name.
/// This is not checked: a query name that reappears after a different one
/// simply starts a new, separate batch. Records with a block length below
/// `min_block_len` are dropped before grouping, and batches left empty by
/// that filter are not yielded. A read error ends the stream.
pub struct BatchGrouper<I> {
    records: I,
    min_block_len: u32,
    current: Option<Batch>,
    done: bool,
}

impl<I> BatchGrouper<I>
where
    I: Iterator<Item = Result<PafRecord>>,
{
    pub fn new(records: I, min_block_len: u32) -> Self {
        Self {
            records,
            min_block_len,
            current: None,
            done: false,
        }
    }
}

impl<I> Iterator for BatchGrouper<I>
where
    I: Iterator<Item = Result<PafRecord>>,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.current.take().filter(|b| !b.is_empty()).map(Ok);
                }
            };

            let boundary = self
                .current
                .as_ref()
                .map_or(false, |b| b.query_name != record.query_name);
            let finished = if boundary { self.current.take() } else { None };

            let batch = self
                .current
                .get_or_insert_with(|| Batch::new(record.query_name.clone()));
            if record.block_len >= self.min_block_len {
                batch.push(record);
            }

            if let Some(batch) = finished.filter(|b| !b.is_empty()) {
                return Some(Ok(batch));
            }
        }
    }
}
