//! ResultSetResponse (`spec.md` §3, §4.9): metadata plus the on-demand
//! block cache and adaptive prefetch policy for one query's rows.

use std::collections::HashMap;

use crate::error::{protocol_err, Result};
use crate::protocol::header::{HeaderLine, HeaderName};
use crate::protocol::tuple::TupleRow;
use crate::protocol::LineType;
use crate::response::data_block::DataBlock;

/// Default rows per block, used both as the initial `reply_size` and as
/// the cap on adaptive-prefetch growth (`10 × DEFAULT_FETCHSIZE`).
pub(crate) const DEFAULT_FETCHSIZE: u32 = 250;

/// A block the caller must `export` from the server before `get_row` can
/// be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockFetch {
    pub offset: i64,
    pub count: u32,
}

#[derive(Debug)]
pub(crate) enum RowLookup {
    Ready(TupleRow),
    Null,
    NeedFetch(BlockFetch),
}

#[derive(Default, Debug)]
struct MetadataFlags {
    name: bool,
    length: bool,
    ty: bool,
    table_name: bool,
}

impl MetadataFlags {
    fn all_seen(&self) -> bool {
        self.name && self.length && self.ty && self.table_name
    }
}

/// Owns one query's result metadata and row cache. `id > 0` identifies a
/// server-side cursor that outlives the first batch and must be closed
/// explicitly; `id == 0` (or the whole result delivered in one block)
/// means there is nothing to close.
#[derive(Debug)]
pub struct ResultSetResponse {
    id: i64,
    seqnr: u64,
    columncount: usize,
    tuplecount: i64,

    names: Vec<String>,
    types: Vec<String>,
    table_names: Vec<String>,
    column_lengths: Vec<i64>,
    precisions: Vec<i64>,
    scales: Vec<i64>,
    metadata_seen: MetadataFlags,

    /// Rowcount the opening SOHeader announced for the first block. Zero
    /// for an empty result set, which then never gets a block at offset 0
    /// (`spec.md` §4.9).
    first_block_rowcount: u32,
    cache_size: u32,
    cache_size_explicit: bool,
    block_offset: i64,
    result_blocks: HashMap<i64, DataBlock>,
    forward_only: bool,
}

impl ResultSetResponse {
    pub(crate) fn new(
        id: i64,
        seqnr: u64,
        columncount: usize,
        tuplecount: i64,
        initial_rowcount: u32,
        cache_size_explicit: bool,
        forward_only: bool,
    ) -> Self {
        Self {
            id,
            seqnr,
            columncount,
            tuplecount,
            names: Vec::new(),
            types: Vec::new(),
            table_names: Vec::new(),
            column_lengths: Vec::new(),
            precisions: Vec::new(),
            scales: Vec::new(),
            metadata_seen: MetadataFlags::default(),
            first_block_rowcount: initial_rowcount,
            cache_size: initial_rowcount.max(1),
            cache_size_explicit,
            block_offset: 0,
            result_blocks: HashMap::new(),
            forward_only,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn seqnr(&self) -> u64 {
        self.seqnr
    }

    pub fn columncount(&self) -> usize {
        self.columncount
    }

    pub fn tuplecount(&self) -> i64 {
        self.tuplecount
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    pub fn column_lengths(&self) -> &[i64] {
        &self.column_lengths
    }

    pub fn precisions(&self) -> &[i64] {
        &self.precisions
    }

    pub fn scales(&self) -> &[i64] {
        &self.scales
    }

    /// Whether a server-side cursor survives past the first batch and so
    /// must be `close`d explicitly (`spec.md` §3).
    pub fn destroy_on_close(&self) -> bool {
        self.id > 0 && self.tuplecount > self.cache_size as i64
    }

    /// `true` once all four header kinds have been seen and the first
    /// data block (registered via [`Self::attach_block`] at offset 0) is
    /// full (`spec.md` §4.9). A result set whose opening SOHeader announced
    /// zero rows in its first block (an empty result) never gets a block
    /// attached at all, and completes on headers alone.
    pub(crate) fn is_complete(&self) -> bool {
        self.metadata_seen.all_seen()
            && (self.first_block_rowcount == 0
                || self
                    .result_blocks
                    .get(&0)
                    .map(DataBlock::is_full)
                    .unwrap_or(false))
    }

    /// Dispatches a Header or Result line during the initial ingest that
    /// follows a `&` SOHeader (`spec.md` §4.9).
    pub(crate) fn ingest(&mut self, line: &str, line_type: LineType) -> Result<()> {
        match line_type {
            LineType::Header => self.ingest_header(line),
            LineType::Result => self.ingest_first_block_row(line),
            LineType::ResultSingleton => self.ingest_singleton_row(line),
            other => Err(protocol_err!(
                "unexpected {other:?} line while filling a result set header"
            )),
        }
    }

    fn ingest_header(&mut self, line: &str) -> Result<()> {
        let header = crate::protocol::header::parse(line)?;
        self.apply_header(header)
    }

    fn apply_header(&mut self, header: HeaderLine) -> Result<()> {
        match header.field {
            HeaderName::Name => {
                self.names = header.strings();
                self.metadata_seen.name = true;
            }
            HeaderName::Length => {
                self.column_lengths = header.ints()?;
                self.metadata_seen.length = true;
            }
            HeaderName::TypeSizes => {
                let pairs = header.int_pairs()?;
                self.precisions = pairs.iter().map(|(precision, _)| *precision).collect();
                self.scales = pairs.iter().map(|(_, scale)| *scale).collect();
            }
            HeaderName::Type => {
                self.types = header.strings();
                self.metadata_seen.ty = true;
            }
            HeaderName::TableName => {
                self.table_names = header.strings();
                self.metadata_seen.table_name = true;
            }
            HeaderName::Other(_) => {}
        }
        Ok(())
    }

    fn ingest_first_block_row(&mut self, line: &str) -> Result<()> {
        let rowcount = self.cache_size as usize;
        let block = self
            .result_blocks
            .entry(0)
            .or_insert_with(|| DataBlock::new(rowcount, 0, self.columncount, self.forward_only));
        block.add_line(line, LineType::Result)
    }

    /// Ingests a `=value` singleton row: the whole result is one row, one
    /// column, with no surrounding `[ ]` (`spec.md` §4.5).
    fn ingest_singleton_row(&mut self, line: &str) -> Result<()> {
        if self.columncount != 1 {
            return Err(protocol_err!(
                "a singleton result line requires exactly one column, this result set has {}",
                self.columncount
            ));
        }
        let value = crate::protocol::tuple::parse_singleton(line)?;
        let mut row = TupleRow::new();
        row.push(value);
        let block = self
            .result_blocks
            .entry(0)
            .or_insert_with(|| DataBlock::new(self.cache_size as usize, 0, self.columncount, self.forward_only));
        block.add_row(row)
    }

    fn block_math(&self, n: i64) -> (i64, i64) {
        let rel = n - self.block_offset;
        let cache = self.cache_size as i64;
        (rel.div_euclid(cache), rel.rem_euclid(cache))
    }

    /// Drops any cached block strictly before `keep_from`, for forward-only
    /// cursors (`spec.md` §4.9).
    fn reclaim_before(&mut self, keep_from: i64) {
        if !self.forward_only {
            return;
        }
        self.result_blocks.retain(|&offset, _| offset >= keep_from);
    }

    /// Looks up row `n`, applying adaptive prefetch growth and forward-only
    /// reclamation (`spec.md` §4.9). `statement_is_latest` is whether no
    /// other statement has executed on the connection since this
    /// ResultSet was created (tracked via the process-wide seqnr).
    pub(crate) fn get_row(&mut self, n: i64, statement_is_latest: bool) -> Result<RowLookup> {
        if n < 0 || n >= self.tuplecount {
            return Err(protocol_err!("row index {n} out of range"));
        }

        if statement_is_latest && !self.cache_size_explicit {
            let (block, _) = self.block_math(n);
            let block_start = self.block_offset + block * self.cache_size as i64;
            let remaining = self.tuplecount - self.block_offset;
            if !self.result_blocks.contains_key(&block_start)
                && remaining > self.cache_size as i64
                && (self.cache_size as u64) < 10 * DEFAULT_FETCHSIZE as u64
            {
                self.block_offset += self.cache_size as i64;
                self.cache_size = ((self.cache_size as u64 * 10).min(10 * DEFAULT_FETCHSIZE as u64)) as u32;
            }
        }

        let (block, _) = self.block_math(n);
        let block_start = self.block_offset + block * self.cache_size as i64;

        self.reclaim_before(block_start);

        if let Some(data_block) = self.result_blocks.get_mut(&block_start) {
            return match data_block.get_row(n) {
                Some(row) => Ok(RowLookup::Ready(row)),
                None => Ok(RowLookup::Null),
            };
        }

        let count = self.cache_size.min((self.tuplecount - block_start) as u32);
        Ok(RowLookup::NeedFetch(BlockFetch { offset: block_start, count }))
    }

    /// Registers a freshly `export`ed block, keyed by its absolute offset.
    pub(crate) fn attach_block(&mut self, block: DataBlock) {
        self.result_blocks.insert(block.offset(), block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_header_line(rs: &mut ResultSetResponse, line: &str) {
        rs.ingest(line, LineType::Header).unwrap();
    }

    #[test]
    fn completes_after_headers_and_first_block() {
        let mut rs = ResultSetResponse::new(0, 1, 1, 1, 1, false, true);
        ingest_header_line(&mut rs, "% x # name");
        ingest_header_line(&mut rs, "% 1 # length");
        ingest_header_line(&mut rs, "% int # type");
        ingest_header_line(&mut rs, "% t # table_name");
        rs.ingest("[ 1\t]", LineType::Result).unwrap();
        assert!(rs.is_complete());
    }

    #[test]
    fn prefetch_grows_tenfold_then_caps() {
        let mut rs = ResultSetResponse::new(1, 1, 1, 100_000, 250, false, true);
        // first 250 rows arrive inline.
        for i in 0..250 {
            rs.ingest(&format!("[ {i}\t]"), LineType::Result).unwrap();
        }

        match rs.get_row(250, true).unwrap() {
            RowLookup::NeedFetch(fetch) => {
                assert_eq!(fetch.offset, 250);
                assert_eq!(fetch.count, 2500);
            }
            other => panic!("expected a fetch request, got {other:?}"),
        }

        let mut block = DataBlock::new(2500, 250, 1, true);
        for i in 250..2750 {
            block.add_line(&format!("[ {i}\t]"), LineType::Result).unwrap();
        }
        rs.attach_block(block);

        match rs.get_row(2750, true).unwrap() {
            RowLookup::NeedFetch(fetch) => {
                assert_eq!(fetch.offset, 2750);
                assert_eq!(fetch.count, 2500);
            }
            other => panic!("expected a fetch request, got {other:?}"),
        }
    }

    #[test]
    fn explicit_cache_size_disables_growth() {
        let mut rs = ResultSetResponse::new(1, 1, 1, 100_000, 250, true, true);
        for i in 0..250 {
            rs.ingest(&format!("[ {i}\t]"), LineType::Result).unwrap();
        }
        match rs.get_row(250, true).unwrap() {
            RowLookup::NeedFetch(fetch) => assert_eq!(fetch.count, 250),
            other => panic!("expected a fetch request, got {other:?}"),
        }
    }

    #[test]
    fn forward_only_reclaims_earlier_blocks() {
        let mut rs = ResultSetResponse::new(1, 1, 1, 1000, 250, true, true);
        for i in 0..250 {
            rs.ingest(&format!("[ {i}\t]"), LineType::Result).unwrap();
        }
        let mut block = DataBlock::new(250, 250, 1, true);
        for i in 250..500 {
            block.add_line(&format!("[ {i}\t]"), LineType::Result).unwrap();
        }
        rs.attach_block(block);

        // reading into the second block should reclaim the first.
        let _ = rs.get_row(260, true).unwrap();
        assert!(!rs.result_blocks.contains_key(&0));
    }
}
