//! DataBlock (`spec.md` §3, §4.9): one fetched slice of a ResultSet's rows.

use crate::error::{protocol_err, Result};
use crate::protocol::tuple::{self, TupleRow};
use crate::protocol::LineType;

/// A single fetched slice of a ResultSet, addressed by `offset` (the
/// absolute row index of its first row). Rows are parsed on demand from
/// raw server text by the Tuple Line Parser and opaque to anything but
/// `get_row`/`add_line`.
#[derive(Debug)]
pub(crate) struct DataBlock {
    rows: Vec<Option<TupleRow>>,
    offset: i64,
    columncount: usize,
    filled: usize,
    forward_only: bool,
}

impl DataBlock {
    pub(crate) fn new(rowcount: usize, offset: i64, columncount: usize, forward_only: bool) -> Self {
        Self {
            rows: vec![None; rowcount],
            offset,
            columncount,
            filled: 0,
            forward_only,
        }
    }

    pub(crate) fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.filled >= self.rows.len()
    }

    /// Parses one server line into the next free row slot. Requires
    /// `line_type == Result` (`spec.md` §4.9).
    pub(crate) fn add_line(&mut self, line: &str, line_type: LineType) -> Result<()> {
        if line_type != LineType::Result {
            return Err(protocol_err!(
                "expected a tuple row while filling a data block, got {line_type:?}"
            ));
        }
        if self.filled >= self.rows.len() {
            return Err(protocol_err!("data block overrun: more rows than declared rowcount"));
        }
        let row = tuple::parse(line, self.columncount)?;
        self.add_row(row)
    }

    /// Inserts an already-parsed row into the next free slot, for the
    /// singleton `=value` case where the Tuple Line Parser is invoked
    /// directly rather than through `add_line` (`spec.md` §4.5).
    pub(crate) fn add_row(&mut self, row: TupleRow) -> Result<()> {
        if self.filled >= self.rows.len() {
            return Err(protocol_err!("data block overrun: more rows than declared rowcount"));
        }
        self.rows[self.filled] = Some(row);
        self.filled += 1;
        Ok(())
    }

    /// Returns the row at absolute index `n`. A forward-only block clears
    /// the slot on this read, so a second read of the same index returns
    /// `None` (`spec.md` §3: "a row slot is cleared after being read
    /// exactly once").
    pub(crate) fn get_row(&mut self, n: i64) -> Option<TupleRow> {
        let idx = usize::try_from(n - self.offset).ok()?;
        let slot = self.rows.get_mut(idx)?;
        if self.forward_only {
            slot.take()
        } else {
            slot.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_and_reports_full() {
        let mut block = DataBlock::new(2, 0, 1, true);
        assert!(!block.is_full());
        block.add_line("[ 1\t]", LineType::Result).unwrap();
        block.add_line("[ 2\t]", LineType::Result).unwrap();
        assert!(block.is_full());
    }

    #[test]
    fn rejects_overrun() {
        let mut block = DataBlock::new(1, 0, 1, true);
        block.add_line("[ 1\t]", LineType::Result).unwrap();
        assert!(block.add_line("[ 2\t]", LineType::Result).is_err());
    }

    #[test]
    fn rejects_wrong_line_type() {
        let mut block = DataBlock::new(1, 0, 1, true);
        assert!(block.add_line("% a # name", LineType::Header).is_err());
    }

    #[test]
    fn forward_only_get_row_clears_the_slot() {
        let mut block = DataBlock::new(1, 10, 1, true);
        block.add_line("[ 42\t]", LineType::Result).unwrap();
        assert!(block.get_row(10).is_some());
        assert!(block.get_row(10).is_none());
    }

    #[test]
    fn scrollable_get_row_does_not_clear_the_slot() {
        let mut block = DataBlock::new(1, 10, 1, false);
        block.add_line("[ 42\t]", LineType::Result).unwrap();
        assert!(block.get_row(10).is_some());
        assert!(block.get_row(10).is_some());
    }
}
