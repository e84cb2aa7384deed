//! Response List (`spec.md` §3, §9): the ordered set of Responses one
//! `execute` produced, plus the process-wide `seqnr` counter the adaptive
//! prefetch heuristic relies on for cross-statement ordering. Kept as a
//! `static` atomic rather than promoted to a thread-local, per `spec.md`
//! §9's explicit instruction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::response::{Response, ResultSetResponse};

static NEXT_SEQNR: AtomicU64 = AtomicU64::new(1);

/// Draws the next statement-execution sequence number.
pub(crate) fn next_seqnr() -> u64 {
    NEXT_SEQNR.fetch_add(1, Ordering::Relaxed)
}

/// The most recent sequence number handed out, used to tell whether a
/// given ResultSet's statement is still the connection's latest.
pub(crate) fn current_seqnr() -> u64 {
    NEXT_SEQNR.load(Ordering::Relaxed).saturating_sub(1)
}

/// Whether result sets on this connection are scrollable or forward-only
/// (`spec.md` §3). Only forward-only is implemented end to end; scrollable
/// result sets keep every block instead of reclaiming them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetType {
    ForwardOnly,
    Scrollable,
}

/// The ordered Responses produced by one `execute`, plus the index needed
/// to route later `Block` SOHeaders to the ResultSet they extend
/// (`spec.md` §4.8: "DataBlock responses are NOT added to `responses`;
/// they are dispatched... via `rsById`").
pub struct ResponseList {
    cache_size: u32,
    max_rows: u32,
    rs_type: ResultSetType,
    seqnr: u64,
    responses: Vec<Response>,
    rs_by_id: HashMap<i64, usize>,
    current_index: usize,
}

impl ResponseList {
    pub(crate) fn new(cache_size: u32, max_rows: u32, rs_type: ResultSetType) -> Self {
        Self {
            cache_size,
            max_rows,
            rs_type,
            seqnr: next_seqnr(),
            responses: Vec::new(),
            rs_by_id: HashMap::new(),
            current_index: 0,
        }
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    pub fn rs_type(&self) -> ResultSetType {
        self.rs_type
    }

    pub fn seqnr(&self) -> u64 {
        self.seqnr
    }

    /// Condition (a) of the adaptive prefetch heuristic: no other
    /// statement has executed (on any connection) since this list was
    /// created.
    pub(crate) fn is_latest_statement(&self) -> bool {
        self.seqnr == current_seqnr()
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn current(&self) -> Option<&Response> {
        self.responses.get(self.current_index)
    }

    /// The ResultSet at the cursor's current position, if the current
    /// Response is one (used by [`crate::connection::MapiConnection::fetch_row`]
    /// to drive `get_row`/`export` without needing the caller to track a
    /// result-set id).
    pub fn current_result_set_mut(&mut self) -> Option<&mut ResultSetResponse> {
        self.responses.get_mut(self.current_index)?.as_result_set_mut()
    }

    pub fn advance(&mut self) -> Option<&Response> {
        self.current_index += 1;
        self.current()
    }

    /// Appends a completed top-level Response, indexing it by id if it is
    /// a ResultSet with a server-side cursor.
    pub(crate) fn push(&mut self, response: Response) {
        if let Response::ResultSet(rs) = &response {
            if rs.id() > 0 {
                self.rs_by_id.insert(rs.id(), self.responses.len());
            }
        }
        self.responses.push(response);
    }

    /// Looks up the ResultSet a `Block` SOHeader (carrying the same id)
    /// should be routed to.
    pub(crate) fn result_set_by_id(&mut self, id: i64) -> Option<&mut ResultSetResponse> {
        let index = *self.rs_by_id.get(&id)?;
        self.responses.get_mut(index)?.as_result_set_mut()
    }

    pub(crate) fn forward_only(&self) -> bool {
        self.rs_type == ResultSetType::ForwardOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqnr_is_process_wide_monotonic() {
        let a = ResponseList::new(250, 0, ResultSetType::ForwardOnly);
        let b = ResponseList::new(250, 0, ResultSetType::ForwardOnly);
        assert!(b.seqnr() > a.seqnr());
        assert!(!a.is_latest_statement());
        assert!(b.is_latest_statement());
    }

    #[test]
    fn push_indexes_result_sets_with_a_cursor_id() {
        let mut list = ResponseList::new(250, 0, ResultSetType::ForwardOnly);
        let header = crate::protocol::soheader::parse("&1 7 1 4 7").unwrap();
        let response = Response::from_soheader(header, list.seqnr(), false, true).unwrap();
        list.push(response);
        assert!(list.result_set_by_id(7).is_some());
        assert!(list.result_set_by_id(999).is_none());
    }
}
