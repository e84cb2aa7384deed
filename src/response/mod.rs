//! Response List / Result Cache (`spec.md` §3, §4.9): the sealed Response
//! variant plus its block cache, replacing the teacher's
//! `IResponse.addLine/wantsMore/complete` polymorphism with a single
//! tagged union and an `ingest` operation (`spec.md` §9).

pub(crate) mod data_block;
mod result_set;

pub use result_set::ResultSetResponse;
pub(crate) use result_set::{BlockFetch, RowLookup, DEFAULT_FETCHSIZE};

use crate::error::{protocol_err, Result};
use crate::protocol::soheader::{SoHeader, SoHeaderKind};
use crate::protocol::LineType;

/// One statement's response, tagged by the kind its `&` SOHeader
/// announced.
#[derive(Debug)]
pub enum Response {
    ResultSet(ResultSetResponse),
    Update { count: i64, last_id: i64 },
    Schema,
    AutoCommit { new_autocommit: bool },
}

impl Response {
    /// Builds the Response a SOHeader announces. `id > 0` results register
    /// with the caller's `rsById` map so later `Block` SOHeaders can route
    /// to them (`spec.md` §4.8 step 3).
    pub(crate) fn from_soheader(
        header: SoHeader,
        seqnr: u64,
        cache_size_explicit: bool,
        forward_only: bool,
    ) -> Result<Self> {
        match header.kind {
            SoHeaderKind::Table | SoHeaderKind::Prepare => {
                let (id, tuplecount, columncount, rowcount) = header
                    .table_fields()
                    .ok_or_else(|| protocol_err!("malformed table-shaped SOHeader"))?;
                Ok(Response::ResultSet(ResultSetResponse::new(
                    id,
                    seqnr,
                    columncount as usize,
                    tuplecount,
                    rowcount as u32,
                    cache_size_explicit,
                    forward_only,
                )))
            }
            SoHeaderKind::Update => {
                let (count, last_id) = header
                    .update_fields()
                    .ok_or_else(|| protocol_err!("malformed update SOHeader"))?;
                Ok(Response::Update { count, last_id })
            }
            SoHeaderKind::Schema => Ok(Response::Schema),
            SoHeaderKind::Trans => Ok(Response::AutoCommit {
                new_autocommit: header.autocommit.unwrap_or(false),
            }),
            SoHeaderKind::Block => Err(protocol_err!(
                "a Block SOHeader cannot start a new top-level response"
            )),
            SoHeaderKind::Unknown => Err(protocol_err!("unrecognized SOHeader kind")),
        }
    }

    /// Whether this response still needs more lines before it is complete
    /// (`spec.md` §4.9: all header kinds seen and the first block full).
    pub(crate) fn wants_more(&self) -> bool {
        match self {
            Response::ResultSet(rs) => !rs.is_complete(),
            Response::Update { .. } | Response::Schema | Response::AutoCommit { .. } => false,
        }
    }

    /// Dispatches one Header/Result line to a ResultSet in progress.
    pub(crate) fn ingest(&mut self, line: &str, line_type: LineType) -> Result<()> {
        match self {
            Response::ResultSet(rs) => rs.ingest(line, line_type),
            _ => Err(protocol_err!(
                "a {line_type:?} line was received for a response that does not accept one"
            )),
        }
    }

    pub fn as_result_set(&self) -> Option<&ResultSetResponse> {
        match self {
            Response::ResultSet(rs) => Some(rs),
            _ => None,
        }
    }

    pub fn as_result_set_mut(&mut self) -> Option<&mut ResultSetResponse> {
        match self {
            Response::ResultSet(rs) => Some(rs),
            _ => None,
        }
    }
}
