//! [`MapiConnection`]: a single MAPI session tying the Authenticator,
//! Redirect Engine, Protocol Engine and Send Pipeline together behind the
//! driver's public surface (`spec.md` §3, §6).

mod establish;
mod send;
mod stream;

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::io::{BlockReader, BlockWriter, MAX_BLOCK_PAYLOAD};
use crate::options::{Language, MapiConnectOptions};
use crate::protocol::tuple::TupleRow;
use crate::response::{BlockFetch, ResultSetResponse, RowLookup, DEFAULT_FETCHSIZE};
use crate::response_list::{ResponseList, ResultSetType};

/// A single authenticated MAPI session (`spec.md` §3's Connection State).
/// At most one [`MapiConnection::execute`] may be in flight at a time
/// (`spec.md` §5) — the API is `&mut self` throughout to make that
/// non-reentrance a compile-time property rather than a runtime check.
pub struct MapiConnection {
    reader: BlockReader,
    writer: Option<BlockWriter>,
    options: MapiConnectOptions,
    /// Last `reply_size` sent to the server; `-1` means none has been sent
    /// yet (`spec.md` §4.8 step 1: only resend on change).
    cur_reply_size: i64,
    warnings: Vec<String>,
    closed: bool,
}

impl MapiConnection {
    /// Parses `url` and connects (`spec.md` §6's connection-string form).
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(MapiConnectOptions::from_str(url)?).await
    }

    /// Connects using already-built options, following redirects per
    /// `options.follow_redirects`/`options.ttl`.
    pub async fn connect_with(options: MapiConnectOptions) -> Result<Self> {
        let established = establish::connect(options).await?;
        Ok(Self {
            reader: established.reader,
            writer: Some(established.writer),
            options: established.options,
            cur_reply_size: -1,
            warnings: established.warnings,
            closed: false,
        })
    }

    pub fn options(&self) -> &MapiConnectOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drains and returns the `#` info lines accumulated since the last
    /// call (`spec.md` §7: warnings never interrupt the response stream,
    /// they are retrieved out-of-band).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Marks the connection unusable. There is no wire-level goodbye
    /// message in MAPI; the transport is simply dropped (`spec.md` §5:
    /// cancellation/closing is not in-band).
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Executes one statement and returns its [`ResponseList`] (`spec.md`
    /// §4.8).
    pub async fn execute(&mut self, query: &str) -> Result<ResponseList> {
        if self.closed {
            return Err(Error::Closed);
        }

        self.sync_reply_size().await?;

        let (prefix, body): (&'static str, String) = match self.options.language {
            Language::Sql => ("s", format!("{query};")),
            Language::Mal | Language::Control => ("", query.to_string()),
        };

        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::protocol("the connection's writer is not available"))?;
        let (writer_back, pending) = send::send(writer, prefix, body, MAX_BLOCK_PAYLOAD).await?;
        self.writer = writer_back;

        let cache_size = if self.cur_reply_size > 0 {
            self.cur_reply_size as u32
        } else {
            DEFAULT_FETCHSIZE
        };

        let result = stream::read_response(
            &mut self.reader,
            cache_size,
            self.options.max_rows,
            ResultSetType::ForwardOnly,
            self.options.fetch_size_explicit,
        )
        .await;

        if let Some(pending) = pending {
            let writer = pending.join().await?;
            self.writer = Some(writer);
        }

        match result {
            Ok((list, warnings)) => {
                self.warnings.extend(warnings);
                Ok(list)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.closed = true;
                }
                Err(e)
            }
        }
    }

    /// Toggles session auto-commit via the `Xauto_commit` control command
    /// (`spec.md` §6).
    pub async fn set_auto_commit(&mut self, on: bool) -> Result<()> {
        self.control(&format!("auto_commit {}", on as u8)).await
    }

    /// Fetches row `n` of the result set the list's cursor currently
    /// points at, issuing an `export` control command and blocking for
    /// the reply if the owning DataBlock is not yet cached (`spec.md`
    /// §4.9).
    pub async fn fetch_row(&mut self, list: &mut ResponseList, n: i64) -> Result<Option<TupleRow>> {
        if self.closed {
            return Err(Error::Closed);
        }

        let statement_is_latest = list.is_latest_statement();
        let forward_only = list.forward_only();

        loop {
            let rs = list
                .current_result_set_mut()
                .ok_or_else(|| Error::protocol("fetch_row called with no current result set"))?;

            let lookup = rs.get_row(n, statement_is_latest)?;
            match lookup {
                RowLookup::Ready(row) => return Ok(Some(row)),
                RowLookup::Null => return Ok(None),
                RowLookup::NeedFetch(fetch) => {
                    let id = rs.id();
                    let columncount = rs.columncount();
                    self.export_block(id, fetch, columncount, forward_only, list).await?;
                }
            }
        }
    }

    /// Closes a server-side cursor if the ResultSet outlived its first
    /// batch. Best effort: a failure is logged, not propagated (`spec.md`
    /// §4.9: "errors on the close command are swallowed").
    pub async fn close_result_set(&mut self, rs: &ResultSetResponse) {
        if self.closed || !rs.destroy_on_close() {
            return;
        }
        if let Err(e) = self.control(&format!("close {}", rs.id())).await {
            log::warn!("failed to close server-side cursor {}: {e}", rs.id());
        }
    }

    /// Releases a prepared statement handle via the `release` control
    /// command (`spec.md` §6).
    pub async fn release_result_set(&mut self, id: i64) -> Result<()> {
        self.control(&format!("release {id}")).await
    }

    async fn export_block(
        &mut self,
        id: i64,
        fetch: BlockFetch,
        columncount: usize,
        forward_only: bool,
        list: &mut ResponseList,
    ) -> Result<()> {
        self.send_control(&format!("export {id} {} {}", fetch.offset, fetch.count))
            .await?;
        let (returned_id, block) =
            stream::read_export_block(&mut self.reader, columncount, forward_only).await?;
        if returned_id != id {
            return Err(Error::protocol(format!(
                "server exported a block for result set {returned_id}, expected {id}"
            )));
        }
        let rs = list
            .result_set_by_id(id)
            .ok_or_else(|| Error::protocol(format!("no result set registered for id {id}")))?;
        rs.attach_block(block);
        Ok(())
    }

    /// Writes an `X`-prefixed control command line (`spec.md` §6). Control
    /// commands are always small enough to write inline.
    async fn send_control(&mut self, cmd: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::protocol("the connection's writer is not available"))?;
        writer.write_line(Some("X"), cmd, Some("\n")).await
    }

    /// Sends a control command and waits for the plain `.` reply that
    /// `reply_size`/`close`/`release`/`auto_commit` all produce (as
    /// opposed to `export`, which replies with a Block SOHeader).
    async fn control(&mut self, cmd: &str) -> Result<()> {
        self.send_control(cmd).await?;
        let preamble = stream::wait_until_prompt(&mut self.reader).await?;
        self.warnings.extend(preamble.warnings);
        Ok(())
    }

    /// Resends `reply_size` if the computed value changed since the last
    /// statement, skipping entirely outside the SQL language (`spec.md`
    /// §4.8 step 1, resolved in `SPEC_FULL.md` §F (9.a) as "only when
    /// changed").
    async fn sync_reply_size(&mut self) -> Result<()> {
        if self.options.language != Language::Sql {
            return Ok(());
        }

        let base = self.options.fetch_size.max(1) as i64;
        let size = if self.options.max_rows != 0 {
            base.min(self.options.max_rows as i64)
        } else {
            base
        };

        if size != self.cur_reply_size {
            self.control(&format!("reply_size {size}")).await?;
            self.cur_reply_size = size;
        }
        Ok(())
    }
}
