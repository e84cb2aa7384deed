//! Send Pipeline: small queries/control commands are written inline;
//! anything longer than one transport block is handed to a background
//! writer task so a full TCP send buffer on either peer cannot deadlock
//! the connection against the reader — a `tokio::task` plus a
//! `tokio::sync::oneshot` completion signal, rather than embedded-path
//! wait/notify signaling.

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::io::BlockWriter;

type WriteOutcome = (BlockWriter, Result<()>);

/// A background write in flight. The caller must [`PendingWrite::join`] it
/// before touching the connection's reader again — the writer owns the
/// socket's write half until then.
pub(crate) struct PendingWrite(oneshot::Receiver<WriteOutcome>);

impl PendingWrite {
    /// Waits for the background writer to finish and hands the
    /// [`BlockWriter`] back, surfacing any IO error it hit.
    pub(crate) async fn join(self) -> Result<BlockWriter> {
        match self.0.await {
            Ok((writer, result)) => result.map(|_| writer),
            Err(_) => Err(Error::protocol(
                "the background writer task was dropped before it finished",
            )),
        }
    }
}

/// Writes `prefix body\n` to `writer`. If `body` fits in one transport
/// block it is written inline and `writer` comes straight back; otherwise
/// a background task takes ownership of `writer` and the caller must
/// `.join()` the returned [`PendingWrite`] once it is done waiting for the
/// server's reply (`spec.md` §4.10 step 2).
pub(crate) async fn send(
    mut writer: BlockWriter,
    prefix: &'static str,
    body: String,
    block_size: usize,
) -> Result<(Option<BlockWriter>, Option<PendingWrite>)> {
    let total_len = prefix.len() + body.len() + 1; // +1 for the trailing '\n'
    if total_len <= block_size {
        writer.write_line(Some(prefix), &body, Some("\n")).await?;
        Ok((Some(writer), None))
    } else {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = writer.write_line(Some(prefix), &body, Some("\n")).await;
            let _ = tx.send((writer, result));
        });
        Ok((None, Some(PendingWrite(rx))))
    }
}
