use byteorder::{ByteOrder as _, LittleEndian};
use bytes::{Buf, BufMut, BytesMut};

use crate::error::{protocol_err, Result};
use crate::net::Socket;
use crate::net::socket::{SocketReader, SocketWriter};

/// Maximum payload per block: `8*1024 - 2` (`spec.md` §3).
pub(crate) const MAX_BLOCK_PAYLOAD: usize = 8 * 1024 - 2;

/// Line buffers grow by doubling, capped at `INT_MAX - 8` (`spec.md` §4.1).
const MAX_LINE_BUFFER: usize = i32::MAX as usize - 8;

/// Server-announced byte order, negotiated during authentication
/// (`spec.md` §3, §4.6). Block framing itself is always little-endian;
/// this only describes numeric data the server may send outside of text
/// lines, which this core driver never decodes (`spec.md` §1 non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Splits a connected [`Socket`] into a [`BlockReader`]/[`BlockWriter`]
/// pair (`spec.md` §4.10, §5: the Send Pipeline's background writer task
/// must own the write side independently of the caller's read loop).
pub(crate) fn split(socket: Socket) -> (BlockReader, BlockWriter) {
    let (reader, writer) = socket.into_split();
    (
        BlockReader {
            socket: reader,
            raw: BytesMut::new(),
            pending_text: String::new(),
            byte_order: ByteOrder::Little,
        },
        BlockWriter {
            socket: writer,
            wbuf: BytesMut::new(),
        },
    )
}

/// The read half of the Block Transport: decodes framed blocks into a
/// persistent UTF-8 text stream and splits it into lines.
pub(crate) struct BlockReader {
    socket: SocketReader,
    /// Raw bytes received from the socket not yet decoded to UTF-8 (may end
    /// in an incomplete multi-byte sequence).
    raw: BytesMut,
    /// Decoded text not yet consumed as a line.
    pending_text: String,
    byte_order: ByteOrder,
}

impl BlockReader {
    pub(crate) fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    pub(crate) fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub(crate) fn set_read_timeout(&mut self, millis: u64) {
        self.socket.set_read_timeout(millis);
    }

    /// Blocks until a `\n` is found (reading more blocks as needed),
    /// strips it, and returns the line.
    pub(crate) async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(idx) = memchr::memchr(b'\n', self.pending_text.as_bytes()) {
                let line = self.pending_text[..idx].to_string();
                self.pending_text.drain(..=idx);
                return Ok(line);
            }

            if self.pending_text.len() > MAX_LINE_BUFFER {
                return Err(protocol_err!(
                    "line exceeded the maximum buffer size of {MAX_LINE_BUFFER} bytes"
                ));
            }

            self.read_one_block().await?;
        }
    }

    /// Reads one block's header and payload and decodes whatever complete
    /// UTF-8 text it contains into `pending_text`, per the "reader
    /// continues until a `\n` is found... or a fresh header must be read"
    /// rule of `spec.md` §4.1. The block's own last-block bit is otherwise
    /// ignored here: it marks a message boundary, not a line boundary.
    async fn read_one_block(&mut self) -> Result<()> {
        let mut header_bytes = [0u8; 2];
        self.socket.read_exact(&mut header_bytes).await?;
        let header = LittleEndian::read_u16(&header_bytes);
        let len = (header >> 1) as usize;

        if len > 0 {
            let start = self.raw.len();
            self.raw.resize(start + len, 0);
            self.socket.read_exact(&mut self.raw[start..]).await?;
        }

        self.decode_available()?;
        Ok(())
    }

    /// Decodes the longest valid UTF-8 prefix of `self.raw`, appending it to
    /// `pending_text` and leaving any trailing incomplete sequence in
    /// `raw` for the next block. A genuinely malformed sequence is a
    /// protocol error that aborts the connection (`spec.md` §4.1).
    fn decode_available(&mut self) -> Result<()> {
        if self.raw.is_empty() {
            return Ok(());
        }

        match std::str::from_utf8(&self.raw) {
            Ok(text) => {
                self.pending_text.push_str(text);
                self.raw.clear();
            }
            Err(e) => {
                let valid_len = e.valid_up_to();
                // `valid_up_to` guarantees `raw[..valid_len]` is valid UTF-8.
                let text = std::str::from_utf8(&self.raw[..valid_len])?;
                self.pending_text.push_str(text);

                match e.error_len() {
                    // An incomplete sequence at the very end: keep the
                    // undecoded tail for the next block.
                    None => {
                        self.raw.advance(valid_len);
                    }
                    // A genuinely malformed sequence.
                    Some(_) => {
                        return Err(protocol_err!(
                            "malformed utf-8 sequence at byte {valid_len} of block payload"
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// The write half of the Block Transport: buffers a logical message, then
/// splits it into blocks at [`BlockWriter::flush`], materializing the
/// whole message before chunking it.
pub(crate) struct BlockWriter {
    socket: SocketWriter,
    wbuf: BytesMut,
}

impl BlockWriter {
    /// Writes `prefix`, `body`, and `suffix` back-to-back into the outbound
    /// buffer, then flushes (sets the last-block bit on the final block)
    /// (`spec.md` §4.1).
    pub(crate) async fn write_line(
        &mut self,
        prefix: Option<&str>,
        body: &str,
        suffix: Option<&str>,
    ) -> Result<()> {
        if let Some(p) = prefix {
            self.wbuf.put_slice(p.as_bytes());
        }
        self.wbuf.put_slice(body.as_bytes());
        if let Some(s) = suffix {
            self.wbuf.put_slice(s.as_bytes());
        }
        self.flush().await
    }

    /// Buffers `text` without flushing; used by the Send Pipeline to
    /// accumulate an oversize query before its single final flush
    /// (`spec.md` §4.10).
    pub(crate) fn buffer(&mut self, text: &str) {
        self.wbuf.put_slice(text.as_bytes());
    }

    /// Emits everything buffered so far as one or more framed blocks, the
    /// final one carrying the last-block bit. A no-op if nothing is
    /// buffered.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }

        let mut offset = 0;
        let total = self.wbuf.len();
        while offset < total {
            let end = (offset + MAX_BLOCK_PAYLOAD).min(total);
            let is_last = end == total;
            let header = (((end - offset) as u16) << 1) | (is_last as u16);
            let mut header_bytes = [0u8; 2];
            LittleEndian::write_u16(&mut header_bytes, header);
            self.socket.write_all(&header_bytes).await?;
            self.socket.write_all(&self.wbuf[offset..end]).await?;
            offset = end;
        }

        self.wbuf.clear();
        self.socket.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pure unit test of the incremental UTF-8 decoder against a multi-byte
    /// character split across two simulated block reads, without needing a
    /// live socket (`spec.md` §8: round-trip/decode invariants).
    #[test]
    fn decode_available_reassembles_split_multibyte_char() {
        // "café" - the 'é' is 2 bytes (0xC3 0xA9), split across two pushes.
        let full = "caf\u{e9}".as_bytes().to_vec();
        let (first, second) = full.split_at(full.len() - 1);

        let mut raw = first.to_vec();
        let mut pending = String::new();

        fn step(raw: &mut Vec<u8>, pending: &mut String) {
            if raw.is_empty() {
                return;
            }
            match std::str::from_utf8(raw) {
                Ok(text) => {
                    pending.push_str(text);
                    raw.clear();
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    let text = std::str::from_utf8(&raw[..valid_len]).unwrap();
                    pending.push_str(text);
                    if e.error_len().is_none() {
                        raw.drain(..valid_len);
                    } else {
                        panic!("malformed");
                    }
                }
            }
        }

        step(&mut raw, &mut pending);
        assert_eq!(pending, "caf");
        assert_eq!(raw, first[first.len() - 1..].to_vec());

        raw.extend_from_slice(second);
        step(&mut raw, &mut pending);
        assert_eq!(pending, "caf\u{e9}");
        assert!(raw.is_empty());
    }

    #[test]
    fn max_block_payload_matches_spec() {
        assert_eq!(MAX_BLOCK_PAYLOAD, 8190);
    }
}
