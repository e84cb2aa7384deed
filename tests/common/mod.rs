//! Shared harness for the `tests/*.rs` integration suites: a loopback TCP
//! "fake server" that speaks just enough of the MAPI block/line wire
//! format (`spec.md` §4.1, §6) to drive [`monetdb_mapi::MapiConnection`]
//! through the scenarios in `spec.md` §8, without a live MonetDB server.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Largest payload a single block may carry (`spec.md` §3): `8*1024 - 2`.
const MAX_BLOCK_PAYLOAD: usize = 8 * 1024 - 2;

/// Binds a fake server to an ephemeral loopback port.
pub async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind fake MAPI server");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Reads one client-written logical message (everything up to and
/// including the block carrying the last-block bit) and returns it
/// decoded as UTF-8, matching `BlockWriter::write_line`'s one-flush-per-call
/// framing (`spec.md` §4.1).
pub async fn recv(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    loop {
        let mut header = [0u8; 2];
        stream
            .read_exact(&mut header)
            .await
            .expect("fake server: failed to read block header");
        let header = u16::from_le_bytes(header);
        let len = (header >> 1) as usize;
        let last = header & 1 == 1;

        if len > 0 {
            let start = buf.len();
            buf.resize(start + len, 0);
            stream
                .read_exact(&mut buf[start..])
                .await
                .expect("fake server: failed to read block payload");
        }

        if last {
            break;
        }
    }
    String::from_utf8(buf).expect("fake server: client sent non-UTF-8")
}

/// Writes `text` as one or more framed blocks, chunked at the maximum
/// block payload with the last-block bit set only on the final chunk
/// (`spec.md` §4.1). `text` should already end in `\n` when it represents
/// complete server lines.
pub async fn send(stream: &mut TcpStream, text: &str) {
    let bytes = text.as_bytes();
    let mut offset = 0;
    loop {
        let end = (offset + MAX_BLOCK_PAYLOAD).min(bytes.len());
        let is_last = end == bytes.len();
        let header = (((end - offset) as u16) << 1) | (is_last as u16);
        stream
            .write_all(&header.to_le_bytes())
            .await
            .expect("fake server: failed to write block header");
        stream
            .write_all(&bytes[offset..end])
            .await
            .expect("fake server: failed to write block payload");
        offset = end;
        if is_last {
            break;
        }
    }
    stream.flush().await.expect("fake server: failed to flush");
}

/// Convenience: joins `lines` with `\n`, appends a trailing `\n`, and sends
/// the result as one logical message.
pub async fn send_lines(stream: &mut TcpStream, lines: &[&str]) {
    let mut text = lines.join("\n");
    text.push('\n');
    send(stream, &text).await;
}

/// Enables `log` output during tests, matching the teacher's inline
/// `env_logger::builder().is_test(true).try_init()` convention.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
