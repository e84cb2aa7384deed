//! Protocol Engine reader (`spec.md` §4.8–§4.9): pumps classified lines
//! out of the Block Transport, dispatches them to Responses, and drives
//! the `export`/`close` control-command round trips the Response List's
//! block cache needs.

use crate::error::{protocol_err, Error, Result};
use crate::io::BlockReader;
use crate::protocol::line::{self, LineType};
use crate::protocol::redirect::{self, RedirectTarget};
use crate::protocol::soheader::{self, SoHeaderKind};
use crate::response::data_block::DataBlock;
use crate::response::Response;
use crate::response_list::{ResponseList, ResultSetType};

/// Lines collected on the way to a `.` prompt that don't belong to any
/// Response: `#` info lines become warnings, a `^` line is a handshake
/// redirect (`spec.md` §4.6, §4.7).
#[derive(Default)]
pub(crate) struct Preamble {
    pub warnings: Vec<String>,
    pub redirect: Option<RedirectTarget>,
}

/// Reads lines until a `.` prompt, collecting everything along the way
/// (`spec.md` §4.7, §4.8): info lines become warnings, a redirect line is
/// recorded but does not end the wait (the merovingian proxy still sends a
/// trailing prompt before the socket is handed back for re-authentication),
/// and error lines are buffered and reported as a single [`Error::Auth`]
/// once the prompt is finally reached, since a rejected login is a fatal
/// authentication failure rather than a recoverable SQL error.
pub(crate) async fn wait_until_prompt(reader: &mut BlockReader) -> Result<Preamble> {
    let mut preamble = Preamble::default();
    let mut errors = Vec::new();
    loop {
        let raw = reader.read_line().await?;
        let (ty, text) = line::classify(&raw);
        match ty {
            LineType::Prompt => {
                if errors.is_empty() {
                    return Ok(preamble);
                }
                return Err(Error::Auth(errors.join("; ")));
            }
            LineType::Info => preamble.warnings.push(text[1..].to_string()),
            LineType::Redirect => preamble.redirect = Some(redirect::parse(&text)?),
            LineType::Error => errors.push(text.strip_prefix('!').unwrap_or(&text).to_string()),
            other => {
                return Err(protocol_err!(
                    "unexpected {other:?} line while waiting for the server to become ready"
                ))
            }
        }
    }
}

/// Splits a `!SQLSTATE!message` error line into [`Error::Sql`] (`spec.md`
/// §4.8 step 4).
pub(crate) fn split_sql_error(text: &str) -> Error {
    let body = text.strip_prefix('!').unwrap_or(text);
    match body.split_once('!') {
        Some((sqlstate, message)) => Error::Sql {
            sqlstate: sqlstate.to_string(),
            message: message.to_string(),
        },
        None => Error::protocol(format!("malformed error line: {text:?}")),
    }
}

/// Reads one statement's full reply into a [`ResponseList`]: zero or more
/// top-level Responses interleaved with info lines, ending at the `.`
/// prompt (`spec.md` §4.8).
pub(crate) async fn read_response(
    reader: &mut BlockReader,
    cache_size: u32,
    max_rows: u32,
    rs_type: ResultSetType,
    cache_size_explicit: bool,
) -> Result<(ResponseList, Vec<String>)> {
    let mut list = ResponseList::new(cache_size, max_rows, rs_type);
    let mut warnings = Vec::new();
    let forward_only = rs_type == ResultSetType::ForwardOnly;

    loop {
        let raw = reader.read_line().await?;
        let (ty, text) = line::classify(&raw);

        match ty {
            LineType::Prompt => return Ok((list, warnings)),
            LineType::More => continue,
            LineType::Info => warnings.push(text[1..].to_string()),
            LineType::Error => return Err(split_sql_error(&text)),
            LineType::Redirect => {
                return Err(protocol_err!("unexpected mid-statement redirect: {text}"))
            }
            LineType::SoHeader => {
                let header = soheader::parse(&text)?;
                let seqnr = list.seqnr();
                let mut response = Response::from_soheader(header, seqnr, cache_size_explicit, forward_only)?;
                fill_response(reader, &mut response).await?;
                list.push(response);
            }
            other => {
                return Err(protocol_err!(
                    "unexpected {other:?} line outside of a result set"
                ))
            }
        }
    }
}

/// Pulls Header/Result/ResultSingleton lines into `response` until it
/// stops wanting more (`spec.md` §4.9: all header kinds seen and the
/// first DataBlock full).
async fn fill_response(reader: &mut BlockReader, response: &mut Response) -> Result<()> {
    while response.wants_more() {
        let raw = reader.read_line().await?;
        let (ty, text) = line::classify(&raw);
        match ty {
            LineType::Header | LineType::Result | LineType::ResultSingleton => {
                response.ingest(&text, ty)?;
            }
            LineType::Error => return Err(split_sql_error(&text)),
            other => {
                return Err(protocol_err!(
                    "unexpected {other:?} line while filling a response"
                ))
            }
        }
    }
    Ok(())
}

/// Reads the reply to an `Xexport <id> <offset> <count>` control command:
/// a single Block SOHeader followed by exactly `rowcount` tuple rows,
/// ending at the prompt (`spec.md` §4.9).
pub(crate) async fn read_export_block(
    reader: &mut BlockReader,
    columncount: usize,
    forward_only: bool,
) -> Result<(i64, DataBlock)> {
    let raw = reader.read_line().await?;
    let (ty, text) = line::classify(&raw);
    let header = match ty {
        LineType::SoHeader => soheader::parse(&text)?,
        LineType::Error => return Err(split_sql_error(&text)),
        other => return Err(protocol_err!("expected a block SOHeader, got {other:?}")),
    };
    if header.kind != SoHeaderKind::Block {
        return Err(protocol_err!(
            "expected a Block SOHeader in reply to an export command, got {:?}",
            header.kind
        ));
    }

    let (id, hdr_columncount, rowcount, offset) = header
        .block_fields()
        .ok_or_else(|| protocol_err!("malformed block SOHeader"))?;
    if hdr_columncount as usize != columncount {
        return Err(protocol_err!(
            "block SOHeader column count {hdr_columncount} does not match the result set's {columncount}"
        ));
    }

    let mut block = DataBlock::new(rowcount as usize, offset, columncount, forward_only);
    for _ in 0..rowcount {
        let raw = reader.read_line().await?;
        let (ty, text) = line::classify(&raw);
        match ty {
            LineType::Result => block.add_line(&text, LineType::Result)?,
            LineType::Error => return Err(split_sql_error(&text)),
            other => return Err(protocol_err!("expected a tuple row, got {other:?}")),
        }
    }

    wait_until_prompt(reader).await?;
    Ok((id, block))
}
