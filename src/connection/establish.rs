//! Connection establishment (`spec.md` §4.6, §4.7): TCP connect, the
//! challenge/response handshake, and the `mapi:`/`merovingian:` redirect
//! loop, which may recurse into the handshake itself.

use std::future::Future;
use std::pin::Pin;

use crate::connection::stream::wait_until_prompt;
use crate::error::{Error, RedirectList, Result};
use crate::io::{self, BlockReader, BlockWriter};
use crate::net::Socket;
use crate::options::MapiConnectOptions;
use crate::protocol::auth;
use crate::protocol::redirect::{self, RedirectScheme, RedirectTarget};

/// A freshly authenticated, prompt-ready transport plus the options that
/// produced it (which may differ from the caller's original options after
/// following redirects) and any warnings the server sent during login.
pub(crate) struct Established {
    pub reader: BlockReader,
    pub writer: BlockWriter,
    pub options: MapiConnectOptions,
    pub warnings: Vec<String>,
}

/// Connects and authenticates, following `mapi:` redirects up to
/// `options.ttl` hops (`spec.md` §4.7).
pub(crate) async fn connect(options: MapiConnectOptions) -> Result<Established> {
    let ttl = options.ttl;
    connect_fresh(options, ttl).await
}

/// Opens a new TCP connection and runs the handshake on it. Boxed because
/// the handshake may recurse back into this function (`RedirectScheme::Monetdb`).
fn connect_fresh(
    options: MapiConnectOptions,
    ttl: u32,
) -> Pin<Box<dyn Future<Output = Result<Established>> + Send>> {
    Box::pin(async move {
        log::debug!("connecting to {}:{}", options.host, options.port);
        let socket = Socket::connect(&options.host, options.port).await?;
        let (mut reader, writer) = io::split(socket);
        reader.set_read_timeout(options.so_timeout_ms);
        handshake(reader, writer, options, ttl).await
    })
}

/// Runs one challenge/response round on an already-open transport and
/// follows whatever redirect (if any) the server answers with. Boxed
/// because a `RedirectScheme::Merovingian` redirect recurses into this
/// same function on the same socket.
fn handshake(
    mut reader: BlockReader,
    mut writer: BlockWriter,
    options: MapiConnectOptions,
    ttl: u32,
) -> Pin<Box<dyn Future<Output = Result<Established>> + Send>> {
    Box::pin(async move {
        let challenge_line = reader.read_line().await?;
        let (response, byte_order) = auth::respond(&challenge_line, &options)?;
        reader.set_byte_order(byte_order);
        writer.write_line(None, &response, Some("\n")).await?;

        let preamble = wait_until_prompt(&mut reader).await?;

        let Some(target) = preamble.redirect else {
            log::debug!(
                "authenticated with {}:{} as {} (database {:?})",
                options.host, options.port, options.user, options.database
            );
            return Ok(Established {
                reader,
                writer,
                options,
                warnings: preamble.warnings,
            });
        };

        if !options.follow_redirects {
            return Err(Error::Redirected(RedirectList(vec![redirect_uri(&target)])));
        }

        let ttl = redirect::decrement_ttl(ttl)?;
        let next_options = redirect::apply(&options, &target);

        match target.scheme {
            // Tear down and reconnect fresh to the redirect target.
            RedirectScheme::Monetdb => {
                log::debug!(
                    "redirected to {}:{}, reconnecting",
                    next_options.host, next_options.port
                );
                connect_fresh(next_options, ttl).await
            }
            // The proxy has already switched us through on the same
            // socket; re-run the handshake there instead of reconnecting.
            RedirectScheme::Merovingian => {
                log::debug!(
                    "redirected to {}:{} via merovingian, re-authenticating on the same socket",
                    next_options.host, next_options.port
                );
                handshake(reader, writer, next_options, ttl).await
            }
        }
    })
}

fn redirect_uri(target: &RedirectTarget) -> String {
    format!(
        "mapi:{}://{}:{}/{}",
        match target.scheme {
            RedirectScheme::Monetdb => "monetdb",
            RedirectScheme::Merovingian => "merovingian",
        },
        target.host,
        target.port,
        target.database.as_deref().unwrap_or(""),
    )
}
