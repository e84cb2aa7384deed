//! Redirect Engine (`spec.md` §4.7): parses `^mapi:monetdb://...` and
//! `^mapi:merovingian://...` lines and folds them into connect options for
//! the next hop.

use std::str::FromStr;

use url::Url;

use crate::error::{protocol_err, Error, Result};
use crate::options::{Language, MapiConnectOptions};

/// Which inner scheme a redirect uses, determining whether the client
/// reconnects from scratch or reuses the socket (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RedirectScheme {
    /// Tear down the transport and connect fresh to `host:port/database`.
    Monetdb,
    /// The proxy already switched us through; re-run authentication on
    /// the same socket.
    Merovingian,
}

/// One redirect target parsed out of a `^` line.
#[derive(Debug, Clone)]
pub(crate) struct RedirectTarget {
    pub scheme: RedirectScheme,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub language: Option<Language>,
}

/// Parses a `^mapi:<scheme>://host[:port]/database[?query]` line. `query`
/// may set `database`/`language`; a `user`/`password` key is logged and
/// ignored rather than rejected, since credentials never travel in a
/// redirect.
pub(crate) fn parse(line: &str) -> Result<RedirectTarget> {
    let uri = line
        .strip_prefix('^')
        .ok_or_else(|| protocol_err!("not a redirect line: {line:?}"))?;
    let rest = uri
        .strip_prefix("mapi:")
        .ok_or_else(|| protocol_err!("unsupported redirect uri: {uri:?}"))?;

    let url: Url = rest
        .parse()
        .map_err(|e| protocol_err!("malformed redirect uri {rest:?}: {e}"))?;

    let scheme = match url.scheme() {
        "monetdb" => RedirectScheme::Monetdb,
        "merovingian" => RedirectScheme::Merovingian,
        other => return Err(protocol_err!("unsupported redirect scheme: {other:?}")),
    };

    let host = url
        .host_str()
        .ok_or_else(|| protocol_err!("redirect uri is missing a host: {rest:?}"))?
        .to_string();
    let port = url.port().unwrap_or(50000);

    let path = url.path().trim_start_matches('/');
    let mut database = if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    };
    let mut language = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "database" => database = Some(value.into_owned()),
            "language" => language = Some(Language::from_str(&value)?),
            "user" | "password" => {
                log::warn!("ignoring `{key}` in redirect target {rest:?}; credentials come from the original connect options");
            }
            other => {
                log::debug!("ignoring unknown redirect query parameter `{other}` in {rest:?}");
            }
        }
    }

    Ok(RedirectTarget {
        host,
        port,
        database,
        language,
    })
}

/// Builds the connect options for the redirected hop: host, port and
/// (optionally) database/language are overridden; user, password and
/// every other field carry over unchanged.
pub(crate) fn apply(options: &MapiConnectOptions, target: &RedirectTarget) -> MapiConnectOptions {
    let mut next = options.clone().host(&target.host).port(target.port);
    if let Some(database) = &target.database {
        next = next.database(database);
    }
    if let Some(language) = target.language {
        next = next.language(language);
    }
    next
}

/// Decrements the redirect hop budget, failing once it is exhausted
/// (`spec.md` §4.7).
pub(crate) fn decrement_ttl(ttl: u32) -> Result<u32> {
    ttl.checked_sub(1).ok_or(Error::RedirectLoop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monetdb_redirect() {
        let target = parse("^mapi:monetdb://db.example.com:12345/prod").unwrap();
        assert_eq!(target.host, "db.example.com");
        assert_eq!(target.port, 12345);
        assert_eq!(target.database.as_deref(), Some("prod"));
    }

    #[test]
    fn parses_merovingian_redirect_with_default_port() {
        let target = parse("^mapi:merovingian://proxy.example.com/").unwrap();
        assert_eq!(target.host, "proxy.example.com");
        assert_eq!(target.port, 50000);
    }

    #[test]
    fn query_overrides_database_and_language() {
        let target = parse("^mapi:monetdb://host/ignored?database=real&language=mal").unwrap();
        assert_eq!(target.database.as_deref(), Some("real"));
        assert_eq!(target.language, Some(Language::Mal));
    }

    #[test]
    fn ignores_user_and_password_in_query() {
        let target = parse("^mapi:monetdb://host/db?user=bob&password=hunter2").unwrap();
        assert_eq!(target.database.as_deref(), Some("db"));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(parse("^mapi:http://host/db").is_err());
    }

    #[test]
    fn apply_overrides_host_port_and_database() {
        let options = MapiConnectOptions::new().host("old").port(1).database("olddb");
        let target = RedirectTarget {
            scheme: RedirectScheme::Monetdb,
            host: "new".to_string(),
            port: 2,
            database: Some("newdb".to_string()),
            language: None,
        };
        let next = apply(&options, &target);
        assert_eq!(next.host, "new");
        assert_eq!(next.port, 2);
        assert_eq!(next.database, "newdb");
        assert_eq!(next.user, options.user);
    }

    #[test]
    fn ttl_exhaustion_errors() {
        assert!(decrement_ttl(1).is_ok());
        assert!(matches!(decrement_ttl(0), Err(Error::RedirectLoop)));
    }
}
