//! Connection parameters exposed to callers (`spec.md` §6).

use std::fmt;

mod parse;

/// Which MAPI sub-language a session speaks. Determines how control
/// commands are framed and whether `reply_size` is ever sent (`spec.md`
/// §4.8 step 1: only for `Language::Sql`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Sql,
    Mal,
    Control,
}

impl Language {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Language::Sql => "sql",
            Language::Mal => "mal",
            Language::Control => "control",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sql" => Ok(Language::Sql),
            "mal" => Ok(Language::Mal),
            "control" => Ok(Language::Control),
            other => Err(crate::error::Error::config(MapiInvalidOption(format!(
                "language={other} is not one of sql, mal, control"
            )))),
        }
    }
}

/// The five hash algorithms MAPI authentication may negotiate, in the
/// driver's preference order (`spec.md` §4.6): strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha512,
    Sha384,
    Sha256,
    Sha1,
    Md5,
}

impl HashAlgorithm {
    /// Preference order, strongest first, used both to pick the challenge
    /// hash and the password-digest hash.
    pub(crate) const PREFERENCE_ORDER: [HashAlgorithm; 5] = [
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha1,
        HashAlgorithm::Md5,
    ];

    pub(crate) fn tag(self) -> &'static str {
        match self {
            HashAlgorithm::Sha512 => "SHA512",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Md5 => "MD5",
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA512" => Ok(HashAlgorithm::Sha512),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "MD5" => Ok(HashAlgorithm::Md5),
            other => Err(crate::error::Error::config(MapiInvalidOption(format!(
                "unsupported hash algorithm: {other}"
            )))),
        }
    }
}

/// Options and flags used to configure a MAPI connection.
///
/// Connection strings are of the form:
/// ```text
/// mapi://[user[:password]@]host[:port]/database[?language=sql&follow_redirects=true&...]
/// ```
#[derive(Debug, Clone)]
pub struct MapiConnectOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub language: Language,
    pub follow_redirects: bool,
    pub ttl: u32,
    pub hash_preference: Option<Vec<HashAlgorithm>>,
    pub so_timeout_ms: u64,
    pub treat_blob_as_binary: bool,
    pub treat_clob_as_longvarchar: bool,
    pub fetch_size: u32,
    /// Whether the caller set `fetch_size` explicitly, which disables the
    /// adaptive-prefetch growth heuristic of `spec.md` §4.9 regardless of
    /// the value chosen.
    pub fetch_size_explicit: bool,
    pub max_rows: u32,
}

impl Default for MapiConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MapiConnectOptions {
    pub fn new() -> Self {
        Self {
            host: String::from("localhost"),
            port: 50000,
            database: String::new(),
            user: String::from("monetdb"),
            password: String::from("monetdb"),
            language: Language::Sql,
            follow_redirects: true,
            ttl: 10,
            hash_preference: None,
            so_timeout_ms: 0,
            treat_blob_as_binary: false,
            treat_clob_as_longvarchar: false,
            fetch_size: 250,
            fetch_size_explicit: false,
            max_rows: 0,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_owned();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_owned();
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_owned();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_owned();
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn hash_preference(mut self, algorithms: Vec<HashAlgorithm>) -> Self {
        self.hash_preference = Some(algorithms);
        self
    }

    pub fn so_timeout_ms(mut self, millis: u64) -> Self {
        self.so_timeout_ms = millis;
        self
    }

    pub fn treat_blob_as_binary(mut self, yes: bool) -> Self {
        self.treat_blob_as_binary = yes;
        self
    }

    pub fn treat_clob_as_longvarchar(mut self, yes: bool) -> Self {
        self.treat_clob_as_longvarchar = yes;
        self
    }

    /// Default number of rows per fetched block. Errors if zero.
    pub fn fetch_size(mut self, size: u32) -> Result<Self, Self> {
        if size == 0 {
            Err(self)
        } else {
            self.fetch_size = size;
            self.fetch_size_explicit = true;
            Ok(self)
        }
    }

    pub fn max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }
}

#[derive(Debug)]
pub(crate) struct MapiInvalidOption(pub(crate) String);

impl fmt::Display for MapiInvalidOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MapiInvalidOption {}
