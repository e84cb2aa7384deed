//! Challenge/response Authenticator (`spec.md` §4.6): negotiates a hash
//! algorithm with the server and builds the login response line.

use digest::Digest;

use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::options::{HashAlgorithm, Language, MapiConnectOptions};

/// MAPI protocol version this driver speaks. Anything else is rejected.
const SUPPORTED_PROTOCOL_VERSION: u32 = 9;

#[derive(Debug, Clone)]
struct Challenge {
    salt: String,
    server_name: String,
    server_hashes: Vec<HashAlgorithm>,
    byte_order: ByteOrder,
    password_hash_algo: HashAlgorithm,
}

/// Parses the server's `salt:serverName:proto:hashList:byteOrder:pwHash[:...]`
/// challenge line, returning both the response line to write back and the
/// byte order to apply to the Block Transport (`spec.md` §4.6).
pub(crate) fn respond(challenge_line: &str, options: &MapiConnectOptions) -> Result<(String, ByteOrder)> {
    let challenge = parse_challenge(challenge_line)?;
    let selected = select_hash(&challenge.server_hashes, options.hash_preference.as_deref())?;

    // Merovingian masks the real credentials with its own well-known ones so
    // it can re-authenticate to the real server on our behalf, unless we are
    // already speaking the control language to it directly (`spec.md` §4.6).
    let (user, password) = if challenge.server_name.eq_ignore_ascii_case("merovingian")
        && options.language != Language::Control
    {
        ("merovingian".to_string(), "merovingian".to_string())
    } else {
        (options.user.clone(), options.password.clone())
    };

    let password_digest = digest_hex(challenge.password_hash_algo, password.as_bytes());
    let combined = format!("{password_digest}{}", challenge.salt);
    let response_digest = digest_hex(selected, combined.as_bytes());

    let response = format!(
        "BIG:{user}:{{{tag}}}{response_digest}:{language}:{database}:",
        tag = selected.tag(),
        language = options.language.as_str(),
        database = options.database,
    );
    Ok((response, challenge.byte_order))
}

fn parse_challenge(line: &str) -> Result<Challenge> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 6 {
        return Err(Error::Auth(format!("malformed challenge line: {line:?}")));
    }

    let salt = parts[0].to_string();
    let server_name = parts[1].to_string();

    let protocol_version: u32 = parts[2]
        .parse()
        .map_err(|_| Error::Auth(format!("non-numeric protocol version: {:?}", parts[2])))?;
    if protocol_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(Error::Auth(format!(
            "unsupported protocol version {protocol_version}, only {SUPPORTED_PROTOCOL_VERSION} is supported"
        )));
    }

    let server_hashes: Vec<HashAlgorithm> = parts[3]
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    let byte_order = match parts[4] {
        "BIG" => ByteOrder::Big,
        "LIT" => ByteOrder::Little,
        other => return Err(Error::Auth(format!("unknown byte order: {other:?}"))),
    };

    let password_hash_algo: HashAlgorithm = parts[5]
        .parse()
        .map_err(|_| Error::Auth(format!("unsupported password hash algorithm: {:?}", parts[5])))?;

    Ok(Challenge {
        salt,
        server_name,
        server_hashes,
        byte_order,
        password_hash_algo,
    })
}

/// Picks the strongest algorithm both the server offered and the caller
/// allows, per `HashAlgorithm::PREFERENCE_ORDER` (`spec.md` §4.6, resolved
/// in `SPEC_FULL.md` §F as an intersection preferring the strongest).
fn select_hash(server_hashes: &[HashAlgorithm], caller_pref: Option<&[HashAlgorithm]>) -> Result<HashAlgorithm> {
    for algo in HashAlgorithm::PREFERENCE_ORDER {
        if !server_hashes.contains(&algo) {
            continue;
        }
        if let Some(pref) = caller_pref {
            if !pref.contains(&algo) {
                continue;
            }
        }
        return Ok(algo);
    }
    Err(Error::Auth(
        "no hash algorithm in common between client and server".to_string(),
    ))
}

fn digest_hex(algo: HashAlgorithm, data: &[u8]) -> String {
    match algo {
        HashAlgorithm::Sha512 => hex::encode(sha2::Sha512::digest(data)),
        HashAlgorithm::Sha384 => hex::encode(sha2::Sha384::digest(data)),
        HashAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(data)),
        HashAlgorithm::Sha1 => hex::encode(sha1::Sha1::digest(data)),
        HashAlgorithm::Md5 => hex::encode(md5::Md5::digest(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> MapiConnectOptions {
        MapiConnectOptions::new().user("monetdb").password("monetdb").database("demo")
    }

    #[test]
    fn digest_hex_matches_known_vectors() {
        assert_eq!(
            digest_hex(HashAlgorithm::Md5, b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            digest_hex(HashAlgorithm::Sha1, b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            digest_hex(HashAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn rejects_unsupported_protocol_version() {
        let err = respond("salt:mdb:8:SHA256:LIT:SHA256:", &opts()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn selects_strongest_common_hash() {
        let (resp, order) = respond("salt:mdb:9:MD5,SHA1,SHA256:LIT:MD5:", &opts()).unwrap();
        assert!(resp.contains("{SHA256}"));
        assert_eq!(order, ByteOrder::Little);
    }

    #[test]
    fn honors_caller_hash_preference() {
        let mut opts = opts();
        opts = opts.hash_preference(vec![HashAlgorithm::Md5]);
        let (resp, _) = respond("salt:mdb:9:MD5,SHA1,SHA256:LIT:MD5:", &opts).unwrap();
        assert!(resp.contains("{MD5}"));
    }

    #[test]
    fn errors_when_no_common_hash() {
        let mut opts = opts();
        opts = opts.hash_preference(vec![HashAlgorithm::Sha512]);
        let err = respond("salt:mdb:9:MD5:LIT:MD5:", &opts).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn masks_credentials_for_merovingian_proxy() {
        let (resp, _) = respond("salt:merovingian:9:MD5:LIT:MD5:", &opts()).unwrap();
        assert!(resp.starts_with("BIG:merovingian:"));
    }

    #[test]
    fn does_not_mask_credentials_when_already_speaking_control() {
        let opts = opts().language(crate::options::Language::Control);
        let (resp, _) = respond("salt:merovingian:9:MD5:LIT:MD5:", &opts).unwrap();
        assert!(resp.starts_with("BIG:monetdb:"));
    }

    #[test]
    fn response_carries_language_and_database() {
        let (resp, _) = respond("salt:mdb:9:MD5:LIT:MD5:", &opts()).unwrap();
        assert!(resp.ends_with(":sql:demo:"));
    }

    #[test]
    fn recognizes_big_endian_byte_order() {
        let (_, order) = respond("salt:mdb:9:MD5:BIG:MD5:", &opts()).unwrap();
        assert_eq!(order, ByteOrder::Big);
    }
}
