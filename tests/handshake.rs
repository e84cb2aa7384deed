//! Connection establishment scenarios: plain handshake, the merovingian
//! redirect (`spec.md` §8 scenario 6), non-followed redirects, and TTL
//! exhaustion (`spec.md` §4.7).

mod common;

use monetdb_mapi::{Error, MapiConnectOptions, MapiConnection};

#[tokio::test]
async fn connects_and_authenticates() {
    common::init_logging();
    let (listener, port) = common::bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        common::send_lines(&mut stream, &["saltvalue:mdb:9:MD5:LIT:MD5:"]).await;
        let login = common::recv(&mut stream).await;
        common::send_lines(&mut stream, &["."]).await;
        login
    });

    let options = MapiConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .user("monetdb")
        .password("monetdb")
        .database("demo");
    let conn = MapiConnection::connect_with(options).await.unwrap();
    assert!(!conn.is_closed());

    let login = server.await.unwrap();
    assert!(login.starts_with("BIG:monetdb:"));
    assert!(login.ends_with(":sql:demo:\n"));
}

#[tokio::test]
async fn follows_merovingian_redirect_on_the_same_socket() {
    common::init_logging();
    let (listener, port) = common::bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        // First challenge: talking to the proxy itself.
        common::send_lines(&mut stream, &["saltA:proxy:9:MD5:LIT:MD5:"]).await;
        let first_login = common::recv(&mut stream).await;

        // The proxy redirects us to the real server it fronts, on the very
        // socket we're already connected on, then still sends its trailing
        // prompt before the re-handshake begins.
        common::send_lines(&mut stream, &["^mapi:merovingian://proxy?database=real", "."]).await;

        // The client re-runs the handshake here; this challenge's server
        // name triggers credential masking (`spec.md` §4.6).
        common::send_lines(&mut stream, &["saltB:merovingian:9:MD5:LIT:MD5:"]).await;
        let second_login = common::recv(&mut stream).await;
        common::send_lines(&mut stream, &["."]).await;

        (first_login, second_login)
    });

    let options = MapiConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .user("alice")
        .password("s3cret")
        .database("ignored");
    let conn = MapiConnection::connect_with(options).await.unwrap();

    assert_eq!(conn.options().database, "real");

    let (first_login, second_login) = server.await.unwrap();
    assert!(first_login.starts_with("BIG:alice:"));
    assert!(second_login.starts_with("BIG:merovingian:"));
}

#[tokio::test]
async fn non_followed_redirect_is_surfaced_to_the_caller() {
    common::init_logging();
    let (listener, port) = common::bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        common::send_lines(&mut stream, &["salt:mdb:9:MD5:LIT:MD5:"]).await;
        let _login = common::recv(&mut stream).await;
        common::send_lines(&mut stream, &["^mapi:monetdb://elsewhere:12345/other", "."]).await;
    });

    let options = MapiConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .follow_redirects(false);
    let err = MapiConnection::connect_with(options).await.unwrap_err();
    assert!(matches!(err, Error::Redirected(_)));

    server.await.unwrap();
}

#[tokio::test]
async fn exhausted_ttl_fails_without_a_second_connection_attempt() {
    common::init_logging();
    let (listener, port) = common::bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        common::send_lines(&mut stream, &["salt:mdb:9:MD5:LIT:MD5:"]).await;
        let _login = common::recv(&mut stream).await;
        common::send_lines(&mut stream, &["^mapi:monetdb://elsewhere:12345/other", "."]).await;
    });

    let options = MapiConnectOptions::new().host("127.0.0.1").port(port).ttl(0);
    let err = MapiConnection::connect_with(options).await.unwrap_err();
    assert!(matches!(err, Error::RedirectLoop));

    server.await.unwrap();
}

#[tokio::test]
async fn rejected_login_is_a_fatal_auth_error_not_a_sql_error() {
    common::init_logging();
    let (listener, port) = common::bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        common::send_lines(&mut stream, &["salt:mdb:9:MD5:LIT:MD5:"]).await;
        let _login = common::recv(&mut stream).await;
        common::send_lines(&mut stream, &["!28000!invalid credentials", "."]).await;
    });

    let options = MapiConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .user("monetdb")
        .password("wrong");
    let err = MapiConnection::connect_with(options).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(err.is_fatal());

    server.await.unwrap();
}
