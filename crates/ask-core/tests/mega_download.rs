use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ask_core::error::{BootstrapError, FetchError};
use ask_core::mega::{FileKey, MegaClient, RemoteObject, RemoteStore};
use ask_core::{BootstrapOutcome, CredentialStore, SessionBootstrapper};
use mockito::Matcher;
use tempfile::tempdir;

const CREDS: &[u8] = br#"{"noiseKey":{"private":"AAA","public":"BBB"},"registered":true}"#;

fn sealed_creds() -> (Vec<u8>, FileKey) {
    FileKey::seal(*b"fedcba9876543210", *b"12345678", CREDS)
}

fn object(file_id: &str, key: &FileKey) -> RemoteObject {
    RemoteObject {
        host: "mega.nz".into(),
        file_id: file_id.into(),
        key: key.encode(),
    }
}

#[tokio::test]
async fn downloads_and_decrypts_public_file() {
    let mut server = mockito::Server::new_async().await;
    let (ciphertext, key) = sealed_creds();
    let ticket = serde_json::json!([{ "s": ciphertext.len(), "g": format!("{}/dl/1", server.url()) }]);
    let api = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .match_body(Matcher::Regex(r#""p":"abc123""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ticket.to_string())
        .create_async()
        .await;
    let body = server
        .mock("GET", "/dl/1")
        .with_status(200)
        .with_body(ciphertext)
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let bytes = client.download(&object("abc123", &key)).await.unwrap();
    assert_eq!(bytes, CREDS);
    api.assert_async().await;
    body.assert_async().await;
}

#[tokio::test]
async fn missing_file_maps_api_code() {
    let mut server = mockito::Server::new_async().await;
    let (_, key) = sealed_creds();
    let _api1 = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(200)
        .with_body("[-9]")
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let err = client.download(&object("gone", &key)).await.unwrap_err();
    assert!(matches!(err, FetchError::Api { code: -9 }));
}

#[tokio::test]
async fn busy_api_is_retried_until_a_ticket_arrives() {
    let mut server = mockito::Server::new_async().await;
    let (ciphertext, key) = sealed_creds();
    let ticket = serde_json::json!([{ "s": ciphertext.len(), "g": format!("{}/dl/3", server.url()) }]);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let api = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(200)
        .with_body_from_request(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                b"[-3]".to_vec()
            } else {
                ticket.to_string().into_bytes()
            }
        })
        .expect(2)
        .create_async()
        .await;
    let body = server
        .mock("GET", "/dl/3")
        .with_status(200)
        .with_body(ciphertext)
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let bytes = client.download(&object("abc123", &key)).await.unwrap();
    assert_eq!(bytes, CREDS);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    api.assert_async().await;
    body.assert_async().await;
}

#[tokio::test]
async fn busy_api_retries_are_bounded() {
    let mut server = mockito::Server::new_async().await;
    let (_, key) = sealed_creds();
    // one initial request plus three retries
    let api = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(200)
        .with_body("[-3]")
        .expect(4)
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let err = client.download(&object("abc123", &key)).await.unwrap_err();
    assert!(matches!(err, FetchError::Api { code: -3 }));
    api.assert_async().await;
}

#[tokio::test]
async fn invalid_key_fails_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let api = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .expect(0)
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let bad = RemoteObject {
        host: "mega.nz".into(),
        file_id: "abc123".into(),
        key: "deadbeef".into(),
    };
    let err = client.download(&bad).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidKey(_)));
    api.assert_async().await;
}

#[tokio::test]
async fn truncated_body_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let (ciphertext, key) = sealed_creds();
    let ticket = serde_json::json!([{ "s": ciphertext.len() + 10, "g": format!("{}/dl/2", server.url()) }]);
    let _api2 = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(200)
        .with_body(ticket.to_string())
        .create_async()
        .await;
    let _body2 = server
        .mock("GET", "/dl/2")
        .with_status(200)
        .with_body(ciphertext)
        .create_async()
        .await;

    let client = MegaClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let err = client.download(&object("abc123", &key)).await.unwrap_err();
    assert!(matches!(err, FetchError::SizeMismatch { .. }));
}

#[tokio::test]
async fn stalled_server_hits_the_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });

    let (_, key) = sealed_creds();
    let client = MegaClient::new(format!("http://{addr}"), Duration::from_millis(200)).unwrap();
    let err = client.download(&object("abc123", &key)).await.unwrap_err();
    match err {
        FetchError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
    hold.abort();
}

#[tokio::test]
async fn bootstrap_persists_exact_downloaded_bytes() {
    let mut server = mockito::Server::new_async().await;
    let (ciphertext, key) = sealed_creds();
    let ticket = serde_json::json!([{ "s": ciphertext.len(), "g": format!("{}/dl/3", server.url()) }]);
    let _api3 = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(200)
        .with_body(ticket.to_string())
        .create_async()
        .await;
    let _body3 = server
        .mock("GET", "/dl/3")
        .with_status(200)
        .with_body(ciphertext)
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("session"));
    let client = Arc::new(MegaClient::new(server.url(), Duration::from_secs(5)).unwrap());
    let token = format!("ASK-XMD~;;;abc123#{}", key.encode());
    let boot = SessionBootstrapper::new(store.clone(), client, Some(token));

    assert_eq!(boot.initialize().await, BootstrapOutcome::Downloaded);
    assert_eq!(std::fs::read(store.creds_path()).unwrap(), CREDS);
    assert_eq!(boot.initialize().await, BootstrapOutcome::ExistingSession);
}

#[tokio::test]
async fn remote_failure_is_reported_as_remote_fetch() {
    let mut server = mockito::Server::new_async().await;
    let _api4 = server
        .mock("POST", Matcher::Regex(r"^/cs".to_string()))
        .with_status(500)
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let (_, key) = sealed_creds();
    let client = Arc::new(MegaClient::new(server.url(), Duration::from_secs(5)).unwrap());
    let boot = SessionBootstrapper::new(
        CredentialStore::new(dir.path()),
        client,
        Some(format!("ASK-XMD~;;;abc123#{}", key.encode())),
    );
    let err = boot.acquire_credentials().await.unwrap_err();
    assert!(matches!(
        err,
        BootstrapError::RemoteFetch(FetchError::Status(500))
    ));
    assert_eq!(boot.initialize().await, BootstrapOutcome::Unauthenticated);
    assert!(!boot.store().exists());
}
