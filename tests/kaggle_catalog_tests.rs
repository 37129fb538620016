//! Integration tests for the Kaggle catalog client against a local HTTP mock

use catalog_ingest::catalog::{
    CatalogClient, CatalogError, KaggleCatalog, KaggleCredentials, SearchRequest,
};
use catalog_ingest::config::CatalogConfig;
use mockito::{Matcher, Server};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

const BASIC_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";

fn client(server: &Server) -> KaggleCatalog {
    client_with_timeout(server, 5)
}

fn client_with_timeout(server: &Server, timeout_secs: u64) -> KaggleCatalog {
    let config = CatalogConfig {
        base_url: server.url(),
        timeout_secs,
    };
    let credentials = KaggleCredentials {
        username: "alice".to_string(),
        key: "secret".to_string(),
    };
    KaggleCatalog::with_credentials(&config, credentials).unwrap()
}

fn request() -> SearchRequest {
    SearchRequest {
        search: "fraud".to_string(),
        min_size: 100_000,
        max_size: 300_000,
    }
}

#[tokio::test]
async fn search_sends_bounds_and_decodes_listing() {
    //* Given
    let mut server = Server::new_async().await;
    let list_mock = server
        .mock("GET", "/datasets/list")
        .match_header("authorization", BASIC_AUTH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("search".into(), "fraud".into()),
            Matcher::UrlEncoded("minSize".into(), "100000".into()),
            Matcher::UrlEncoded("maxSize".into(), "300000".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {
                    "ref": "sgpjesus/bank-account-fraud-dataset-neurips-2022",
                    "url": "https://www.kaggle.com/datasets/sgpjesus/bank-account-fraud-dataset-neurips-2022",
                    "title": "Bank Account Fraud Dataset Suite (NeurIPS 2022)",
                    "totalBytes": 195912345,
                    "lastUpdated": "2023-11-29T15:47:33.15Z",
                    "usabilityRating": 1.0,
                    "downloadCount": 12345
                },
                {
                    "ref": "someone/old-fraud",
                    "title": "Old fraud data",
                    "totalBytes": 150000,
                    "lastUpdated": "2019-02-01T00:00:00Z",
                    "usabilityRating": null
                }
            ]"#,
        )
        .expect(1)
        .create_async()
        .await;

    //* When
    let datasets = client(&server).search(&request()).await.unwrap();

    //* Then
    list_mock.assert_async().await;
    assert_eq!(datasets.len(), 2);
    assert_eq!(
        datasets[0].reference,
        "sgpjesus/bank-account-fraud-dataset-neurips-2022"
    );
    assert_eq!(datasets[0].usability, 1.0);
    assert_eq!(datasets[0].last_updated_year, 2023);
    assert_eq!(datasets[0].size_bytes, 195912345);
    assert_eq!(datasets[1].usability, 0.0);
    assert_eq!(datasets[1].last_updated_year, 2019);
    assert!(datasets[1].url.ends_with("/datasets/someone/old-fraud"));
}

#[tokio::test]
async fn search_maps_unauthorized_to_authentication_error() {
    let mut server = Server::new_async().await;
    let list_mock = server
        .mock("GET", "/datasets/list")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"code": 401, "message": "Unauthenticated"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = client(&server).search(&request()).await.unwrap_err();

    list_mock.assert_async().await;
    assert!(matches!(err, CatalogError::Authentication(_)));
}

#[tokio::test]
async fn search_maps_server_error_to_unavailable() {
    let mut server = Server::new_async().await;
    let _list_mock = server
        .mock("GET", "/datasets/list")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let err = client(&server).search(&request()).await.unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)));
}

#[tokio::test]
async fn search_rejects_malformed_body() {
    let mut server = Server::new_async().await;
    let _list_mock = server
        .mock("GET", "/datasets/list")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = client(&server).search(&request()).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidResponse(_)));
}

#[tokio::test]
async fn download_writes_archive_next_to_file_name() {
    let mut server = Server::new_async().await;
    let download_mock = server
        .mock("GET", "/datasets/download/owner/data/Base.csv")
        .match_header("authorization", BASIC_AUTH)
        .with_status(200)
        .with_body(b"PK-archive-bytes".to_vec())
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("temp");
    let path = client(&server)
        .download_file("owner/data", "Base.csv", &dest, true)
        .await
        .unwrap();

    download_mock.assert_async().await;
    assert_eq!(path, dest.join("Base.csv.zip"));
    assert_eq!(std::fs::read(&path).unwrap(), b"PK-archive-bytes");
}

#[tokio::test]
async fn unforced_download_keeps_existing_archive() {
    let mut server = Server::new_async().await;
    let download_mock = server
        .mock("GET", "/datasets/download/owner/data/Base.csv")
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Base.csv.zip"), b"old").unwrap();

    let path = client(&server)
        .download_file("owner/data", "Base.csv", dir.path(), false)
        .await
        .unwrap();

    download_mock.assert_async().await;
    assert_eq!(std::fs::read(path).unwrap(), b"old");
}

#[tokio::test]
async fn forced_download_replaces_existing_archive() {
    let mut server = Server::new_async().await;
    let _download_mock = server
        .mock("GET", "/datasets/download/owner/data/Base.csv")
        .with_status(200)
        .with_body("new")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Base.csv.zip"), b"old").unwrap();

    let path = client(&server)
        .download_file("owner/data", "Base.csv", dir.path(), true)
        .await
        .unwrap();

    assert_eq!(std::fs::read(path).unwrap(), b"new");
}

#[tokio::test]
async fn download_of_unknown_file_is_not_found() {
    let mut server = Server::new_async().await;
    let _download_mock = server
        .mock("GET", "/datasets/download/owner/data/Nope.csv")
        .with_status(404)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let err = client(&server)
        .download_file("owner/data", "Nope.csv", dir.path(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NotFound(_)));
    assert!(!dir.path().join("Nope.csv.zip").exists());
}

#[tokio::test]
async fn slow_download_that_keeps_streaming_completes() {
    //* Given
    let mut server = Server::new_async().await;
    let _download_mock = server
        .mock("GET", "/datasets/download/owner/data/Base.csv")
        .with_status(200)
        .with_chunked_body(|w| {
            for _ in 0..3 {
                w.write_all(&[b'z'; 1024])?;
                w.flush()?;
                std::thread::sleep(Duration::from_millis(600));
            }
            Ok(())
        })
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();

    //* When
    let path = client_with_timeout(&server, 1)
        .download_file("owner/data", "Base.csv", dir.path(), true)
        .await
        .unwrap();

    //* Then
    assert_eq!(std::fs::read(&path).unwrap().len(), 3 * 1024);
    assert!(!dir.path().join("Base.csv.zip.part").exists());
}

#[tokio::test]
async fn stalled_download_is_unavailable_and_leaves_no_archive() {
    //* Given
    let mut server = Server::new_async().await;
    let _download_mock = server
        .mock("GET", "/datasets/download/owner/data/Base.csv")
        .with_status(200)
        .with_chunked_body(|w| {
            w.write_all(&[b'z'; 1024])?;
            w.flush()?;
            std::thread::sleep(Duration::from_millis(2500));
            w.write_all(&[b'z'; 1024])
        })
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();

    //* When
    let err = client_with_timeout(&server, 1)
        .download_file("owner/data", "Base.csv", dir.path(), true)
        .await
        .unwrap_err();

    //* Then
    assert!(matches!(err, CatalogError::Unavailable(_)), "got {:?}", err);
    assert!(!dir.path().join("Base.csv.zip").exists());
    assert!(!dir.path().join("Base.csv.zip.part").exists());
}

#[tokio::test]
async fn malformed_reference_fails_without_request() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let err = client(&server)
        .download_file("not-a-reference", "Base.csv", dir.path(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::InvalidReference(_)));
}

#[test]
fn credentials_file_is_parsed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kaggle.json");
    std::fs::write(&path, r#"{"username": "alice", "key": "secret"}"#).unwrap();

    let creds = KaggleCredentials::from_file(&path).unwrap();
    assert_eq!(creds.username, "alice");
    assert_eq!(creds.key, "secret");

    let missing = KaggleCredentials::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, CatalogError::Authentication(_)));
}

/// Serializes tests that rewrite the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const CREDENTIAL_VARS: [&str; 5] = [
    "KAGGLE_USERNAME",
    "KAGGLE_KEY",
    "KAGGLE_CONFIG_DIR",
    "HOME",
    "USERPROFILE",
];

/// Sets the credential-related variables for one test and restores the
/// previous values on drop.
struct ScopedEnv {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    fn new(vars: &[(&'static str, &str)]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = CREDENTIAL_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();
        for name in CREDENTIAL_VARS {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn write_kaggle_json(dir: &std::path::Path, username: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("kaggle.json"),
        format!(r#"{{"username": "{}", "key": "file-key"}}"#, username),
    )
    .unwrap();
}

#[test]
fn env_pair_takes_precedence_over_credentials_file() {
    let dir = TempDir::new().unwrap();
    write_kaggle_json(dir.path(), "from-file");
    let _env = ScopedEnv::new(&[
        ("KAGGLE_USERNAME", "from-env"),
        ("KAGGLE_KEY", "env-key"),
        ("KAGGLE_CONFIG_DIR", dir.path().to_str().unwrap()),
    ]);

    let creds = KaggleCredentials::discover().unwrap();

    assert_eq!(creds.username, "from-env");
    assert_eq!(creds.key, "env-key");
}

#[test]
fn config_dir_file_is_used_without_env_pair() {
    let dir = TempDir::new().unwrap();
    write_kaggle_json(dir.path(), "from-config-dir");
    let _env = ScopedEnv::new(&[("KAGGLE_CONFIG_DIR", dir.path().to_str().unwrap())]);

    let creds = KaggleCredentials::discover().unwrap();

    assert_eq!(creds.username, "from-config-dir");
    assert_eq!(creds.key, "file-key");
}

#[test]
fn half_set_env_pair_falls_back_to_file() {
    let dir = TempDir::new().unwrap();
    write_kaggle_json(dir.path(), "from-file");
    let _env = ScopedEnv::new(&[
        ("KAGGLE_USERNAME", "from-env"),
        ("KAGGLE_CONFIG_DIR", dir.path().to_str().unwrap()),
    ]);

    let creds = KaggleCredentials::discover().unwrap();

    assert_eq!(creds.username, "from-file");
}

#[test]
fn home_kaggle_dir_is_the_last_resort() {
    let home = TempDir::new().unwrap();
    write_kaggle_json(&home.path().join(".kaggle"), "from-home");
    let _env = ScopedEnv::new(&[("HOME", home.path().to_str().unwrap())]);

    let creds = KaggleCredentials::discover().unwrap();

    assert_eq!(creds.username, "from-home");
}

#[test]
fn no_credentials_anywhere_is_authentication_error() {
    let home = TempDir::new().unwrap();
    let _env = ScopedEnv::new(&[("HOME", home.path().to_str().unwrap())]);

    let err = KaggleCredentials::discover().unwrap_err();

    assert!(matches!(err, CatalogError::Authentication(_)));
}
