use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::sleep;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config with local storage and credentials that are never used
fn minimal_config(port: u16, dir: &TempDir) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[carrier]
base_url = "http://127.0.0.1:9"
user = "loja"
access_code = "segredo-de-teste"
postage_card = "0076543210"

[labels]
storage_dir = "{}"
public_prefix = "/rotulos"
"#,
        port,
        dir.path().join("postagem.db").display(),
        dir.path().join("rotulos").display()
    )
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_postagem"))
        .env("POSTAGEM_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &dir));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 60).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["carrier"], "correios");

    // Label directory is created at startup
    assert!(dir.path().join("rotulos").is_dir());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &dir));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 60).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body = response.text().await.expect("Failed to read body");
    assert!(!body.contains("segredo-de-teste"));

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["carrier"]["access_code_configured"], true);
    assert_eq!(json["carrier"]["postage_card"], "0076543210");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_empty_store_endpoints() {
    let port = get_available_port();
    let dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &dir));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 60).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/pre-postings", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["total_count"], 0);

    let response = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let text = response.text().await.unwrap();
    assert!(text.contains("postagem_pre_postings_by_status"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_invalid_config_exits() {
    let dir = TempDir::new().unwrap();
    let content = minimal_config(0, &dir);
    let config = write_config(&content);

    let status = tokio::time::timeout(
        Duration::from_secs(10),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_postagem"))
            .env("POSTAGEM_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .status(),
    )
    .await
    .expect("Server did not exit")
    .expect("Failed to run server");

    assert!(!status.success());
}
