//! Library-level end-to-end tests: config document in, mirrored tree out.
//!
//! The marketplace and update service are both served by one wiremock server.

mod support;

use std::path::Path;

use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use vscod_core::marketplace::Endpoints;
use vscod_core::{
    ConfigDocument, Orchestrator, ProcessExit, Settings, TaskError, TaskOutcome,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG: &str = r#"{
    "vscode": {"platform": "linux-x64", "build": "stable"},
    "extensions": {
        "python": "ms-python.python",
        "Web": {
            "React": "dsznajder.es7-react-js-snippets",
            "Lint": "dbaeumer.vscode-eslint@2.4.2"
        }
    }
}"#;

fn package_path(publisher: &str, name: &str, version: &str) -> String {
    format!("/_apis/public/gallery/publishers/{publisher}/vsextensions/{name}/{version}/vspackage")
}

async fn mount_item_page(server: &MockServer, id: &str, version: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("itemName", id))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<script>{{"Version":"{version}"}}</script>"#)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_package(server: &MockServer, publisher: &str, name: &str, version: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(package_path(publisher, name, version)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_mirror(server: &MockServer, item_page_calls: u64) {
    mount_item_page(server, "ms-python.python", "2024.0.1", item_page_calls).await;
    mount_item_page(server, "dsznajder.es7-react-js-snippets", "4.4.3", item_page_calls).await;
    // Pinned versions never consult the item page.
    mount_item_page(server, "dbaeumer.vscode-eslint", "9.9.9", 0).await;

    mount_package(server, "ms-python", "python", "2024.0.1", "py").await;
    mount_package(server, "dsznajder", "es7-react-js-snippets", "4.4.3", "react").await;
    mount_package(server, "dbaeumer", "vscode-eslint", "2.4.2", "eslint").await;

    Mock::given(method("GET"))
        .and(path("/api/update/linux-x64/stable/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": format!("{}/stable/abc/code-stable-x64-1702460949.tar.gz", server.uri()),
            "productVersion": "1.85.1"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stable/abc/code-stable-x64-1702460949.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tarball"))
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer, output_dir: &Path) -> Orchestrator {
    Orchestrator::new(Settings {
        output_dir: output_dir.to_path_buf(),
        concurrency: 3,
        endpoints: Endpoints::new(server.uri(), server.uri()),
        ..Settings::default()
    })
    .unwrap()
}

fn read(root: &Path, rel: &[&str]) -> String {
    let mut path = root.to_path_buf();
    path.extend(rel);
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_config_materializes_mirrored_tree() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_mirror(&server, 1).await;
    let tmp = TempDir::new().unwrap();
    let document = ConfigDocument::from_json_str(CONFIG).unwrap();

    let report = orchestrator(&server, tmp.path())
        .run_document(&document)
        .await
        .unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.succeeded(), 4, "failures: {:?}", report.failures().collect::<Vec<_>>());
    assert_eq!(report.exit_outcome(), ProcessExit::Success);

    assert_eq!(
        read(tmp.path(), &["linux-x64", "code-stable-x64-1702460949.tar.gz"]),
        "tarball"
    );
    assert_eq!(read(tmp.path(), &["python", "ms-python.python-2024.0.1.vsix"]), "py");
    assert_eq!(
        read(tmp.path(), &["Web", "React", "dsznajder.es7-react-js-snippets-4.4.3.vsix"]),
        "react"
    );
    assert_eq!(
        read(tmp.path(), &["Web", "Lint", "dbaeumer.vscode-eslint-2.4.2.vsix"]),
        "eslint"
    );

    // Results come back in walk order: binaries first, then extensions.
    let destinations: Vec<String> = report
        .results
        .iter()
        .map(|r| r.task.destination_display())
        .collect();
    assert_eq!(destinations, vec!["linux-x64", "python", "Web/React", "Web/Lint"]);
}

#[tokio::test]
async fn test_rerun_skips_existing_artifacts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_mirror(&server, 2).await;
    let tmp = TempDir::new().unwrap();
    let document = ConfigDocument::from_json_str(CONFIG).unwrap();

    let first = orchestrator(&server, tmp.path())
        .run_document(&document)
        .await
        .unwrap();
    let second = orchestrator(&server, tmp.path())
        .run_document(&document)
        .await
        .unwrap();

    assert_eq!(first.succeeded(), 4);
    assert_eq!(second.skipped(), 4);
    assert_eq!(second.succeeded(), 0);
    assert_eq!(second.exit_outcome(), ProcessExit::Success);
}

#[tokio::test]
async fn test_missing_artifact_does_not_stop_siblings() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_item_page(&server, "ms-python.python", "2024.0.1", 1).await;
    mount_package(&server, "ms-python", "python", "2024.0.1", "py").await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("itemName", "ghost.extension"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let tmp = TempDir::new().unwrap();
    let document = ConfigDocument::from_json_str(
        r#"{"extensions": {"a": "ghost.extension", "b": "ms-python.python"}}"#,
    )
    .unwrap();

    let report = orchestrator(&server, tmp.path())
        .run_document(&document)
        .await
        .unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(
        report.results[0].outcome,
        TaskOutcome::Failure(TaskError::ArtifactNotFound {
            identifier: "ghost.extension".to_string()
        })
    );
    assert!(matches!(report.results[1].outcome, TaskOutcome::Success { .. }));
    assert_eq!(report.exit_outcome(), ProcessExit::Partial);
    assert!(!tmp.path().join("a").exists());
}

#[tokio::test]
async fn test_server_error_on_package_leaves_no_partial_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path(package_path("pub", "ext", "1.0.0")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let tmp = TempDir::new().unwrap();
    let document =
        ConfigDocument::from_json_str(r#"{"extensions": {"x": "pub.ext@1.0.0"}}"#).unwrap();

    let report = orchestrator(&server, tmp.path())
        .run_document(&document)
        .await
        .unwrap();

    assert!(matches!(
        report.results[0].outcome,
        TaskOutcome::Failure(TaskError::Network { .. })
    ));
    assert_eq!(report.exit_outcome(), ProcessExit::Failure);
    assert!(!tmp.path().join("x").exists());
}
