//! Integration tests for job submission, polling and resolution.

use axum::http::{StatusCode, header};
use serde_json::json;

use cardwall_core::traits::catalog::CardCatalog;
use cardwall_core::types::CardDraft;

use crate::helpers::{TestApp, new_user};

fn import_cards(text: &str) -> serde_json::Value {
    json!({ "kind": "import_cards", "project": "alpha", "text": text })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::inline().await;

    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["execution_mode"], "inline");
}

#[tokio::test]
async fn test_submit_requires_user() {
    let app = TestApp::inline().await;

    let response = app
        .request("POST", "/api/jobs", Some(import_cards("Name\nLogin")), None)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_inline_import_redirects_with_notice() {
    let app = TestApp::inline().await;
    let user = new_user();

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(import_cards("Name\tType\nLogin\tStory\nLogout\tStory\n")),
            Some(&user),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let view = &response.body["data"]["view"];
    assert_eq!(view["state"], "redirect");
    assert_eq!(view["location"], "/projects/alpha/cards");
    assert_eq!(view["notice"], "2 cards imported");
    assert_eq!(response.body["data"]["job"]["progress"]["completed"], 2);
    assert_eq!(app.catalog.list_cards("alpha").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_row_errors_are_reported_without_notice() {
    let app = TestApp::inline().await;
    let user = new_user();

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(import_cards("Number\tName\n1\tLogin\n1.456\tLogout\n")),
            Some(&user),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let view = &response.body["data"]["view"];
    assert_eq!(view["state"], "report");
    assert_eq!(view["status"], "completed_with_errors");
    assert_eq!(view["errors"].as_array().unwrap().len(), 1);
    assert_eq!(view["errors"][0]["name"], "invalid_card_number");
    assert!(view["result"].get("notice").is_none());
}

#[tokio::test]
async fn test_bad_upload_is_rejected_before_any_job_exists() {
    let app = TestApp::inline().await;
    let user = new_user();

    let missing = app
        .upload(&user, "import_dependencies", "alpha", None)
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "VALIDATION_ERROR");

    let wrong_type = app
        .upload(
            &user,
            "import_dependencies",
            "alpha",
            Some(("deps.exe", b"[]")),
        )
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_type.body["details"]["field"], "file");

    let listed = app.request("GET", "/api/jobs", None, Some(&user)).await;
    assert_eq!(listed.body["data"]["total_items"], 0);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_unknown_project_is_rejected() {
    let app = TestApp::inline().await;

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "kind": "export_project", "project": "ghost" })),
            Some(&new_user()),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_queued_job_is_polled_to_completion() {
    let app = TestApp::queued().await;
    let user = new_user();

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(import_cards("Name\nLogin\nLogout\nSignup\n")),
            Some(&user),
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    let submitted = &response.body["data"];
    assert_eq!(submitted["job"]["status"], "queued");
    assert_eq!(submitted["view"]["state"], "in_progress");
    let poll_url = submitted["view"]["poll_url"].as_str().unwrap().to_string();
    assert!(poll_url.ends_with("?project=alpha"));

    app.start_worker();

    let first = app.wait_for_final_view(&poll_url, &user).await;
    assert_eq!(first["state"], "redirect");
    assert_eq!(first["notice"], "3 cards imported");

    // Later polls keep returning the same final view.
    let again = app.request("GET", &poll_url, None, Some(&user)).await;
    assert_eq!(again.body["data"], first);
}

#[tokio::test]
async fn test_jobs_are_private_to_their_owner() {
    let app = TestApp::inline().await;
    let owner = new_user();

    let response = app
        .request("POST", "/api/jobs", Some(import_cards("Name\nLogin")), Some(&owner))
        .await;
    let id = response.body["data"]["job"]["id"].as_str().unwrap().to_string();

    let stranger = new_user();
    let polled = app
        .request("GET", &format!("/api/jobs/progress/{id}"), None, Some(&stranger))
        .await;
    assert_eq!(polled.status, StatusCode::NOT_FOUND);

    let fetched = app
        .request("GET", &format!("/api/jobs/{id}"), None, Some(&owner))
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["data"]["kind"], "import_cards");
}

#[tokio::test]
async fn test_list_with_out_of_range_page_is_empty() {
    let app = TestApp::inline().await;
    let owner = new_user();
    app.request("POST", "/api/jobs", Some(import_cards("Name\nLogin")), Some(&owner))
        .await;

    let response = app
        .request("GET", "/api/jobs?page=18446744073709551615", None, Some(&owner))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["total_items"], 1);
    assert_eq!(response.body["data"]["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_program_export_download() {
    let app = TestApp::inline().await;
    let user = new_user();
    app.catalog
        .create_card(
            "alpha",
            &CardDraft {
                name: "Login".to_string(),
                ..CardDraft::default()
            },
        )
        .await
        .unwrap();

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({ "kind": "export_program", "project": "release" })),
            Some(&user),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let location = response.body["data"]["view"]["location"]
        .as_str()
        .unwrap()
        .to_string();

    let download = app.request("GET", &location, None, Some(&user)).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"release.cardwall\""
    );
    let archive: serde_json::Value = serde_json::from_slice(&download.raw).unwrap();
    assert_eq!(archive["projects"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_pending_dependencies_can_be_resolved() {
    let app = TestApp::inline().await;
    let user = new_user();
    for name in ["Login", "Logout"] {
        app.catalog
            .create_card(
                "alpha",
                &CardDraft {
                    name: name.to_string(),
                    ..CardDraft::default()
                },
            )
            .await
            .unwrap();
    }
    let drafts = json!([
        { "number": 1, "name": "Auth API", "raising_card": null, "resolving_project": "beta" },
        { "number": 2, "name": "Session API", "raising_card": null, "resolving_project": "beta" },
        { "number": 3, "name": "Audit API", "raising_card": null, "resolving_project": "beta" }
    ]);
    let data = serde_json::to_vec(&drafts).unwrap();

    let response = app
        .upload(&user, "import_dependencies", "alpha", Some(("deps.json", &data)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let view = &response.body["data"]["view"];
    assert_eq!(view["errors"].as_array().unwrap().len(), 3);
    assert_eq!(view["errors"][0]["name"], "pending_raising_card");
    let id = response.body["data"]["job"]["id"].as_str().unwrap().to_string();

    let resolved = app
        .request(
            "POST",
            &format!("/api/jobs/{id}/errors/resolve"),
            Some(json!({
                "resolutions": [
                    { "index": 0, "raising_card": { "project": "alpha", "number": 1 } },
                    { "index": 1, "raising_card": { "project": "alpha", "number": 2 } }
                ]
            })),
            Some(&user),
        )
        .await;
    assert_eq!(resolved.status, StatusCode::OK);
    let errors = resolved.body["data"]["errors"].as_array().unwrap();
    assert_eq!(errors[0]["raising_card"]["number"], 1);
    assert_eq!(errors[1]["raising_card"]["number"], 2);
    assert!(errors[2].get("raising_card").is_none_or(|card| card.is_null()));

    let unknown = app
        .request(
            "POST",
            &format!("/api/jobs/{id}/errors/resolve"),
            Some(json!({
                "resolutions": [
                    { "index": 2, "raising_card": { "project": "alpha", "number": 42 } }
                ]
            })),
            Some(&user),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}
