//! Integration tests for Flowie
//!
//! CLI behaviour through the compiled binary, and a full HTTP session
//! through the public router.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a flowie Command isolated from the caller's environment
fn flowie(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("flowie");
    cmd.current_dir(dir.path())
        .env_remove("FLOWIE_CONFIG")
        .env_remove("FLOWIE_HOST")
        .env_remove("FLOWIE_PORT")
        .env_remove("FLOWIE_DB_PATH")
        .env_remove("FLOWIE_JWT_SECRET")
        .env_remove("FLOWIE_LOG_LEVEL");
    cmd
}

fn create_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_flowie_help() {
        let dir = create_temp_dir();
        flowie(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("seed-task-types"));
    }

    #[test]
    fn test_flowie_version() {
        let dir = create_temp_dir();
        flowie(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = create_temp_dir();
        flowie(&dir).arg("migrate").assert().failure();
    }
}

// =============================================================================
// Database Commands
// =============================================================================

mod database_commands {
    use super::*;

    #[test]
    fn test_init_db_creates_file() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["--db-path", "state/flowie.db", "init-db"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Flowie database initialized"));

        assert!(dir.path().join("state/flowie.db").exists());
    }

    #[test]
    fn test_init_db_uses_env_path() {
        let dir = create_temp_dir();
        flowie(&dir)
            .env("FLOWIE_DB_PATH", "from-env.db")
            .arg("init-db")
            .assert()
            .success();

        assert!(dir.path().join("from-env.db").exists());
    }

    #[test]
    fn test_seed_task_types_is_idempotent() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["--db-path", "flowie.db", "seed-task-types"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added 3 default task type(s)"));

        flowie(&dir)
            .args(["--db-path", "flowie.db", "seed-task-types"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already present"));
    }
}

// =============================================================================
// Configuration Commands
// =============================================================================

mod config_commands {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("using defaults"))
            .stdout(predicate::str::contains("port = 8080"))
            .stdout(predicate::str::contains("********"));
    }

    #[test]
    fn test_config_show_applies_cli_overrides() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["--port", "9123", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9123"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let content = fs::read_to_string(dir.path().join("flowie.toml")).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[rate_limit]"));
    }

    #[test]
    fn test_config_validate_warns_on_default_secret() {
        let dir = create_temp_dir();
        flowie(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("jwt_secret"));
    }

    #[test]
    fn test_config_validate_with_config() {
        let dir = create_temp_dir();
        fs::write(
            dir.path().join("flowie.toml"),
            r#"
[auth]
jwt_secret = "an-actual-production-grade-secret-value"

[rate_limit]
max_requests = 20
"#,
        )
        .unwrap();

        flowie(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_with_invalid_toml_fails() {
        let dir = create_temp_dir();
        fs::write(dir.path().join("custom.toml"), "[server\nport = ").unwrap();

        flowie(&dir)
            .args(["--config", "custom.toml", "config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse flowie.toml"));
    }
}

// =============================================================================
// End-to-end HTTP session
// =============================================================================

mod http_flow {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use flowie::api::AppState;
    use flowie::clock::FixedClock;
    use flowie::config::FlowieConfig;
    use flowie::db::{DbHandle, FlowieDb};
    use flowie::server::build_router;

    fn app() -> Router {
        let db = FlowieDb::new_in_memory().unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        ));
        let state = Arc::new(AppState::new(
            FlowieConfig::default(),
            DbHandle::new(db),
            clock,
        ));
        build_router(state)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_plan_work_and_subscribe() {
        let app = app();
        let due = Utc.with_ymd_and_hms(2026, 9, 10, 16, 0, 0).unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "ellen@example.com",
                "password": "a-long-password",
                "name": "Ellen Wouters",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session = json_of(&body);
        let employee_id = session["employee"]["id"].clone();

        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "ellen@example.com", "password": "a-long-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = json_of(&body)["access_token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "POST",
            "/api/projects",
            Some(&token),
            Some(json!({"title": "Warehouse conversion", "company": "immoseed"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let project_id = json_of(&body)["id"].clone();

        let (status, body) = call(
            &app,
            "POST",
            "/api/tasks",
            Some(&token),
            Some(json!({
                "project_id": project_id,
                "employee_id": employee_id,
                "title": "Survey the roof; check gutters",
                "due_date": due,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let task_id = json_of(&body)["id"].clone();

        let (status, body) = call(
            &app,
            "PATCH",
            &format!("/api/tasks/{}/status", task_id),
            Some(&token),
            Some(json!({"status": "ongoing"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["status"], "ongoing");

        let (_, body) = call(
            &app,
            "GET",
            &format!("/api/projects/{}", project_id),
            Some(&token),
            None,
        )
        .await;
        let detail = json_of(&body);
        assert_eq!(detail["task_counts"]["ongoing"], 1);
        assert_eq!(detail["task_counts"]["total"], 1);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/employees/{}/calendar-token", employee_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let feed_path = json_of(&body)["feed_path"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", &feed_path, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let feed = String::from_utf8(body).unwrap();
        assert!(feed.contains("X-WR-CALNAME:Flowie - Ellen Wouters\r\n"));
        assert!(feed.contains("SUMMARY:[Warehouse conversion] Survey the roof\\; check gutters\r\n"));
        assert!(feed.contains("DTSTART;VALUE=DATE:20260910\r\n"));

        let (status, _) = call(&app, "POST", "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", "/api/projects", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // The feed does not depend on the session.
        let (status, _) = call(&app, "GET", &feed_path, None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
