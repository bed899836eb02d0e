// tests/run_aider_api.rs
// End-to-end tests for POST /run-aider against scripted stand-ins for aider

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aider_api::config::Settings;
use aider_api::runner::{InvocationSpec, ProcessHandle, ProcessLauncher, SystemLauncher};
use aider_api::server::{AppState, create_router};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Runs `sh -c <script> aider <argv...>` so the script sees aider's argument vector as `$@`
struct ScriptLauncher {
    script: String,
}

impl ProcessLauncher for ScriptLauncher {
    fn launch(&self, spec: InvocationSpec, cwd: &Path) -> aider_api::Result<ProcessHandle> {
        let mut args = vec!["-c".to_string(), self.script.clone(), "aider".to_string()];
        args.extend(spec.args);
        let shell = InvocationSpec {
            program: PathBuf::from("sh"),
            args,
        };
        SystemLauncher::new().launch(shell, cwd)
    }
}

const HELP_SCRIPT: &str = r#"
echo "Aider v0.0.0-test"
echo "args: $*"
echo ""
echo "warning: no git repo" 1>&2
echo "/help    Ask questions about aider"
"#;

const KEY_FAILURE_SCRIPT: &str = r#"
echo "litellm.AuthenticationError: invalid x-api-key"
echo "https://aider.chat/docs/troubleshooting/models-and-keys.html"
exit 1
"#;

/// Prints every staged file it was given
const CAT_FILES_SCRIPT: &str = r#"
for f in "$@"; do
  case "$f" in
    --*) ;;
    *) [ -f "$f" ] && cat "$f" ;;
  esac
done
"#;

fn app_with_script(script: &str) -> axum::Router {
    let launcher = Arc::new(ScriptLauncher {
        script: script.to_string(),
    });
    create_router(AppState::with_launcher(Settings::default(), launcher))
}

fn post(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run-aider")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// (event name, parsed data) for every SSE message in `body`
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(v.trim_start()).unwrap());
                }
            }
            Some((name?, data?))
        })
        .collect()
}

#[tokio::test]
async fn buffered_help_returns_stdout_without_error() {
    let app = app_with_script(HELP_SCRIPT);
    let response = app
        .oneshot(post(json!({ "message": "/help", "stream": false })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;

    let stdout = result["raw-stdout"].as_str().unwrap();
    assert!(stdout.starts_with("Aider v0.0.0-test\n"));
    assert!(stdout.contains(
        "args: --message /help --auto-commits --dirty-commits --no-dry-run \
         --no-show-model-warnings --yes"
    ));
    // blank lines survive in the aggregate
    assert!(stdout.contains("\n\n"));
    assert_eq!(result["raw-stderr"], "warning: no git repo\n");
    assert!(result.get("error").is_none());
    assert_eq!(result["exit-code"], 0);
}

#[tokio::test]
async fn buffered_missing_key_sets_specific_error() {
    let app = app_with_script(KEY_FAILURE_SCRIPT);
    let response = app
        .oneshot(post(json!({ "message": "fix the bug", "stream": false })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["error"], "something went wrong, AI key or model not found");
    assert_eq!(result["exit-code"], 1);
}

#[tokio::test]
async fn missing_executable_is_a_result_not_a_fault() {
    let settings = Settings {
        aider_bin: PathBuf::from("/definitely/not/installed/aider"),
        ..Settings::default()
    };
    let app = create_router(AppState::new(settings));
    let response = app
        .oneshot(post(json!({ "message": "/help", "stream": false })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["raw-stdout"], "");
    assert!(result["raw-stderr"]
        .as_str()
        .unwrap()
        .starts_with("Error: Failed to start aider process"));
    assert!(result.get("error").is_none());
}

#[tokio::test]
async fn missing_executable_streams_a_complete_event() {
    let settings = Settings {
        aider_bin: PathBuf::from("/definitely/not/installed/aider"),
        ..Settings::default()
    };
    let app = create_router(AppState::new(settings));
    let response = app
        .oneshot(post(json!({ "message": "/help", "stream": true })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let events = parse_sse(&body_string(response).await);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "complete");
    assert_eq!(events[0].1["raw-stdout"], "");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = app_with_script(HELP_SCRIPT);
    let response = app
        .oneshot(post(json!({ "message": "   ", "stream": false })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let result = body_json(response).await;
    assert!(result["error"].as_str().unwrap().contains("message"));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = app_with_script(HELP_SCRIPT);
    let request = Request::builder()
        .method("POST")
        .uri("/run-aider")
        .header("content-type", "application/json")
        .body(Body::from("{not:json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    let result = body_json(response).await;
    assert!(result["error"].is_string());
}

#[tokio::test]
async fn escaping_file_name_is_rejected() {
    let app = app_with_script(CAT_FILES_SCRIPT);
    let response = app
        .oneshot(post(json!({
            "message": "edit",
            "files": { "../outside.py": "x" },
            "stream": false
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn option_like_file_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_script(HELP_SCRIPT);
    let response = app
        .oneshot(post(json!({
            "message": "edit",
            "files": { "--test-cmd=touch pwned": "", "--auto-test": "" },
            "root": dir.path(),
            "stream": false
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let result = body_json(response).await;
    assert!(result["error"].as_str().unwrap().contains("must not start with '-'"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_root_fails_launch_even_with_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("does/not/exist");

    for files in [json!(null), json!({ "a.py": "1" })] {
        let response = app_with_script("pwd")
            .oneshot(post(json!({
                "message": "edit",
                "files": files,
                "root": root,
                "stream": false
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        assert_eq!(result["raw-stdout"], "");
        let stderr = result["raw-stderr"].as_str().unwrap();
        assert!(stderr.starts_with("Error: Failed to start aider process: working directory"));
        assert!(stderr.contains("does not exist"));
        assert!(result.get("exit-code").is_none());
    }
    assert!(!dir.path().join("does").exists());
}

#[tokio::test]
async fn files_are_staged_in_root_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_script(CAT_FILES_SCRIPT);
    let response = app
        .oneshot(post(json!({
            "message": "add a docstring to this function",
            "files": { "test.py": "def hello():\n    print('Hello, World!')\n" },
            "root": dir.path(),
            "dry_run": true,
            "stream": false
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(
        result["raw-stdout"],
        "def hello():\n    print('Hello, World!')\n"
    );
    assert!(dir.path().join("test.py").is_file());
}

#[tokio::test]
async fn streaming_emits_progress_then_complete() {
    let app = app_with_script(HELP_SCRIPT);
    let response = app
        .oneshot(post(json!({ "message": "/help", "stream": true })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let events = parse_sse(&body_string(response).await);
    let (last, progress) = events.split_last().unwrap();
    assert_eq!(last.0, "complete");
    assert!(progress.iter().all(|(name, _)| name == "progress"));

    // per-origin progress lines rebuild the aggregates (blank lines aside)
    let rebuild = |origin: &str| -> String {
        progress
            .iter()
            .filter(|(_, data)| data["type"] == origin)
            .map(|(_, data)| format!("{}\n", data["content"].as_str().unwrap()))
            .collect()
    };
    let without_blank = |s: &str| -> String {
        s.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!("{}\n", l))
            .collect()
    };
    let complete = &last.1;
    assert_eq!(rebuild("stdout"), without_blank(complete["raw-stdout"].as_str().unwrap()));
    assert_eq!(rebuild("stderr"), complete["raw-stderr"].as_str().unwrap());
    assert!(complete.get("error").is_none());
}

#[tokio::test]
async fn streaming_and_buffered_agree() {
    for script in [HELP_SCRIPT, KEY_FAILURE_SCRIPT] {
        let buffered = app_with_script(script)
            .oneshot(post(json!({ "message": "same", "stream": false })))
            .await
            .unwrap();
        let buffered = body_json(buffered).await;

        let streamed = app_with_script(script)
            .oneshot(post(json!({ "message": "same", "stream": true })))
            .await
            .unwrap();
        let events = parse_sse(&body_string(streamed).await);
        let (name, complete) = events.last().unwrap();

        assert_eq!(name, "complete");
        assert_eq!(complete, &buffered);
    }
}

#[tokio::test]
async fn stream_defaults_to_configured_mode() {
    // no "stream" key: the default setting (streaming) applies
    let response = app_with_script(HELP_SCRIPT)
        .oneshot(post(json!({ "message": "/help" })))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );

    let settings = Settings {
        default_stream: false,
        ..Settings::default()
    };
    let launcher = Arc::new(ScriptLauncher {
        script: HELP_SCRIPT.to_string(),
    });
    let app = create_router(AppState::with_launcher(settings, launcher));
    let response = app.oneshot(post(json!({ "message": "/help" }))).await.unwrap();
    let result = body_json(response).await;
    assert!(result["raw-stdout"].is_string());
}

#[tokio::test]
async fn health_reports_request_count() {
    let launcher = Arc::new(ScriptLauncher {
        script: HELP_SCRIPT.to_string(),
    });
    let state = AppState::with_launcher(Settings::default(), launcher);
    let app = create_router(state.clone());

    let response = app
        .clone()
        .oneshot(post(json!({ "message": "/help", "stream": false })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let _ = body_string(response).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["requests_served"], 1);
    assert_eq!(state.requests_served(), 1);
}
