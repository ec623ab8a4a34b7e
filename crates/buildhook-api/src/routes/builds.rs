//! Build trigger endpoints.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use buildhook_core::{BuildArg, BuildId, BuildSpec, GitRefKind};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/build", post(create_build))
        .route("/result", post(receive_result))
}

/// Inbound build request as sent by callers.
///
/// `dockerbuildArg` is itself a JSON-encoded array and is decoded in a second
/// pass by [`BuildRequest::into_spec`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildRequest {
    pub username: String,
    #[serde(rename = "buildTagID")]
    pub build_tag_id: i64,
    pub github_host: String,
    pub github_org_name: String,
    pub github_repo_name: String,
    pub github_token: String,
    pub git_branch_type: String,
    pub git_branch_name: String,
    pub dockerfile_location: String,
    pub dockerfile_name: String,
    pub docker_tag_name: String,
    pub docker_org_name: String,
    pub docker_repo_name: String,
    #[serde(rename = "d2hubPushKeyID")]
    pub push_key_id: String,
    #[serde(rename = "d2hubPushKeyPassword")]
    pub push_key_password: String,
    #[serde(rename = "watchCenterID")]
    pub watch_center_id: String,
    #[serde(rename = "buildID")]
    pub build_id: String,
    #[serde(rename = "resultCallbackURL")]
    pub result_callback_url: String,
    #[serde(rename = "dockerbuildArg")]
    pub docker_build_arg: String,
}

impl BuildRequest {
    /// Validate the request and turn it into an immutable build spec.
    pub fn into_spec(self, registry: &str) -> Result<BuildSpec, ApiError> {
        let build_args = parse_build_args(&self.docker_build_arg)?;

        let ref_kind = match self.git_branch_type.as_str() {
            "Branch" => GitRefKind::Branch,
            "Tag" => GitRefKind::Tag,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Unknown gitBranchType '{}'",
                    other
                )));
            }
        };

        for (field, value) in [
            ("githubHost", &self.github_host),
            ("githubOrgName", &self.github_org_name),
            ("githubRepoName", &self.github_repo_name),
            ("gitBranchName", &self.git_branch_name),
            ("dockerOrgName", &self.docker_org_name),
            ("dockerRepoName", &self.docker_repo_name),
            ("dockerTagName", &self.docker_tag_name),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("Missing {}", field)));
            }
        }

        if !self.result_callback_url.is_empty() {
            url::Url::parse(&self.result_callback_url).map_err(|e| {
                ApiError::BadRequest(format!("Invalid resultCallbackURL: {}", e))
            })?;
        }

        let build_id = if self.build_id.is_empty() {
            BuildId::generate()
        } else {
            BuildId::new(self.build_id)
        };

        let spec = BuildSpec {
            build_id,
            username: self.username,
            build_tag_id: self.build_tag_id,
            source_host: self.github_host,
            source_org: self.github_org_name,
            source_repo: self.github_repo_name,
            source_token: self.github_token,
            ref_kind,
            ref_name: self.git_branch_name,
            dockerfile_location: self.dockerfile_location,
            dockerfile_name: Some(self.dockerfile_name).filter(|name| !name.is_empty()),
            registry: registry.to_string(),
            image_org: self.docker_org_name,
            image_repo: self.docker_repo_name,
            image_tag: self.docker_tag_name,
            push_key_id: self.push_key_id,
            push_key_password: self.push_key_password,
            build_args,
            callback_url: self.result_callback_url,
            chat_channel: Some(self.watch_center_id).filter(|id| !id.is_empty()),
        };

        // Refuse Dockerfile locations that point outside the checkout
        spec.dockerfile_path()?;
        Ok(spec)
    }
}

/// Decode the JSON-encoded build argument list; empty means none.
fn parse_build_args(raw: &str) -> Result<Vec<BuildArg>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| {
        warn!(error = %e, "Invalid dockerbuildArg");
        ApiError::BadRequest(format!("Invalid dockerbuildArg: {}", e))
    })
}

async fn index() -> &'static str {
    "docker builder server"
}

/// Accept a build and run it in the background.
async fn create_build(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: BuildRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Invalid build request");
        ApiError::BadRequest(format!("Invalid JSON: {}", e))
    })?;

    let spec = request.into_spec(&state.config.registry_addr)?;

    info!(
        build_id = %spec.build_id,
        image = %spec.image_name_with_tag(),
        repo = %format!("{}/{}", spec.source_org, spec.source_repo),
        git_ref = %spec.ref_name,
        "Build accepted"
    );

    state.pipeline.spawn(spec);
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct ResultPayload {
    #[serde(rename = "isSuccess", default)]
    is_success: bool,
}

/// Loopback receiver for result callbacks.
async fn receive_result(body: Bytes) -> StatusCode {
    match serde_json::from_slice::<ResultPayload>(&body) {
        Ok(payload) if payload.is_success => StatusCode::OK,
        Ok(_) => StatusCode::BAD_REQUEST,
        Err(e) => {
            warn!(error = %e, "Invalid build result");
            StatusCode::BAD_REQUEST
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChannelReporter, test_state};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn build_body() -> Value {
        json!({
            "username": "alice",
            "buildTagID": 42,
            "githubHost": "github.example.com",
            "githubOrgName": "org",
            "githubRepoName": "app",
            "githubToken": "tok",
            "gitBranchType": "Branch",
            "gitBranchName": "main",
            "dockerfileLocation": "docker",
            "dockerfileName": "",
            "dockerTagName": "v1",
            "dockerOrgName": "org",
            "dockerRepoName": "app",
            "d2hubPushKeyID": "pusher",
            "d2hubPushKeyPassword": "secret",
            "watchCenterID": "",
            "buildID": "b-77",
            "resultCallbackURL": "http://ci.example.com/result",
            "dockerbuildArg": "[{\"Name\":\"VERSION\",\"Value\":\"1.0\"}]"
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: String) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    fn app() -> (Router, ChannelReporter) {
        let (state, reporter) = test_state();
        (crate::routes::router(state), reporter)
    }

    #[tokio::test]
    async fn test_index() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "docker builder server");
    }

    #[tokio::test]
    async fn test_build_is_accepted_and_runs() {
        let (app, mut reporter) = app();

        let (status, _) = send(app, "POST", "/build", build_body().to_string()).await;
        assert_eq!(status, StatusCode::CREATED);

        let result = tokio::time::timeout(Duration::from_secs(5), reporter.results.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_success, "error: {}", result.error_reason);
        assert_eq!(result.build_id.as_str(), "b-77");
        assert_eq!(result.docker_image_name, "registry.example.com/org/app:v1");
        assert_eq!(result.build_spec.build_tag_id, 42);
        assert_eq!(result.build_spec.chat_channel, None);
        assert_eq!(result.build_spec.dockerfile_name(), "Dockerfile");
        assert_eq!(
            result.build_spec.build_args,
            vec![BuildArg {
                name: "VERSION".to_string(),
                value: "1.0".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let (app, _) = app();
        let (status, body) = send(app, "POST", "/build", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_invalid_build_args_are_rejected() {
        let (app, _) = app();
        let mut body = build_body();
        body["dockerbuildArg"] = json!("[{\"Name\":");

        let (status, body) = send(app, "POST", "/build", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("dockerbuildArg"));
    }

    #[tokio::test]
    async fn test_unknown_ref_kind_is_rejected() {
        let (app, _) = app();
        let mut body = build_body();
        body["gitBranchType"] = json!("Commit");

        let (status, _) = send(app, "POST", "/build", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut body = build_body();
        body["dockerRepoName"] = json!("");
        let request: BuildRequest = serde_json::from_value(body).unwrap();

        match request.into_spec("registry.example.com") {
            Err(ApiError::BadRequest(msg)) => assert!(msg.contains("dockerRepoName")),
            other => panic!("Expected BadRequest, got {:?}", other.map(|s| s.build_id)),
        }
    }

    #[tokio::test]
    async fn test_dockerfile_location_outside_checkout_is_rejected() {
        let (app, _) = app();
        let mut body = build_body();
        body["dockerfileLocation"] = json!("../../root/.ssh");

        let (status, body) = send(app, "POST", "/build", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("leaves the workspace"));
    }

    #[test]
    fn test_bad_callback_url_is_rejected() {
        let mut body = build_body();
        body["resultCallbackURL"] = json!("not a url");
        let request: BuildRequest = serde_json::from_value(body).unwrap();
        assert!(request.into_spec("registry.example.com").is_err());
    }

    #[test]
    fn test_missing_build_id_is_generated() {
        let mut body = build_body();
        body.as_object_mut().unwrap().remove("buildID");
        body["watchCenterID"] = json!("4958");
        body["dockerfileName"] = json!("Dockerfile.prod");
        let request: BuildRequest = serde_json::from_value(body).unwrap();

        let spec = request.into_spec("registry.example.com").unwrap();
        assert!(!spec.build_id.as_str().is_empty());
        assert_eq!(spec.chat_channel.as_deref(), Some("4958"));
        assert_eq!(spec.dockerfile_name(), "Dockerfile.prod");
        assert_eq!(spec.ref_kind, GitRefKind::Branch);
    }

    #[test]
    fn test_lower_case_build_arg_keys() {
        let args = parse_build_args(r#"[{"name":"A","value":"1"}]"#).unwrap();
        assert_eq!(args[0].name, "A");
        assert!(parse_build_args("  ").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_receiver() {
        let (app, _) = app();
        let success = r#"{"isSuccess":true}"#.to_string();
        let (status, _) = send(app.clone(), "POST", "/result", success).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) =
            send(app.clone(), "POST", "/result", r#"{"isSuccess":false}"#.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app, "POST", "/result", "garbage".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ready_reports_push_lanes() {
        let (app, mut reporter) = app();

        let (status, body) = send(app.clone(), "GET", "/health/ready", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["pushLanes"], 0);

        send(app.clone(), "POST", "/build", build_body().to_string()).await;
        tokio::time::timeout(Duration::from_secs(5), reporter.results.recv())
            .await
            .unwrap()
            .unwrap();

        let (_, body) = send(app, "GET", "/health/ready", String::new()).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["pushLanes"], 1);
    }
}
