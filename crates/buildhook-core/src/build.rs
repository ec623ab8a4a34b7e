//! Build request and build outcome types.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BuildId, Error, Result};

/// Dockerfile name used when the request does not name one.
pub const DEFAULT_DOCKERFILE_NAME: &str = "Dockerfile";

/// Whether `ref_name` names a branch or a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitRefKind {
    Branch,
    Tag,
}

impl std::fmt::Display for GitRefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitRefKind::Branch => write!(f, "Branch"),
            GitRefKind::Tag => write!(f, "Tag"),
        }
    }
}

/// A `--build-arg` name/value pair passed verbatim to the build engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArg {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Value", alias = "value")]
    pub value: String,
}

/// Immutable description of one build request.
///
/// Serialized field names follow the wire format callers already consume in
/// the result callback. Credentials are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSpec {
    #[serde(rename = "buildID")]
    pub build_id: BuildId,
    pub username: String,
    #[serde(rename = "buildTagID")]
    pub build_tag_id: i64,

    /// Source host, e.g. `github.com`.
    #[serde(rename = "githubHost")]
    pub source_host: String,
    #[serde(rename = "githubOrgName")]
    pub source_org: String,
    #[serde(rename = "githubRepoName")]
    pub source_repo: String,
    #[serde(skip_serializing)]
    pub source_token: String,

    #[serde(rename = "gitBranchType")]
    pub ref_kind: GitRefKind,
    #[serde(rename = "gitBranchName")]
    pub ref_name: String,

    #[serde(rename = "dockerfileLocation")]
    pub dockerfile_location: String,
    #[serde(rename = "dockerfileName")]
    pub dockerfile_name: Option<String>,

    #[serde(rename = "dockerRegistryAddr")]
    pub registry: String,
    #[serde(rename = "dockerOrgName")]
    pub image_org: String,
    #[serde(rename = "dockerRepoName")]
    pub image_repo: String,
    #[serde(rename = "dockerTagName")]
    pub image_tag: String,

    #[serde(rename = "d2hubPushKeyID")]
    pub push_key_id: String,
    #[serde(skip_serializing)]
    pub push_key_password: String,

    #[serde(rename = "buildArgs")]
    pub build_args: Vec<BuildArg>,

    #[serde(rename = "resultCallbackURL")]
    pub callback_url: String,
    #[serde(rename = "watchCenterID")]
    pub chat_channel: Option<String>,
}

impl BuildSpec {
    /// `registry/org/repo`, the push serialization key.
    pub fn image_name(&self) -> String {
        format!("{}/{}/{}", self.registry, self.image_org, self.image_repo)
    }

    /// `registry/org/repo:tag`
    pub fn image_name_with_tag(&self) -> String {
        format!("{}:{}", self.image_name(), self.image_tag)
    }

    /// The Dockerfile name, falling back to `Dockerfile`.
    pub fn dockerfile_name(&self) -> &str {
        self.dockerfile_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DOCKERFILE_NAME)
    }

    /// Dockerfile path relative to the workspace root.
    ///
    /// A leading `/` on the location is ignored. Any `..` component in the
    /// location or the name is rejected, so the path always stays inside the
    /// workspace it is joined onto.
    pub fn dockerfile_path(&self) -> Result<PathBuf> {
        let path = Path::new(self.dockerfile_location.trim_start_matches('/'))
            .join(self.dockerfile_name());

        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::InvalidInput(format!(
                "dockerfile path {} leaves the workspace",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Browsable URL of the source repository, used in notifications.
    pub fn source_url(&self) -> String {
        format!(
            "http://{}/{}/{}",
            self.source_host, self.source_org, self.source_repo
        )
    }
}

/// Outcome of one build, delivered to the result callback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    #[serde(rename = "buildID")]
    pub build_id: BuildId,
    pub is_success: bool,
    pub error_reason: String,
    pub logs: String,
    pub docker_image_name: String,
    pub build_spec: Arc<BuildSpec>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BuildResult {
    /// Create a pending result for a build that is about to start.
    pub fn pending(spec: Arc<BuildSpec>) -> Self {
        Self {
            build_id: spec.build_id.clone(),
            is_success: false,
            error_reason: String::new(),
            logs: String::new(),
            docker_image_name: spec.image_name_with_tag(),
            build_spec: spec,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark the build as succeeded.
    pub fn succeed(&mut self, logs: String) {
        self.is_success = true;
        self.error_reason.clear();
        self.logs = logs;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the build as failed with the given reason.
    pub fn fail(&mut self, reason: impl ToString, logs: String) {
        self.is_success = false;
        self.error_reason = reason.to_string();
        self.logs = logs;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_spec() -> BuildSpec {
        BuildSpec {
            build_id: BuildId::new("b-1"),
            username: "alice".to_string(),
            build_tag_id: 7,
            source_host: "github.example.com".to_string(),
            source_org: "org".to_string(),
            source_repo: "app".to_string(),
            source_token: "s3cr3t".to_string(),
            ref_kind: GitRefKind::Branch,
            ref_name: "main".to_string(),
            dockerfile_location: "docker".to_string(),
            dockerfile_name: None,
            registry: "registry.example.com".to_string(),
            image_org: "org".to_string(),
            image_repo: "app".to_string(),
            image_tag: "latest".to_string(),
            push_key_id: "pusher".to_string(),
            push_key_password: "hunter2".to_string(),
            build_args: vec![BuildArg {
                name: "VERSION".to_string(),
                value: "1.0".to_string(),
            }],
            callback_url: "http://ci.example.com/result".to_string(),
            chat_channel: None,
        }
    }

    #[test]
    fn test_image_names() {
        let spec = make_spec();
        assert_eq!(spec.image_name(), "registry.example.com/org/app");
        assert_eq!(
            spec.image_name_with_tag(),
            "registry.example.com/org/app:latest"
        );
    }

    #[test]
    fn test_dockerfile_path_defaults_name() {
        let mut spec = make_spec();
        assert_eq!(
            spec.dockerfile_path().unwrap(),
            PathBuf::from("docker/Dockerfile")
        );

        spec.dockerfile_name = Some(String::new());
        assert_eq!(
            spec.dockerfile_path().unwrap(),
            PathBuf::from("docker/Dockerfile")
        );

        spec.dockerfile_name = Some("Dockerfile.prod".to_string());
        assert_eq!(
            spec.dockerfile_path().unwrap(),
            PathBuf::from("docker/Dockerfile.prod")
        );
    }

    #[test]
    fn test_dockerfile_path_stays_relative() {
        let mut spec = make_spec();
        spec.dockerfile_location = "/build/docker".to_string();
        assert!(spec.dockerfile_path().unwrap().is_relative());
        assert_eq!(
            spec.dockerfile_path().unwrap(),
            PathBuf::from("build/docker/Dockerfile")
        );

        spec.dockerfile_location = "./docker".to_string();
        assert_eq!(
            spec.dockerfile_path().unwrap(),
            PathBuf::from("docker/Dockerfile")
        );

        spec.dockerfile_location = String::new();
        assert_eq!(spec.dockerfile_path().unwrap(), PathBuf::from("Dockerfile"));
    }

    #[test]
    fn test_dockerfile_path_rejects_parent_dirs() {
        let mut spec = make_spec();
        for location in ["../secret", "docker/../../etc", "/../../root/.ssh", ".."] {
            spec.dockerfile_location = location.to_string();
            assert!(
                matches!(spec.dockerfile_path(), Err(Error::InvalidInput(_))),
                "{} should be rejected",
                location
            );
        }

        spec.dockerfile_location = "docker".to_string();
        spec.dockerfile_name = Some("../Dockerfile".to_string());
        assert!(spec.dockerfile_path().is_err());
    }

    #[test]
    fn test_build_arg_accepts_both_key_casings() {
        let args: Vec<BuildArg> =
            serde_json::from_str(r#"[{"Name":"A","Value":"1"},{"name":"B","value":"2"}]"#)
                .unwrap();
        assert_eq!(args[0].name, "A");
        assert_eq!(args[1].value, "2");
    }

    #[test]
    fn test_result_serialization_hides_credentials() {
        let mut result = BuildResult::pending(Arc::new(make_spec()));
        result.succeed("step 1/2".to_string());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["buildID"], "b-1");
        assert_eq!(json["isSuccess"], true);
        assert_eq!(json["errorReason"], "");
        assert_eq!(json["logs"], "step 1/2");
        assert_eq!(
            json["dockerImageName"],
            "registry.example.com/org/app:latest"
        );
        assert_eq!(json["buildSpec"]["gitBranchName"], "main");

        let text = json.to_string();
        assert!(!text.contains("s3cr3t"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_fail_records_reason_and_logs() {
        let mut result = BuildResult::pending(Arc::new(make_spec()));
        assert!(result.finished_at.is_none());

        result.fail("checkout stage: boom", "partial".to_string());
        assert!(result.finished_at.is_some());
        assert!(!result.is_success);
        assert_eq!(result.error_reason, "checkout stage: boom");
        assert_eq!(result.logs, "partial");
    }
}
