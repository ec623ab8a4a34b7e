//! Git checkout of the requested branch or tag, including submodules.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use buildhook_core::{BuildLog, BuildSpec, Error, GitRefKind, Result, SourceCheckout};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::github::SourceHostClient;

const GITMODULES: &str = ".gitmodules";

/// Checks out sources with the `git` command line.
pub struct GitCheckout {
    source_host: SourceHostClient,
}

impl GitCheckout {
    pub fn new(source_host: SourceHostClient) -> Self {
        Self { source_host }
    }
}

#[async_trait]
impl SourceCheckout for GitCheckout {
    async fn checkout(&self, spec: &BuildSpec, workspace: &Path, log: &BuildLog) -> Result<()> {
        let repo = self
            .source_host
            .get_repo(
                &spec.source_host,
                &spec.source_token,
                &spec.source_org,
                &spec.source_repo,
            )
            .await?;

        let url = clone_url(
            self.source_host.scheme(),
            &spec.source_token,
            &spec.source_host,
            &repo.full_name,
        );

        info!(
            build_id = %spec.build_id,
            repo = %repo.full_name,
            kind = %spec.ref_kind,
            git_ref = %spec.ref_name,
            "Cloning repository"
        );

        fetch(&url, spec, workspace, log).await
    }
}

/// Clone `url` into the workspace at the requested branch or tag, then bring
/// in submodules when the checkout has a `.gitmodules` file.
async fn fetch(url: &str, spec: &BuildSpec, workspace: &Path, log: &BuildLog) -> Result<()> {
    let target = workspace.to_string_lossy().to_string();
    let token = spec.source_token.as_str();

    match spec.ref_kind {
        GitRefKind::Branch => {
            let args = ["clone", "-b", spec.ref_name.as_str(), url, target.as_str()];
            run_git(&args, None, token, log).await?;
        }
        GitRefKind::Tag => {
            run_git(&["clone", url, &target], None, token, log).await?;
            run_git(&["checkout", &spec.ref_name], Some(workspace), token, log).await?;
        }
    }

    if tokio::fs::try_exists(workspace.join(GITMODULES))
        .await
        .unwrap_or(false)
    {
        info!(build_id = %spec.build_id, "Updating submodules");
        update_submodules(workspace, &spec.source_host, token, log).await?;
    }

    Ok(())
}

/// Rewrite every submodule URL to carry the access token, then update
/// submodules recursively.
async fn update_submodules(
    workspace: &Path,
    host: &str,
    token: &str,
    log: &BuildLog,
) -> Result<()> {
    let listing = Command::new("git")
        .args(["config", "--file", GITMODULES, "-l"])
        .current_dir(workspace)
        .stdin(Stdio::null())
        .output()
        .await;

    let listing = match listing {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).to_string()
        }
        Ok(output) => {
            warn!(status = %output.status, "Listing submodule URLs failed");
            return Ok(());
        }
        Err(e) => {
            warn!(error = %e, "Listing submodule URLs failed");
            return Ok(());
        }
    };

    let entries = parse_submodule_urls(&listing)?;
    if entries.is_empty() {
        return Ok(());
    }

    for entry in &entries {
        let url = rewrite_submodule_url(&entry.url, host, token);
        debug!(key = %entry.key, url = %redact(&url, token), "Rewriting submodule URL");
        let args = ["config", "--file", GITMODULES, entry.key.as_str(), url.as_str()];
        run_git(&args, Some(workspace), token, log).await?;
    }

    run_git(
        &["submodule", "update", "--init", "--recursive"],
        Some(workspace),
        token,
        log,
    )
    .await
}

/// A `submodule.<name>.url=<url>` entry from `.gitmodules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleUrl {
    pub key: String,
    pub url: String,
}

/// Parse the URL entries out of `git config -l` output.
///
/// Every line mentioning `.url` must be exactly one `key=value` pair.
pub fn parse_submodule_urls(listing: &str) -> Result<Vec<SubmoduleUrl>> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(".url"))
        .map(|line| {
            let parts: Vec<&str> = line.split('=').collect();
            match parts.as_slice() {
                [key, url] if !key.is_empty() => Ok(SubmoduleUrl {
                    key: key.to_string(),
                    url: url.to_string(),
                }),
                _ => Err(Error::SubmoduleSpecInvalid(line.to_string())),
            }
        })
        .collect()
}

/// Turn a submodule URL into an HTTPS URL carrying the access token.
///
/// `git@host:org/repo.git` becomes `https://token@host/org/repo.git`.
pub fn rewrite_submodule_url(url: &str, host: &str, token: &str) -> String {
    let mut url = url.to_string();
    if let Some(rest) = url.strip_prefix("git@") {
        url = format!("https://{}", rest).replacen(
            &format!("{}:", host),
            &format!("{}/", host),
            1,
        );
    }
    url.replacen(
        &format!("https://{}", host),
        &format!("https://{}@{}", token, host),
        1,
    )
}

/// Clone URL with the token embedded as the user part.
pub fn clone_url(scheme: &str, token: &str, host: &str, full_name: &str) -> String {
    format!("{}://{}@{}/{}.git", scheme, token, host, full_name)
}

fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, "[REDACTED]")
    }
}

/// Run a git command, copying its output into the build log.
async fn run_git(args: &[&str], cwd: Option<&Path>, token: &str, log: &BuildLog) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| Error::CheckoutFailed(format!("failed to run git {}: {}", args[0], e)))?;

    let stdout = redact(&String::from_utf8_lossy(&output.stdout), token);
    let stderr = redact(&String::from_utf8_lossy(&output.stderr), token);
    log.append(&stdout);
    log.append(&stderr);

    if !output.status.success() {
        // Don't echo the arguments, they may contain the token
        warn!(command = args[0], status = %output.status, "Git command failed");
        return Err(Error::CheckoutFailed(format!(
            "git {} exited with {}: {}",
            args[0],
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}
