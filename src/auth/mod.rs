//! Authentication for GitHub and GitLab
//!
//! Supports environment variables and CLI-based auth (gh, glab).

use crate::config::ScmType;
use crate::error::{Error, Result};
use std::env;
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a GitHub token, in order
pub const GITHUB_TOKEN_VARS: &[&str] = &["GITHUB_ACCESS_TOKEN", "GITHUB_TOKEN", "GH_TOKEN"];

/// Environment variables checked for a GitLab token, in order
pub const GITLAB_TOKEN_VARS: &[&str] = &["GITLAB_TOKEN", "GL_TOKEN"];

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh or glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// A resolved API token
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The token itself
    pub token: String,
    /// Where it came from
    pub source: AuthSource,
}

/// Read the first non-empty variable out of `vars`
fn token_from_env<'a>(vars: impl IntoIterator<Item = &'a str>) -> Option<(String, &'a str)> {
    vars.into_iter().find_map(|var| {
        env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| (v, var))
    })
}

async fn token_from_cli(program: &str, host: Option<&str>) -> Option<String> {
    let mut command = Command::new(program);
    command.args(["auth", "token"]);
    if let Some(host) = host {
        command.args(["--hostname", host]);
    }

    let output = command.output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!token.is_empty()).then_some(token)
}

/// Resolve a token for `kind`
///
/// `token_env` names a project-specific variable and is checked before the
/// backend defaults. The `gh`/`glab` CLI is the last resort.
pub async fn get_auth(
    kind: ScmType,
    token_env: Option<&str>,
    host: Option<&str>,
) -> Result<AuthConfig> {
    let (defaults, program) = match kind {
        ScmType::GitHub => (GITHUB_TOKEN_VARS, "gh"),
        ScmType::GitLab => (GITLAB_TOKEN_VARS, "glab"),
    };

    let vars = token_env.into_iter().chain(defaults.iter().copied());
    if let Some((token, var)) = token_from_env(vars) {
        debug!(var, "using token from environment");
        return Ok(AuthConfig {
            token,
            source: AuthSource::EnvVar,
        });
    }

    if let Some(token) = token_from_cli(program, host).await {
        debug!(program, "using token from CLI");
        return Ok(AuthConfig {
            token,
            source: AuthSource::Cli,
        });
    }

    let hint = token_env.unwrap_or(defaults[0]);
    Err(Error::Auth(format!(
        "no {kind} token found; set {hint} or log in with `{program} auth login`"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_vars_yield_nothing() {
        let found = token_from_env(["SUBMITQUEUE_UNSET_TOKEN_A", "SUBMITQUEUE_UNSET_TOKEN_B"]);
        assert_eq!(found, None);
    }

    #[test]
    fn test_default_var_order() {
        assert_eq!(GITHUB_TOKEN_VARS[0], "GITHUB_ACCESS_TOKEN");
        assert_eq!(GITLAB_TOKEN_VARS[0], "GITLAB_TOKEN");
    }
}
