//! Test request body templating
//!
//! Placeholders look like `{{repo}}` or, for project files written for
//! Go templates, `{{.Repo}}`. Names are matched case-insensitively.
//! `{{run_id}}` is the id a CI system reports its result under.

use crate::error::{Error, Result};
use crate::types::SubmitRequest;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
});

fn lookup(name: &str, request: &SubmitRequest, run_id: &str) -> Option<String> {
    let value = match name.to_ascii_lowercase().as_str() {
        "project" | "project_name" => request.project_name.clone(),
        "repo" | "repo_name" => request.repo_name.clone(),
        "pr" | "pr_number" | "prnumber" | "pull_request_number" => {
            request.pull_request_number.to_string()
        }
        "from_ref" | "fromref" => request.from_ref.clone(),
        "sha1" | "sha" => request.sha1.to_string(),
        "priority" => request.priority.to_string(),
        "emergency" | "is_emergency" | "isemergency" => request.is_emergency.to_string(),
        "run_id" | "runid" => run_id.to_string(),
        _ => return None,
    };
    Some(value)
}

/// Substitute request fields and the test run id into `template`
pub fn render_body(template: &str, request: &SubmitRequest, run_id: &str) -> Result<String> {
    let mut unknown = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        lookup(name, request, run_id).unwrap_or_else(|| {
            unknown.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    if let Some(name) = unknown {
        return Err(Error::Template(format!("unknown placeholder '{name}'")));
    }
    Ok(rendered.into_owned())
}
