//! Core types for submit-queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A commit fingerprint (hex SHA1)
///
/// Used to detect whether a branch head or a pull request head has moved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(String);

impl Sha {
    /// Wrap a hex commit id
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    /// The hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, for log lines
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sha {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Sha {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Priority of a submit request; higher is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// Priority 1, the most urgent tier
    pub const P1: Self = Self(999);
    /// Priority 2
    pub const P2: Self = Self(998);
    /// Priority 3
    pub const P3: Self = Self(997);
    /// Priority 4, what every request gets by default
    pub const P4: Self = Self(0);
    /// Alias for [`Priority::P4`]
    pub const NORMAL: Self = Self::P4;
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
            Self::P3 => write!(f, "P3"),
            Self::P4 => write!(f, "P4"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "p1" => Ok(Self::P1),
            "p2" => Ok(Self::P2),
            "p3" => Ok(Self::P3),
            "p4" | "normal" => Ok(Self::P4),
            other => other
                .parse::<u32>()
                .map(Self)
                .map_err(|_| format!("invalid priority '{trimmed}' (expected P1-P4 or a number)")),
        }
    }
}

/// A candidate merge waiting in a project's submit queue
///
/// Identity fields never change once the request is enqueued. A requeue
/// puts the same value back; the next processing pass captures a fresh
/// baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Ordering rank within the non-emergency and emergency partitions
    pub priority: Priority,
    /// Outranks every priority tier
    pub is_emergency: bool,
    /// Project the request was submitted to
    pub project_name: String,
    /// Repository within the project
    pub repo_name: String,
    /// Pull request number
    pub pull_request_number: u64,
    /// Source ref being merged
    pub from_ref: String,
    /// PR head at submission time
    pub sha1: Sha,
    /// When the request was first submitted
    pub submitted_at: DateTime<Utc>,
}

impl SubmitRequest {
    /// Create a normal-priority request submitted now
    pub fn new(
        project_name: impl Into<String>,
        repo_name: impl Into<String>,
        pull_request_number: u64,
        from_ref: impl Into<String>,
        sha1: impl Into<Sha>,
    ) -> Self {
        Self {
            priority: Priority::NORMAL,
            is_emergency: false,
            project_name: project_name.into(),
            repo_name: repo_name.into(),
            pull_request_number,
            from_ref: from_ref.into(),
            sha1: sha1.into(),
            submitted_at: Utc::now(),
        }
    }

    /// Set the priority
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Flag as emergency
    #[must_use]
    pub const fn with_emergency(mut self, is_emergency: bool) -> Self {
        self.is_emergency = is_emergency;
        self
    }
}

impl fmt::Display for SubmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{} ({}{})",
            self.project_name,
            self.repo_name,
            self.pull_request_number,
            self.priority,
            if self.is_emergency { ", emergency" } else { "" }
        )
    }
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    Squash,
    /// Create a merge commit
    #[default]
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}
