//! Best-effort scanner for the tagged blocks models use to propose edits.
//!
//! Recognized shapes:
//!
//! ```text
//! <Action type="file" filePath="src/App.tsx">full file content</Action>
//! <Action type="delete" filePath="src/Old.tsx" />
//! <include>src/App.tsx</include>
//! ```
//!
//! Nothing here fails: malformed blocks are skipped and whatever well-formed
//! blocks exist are returned in reply order.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<Action\s+type="([^"]+)"\s+filePath="([^"]+)"\s*(?:/>|>(.*?)</Action>)"#)
        .expect("action pattern should be valid")
});

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<include>(.*?)</include>").expect("include pattern should be valid")
});

/// One edit proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileAction {
    /// Replace (or create) the file with the given full content.
    Write { path: String, content: String },
    /// Remove the file if it exists.
    Delete { path: String },
    /// A block with an unrecognized `type`; applied as a logged no-op.
    Other { kind: String, path: String },
}

impl FileAction {
    /// The `type` attribute as it appeared in the reply.
    pub fn kind(&self) -> &str {
        match self {
            FileAction::Write { .. } => "file",
            FileAction::Delete { .. } => "delete",
            FileAction::Other { kind, .. } => kind,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileAction::Write { path, .. }
            | FileAction::Delete { path }
            | FileAction::Other { path, .. } => path,
        }
    }
}

/// Extract every well-formed action block from a reply.
pub fn parse_file_actions(reply: &str) -> Vec<FileAction> {
    ACTION_RE
        .captures_iter(reply)
        .map(|caps| {
            let kind = caps[1].trim();
            let path = caps[2].trim().to_string();
            match kind {
                "file" => FileAction::Write {
                    path,
                    content: caps
                        .get(3)
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default(),
                },
                "delete" => FileAction::Delete { path },
                other => FileAction::Other {
                    kind: other.to_string(),
                    path,
                },
            }
        })
        .collect()
}

/// Extract the paths named by `<include>` markers, in order, skipping blanks.
pub fn parse_included_paths(reply: &str) -> Vec<String> {
    INCLUDE_RE
        .captures_iter(reply)
        .map(|caps| caps[1].trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}
