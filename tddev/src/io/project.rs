//! Rooted file access for the generated project.
//!
//! Every path the model names goes through [`ProjectStore::resolve`], which
//! rejects absolute paths and `..` segments that climb out of the root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::actions::FileAction;
use crate::io::run_log::RUN_LOG_DIR;

/// Patterns hidden from listings unless the caller supplies its own set.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/**",
    "dist/**",
    "build/**",
    ".git/**",
    "*.log",
    "__pycache__/**",
    "*.pyc",
    ".tddev/**",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("path escapes project root: {0}")]
    OutsideRoot(String),

    #[error("run log is not writable by actions: {0}")]
    RunLog(String),

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File operations confined to one project directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    /// Open (creating if needed) the project directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io("create root", &root, e))?;
        info!(root = %root.display(), "opened project store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a root-relative path onto the filesystem.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let candidate = Path::new(path);
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(StoreError::OutsideRoot(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::OutsideRoot(path.to_string()));
                }
            }
        }
        if parts.is_empty() {
            return Err(StoreError::OutsideRoot(path.to_string()));
        }
        Ok(parts.iter().fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    /// Whether `path` names an existing regular file inside the root.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    /// Sorted root-relative paths of all files not matched by `exclude`.
    ///
    /// `None` applies [`DEFAULT_EXCLUDES`].
    pub fn list_files(&self, exclude: Option<&[String]>) -> Result<Vec<String>, StoreError> {
        let excludes = match exclude {
            Some(patterns) => ExcludeSet::new(patterns.iter().map(String::as_str)),
            None => ExcludeSet::new(DEFAULT_EXCLUDES.iter().copied()),
        };

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).min_depth(1).into_iter();
        let walker = walker.filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let rel = relative_slash_path(&self.root, entry.path());
            !excludes.prunes_dir(&rel)
        });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                StoreError::Io {
                    action: "walk",
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative_slash_path(&self.root, entry.path());
            if !excludes.matches(&rel) {
                files.push(rel);
            }
        }
        files.sort();
        debug!(count = files.len(), "listed project files");
        Ok(files)
    }

    pub fn read(&self, path: &str) -> Result<String, StoreError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => StoreError::io("read", &full, e),
        })
    }

    /// Write `content`, creating parent directories and replacing any existing file.
    pub fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create dir", parent, e))?;
        }
        fs::write(&full, content).map_err(|e| StoreError::io("write", &full, e))?;
        debug!(path, bytes = content.len(), "wrote file");
        Ok(())
    }

    /// Remove the file; a missing file is not an error.
    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => {
                debug!(path, "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("delete", &full, e)),
        }
    }

    /// Box-drawing tree of the project, directories first.
    ///
    /// Directories deeper than `max_depth` are listed but not expanded.
    pub fn tree(&self, max_depth: usize) -> Result<String, StoreError> {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());
        let mut lines = vec![name];
        tree_lines(&self.root, "", 0, max_depth, &mut lines)?;
        Ok(lines.join("\n"))
    }

    /// Concatenate labeled file contents for a model prompt.
    ///
    /// Each file becomes `<file filePath="REL">` … `</file>`; blocks are
    /// separated by a blank line. Line numbers are 1-based and right-aligned
    /// to four columns.
    pub fn context_buffer(
        &self,
        paths: &[String],
        include_line_numbers: bool,
    ) -> Result<String, StoreError> {
        let mut blocks = Vec::with_capacity(paths.len());
        for path in paths {
            let content = self.read(path)?;
            let body = if include_line_numbers {
                content
                    .split('\n')
                    .enumerate()
                    .map(|(i, line)| format!("{:>4} | {line}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                content
            };
            blocks.push(format!("<file filePath=\"{path}\">\n{body}\n</file>"));
        }
        Ok(blocks.join("\n\n"))
    }

    /// Apply one model action. Returns whether the tree was touched.
    ///
    /// Writes and deletes under the run-log directory are refused.
    pub fn apply_action(&self, action: &FileAction) -> Result<bool, StoreError> {
        if let FileAction::Write { path, .. } | FileAction::Delete { path } = action
            && self.resolve(path)?.starts_with(self.root.join(RUN_LOG_DIR))
        {
            return Err(StoreError::RunLog(path.clone()));
        }
        match action {
            FileAction::Write { path, content } => {
                self.write(path, content)?;
                info!(path = %path, "applied write");
                Ok(true)
            }
            FileAction::Delete { path } => {
                self.delete(path)?;
                info!(path = %path, "applied delete");
                Ok(true)
            }
            FileAction::Other { kind, path } => {
                warn!(kind = %kind, path = %path, "ignoring unknown action type");
                Ok(false)
            }
        }
    }
}

fn tree_lines(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), StoreError> {
    let mut entries: Vec<(bool, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io("read dir", dir, e))? {
        let entry = entry.map_err(|e| StoreError::io("read dir", dir, e))?;
        let path = entry.path();
        entries.push((
            path.is_dir(),
            entry.file_name().to_string_lossy().into_owned(),
            path,
        ));
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let count = entries.len();
    for (i, (is_dir, name, path)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        lines.push(format!("{prefix}{}{name}", if last { "└── " } else { "├── " }));
        if is_dir && depth < max_depth {
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            tree_lines(&path, &child_prefix, depth + 1, max_depth, lines)?;
        }
    }
    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// fnmatch-style patterns over `/`-separated relative paths.
///
/// `*` matches any run of characters including `/`, `?` matches one
/// character, and everything else is literal.
struct ExcludeSet {
    patterns: Vec<Regex>,
    /// Directory parts of the `prefix/**` patterns.
    dir_prefixes: Vec<Regex>,
}

impl ExcludeSet {
    fn new<'a>(patterns: impl Iterator<Item = &'a str>) -> Self {
        let mut set = Self {
            patterns: Vec::new(),
            dir_prefixes: Vec::new(),
        };
        for pattern in patterns {
            let Some(compiled) = compile_glob(pattern) else {
                continue;
            };
            set.patterns.push(compiled);
            if let Some(prefix) = pattern.strip_suffix("/**")
                && let Some(dir) = compile_glob(prefix)
            {
                set.dir_prefixes.push(dir);
            }
        }
        set
    }

    fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(rel))
    }

    /// Only a `prefix/**` pattern whose prefix matches the directory
    /// excludes every path below it, so only those prune the walk.
    fn prunes_dir(&self, rel: &str) -> bool {
        self.dir_prefixes.iter().any(|re| re.is_match(rel))
    }
}

fn compile_glob(pattern: &str) -> Option<Regex> {
    match Regex::new(&glob_to_regex(pattern)) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern, err = %err, "skipping invalid exclude pattern");
            None
        }
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}
