//! Mapping between source paths and namespaced class paths.

use std::path::{Path, PathBuf};

/// Describes how the host lays out its classes.
///
/// Class paths use `\` as the namespace separator. The root namespace
/// corresponds to `source_dir` on disk, so `App\Jobs\SyncUsers` lives in
/// `app/Jobs/SyncUsers.<ext>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceLayout {
    pub root_namespace: String,
    pub source_dir: String,
    /// Namespace fragment identifying console command handlers.
    pub command_namespace: String,
    /// Namespace fragment identifying queued job handlers.
    pub job_namespace: String,
}

impl Default for NamespaceLayout {
    fn default() -> Self {
        Self {
            root_namespace: "App".into(),
            source_dir: "app".into(),
            command_namespace: "Console\\Commands".into(),
            job_namespace: "App\\Jobs".into(),
        }
    }
}

impl NamespaceLayout {
    /// Derive a command class from the file an exception was raised in.
    ///
    /// Returns `None` unless the path lies under the command namespace.
    pub fn command_class_from_path(&self, file: &str) -> Option<String> {
        let normalised = format!("\\{}", file.replace('/', "\\"));
        let command_at = normalised.find(&self.command_namespace)?;
        let marker = format!("\\{}\\", self.source_dir);
        let source_at = normalised[..command_at].rfind(&marker)?;
        let relative = &normalised[source_at + marker.len()..];
        let relative = strip_extension(relative);
        if relative.is_empty() {
            return None;
        }
        Some(format!("{}\\{}", self.root_namespace, relative))
    }

    /// Source file holding `class`, relative to `root`.
    pub fn path_for_class(&self, root: &Path, class: &str, extension: &str) -> PathBuf {
        let class = class.trim_start_matches('\\');
        let mut path = root.to_path_buf();
        for (index, segment) in class.split('\\').enumerate() {
            if index == 0 && segment == self.root_namespace {
                path.push(&self.source_dir);
            } else {
                path.push(segment);
            }
        }
        path.set_extension(extension);
        path
    }
}

fn strip_extension(relative: &str) -> &str {
    let name_start = relative.rfind('\\').map_or(0, |at| at + 1);
    match relative[name_start..].rfind('.') {
        Some(dot) => &relative[..name_start + dot],
        None => relative,
    }
}
