//! Textual fallback for attribute lookup.
//!
//! When the attribute provider knows nothing about a method, the declaring
//! source file is read and scanned for declarations shaped like
//! `#[First, Second(args)] public function name`. This is a best-effort
//! reconstruction: it only sees attributes written on the line(s) directly
//! before the method and it matches topic keys by substring.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use super::NamespaceLayout;

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#\[\s*(.*?)\s*\]\s*public\s*function\s*(\w+)")
        .expect("valid declaration pattern")
});

/// Capability to read the source text declaring a class.
pub trait SourceProvider: Send + Sync {
    fn read_source(&self, class: &str) -> io::Result<String>;
}

/// Reads class sources from a directory tree laid out per
/// [`NamespaceLayout`].
#[derive(Clone, Debug)]
pub struct SourceTree {
    root: PathBuf,
    extension: String,
    layout: NamespaceLayout,
}

impl SourceTree {
    /// Sources under `root` with files named `<Class>.<extension>`.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            layout: NamespaceLayout::default(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: NamespaceLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn path_for(&self, class: &str) -> PathBuf {
        self.layout
            .path_for_class(&self.root, class, &self.extension)
    }
}

impl SourceProvider for SourceTree {
    fn read_source(&self, class: &str) -> io::Result<String> {
        fs::read_to_string(self.path_for(class))
    }
}

/// Map each annotated method name to its attribute names.
///
/// Attribute arguments are dropped, so `#[Topic("x"), Audit]` yields
/// `["Topic", "Audit"]`. A method annotated more than once accumulates
/// the names in order.
pub fn scan_declarations(source: &str) -> HashMap<String, Vec<String>> {
    let mut declarations: HashMap<String, Vec<String>> = HashMap::new();
    for caps in DECLARATION.captures_iter(source) {
        let names = declarations.entry(caps[2].to_string()).or_default();
        for attribute in caps[1].split(',') {
            let attribute = attribute.trim();
            let name = attribute
                .split_once('(')
                .map_or(attribute, |(name, _)| name)
                .trim();
            names.push(name.to_string());
        }
    }
    declarations
}
