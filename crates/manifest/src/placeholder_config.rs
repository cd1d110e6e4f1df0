// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder source maps

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where placeholder content comes from.
///
/// Two maps, consulted in order: `user_dir` (paths relative to the user's
/// project dir, `*` globs pick the newest match by mtime) then `package_dir`
/// (paths relative to the package install dir).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    #[serde(default)]
    pub user_dir: IndexMap<String, String>,
    #[serde(default)]
    pub package_dir: IndexMap<String, String>,
}

impl PlaceholderConfig {
    /// Standard artifact placeholders for a fresh workspace.
    pub fn standard() -> Self {
        let mut user_dir = IndexMap::new();
        for (name, path) in [
            ("product_brief", ".codemachine/artifacts/product-brief*.md"),
            ("prd", ".codemachine/artifacts/prd*.md"),
            ("ux_design_spec", ".codemachine/artifacts/ux-design-spec*.md"),
            ("bmad_architecture", ".codemachine/artifacts/architecture*.md"),
            ("epics", ".codemachine/artifacts/epics*.md"),
        ] {
            user_dir.insert(name.to_string(), path.to_string());
        }
        Self {
            user_dir,
            package_dir: IndexMap::new(),
        }
    }

    /// Look up a placeholder source, `user_dir` first.
    pub fn lookup(&self, name: &str) -> Option<PlaceholderSource<'_>> {
        if let Some(path) = self.user_dir.get(name) {
            return Some(PlaceholderSource::UserDir(path));
        }
        self.package_dir
            .get(name)
            .map(|path| PlaceholderSource::PackageDir(path))
    }
}

/// A resolved placeholder source path, tagged with its base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderSource<'a> {
    UserDir(&'a str),
    PackageDir(&'a str),
}

#[cfg(test)]
#[path = "placeholder_config_tests.rs"]
mod tests;
