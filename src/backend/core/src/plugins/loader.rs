//! Plugin Loader discovery (C3, §4.3).
//!
//! Compiled plugin code is not dynamically imported the way the original
//! interpreted host did it (§9: "Import-cache manipulation... applies only
//! to interpreted-language hosting"); instead, each plugin directory is
//! paired with a statically linked [`crate::plugins::PluginModule`] factory.
//! What this module preserves faithfully from §4.3 is the *discovery*
//! algorithm: two-sourced precedence (installed entry points win over
//! filesystem directories), duplicate-id handling, and the exclusion rules
//! for nested subtrees.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::plugins::PluginModule;

/// A discovered plugin directory plus the factory that builds its
/// [`PluginModule`] implementation — the stand-in for "import this file
/// under a stable synthetic name" in a compiled target.
pub struct DiscoveredPlugin {
    pub id: String,
    pub path: PathBuf,
    pub source: DiscoverySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    EntryPoint,
    Filesystem,
}

/// An installed-package entry point: a factory that returns the plugin's
/// directory path (§6's "entry-point contract"). Mirrors the original's
/// tolerance for non-string returns and exceptions — both are represented
/// here as `Err`, logged and skipped by the caller.
pub type EntryPointFactory = Box<dyn Fn() -> Result<PathBuf, String> + Send + Sync>;

pub struct EntryPoint {
    pub name: String,
    pub factory: EntryPointFactory,
}

/// Discover plugin directories with installed-entry-point precedence over
/// filesystem directories (§4.3). `installed_root` is the "system package
/// directory" a returned path is checked against to trigger the recovery
/// probe.
pub fn discover(
    entry_points: Vec<EntryPoint>,
    filesystem_root: &Path,
    installed_root: Option<&Path>,
) -> Vec<DiscoveredPlugin> {
    let mut by_id: HashMap<String, DiscoveredPlugin> = HashMap::new();

    for entry_point in entry_points {
        let name = entry_point.name.clone();
        match (entry_point.factory)() {
            Ok(mut path) => {
                if let Some(root) = installed_root {
                    if path == root {
                        match recover_entry_point_subfolder(root, &name) {
                            Some(recovered) => path = recovered,
                            None => {
                                tracing::warn!(
                                    entry_point = %name,
                                    "entry point returned the system package root and recovery probe found no matching subfolder; skipping"
                                );
                                continue;
                            }
                        }
                    }
                }
                by_id.insert(
                    name.clone(),
                    DiscoveredPlugin {
                        id: name,
                        path,
                        source: DiscoverySource::EntryPoint,
                    },
                );
            }
            Err(reason) => {
                tracing::warn!(entry_point = %name, reason, "entry point factory failed; skipping");
            }
        }
    }

    if filesystem_root.is_dir() {
        if let Ok(entries) = std::fs::read_dir(filesystem_root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                    continue;
                };
                if by_id.contains_key(&id) {
                    tracing::info!(plugin = %id, "filesystem plugin dropped: installed entry point takes precedence");
                    continue;
                }
                by_id.insert(
                    id.clone(),
                    DiscoveredPlugin {
                        id,
                        path,
                        source: DiscoverySource::Filesystem,
                    },
                );
            }
        }
    }

    let mut discovered: Vec<_> = by_id.into_values().collect();
    discovered.sort_by(|a, b| a.id.cmp(&b.id));
    discovered
}

/// Probe `root` for a subfolder matching `name` in both hyphen and
/// underscore spellings (§4.3, §6).
fn recover_entry_point_subfolder(root: &Path, name: &str) -> Option<PathBuf> {
    for candidate in [name.replace('_', "-"), name.replace('-', "_"), name.to_string()] {
        let candidate_path = root.join(&candidate);
        if candidate_path.is_dir() {
            return Some(candidate_path);
        }
    }
    None
}

/// Whether a path should be excluded from hook/override collection (§4.3):
/// `tests/` subtrees, the framework's own folder, and (unless the plugin
/// itself lives under a `plugins/` path) nested `plugins/` subtrees.
pub fn is_excluded_path(relative: &Path, plugin_lives_under_plugins: bool, framework_self_dir: &str) -> bool {
    relative.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        part == "tests" || part == framework_self_dir || (part == "plugins" && !plugin_lives_under_plugins)
    })
}

/// Registry of statically linked plugin factories, keyed by plugin id —
/// the compiled-target replacement for dynamic module import (§9).
#[derive(Default)]
pub struct PluginFactoryRegistry {
    factories: HashMap<String, Box<dyn Fn(&Path) -> crate::error::Result<Box<dyn PluginModule>> + Send + Sync>>,
}

impl PluginFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        plugin_id: impl Into<String>,
        factory: impl Fn(&Path) -> crate::error::Result<Box<dyn PluginModule>> + Send + Sync + 'static,
    ) {
        self.factories.insert(plugin_id.into(), Box::new(factory));
    }

    pub fn build(&self, plugin_id: &str, path: &Path) -> crate::error::Result<Box<dyn PluginModule>> {
        let factory = self
            .factories
            .get(plugin_id)
            .ok_or_else(|| crate::error::CoreError::plugin_load_failed(plugin_id, "no factory linked for this plugin id"))?;
        factory(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn entry_points_take_precedence_over_filesystem() {
        let tmp = TempDir::new().unwrap();
        let fs_plugin = tmp.path().join("shared-id");
        fs::create_dir_all(&fs_plugin).unwrap();

        let entry_point_dir = tmp.path().join("entry-point-source");
        fs::create_dir_all(&entry_point_dir).unwrap();
        let entry_point_dir_clone = entry_point_dir.clone();

        let entry_points = vec![EntryPoint {
            name: "shared-id".to_string(),
            factory: Box::new(move || Ok(entry_point_dir_clone.clone())),
        }];

        let discovered = discover(entry_points, tmp.path(), None);
        let found = discovered.iter().find(|d| d.id == "shared-id").unwrap();
        assert_eq!(found.source, DiscoverySource::EntryPoint);
        assert_eq!(found.path, entry_point_dir);
    }

    #[test]
    fn failing_entry_point_is_skipped_without_aborting_discovery() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("good")).unwrap();

        let entry_points = vec![EntryPoint {
            name: "bad".to_string(),
            factory: Box::new(|| Err("boom".to_string())),
        }];

        let discovered = discover(entry_points, tmp.path(), None);
        assert!(discovered.iter().any(|d| d.id == "good"));
        assert!(!discovered.iter().any(|d| d.id == "bad"));
    }

    #[test]
    fn system_package_root_triggers_recovery_probe() {
        let tmp = TempDir::new().unwrap();
        let installed_root = tmp.path().join("site-packages");
        fs::create_dir_all(installed_root.join("my_plugin")).unwrap();
        let installed_root_clone = installed_root.clone();

        let entry_points = vec![EntryPoint {
            name: "my-plugin".to_string(),
            factory: Box::new(move || Ok(installed_root_clone.clone())),
        }];

        let discovered = discover(entry_points, &tmp.path().join("empty"), Some(&installed_root));
        let found = discovered.iter().find(|d| d.id == "my-plugin").unwrap();
        assert_eq!(found.path, installed_root.join("my_plugin"));
    }

    #[test]
    fn exclusion_rules_match_tests_and_nested_plugins() {
        assert!(is_excluded_path(Path::new("tests/foo.rs"), false, "_framework"));
        assert!(is_excluded_path(Path::new("nested/plugins/x.rs"), false, "_framework"));
        assert!(!is_excluded_path(Path::new("nested/plugins/x.rs"), true, "_framework"));
        assert!(!is_excluded_path(Path::new("src/lib.rs"), false, "_framework"));
    }
}
