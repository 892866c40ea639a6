//! Manifest Resolver (C1, §4.1).
//!
//! Merges plugin metadata from an on-disk manifest, a build manifest, and
//! (for installed plugins) an installed-package index into one normalized
//! [`Manifest`] record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Sentinel for fields that end up empty after normalization (§3).
pub const UNKNOWN: &str = "Unknown";

const ON_DISK_MANIFEST: &str = "plugin.toml";
const BUILD_MANIFEST: &str = "plugin.build.toml";

/// Normalized plugin record (§3). Every string field is trimmed; empty
/// collapses to [`UNKNOWN`] (or, for `name`, a humanized directory name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub keywords: Vec<String>,
    pub description: String,
    pub author_name: String,
    pub author_email: String,
    pub urls: Vec<String>,
    pub license: String,
    pub min_host_version: Option<String>,
    pub max_host_version: Option<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// On-disk formats
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct OnDiskManifest {
    #[serde(default)]
    plugin: OnDiskPlugin,
}

#[derive(Debug, Default, Deserialize)]
struct OnDiskPlugin {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    author: Option<OnDiskAuthor>,
    #[serde(default)]
    urls: Option<OnDiskUrls>,
    #[serde(default)]
    host: Option<OnDiskHost>,
}

#[derive(Debug, Default, Deserialize)]
struct OnDiskAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OnDiskUrls {
    #[serde(flatten)]
    entries: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct OnDiskHost {
    #[serde(default)]
    min_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
    /// The host-package requirement string, e.g. `"flowplug-host>=1.2,<2.0"`,
    /// used for version-bound inference when `min_version`/`max_version`
    /// are absent (§4.1 step 5).
    #[serde(default)]
    requirement: Option<String>,
}

/// The build manifest describes dependencies and, optionally, metadata
/// overrides (§6).
#[derive(Debug, Default, Deserialize)]
struct BuildManifestFile {
    #[serde(default)]
    build: BuildSection,
}

#[derive(Debug, Default, Deserialize)]
struct BuildSection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    author: Option<OnDiskAuthor>,
    #[serde(default)]
    urls: Option<OnDiskUrls>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    editable: bool,
}

/// A normalized, mutable scratch record used while merging sources. `None`
/// means "still at default" — the precedence rules in §4.1 all hinge on
/// distinguishing "unset" from "explicitly empty string".
#[derive(Debug, Default, Clone)]
struct Fields {
    name: Option<String>,
    version: Option<String>,
    keywords: Vec<String>,
    description: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
    urls: Vec<String>,
    license: Option<String>,
    min_host_version: Option<String>,
    max_host_version: Option<String>,
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl Fields {
    fn from_on_disk(raw: OnDiskPlugin) -> Self {
        let (author_name, author_email) = match raw.author {
            Some(a) => (
                a.name.as_deref().and_then(trimmed),
                a.email.as_deref().and_then(trimmed),
            ),
            None => (None, None),
        };
        let urls = raw
            .urls
            .map(|u| u.entries.into_values().filter_map(|v| trimmed(&v)).collect())
            .unwrap_or_default();
        let (min_host_version, max_host_version) = match &raw.host {
            Some(h) => (
                h.min_version.as_deref().and_then(trimmed),
                h.max_version.as_deref().and_then(trimmed),
            ),
            None => (None, None),
        };
        Self {
            name: raw.name.as_deref().and_then(trimmed),
            version: raw.version.as_deref().and_then(trimmed),
            keywords: raw.keywords.iter().filter_map(|k| trimmed(k)).collect(),
            description: raw.description.as_deref().and_then(trimmed),
            author_name,
            author_email,
            urls,
            license: raw.license.as_deref().and_then(trimmed),
            min_host_version,
            max_host_version,
        }
    }

    fn from_build(raw: &BuildSection) -> Self {
        let (author_name, author_email) = match &raw.author {
            Some(a) => (
                a.name.as_deref().and_then(trimmed),
                a.email.as_deref().and_then(trimmed),
            ),
            None => (None, None),
        };
        let urls = raw
            .urls
            .as_ref()
            .map(|u| u.entries.values().filter_map(|v| trimmed(v)).collect())
            .unwrap_or_default();
        Self {
            name: raw.name.as_deref().and_then(trimmed),
            version: raw.version.as_deref().and_then(trimmed),
            keywords: raw.keywords.iter().filter_map(|k| trimmed(k)).collect(),
            description: raw.description.as_deref().and_then(trimmed),
            author_name,
            author_email,
            urls,
            license: raw.license.as_deref().and_then(trimmed),
            min_host_version: None,
            max_host_version: None,
        }
    }

    /// Apply `override` onto `self` wherever `override` is non-empty,
    /// *excluding* version bounds (§3 invariant: "values from a build
    /// manifest override the on-disk manifest only when non-empty ... bounds
    /// in the on-disk manifest take precedence over bounds inferred from the
    /// plugin's declared host-package requirement").
    fn override_if_non_empty(mut self, over: &Fields) -> Self {
        if over.name.is_some() {
            self.name = over.name.clone();
        }
        if over.version.is_some() {
            self.version = over.version.clone();
        }
        if !over.keywords.is_empty() {
            self.keywords = over.keywords.clone();
        }
        if over.description.is_some() {
            self.description = over.description.clone();
        }
        if over.author_name.is_some() {
            self.author_name = over.author_name.clone();
        }
        if over.author_email.is_some() {
            self.author_email = over.author_email.clone();
        }
        if !over.urls.is_empty() {
            self.urls = over.urls.clone();
        }
        if over.license.is_some() {
            self.license = over.license.clone();
        }
        self
    }

    /// Apply installed-distribution metadata only to fields still unset
    /// (§4.1 step 4).
    fn apply_distribution_defaults(mut self, dist: &InstalledMetadata) -> Self {
        if self.name.is_none() {
            self.name = trimmed(&dist.name);
        }
        if self.version.is_none() {
            self.version = trimmed(&dist.version);
        }
        if self.description.is_none() {
            self.description = dist.summary.as_deref().and_then(trimmed);
        }
        if self.author_name.is_none() {
            self.author_name = dist.author.as_deref().and_then(trimmed);
        }
        if self.license.is_none() {
            self.license = dist.license.as_deref().and_then(trimmed);
        }
        if self.urls.is_empty() {
            self.urls = dist
                .home_page
                .iter()
                .chain(dist.project_urls.iter())
                .filter_map(|v| trimmed(v))
                .collect();
        }
        self
    }

    fn finalize(self, plugin_dir_id: &str) -> Manifest {
        let name = self
            .name
            .unwrap_or_else(|| humanize_directory_name(plugin_dir_id));
        Manifest {
            name,
            version: self.version.unwrap_or_else(|| UNKNOWN.to_string()),
            keywords: self.keywords,
            description: self.description.unwrap_or_else(|| UNKNOWN.to_string()),
            author_name: self.author_name.unwrap_or_else(|| UNKNOWN.to_string()),
            author_email: self.author_email.unwrap_or_else(|| UNKNOWN.to_string()),
            urls: self.urls,
            license: self.license.unwrap_or_else(|| UNKNOWN.to_string()),
            min_host_version: self.min_host_version,
            max_host_version: self.max_host_version,
        }
    }
}

/// Humanize a plugin directory identifier into a display name, e.g.
/// `"pdf-ingest_plugin"` -> `"Pdf Ingest Plugin"`.
fn humanize_directory_name(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ───────────────────────────────────────────────────────────────────────────
// Installed-package index
// ───────────────────────────────────────────────────────────────────────────

/// A stand-in for Python distribution metadata: a simple registry mapping a
/// plugin id (in any of its hyphen/underscore spellings) to the metadata a
/// package manager would have recorded, plus the files it installed and its
/// declared requirements. Rust plugins are not dynamically pip-installed, so
/// there is no runtime package database to introspect; hosts that vendor
/// plugins as installed packages populate this index themselves (e.g. from
/// their own build manifest) and pass it to [`resolve`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstalledIndex {
    pub distributions: Vec<InstalledMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstalledMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
    #[serde(default)]
    pub project_urls: Vec<String>,
    /// Declared requirement strings, e.g. `["flowplug-host>=1.2,<2.0"]`.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Files this distribution installed, used for the fallback scan in
    /// §4.1 step 4 when the directory-name lookup misses.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl InstalledIndex {
    /// Directory-name lookup trying the id and its hyphen/underscore
    /// variants (§4.1 step 4, §6's entry-point recovery probe).
    fn find_by_id(&self, plugin_id: &str) -> Option<&InstalledMetadata> {
        let hyphen = plugin_id.replace('_', "-");
        let underscore = plugin_id.replace('-', "_");
        self.distributions.iter().find(|d| {
            d.name == plugin_id || d.name == hyphen || d.name == underscore
        })
    }

    /// Fallback: scan every distribution's file list for one under the
    /// plugin directory.
    fn find_by_files_under(&self, plugin_dir: &Path) -> Option<&InstalledMetadata> {
        self.distributions
            .iter()
            .find(|d| d.files.iter().any(|f| f.starts_with(plugin_dir)))
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Discovery: finding manifest files
// ───────────────────────────────────────────────────────────────────────────

/// Find the shallowest occurrence of `filename` under `root`, preferring
/// `root` itself; ties broken lexicographically by relative path (§4.1
/// step 1).
fn find_manifest_file(root: &Path, filename: &str) -> Option<PathBuf> {
    let direct = root.join(filename);
    if direct.is_file() {
        return Some(direct);
    }

    let mut best: Option<(usize, PathBuf)> = None;
    let mut stack = vec![(root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push((path, depth + 1));
            } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
                match &best {
                    Some((best_depth, best_path)) if *best_depth < depth + 1 => {}
                    Some((best_depth, best_path)) if *best_depth == depth + 1 && *best_path < path => {}
                    _ => best = Some((depth + 1, path)),
                }
            }
        }
    }
    best.map(|(_, p)| p)
}

fn parse_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| CoreError::manifest_invalid(path.display().to_string(), e.to_string()))
}

// ───────────────────────────────────────────────────────────────────────────
// Version-bound inference (§4.1 step 5)
// ───────────────────────────────────────────────────────────────────────────

/// Parse requirement strings of the form `HOST_PKG_NAME<specs>` and apply
/// the last-declared specifier for each bound direction. Unknown operators
/// (and `~=`) are ignored with a warning.
fn infer_host_bounds(host_pkg_name: &str, requirements: &[String]) -> (Option<String>, Option<String>) {
    let mut min: Option<String> = None;
    let mut max: Option<String> = None;

    for req in requirements {
        let req = req.trim();
        let Some(rest) = req.strip_prefix(host_pkg_name) else {
            continue;
        };
        for spec in rest.split(',') {
            let spec = spec.trim();
            if let Some(v) = spec.strip_prefix(">=").or_else(|| spec.strip_prefix('>')) {
                min = Some(v.trim().to_string());
            } else if let Some(v) = spec.strip_prefix("<=").or_else(|| spec.strip_prefix('<')) {
                max = Some(v.trim().to_string());
            } else if let Some(v) = spec.strip_prefix("==") {
                max = Some(v.trim().to_string());
            } else if spec.starts_with("~=") {
                tracing::warn!(spec, "ignoring ~= version specifier for bound inference");
            } else if !spec.is_empty() {
                tracing::warn!(spec, "ignoring unrecognized version specifier");
            }
        }
    }

    (min, max)
}

// ───────────────────────────────────────────────────────────────────────────
// Public resolver entry point
// ───────────────────────────────────────────────────────────────────────────

/// Resolve a plugin directory's manifest (§4.1).
///
/// `host_pkg_name` is the name used to recognize the host-package
/// requirement inside a distribution's `requires` list, e.g.
/// `"flowplug-host"`. `installed` is consulted only when `plugin_dir` lies
/// under `installed_root` (the analog of "is under a system package
/// directory"); pass `None` for purely filesystem-discovered plugins.
pub fn resolve(
    plugin_dir: &Path,
    host_pkg_name: &str,
    installed: Option<(&Path, &InstalledIndex)>,
) -> Result<Manifest> {
    let plugin_id = plugin_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::manifest_invalid(plugin_dir.display().to_string(), "path has no final segment"))?
        .to_string();

    let on_disk_path = find_manifest_file(plugin_dir, ON_DISK_MANIFEST);
    let build_path = find_manifest_file(plugin_dir, BUILD_MANIFEST);

    let mut on_disk_fields = match &on_disk_path {
        Some(path) => Fields::from_on_disk(parse_toml::<OnDiskManifest>(path)?.plugin),
        None => Fields::default(),
    };

    let build_file: Option<BuildManifestFile> = match &build_path {
        Some(path) => Some(parse_toml(path)?),
        None => None,
    };

    if let Some(build) = &build_file {
        on_disk_fields = on_disk_fields.override_if_non_empty(&Fields::from_build(&build.build));
    }

    let mut requirements_for_bounds: Vec<String> = Vec::new();

    if let Some((installed_root, index)) = installed {
        if plugin_dir.starts_with(installed_root) {
            let dist = index
                .find_by_id(&plugin_id)
                .or_else(|| index.find_by_files_under(plugin_dir));
            if let Some(dist) = dist {
                if on_disk_path.is_none() {
                    // §4.1 step 4: if the on-disk manifest was absent, a
                    // manifest inside the distribution's own files would be
                    // preferred; we have no separate copy to parse here, so
                    // distribution metadata becomes the sole source for any
                    // field it covers via apply_distribution_defaults below.
                    tracing::debug!(plugin = %plugin_id, "no on-disk manifest; using installed distribution metadata");
                }
                on_disk_fields = on_disk_fields.apply_distribution_defaults(dist);
                requirements_for_bounds.extend(dist.requires.iter().cloned());
            }
        }
    }

    if on_disk_fields.min_host_version.is_none() && on_disk_fields.max_host_version.is_none() {
        let (min, max) = infer_host_bounds(host_pkg_name, &requirements_for_bounds);
        on_disk_fields.min_host_version = min;
        on_disk_fields.max_host_version = max;
    }

    Ok(on_disk_fields.finalize(&plugin_id))
}

/// Dependencies declared by a plugin's build manifest (consumed by C2, the
/// dependency installer). Returns an empty list if there is no build
/// manifest.
pub fn declared_dependencies(plugin_dir: &Path) -> Result<Vec<String>> {
    match find_manifest_file(plugin_dir, BUILD_MANIFEST) {
        Some(path) => Ok(parse_toml::<BuildManifestFile>(&path)?.build.dependencies),
        None => Ok(Vec::new()),
    }
}

/// Whether the build manifest requests an editable install (C2).
pub fn wants_editable_install(plugin_dir: &Path) -> Result<bool> {
    match find_manifest_file(plugin_dir, BUILD_MANIFEST) {
        Some(path) => Ok(parse_toml::<BuildManifestFile>(&path)?.build.editable),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn empty_fields_collapse_to_unknown_sentinel() {
        let tmp = TempDir::new().unwrap();
        let plugin_dir = tmp.path().join("my-plugin");
        fs::create_dir_all(&plugin_dir).unwrap();
        write(&plugin_dir, ON_DISK_MANIFEST, "[plugin]\nname = \"  \"\n");

        let manifest = resolve(&plugin_dir, "flowplug-host", None).unwrap();
        assert_eq!(manifest.name, "My Plugin"); // humanized from dir name
        assert_eq!(manifest.version, UNKNOWN);
        assert_eq!(manifest.description, UNKNOWN);
    }

    #[test]
    fn build_manifest_overrides_non_empty_fields_only() {
        let tmp = TempDir::new().unwrap();
        let plugin_dir = tmp.path().join("sample");
        fs::create_dir_all(&plugin_dir).unwrap();
        write(
            &plugin_dir,
            ON_DISK_MANIFEST,
            "[plugin]\nname = \"Sample\"\nversion = \"1.0.0\"\ndescription = \"from disk\"\n",
        );
        write(
            &plugin_dir,
            BUILD_MANIFEST,
            "[build]\nversion = \"1.1.0\"\ndependencies = [\"requests\"]\n",
        );

        let manifest = resolve(&plugin_dir, "flowplug-host", None).unwrap();
        assert_eq!(manifest.name, "Sample");
        assert_eq!(manifest.version, "1.1.0"); // overridden
        assert_eq!(manifest.description, "from disk"); // untouched (build left it empty)

        let deps = declared_dependencies(&plugin_dir).unwrap();
        assert_eq!(deps, vec!["requests".to_string()]);
    }

    #[test]
    fn on_disk_bounds_take_precedence_over_inferred_bounds() {
        let tmp = TempDir::new().unwrap();
        let plugin_dir = tmp.path().join("bounded");
        fs::create_dir_all(&plugin_dir).unwrap();
        write(
            &plugin_dir,
            ON_DISK_MANIFEST,
            "[plugin]\nname = \"Bounded\"\n\n[plugin.host]\nmin_version = \"1.0\"\n",
        );

        let installed_root = tmp.path().to_path_buf();
        let index = InstalledIndex {
            distributions: vec![InstalledMetadata {
                name: "bounded".into(),
                version: "9.9.9".into(),
                requires: vec!["flowplug-host<3.0".into()],
                ..Default::default()
            }],
        };

        let manifest = resolve(&plugin_dir, "flowplug-host", Some((&installed_root, &index))).unwrap();
        assert_eq!(manifest.min_host_version, Some("1.0".to_string()));
        // max_version was not set on-disk, so it is NOT inferred either —
        // the spec's rule ties together whether *either* bound is set
        // on-disk before skipping inference.
        assert_eq!(manifest.max_host_version, None);
    }

    #[test]
    fn version_bounds_inferred_when_absent() {
        let tmp = TempDir::new().unwrap();
        let plugin_dir = tmp.path().join("inferred");
        fs::create_dir_all(&plugin_dir).unwrap();
        write(&plugin_dir, ON_DISK_MANIFEST, "[plugin]\nname = \"Inferred\"\n");

        let installed_root = tmp.path().to_path_buf();
        let index = InstalledIndex {
            distributions: vec![InstalledMetadata {
                name: "inferred".into(),
                version: "2.0.0".into(),
                requires: vec![
                    "flowplug-host>=1.0".into(),
                    "flowplug-host==1.9".into(),
                ],
                ..Default::default()
            }],
        };

        let manifest = resolve(&plugin_dir, "flowplug-host", Some((&installed_root, &index))).unwrap();
        assert_eq!(manifest.min_host_version, Some("1.0".to_string()));
        assert_eq!(manifest.max_host_version, Some("1.9".to_string()));
        assert_eq!(manifest.version, "2.0.0"); // from distribution, on-disk left unset
    }

    #[test]
    fn humanize_directory_name_handles_hyphen_and_underscore() {
        assert_eq!(humanize_directory_name("pdf-ingest_plugin"), "Pdf Ingest Plugin");
    }
}
