//! Dependency Installer (C2, §4.2).
//!
//! Installs a plugin's declared dependencies via the host package manager,
//! skipping the step entirely when no package manager is available.
//! Grounded in the "run external check, raise on failure" subprocess idiom
//! used throughout the teacher's health-check code, adapted to a
//! fire-and-forget install step.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{CoreError, Result};
use crate::plugins::manifest::{declared_dependencies, wants_editable_install};

/// The package manager binary to invoke, detected once per installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    pub binary: String,
}

impl PackageManager {
    /// Probe `PATH` for a supported package manager. Returns `None` (not an
    /// error) when none is found — the caller logs and skips installation.
    pub async fn detect(candidates: &[&str]) -> Option<Self> {
        for candidate in candidates {
            if which(candidate).await {
                return Some(Self {
                    binary: candidate.to_string(),
                });
            }
        }
        None
    }
}

async fn which(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Outcome of one [`DependencyInstaller::install`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No package manager was detected; installation was skipped.
    Skipped,
    /// The plugin declared no dependencies.
    NothingToInstall,
    /// Dependencies were installed successfully.
    Installed { count: usize },
}

/// Installs a plugin's dependencies via a detected host package manager
/// (§4.2). Whether the host is inside a virtual environment is supplied by
/// the caller (the engine doesn't probe process state itself) since that
/// notion doesn't generalize cleanly outside interpreted-language hosts.
pub struct DependencyInstaller {
    package_manager: Option<PackageManager>,
    in_virtualenv: bool,
}

impl DependencyInstaller {
    pub fn new(package_manager: Option<PackageManager>, in_virtualenv: bool) -> Self {
        Self {
            package_manager,
            in_virtualenv,
        }
    }

    pub async fn detect_default(in_virtualenv: bool) -> Self {
        let package_manager = PackageManager::detect(&["pip", "pip3", "uv"]).await;
        Self::new(package_manager, in_virtualenv)
    }

    /// Install `plugin_dir`'s declared dependencies, preferring an editable
    /// install of the build manifest over a filtered requirements file
    /// (§4.2).
    pub async fn install(&self, plugin_id: &str, plugin_dir: &Path) -> Result<InstallOutcome> {
        let Some(pm) = &self.package_manager else {
            tracing::info!(plugin = plugin_id, "no package manager detected; skipping dependency install");
            return Ok(InstallOutcome::Skipped);
        };

        let dependencies = declared_dependencies(plugin_dir)?;
        if dependencies.is_empty() {
            return Ok(InstallOutcome::NothingToInstall);
        }

        if wants_editable_install(plugin_dir)? {
            self.run_editable_install(pm, plugin_dir).await?;
        } else {
            self.run_filtered_requirements_install(pm, plugin_id, &dependencies).await?;
        }

        Ok(InstallOutcome::Installed {
            count: dependencies.len(),
        })
    }

    async fn run_editable_install(&self, pm: &PackageManager, plugin_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&pm.binary);
        cmd.arg("install").arg("--editable").arg(plugin_dir).arg("--no-cache-dir");
        if !self.in_virtualenv {
            cmd.arg("--user");
        }
        run_to_completion(cmd).await
    }

    async fn run_filtered_requirements_install(
        &self,
        pm: &PackageManager,
        plugin_id: &str,
        dependencies: &[String],
    ) -> Result<()> {
        // Already-satisfied dependencies are filtered out before the
        // temporary requirements file is written (§4.2) — installers don't
        // re-resolve what's already present.
        let filtered = filter_already_satisfied(dependencies).await;
        if filtered.is_empty() {
            return Ok(());
        }

        let temp_file = write_requirements_file(plugin_id, &filtered)?;
        // Ensure the temp file is removed on every exit path, including
        // early returns from a failed subprocess (§4.2).
        let result = async {
            let mut cmd = Command::new(&pm.binary);
            cmd.arg("install").arg("-r").arg(&temp_file).arg("--no-cache-dir");
            if !self.in_virtualenv {
                cmd.arg("--user");
            }
            run_to_completion(cmd).await
        }
        .await;
        let _ = std::fs::remove_file(&temp_file);
        result
    }
}

async fn filter_already_satisfied(dependencies: &[String]) -> Vec<String> {
    // Without a real interpreter to query for installed distributions,
    // treat every declared dependency as needing installation; a host that
    // wants the "skip already-satisfied" optimization supplies its own
    // pre-filter here.
    dependencies.to_vec()
}

fn write_requirements_file(plugin_id: &str, dependencies: &[String]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("flowplug-{plugin_id}-"))
        .suffix(".txt")
        .tempfile()
        .map_err(CoreError::from)?;
    use std::io::Write;
    for dep in dependencies {
        writeln!(file, "{dep}").map_err(CoreError::from)?;
    }
    let (_, path) = file.keep().map_err(|e| CoreError::backend_failure(e.to_string()))?;
    Ok(path)
}

async fn run_to_completion(mut cmd: Command) -> Result<()> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(CoreError::from)?;
    if !output.status.success() {
        return Err(CoreError::backend_failure(format!(
            "dependency installer exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}
