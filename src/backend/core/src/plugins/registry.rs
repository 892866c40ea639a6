//! Plugin record lifecycle (C3, §4.3, §3).
//!
//! A `PluginRecord` moves through exactly two transitions: activation
//! (install dependencies, collect hook/override records, assign the
//! plugin's own id to every hook that doesn't already carry one, run the
//! `activated` override, then flip `active`) and deactivation (run
//! `deactivated`, drop cached hook/override state, flip `active` off).
//! Re-registering the same plugin id with a different module instance is a
//! hard failure (§8's duplicate-registration scenario); re-registering the
//! same instance is a no-op.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CoreError, Result};
use crate::hooks::{HookCall, HookHandle, HookRecord, HookRecordKind};
use crate::plugins::installer::DependencyInstaller;
use crate::plugins::manifest::Manifest;
use crate::plugins::PluginModule;

/// A loaded plugin and its lifecycle state (§3: `{id, path, manifest, hooks,
/// overrides, active}`).
pub struct PluginRecord {
    pub id: String,
    pub path: PathBuf,
    pub manifest: Manifest,
    module: Box<dyn PluginModule>,
    hooks: Vec<HookHandle>,
    overrides: HashMap<String, Arc<crate::hooks::HookFn>>,
    active: bool,
}

impl std::fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("active", &self.active)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl PluginRecord {
    pub fn hooks(&self) -> &[HookHandle] {
        &self.hooks
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Registry of loaded plugins, keyed by id (§3, §4.3).
#[derive(Default)]
pub struct PluginRegistry {
    records: RwLock<HashMap<String, PluginRecord>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly discovered, not-yet-activated plugin. Re-registering
    /// the same id is only tolerated when it is the exact same module
    /// instance (by pointer identity) — anything else is a hard failure
    /// (§8).
    pub fn register(
        &self,
        id: String,
        path: PathBuf,
        manifest: Manifest,
        module: Box<dyn PluginModule>,
    ) -> Result<()> {
        let mut records = self.records.write();
        if let Some(existing) = records.get(&id) {
            if std::ptr::eq(existing.module.as_ref(), module.as_ref()) {
                tracing::warn!(plugin = %id, "duplicate registration of the same plugin instance; ignoring");
                return Ok(());
            }
            return Err(CoreError::plugin_load_failed(
                &id,
                "a different plugin is already registered under this id",
            ));
        }
        records.insert(
            id.clone(),
            PluginRecord {
                id,
                path,
                manifest,
                module,
                hooks: Vec::new(),
                overrides: HashMap::new(),
                active: false,
            },
        );
        Ok(())
    }

    /// Activate a plugin (§4.3): install its declared dependencies, collect
    /// its hook/override records (assigning this plugin's id to any hook
    /// that did not supply one of its own), run its `activated` override,
    /// then mark it active.
    pub async fn activate(&self, id: &str, installer: &DependencyInstaller) -> Result<()> {
        let (path, collected) = {
            let records = self.records.read();
            let record = records
                .get(id)
                .ok_or_else(|| CoreError::plugin_not_found(id))?;
            if record.active {
                return Ok(());
            }
            (record.path.clone(), record.module.init())
        };

        installer.install(id, &path).await?;

        let mut hooks = Vec::new();
        let mut overrides = HashMap::new();
        for record in collected {
            let HookRecord {
                name,
                priority,
                kind,
                handler,
            } = record;
            match kind {
                HookRecordKind::Hook => hooks.push(HookHandle {
                    name,
                    priority,
                    plugin_id: Some(id.to_string()),
                    handler,
                }),
                HookRecordKind::LifecycleOverride => {
                    overrides.insert(name, handler);
                }
            }
        }

        if let Some(activated) = overrides.get("activated").cloned() {
            let call = HookCall::bare(crate::hooks::DispatchContext::new(id.to_string()));
            activated(call)
                .await
                .map_err(|e| CoreError::plugin_load_failed(id, format!("activated override failed: {e}")))?;
        }

        let mut records = self.records.write();
        if let Some(record) = records.get_mut(id) {
            record.hooks = hooks;
            record.overrides = overrides;
            record.active = true;
        }
        Ok(())
    }

    /// Deactivate a plugin (§4.3): run its `deactivated` override, then
    /// drop its cached hook/override state and mark it inactive.
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        let deactivated_override = {
            let records = self.records.read();
            let record = records
                .get(id)
                .ok_or_else(|| CoreError::plugin_not_found(id))?;
            if !record.active {
                return Ok(());
            }
            record.overrides.get("deactivated").cloned()
        };

        if let Some(deactivated) = deactivated_override {
            let call = HookCall::bare(crate::hooks::DispatchContext::new(id.to_string()));
            deactivated(call)
                .await
                .map_err(|e| CoreError::plugin_load_failed(id, format!("deactivated override failed: {e}")))?;
        }

        let mut records = self.records.write();
        if let Some(record) = records.get_mut(id) {
            record.hooks.clear();
            record.overrides.clear();
            record.active = false;
        }
        Ok(())
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.records
            .read()
            .values()
            .filter(|r| r.active)
            .map(|r| r.id.clone())
            .collect()
    }

    /// All hook handles across every active plugin, for [`crate::hooks::HookRegistry::refresh`].
    pub fn all_active_hooks(&self) -> Vec<HookHandle> {
        self.records
            .read()
            .values()
            .filter(|r| r.active)
            .flat_map(|r| r.hooks.iter().cloned())
            .collect()
    }

    pub fn manifest(&self, id: &str) -> Option<Manifest> {
        self.records.read().get(id).map(|r| r.manifest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookOutcome;

    struct NoopModule;
    impl PluginModule for NoopModule {
        fn init(&self) -> Vec<HookRecord> {
            vec![HookRecord {
                name: "noop".to_string(),
                priority: 1,
                kind: HookRecordKind::Hook,
                handler: Arc::new(|_call: HookCall| Box::pin(async { Ok(HookOutcome::Value(None)) })),
            }]
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            name: "test".to_string(),
            version: "Unknown".to_string(),
            keywords: Vec::new(),
            description: "Unknown".to_string(),
            author_name: "Unknown".to_string(),
            author_email: "Unknown".to_string(),
            urls: Vec::new(),
            license: "Unknown".to_string(),
            min_host_version: None,
            max_host_version: None,
        }
    }

    #[tokio::test]
    async fn activation_assigns_plugin_id_and_flips_active() {
        let registry = PluginRegistry::new();
        registry
            .register("p1".to_string(), PathBuf::from("/tmp/p1"), manifest(), Box::new(NoopModule))
            .unwrap();
        let installer = DependencyInstaller::new(None, true);
        registry.activate("p1", &installer).await.unwrap();

        let hooks = registry.all_active_hooks();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].plugin_id.as_deref(), Some("p1"));
    }

    #[test]
    fn duplicate_id_with_different_instance_is_a_hard_failure() {
        let registry = PluginRegistry::new();
        registry
            .register("p1".to_string(), PathBuf::from("/tmp/p1"), manifest(), Box::new(NoopModule))
            .unwrap();
        let err = registry
            .register("p1".to_string(), PathBuf::from("/tmp/p1"), manifest(), Box::new(NoopModule))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::PluginLoadFailed);
    }

    #[tokio::test]
    async fn deactivation_clears_hooks() {
        let registry = PluginRegistry::new();
        registry
            .register("p1".to_string(), PathBuf::from("/tmp/p1"), manifest(), Box::new(NoopModule))
            .unwrap();
        let installer = DependencyInstaller::new(None, true);
        registry.activate("p1", &installer).await.unwrap();
        registry.deactivate("p1").await.unwrap();
        assert!(registry.all_active_hooks().is_empty());
    }
}
