//! Plugin runtime (C1–C3, §4.1–§4.3).
//!
//! A plugin is a directory with a manifest ([`manifest`]) and a statically
//! linked [`PluginModule`] factory ([`loader`]). Loading a plugin resolves
//! its manifest, installs its declared dependencies ([`installer`]), and
//! collects the hook/lifecycle-override records its `init()` returns;
//! [`registry`] owns the resulting [`registry::PluginRecord`] lifecycle.
//!
//! Sandboxing untrusted plugin code is out of scope (the original host's
//! resource/permission enforcement layer is not reproduced here).

pub mod installer;
pub mod loader;
pub mod manifest;
pub mod registry;

use crate::hooks::HookRecord;

/// The compiled-target replacement for "import this module and collect its
/// decorated top-level values" (§9): a plugin provides one of these, and
/// `init()` returns every hook and lifecycle override it defines.
pub trait PluginModule: Send + Sync {
    fn init(&self) -> Vec<HookRecord>;
}

pub use installer::{DependencyInstaller, InstallOutcome, PackageManager};
pub use loader::{DiscoveredPlugin, DiscoverySource, EntryPoint, PluginFactoryRegistry};
pub use manifest::Manifest;
pub use registry::{PluginRecord, PluginRegistry};
