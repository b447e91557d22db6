//! Method providers.
//!
//! A provider is the plug-in boundary of the registry: it declares a set of
//! method definitions which the registry scans and registers. Providers can
//! be disabled by name through `ORCH_DISABLE_PLUGINS` (comma-separated) or a
//! `.pipeline_disable_plugins` file in the project directory.
use std::collections::HashSet;
use std::path::Path;

use crate::registry::MethodDef;

/// Environment variable listing disabled providers, comma-separated
pub const DISABLE_PLUGINS_ENV: &str = "ORCH_DISABLE_PLUGINS";

/// File listing disabled providers, one per line
pub const DISABLE_PLUGINS_FILE: &str = ".pipeline_disable_plugins";

/// A domain plug-in contributing method implementations
pub trait MethodProvider: Send + Sync {
    /// The unique provider name, matched against the disable list
    fn name(&self) -> &str;

    /// The method definitions this provider contributes
    fn methods(&self) -> Vec<MethodDef>;
}

/// Collect the disabled-provider set from the environment and, when present,
/// the disable file in `project_dir`.
pub fn load_disabled(project_dir: &Path) -> HashSet<String> {
    let mut disabled = HashSet::new();

    if let Ok(value) = std::env::var(DISABLE_PLUGINS_ENV) {
        for name in value.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                disabled.insert(name.to_string());
            }
        }
    }

    let file = project_dir.join(DISABLE_PLUGINS_FILE);
    if let Ok(contents) = std::fs::read_to_string(&file) {
        for line in contents.lines() {
            let name = line.trim();
            if !name.is_empty() && !name.starts_with('#') {
                disabled.insert(name.to_string());
            }
        }
    }

    disabled
}
