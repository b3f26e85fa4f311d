//! Installed modules, loaded from JSON manifests

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::collab::ModuleRepository;
use crate::lsid::{compare_versions, Lsid};
use crate::param::spec::ModuleSpec;

/// Read-only snapshot of every `*.json` manifest in a directory
///
/// A versioned LSID matches exactly; an LSID without a version resolves to the latest version
/// of that module.
#[derive(Debug, Default)]
pub struct JsonModuleRepository {
    modules: HashMap<Lsid, Arc<ModuleSpec>>,
}

impl JsonModuleRepository {
    pub fn load(dir: &Path) -> Result<JsonModuleRepository> {
        let mut repository = JsonModuleRepository::default();
        let entries = fs::read_dir(dir).with_context(|| format!("Can't read module directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let json = fs::read_to_string(&path).with_context(|| format!("Can't read manifest {}", path.display()))?;
            let module: ModuleSpec =
                serde_json::from_str(&json).with_context(|| format!("Invalid manifest {}", path.display()))?;
            repository.insert(module);
        }
        info!("Loaded {} modules from {}", repository.modules.len(), dir.display());
        Ok(repository)
    }

    pub fn insert(&mut self, module: ModuleSpec) {
        if self.modules.contains_key(&module.lsid) {
            warn!("Duplicate module {}, keeping the last one loaded", module.lsid);
        }
        self.modules.insert(module.lsid.clone(), Arc::new(module));
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleRepository for JsonModuleRepository {
    fn get(&self, lsid: &Lsid) -> Option<Arc<ModuleSpec>> {
        if lsid.version.is_some() {
            return self.modules.get(lsid).cloned();
        }
        self.modules
            .values()
            .filter(|module| module.lsid.same_module(lsid))
            .max_by(|a, b| compare_versions(a.lsid.version.as_deref(), b.lsid.version.as_deref()))
            .cloned()
    }
}
