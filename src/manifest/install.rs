// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::crawler::chunk::default_chunk_load_regex;
use crate::engine::{ChunkLoader, Engine};
use crate::lazy::{Deferred, Filter, LazyError};
use crate::manifest::{ExtensionManifest, ExtensionSpec, LookupSpec, ManifestError};
use crate::output::BadStart;
use crate::patch::PatchDescriptor;
use crate::pattern::fragment::parse_all;
use crate::pattern::{cache, CodeFragment, Regex};
use crate::registry::ExportValue;
use log::{error, info};

enum Plan {
    Filter(Filter),
    ModuleFactory(Vec<CodeFragment>),
    Chunks { code: Vec<CodeFragment>, matcher: Regex },
}

pub struct InstalledExtension {
    pub name: String,
    pub patches: Vec<usize>,
    pub lookups: Vec<Deferred<ExportValue>>,
    pub loaders: Vec<ChunkLoader>,
}

#[derive(Default)]
pub struct InstallSummary {
    pub installed: Vec<InstalledExtension>,
    pub failed: Vec<BadStart>,
}

fn plan_lookup(lookup: &LookupSpec) -> Result<Plan, ManifestError> {
    let plan = match lookup {
        LookupSpec::ByProps(props) => Plan::Filter(Filter::by_props(props.clone())?),
        LookupSpec::ByCode(code) => Plan::Filter(Filter::by_code(parse_all(code)?)?),
        LookupSpec::ByStoreName(name) => Plan::Filter(Filter::by_store_name(name.clone())?),
        LookupSpec::ByFactoryCode(code) => Plan::Filter(Filter::by_factory_code(parse_all(code)?)?),
        LookupSpec::ComponentByCode(code) => Plan::Filter(Filter::component_by_code(parse_all(code)?)?),
        LookupSpec::ModuleFactory(code) => {
            let code = parse_all(code)?;
            if code.is_empty() {
                return Err(LazyError::MalformedCriteria("module factory lookup needs code".to_string()).into());
            }
            Plan::ModuleFactory(code)
        }
        LookupSpec::ExtractAndLoadChunks { code, matcher } => {
            let code = parse_all(code)?;
            if code.is_empty() {
                return Err(LazyError::MalformedCriteria("extractAndLoadChunks needs code".to_string()).into());
            }
            let matcher = match matcher {
                Some(source) => cache::compile(source)?,
                None => default_chunk_load_regex()?,
            };
            Plan::Chunks { code, matcher }
        }
    };
    Ok(plan)
}

/// Everything an extension would register, built without touching the
/// engine so a bad entry leaves no trace.
fn prepare(ext: &ExtensionSpec, config: &Config) -> Result<(Vec<PatchDescriptor>, Vec<Plan>), ManifestError> {
    let descriptors = ext
        .patches
        .iter()
        .map(|spec| {
            PatchDescriptor::from_spec(&ext.name, spec, config).map(|d| d.with_bootstrap(ext.bootstrap))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let plans = ext.lookups.iter().map(plan_lookup).collect::<Result<Vec<_>, _>>()?;
    Ok((descriptors, plans))
}

/// Registers each extension's patches and lookups. An extension either
/// installs completely or not at all; failures come back as bad starts.
pub fn install(engine: &Engine, manifest: &ExtensionManifest) -> InstallSummary {
    let mut summary = InstallSummary::default();

    for ext in &manifest.extensions {
        let (descriptors, plans) = match prepare(ext, engine.config()) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(target: "patcher", "Extension {} failed to start: {}", ext.name, e);
                summary.failed.push(BadStart {
                    plugin: ext.name.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut installed = InstalledExtension {
            name: ext.name.clone(),
            patches: descriptors.into_iter().map(|d| engine.register_patch(d)).collect(),
            lookups: Vec::new(),
            loaders: Vec::new(),
        };

        for plan in plans {
            match plan {
                Plan::Filter(filter) => installed.lookups.push(engine.lazy().lookup(filter)),
                Plan::ModuleFactory(code) => {
                    engine.find_module_factory(&code);
                }
                Plan::Chunks { code, matcher } => {
                    installed.loaders.push(engine.extract_and_load_chunks_lazy(code, matcher));
                }
            }
        }

        info!(
            target: "patcher",
            "Started {} ({} patches, {} lookups)",
            installed.name,
            installed.patches.len(),
            installed.lookups.len() + installed.loaders.len()
        );
        summary.installed.push(installed);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Snapshot, SnapshotHost};
    use std::rc::Rc;

    fn engine() -> Engine {
        Engine::new(Config::default(), Rc::new(SnapshotHost::new(Snapshot::new())))
    }

    #[test]
    fn test_bad_extension_leaves_no_trace() {
        let manifest = ExtensionManifest::parse(
            r#"{"extensions": [
                {"name": "Good", "patches": [{"find": "A", "replacement": [{"match": "a", "replace": "b"}]}],
                 "lookups": [{"by_props": ["x"]}]},
                {"name": "Broken", "patches": [{"find": "B", "replacement": [{"match": "b", "replace": "c"}]}],
                 "lookups": [{"by_props": []}]}
            ]}"#,
        )
        .unwrap();
        let engine = engine();
        let summary = install(&engine, &manifest);

        assert_eq!(summary.installed.len(), 1);
        assert_eq!(summary.failed[0].plugin, "Broken");
        assert_eq!(engine.patches().len(), 1);
        assert_eq!(engine.lazy().history().len(), 1);
    }

    #[test]
    fn test_invalid_regex_is_a_bad_start() {
        let manifest = ExtensionManifest::parse(
            r#"{"extensions": [{"name": "Regex", "patches": [{"find": "A", "replacement": [{"match": "(", "replace": ""}]}]}]}"#,
        )
        .unwrap();
        let summary = install(&engine(), &manifest);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.installed.is_empty());
    }

    #[test]
    fn test_look_behind_rule_installs() {
        let manifest = ExtensionManifest::parse(
            r#"{"extensions": [{"name": "Lookaround", "patches": [{"find": "A",
                "replacement": [{"match": "(?<=A;)b(?!c)", "replace": "B"}]}]}]}"#,
        )
        .unwrap();
        let summary = install(&engine(), &manifest);
        assert!(summary.failed.is_empty());
        assert_eq!(summary.installed.len(), 1);
    }

    #[test]
    fn test_bootstrap_flag_reaches_descriptors() {
        let manifest = ExtensionManifest::parse(
            r#"{"extensions": [{"name": "Core", "bootstrap": true,
                "patches": [{"find": "A", "replacement": [{"match": "a", "replace": "b"}]}],
                "lookups": [{"extract_and_load_chunks": {"code": ["A"]}}, {"module_factory": ["A"]}]}]}"#,
        )
        .unwrap();
        let engine = engine();
        let summary = install(&engine, &manifest);
        assert_eq!(engine.patches().pending_bootstrap(), vec!["Core".to_string()]);
        assert_eq!(summary.installed[0].loaders.len(), 1);
        assert_eq!(engine.lazy().history().len(), 2);
    }
}
