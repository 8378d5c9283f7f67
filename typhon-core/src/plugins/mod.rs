//! Plugin registry and lifecycle event dispatch.
//!
//! Projects declare plugins in `typhon.plugins.json`; identifiers are
//! resolved against a host-provided factory registry, so the host never
//! evaluates arbitrary code paths. Plugins observe the pipeline through
//! named lifecycle events and answer each with an explicit outcome; a
//! single `Cancel` stops the pipeline step that published the event.

use crate::error::{Result, TyphonError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the per-project plugin declaration.
pub const PLUGIN_MANIFEST: &str = "typhon.plugins.json";

/// A pipeline lifecycle event delivered to every registered plugin.
#[derive(Debug, Clone)]
pub enum Event {
    /// Published before packaging; cancellable.
    Build { project: String, version: String, archive: PathBuf },
    /// Published before running an archive; cancellable.
    Run { file: PathBuf, performance: bool },
    /// Synthetic event used by plugin-authoring workflows.
    Test,
}

impl Event {
    /// The event name plugins dispatch on.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Build { .. } => "build",
            Event::Run { .. } => "run",
            Event::Test => "test",
        }
    }
}

/// Handler verdict for an event.
///
/// Cancellation is an explicit return value, aggregated by the dispatcher;
/// there is no shared mutable flag between handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOutcome {
    #[default]
    Continue,
    Cancel,
}

/// Capability interface every plugin implements.
///
/// Handlers must not assume any invocation order across plugins.
pub trait Plugin: Send {
    /// Plugin name; registry key.
    fn name(&self) -> &str;

    /// Plugin version.
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Called once at registration, before any event is delivered.
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle a lifecycle event.
    fn on_event(&mut self, event: &Event) -> Result<EventOutcome>;
}

/// Constructor for a declaratively referenced plugin.
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// Host-side map from plugin identifier to constructor.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under an identifier.
    pub fn register(&mut self, id: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(id.into(), factory);
    }

    /// Construct the plugin registered under `id`.
    pub fn construct(&self, id: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(id).map(|factory| factory())
    }
}

/// Result of testing a single plugin without crashing the host.
#[derive(Debug)]
pub struct PluginTestReport {
    pub plugin: String,
    pub passed: bool,
    pub error: Option<String>,
}

/// Read the plugin identifiers a project declares.
///
/// Absence of the declaration file is not an error; it yields an empty
/// list.
pub fn declared_plugins(project_dir: &Path) -> Result<Vec<String>> {
    let path = project_dir.join(PLUGIN_MANIFEST);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| TyphonError::io(&path, e))?;
    serde_json::from_str(&content).map_err(|e| TyphonError::InvalidConfig {
        reason: format!("Failed to parse {}: {}", path.display(), e),
    })
}

/// In-memory plugin registry keyed by plugin name; owns event dispatch.
#[derive(Default)]
pub struct PluginManager {
    plugins: BTreeMap<String, Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every plugin the project declares.
    ///
    /// Each identifier is resolved through the factory registry and the
    /// plugin's `load` hook runs before it joins the registry. A missing
    /// declaration file is a no-op.
    pub fn register_plugins(
        &mut self,
        project_dir: &Path,
        registry: &PluginRegistry,
    ) -> Result<usize> {
        for id in declared_plugins(project_dir)? {
            let plugin = registry.construct(&id).ok_or_else(|| TyphonError::PluginFailed {
                plugin: id.clone(),
                reason: "Unknown plugin identifier".to_string(),
            })?;
            self.register_instance(plugin)?;
        }
        Ok(self.plugins.len())
    }

    /// Register a pre-built plugin instance.
    pub fn register_instance(&mut self, mut plugin: Box<dyn Plugin>) -> Result<()> {
        plugin.load().map_err(|e| TyphonError::PluginFailed {
            plugin: plugin.name().to_string(),
            reason: e.to_string(),
        })?;

        let name = plugin.name().to_string();
        debug!(plugin = %name, version = plugin.version(), "plugin loaded");
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Dispatch an event to every registered plugin.
    ///
    /// Returns `true` as soon as any plugin answers `Cancel`; `false`
    /// otherwise (always `false` with zero plugins). A handler error
    /// propagates and aborts the pipeline.
    pub fn process_event(&mut self, event: &Event) -> Result<bool> {
        for (name, plugin) in self.plugins.iter_mut() {
            let outcome = plugin.on_event(event).map_err(|e| TyphonError::PluginFailed {
                plugin: name.clone(),
                reason: e.to_string(),
            })?;

            if outcome == EventOutcome::Cancel {
                info!(plugin = %name, event = event.name(), "event cancelled");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Load a plugin and dispatch a synthetic `test` event to it, capturing
    /// any error instead of propagating it.
    pub fn test_plugin(plugin: &mut dyn Plugin) -> PluginTestReport {
        let name = plugin.name().to_string();

        if let Err(e) = plugin.load() {
            return PluginTestReport { plugin: name, passed: false, error: Some(e.to_string()) };
        }

        match plugin.on_event(&Event::Test) {
            Ok(_) => PluginTestReport { plugin: name, passed: true, error: None },
            Err(e) => PluginTestReport { plugin: name, passed: false, error: Some(e.to_string()) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPlugin {
        name: String,
        outcome: EventOutcome,
        fail_load: bool,
        fail_events: bool,
        seen: Vec<String>,
    }

    impl RecordingPlugin {
        fn boxed(name: &str, outcome: EventOutcome) -> Box<dyn Plugin> {
            Box::new(Self {
                name: name.to_string(),
                outcome,
                fail_load: false,
                fail_events: false,
                seen: Vec::new(),
            })
        }
    }

    impl Plugin for RecordingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn load(&mut self) -> Result<()> {
            if self.fail_load {
                return Err(TyphonError::InvalidConfig { reason: "load failed".to_string() });
            }
            Ok(())
        }

        fn on_event(&mut self, event: &Event) -> Result<EventOutcome> {
            if self.fail_events {
                return Err(TyphonError::InvalidConfig { reason: "handler failed".to_string() });
            }
            self.seen.push(event.name().to_string());
            Ok(self.outcome)
        }
    }

    fn run_event(project: &str) -> Event {
        Event::Run { file: PathBuf::from(project), performance: false }
    }

    #[test]
    fn test_process_event_with_no_plugins_never_cancels() {
        let mut manager = PluginManager::new();
        assert!(!manager.process_event(&run_event("demo.typh")).unwrap());
    }

    #[test]
    fn test_process_event_aggregates_cancellation() {
        let mut manager = PluginManager::new();
        manager.register_instance(RecordingPlugin::boxed("a", EventOutcome::Continue)).unwrap();
        manager.register_instance(RecordingPlugin::boxed("b", EventOutcome::Cancel)).unwrap();

        assert!(manager.process_event(&run_event("demo.typh")).unwrap());
    }

    #[test]
    fn test_process_event_continues_without_cancel() {
        let mut manager = PluginManager::new();
        manager.register_instance(RecordingPlugin::boxed("a", EventOutcome::Continue)).unwrap();
        manager.register_instance(RecordingPlugin::boxed("b", EventOutcome::Continue)).unwrap();

        assert!(!manager.process_event(&run_event("demo.typh")).unwrap());
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut manager = PluginManager::new();
        manager
            .register_instance(Box::new(RecordingPlugin {
                name: "broken".to_string(),
                outcome: EventOutcome::Continue,
                fail_load: false,
                fail_events: true,
                seen: Vec::new(),
            }))
            .unwrap();

        let result = manager.process_event(&run_event("demo.typh"));
        assert!(matches!(result, Err(TyphonError::PluginFailed { .. })));
    }

    #[test]
    fn test_register_instance_surfaces_load_failure() {
        let mut manager = PluginManager::new();
        let result = manager.register_instance(Box::new(RecordingPlugin {
            name: "broken".to_string(),
            outcome: EventOutcome::Continue,
            fail_load: true,
            fail_events: false,
            seen: Vec::new(),
        }));

        assert!(matches!(result, Err(TyphonError::PluginFailed { .. })));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_test_plugin_captures_errors() {
        let mut broken = RecordingPlugin {
            name: "broken".to_string(),
            outcome: EventOutcome::Continue,
            fail_load: false,
            fail_events: true,
            seen: Vec::new(),
        };

        let report = PluginManager::test_plugin(&mut broken);
        assert_eq!(report.plugin, "broken");
        assert!(!report.passed);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_test_plugin_passes_healthy_plugin() {
        let mut healthy = RecordingPlugin {
            name: "healthy".to_string(),
            outcome: EventOutcome::Continue,
            fail_load: false,
            fail_events: false,
            seen: Vec::new(),
        };

        let report = PluginManager::test_plugin(&mut healthy);
        assert!(report.passed);
        assert!(report.error.is_none());
        assert_eq!(healthy.seen, vec!["test"]);
    }

    #[test]
    fn test_register_plugins_without_declaration_is_noop() {
        let dir = std::env::temp_dir().join(format!("typhon-plugins-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let mut manager = PluginManager::new();
        let count = manager.register_plugins(&dir, &PluginRegistry::new()).unwrap();
        assert_eq!(count, 0);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_register_plugins_resolves_factories() {
        let dir = std::env::temp_dir().join(format!("typhon-plugins-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PLUGIN_MANIFEST), r#"["recorder"]"#).unwrap();

        let mut registry = PluginRegistry::new();
        registry.register("recorder", || RecordingPlugin::boxed("recorder", EventOutcome::Continue));

        let mut manager = PluginManager::new();
        let count = manager.register_plugins(&dir, &registry).unwrap();
        assert_eq!(count, 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_register_plugins_rejects_unknown_identifier() {
        let dir = std::env::temp_dir().join(format!("typhon-plugins-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PLUGIN_MANIFEST), r#"["missing"]"#).unwrap();

        let mut manager = PluginManager::new();
        let result = manager.register_plugins(&dir, &PluginRegistry::new());
        assert!(matches!(result, Err(TyphonError::PluginFailed { .. })));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            Event::Build {
                project: "demo".to_string(),
                version: "0.0.1".to_string(),
                archive: PathBuf::from("target/demo.typh"),
            }
            .name(),
            "build"
        );
        assert_eq!(run_event("demo.typh").name(), "run");
        assert_eq!(Event::Test.name(), "test");
    }
}
