//! Composition root wiring discovery, scanning, recommendations, batches,
//! history and restore scripts to one command layer and one event bus.
//!
//! Every blocking operation has a `spawn_*` twin returning a [`TaskHandle`] so
//! interactive callers never wait on a device command.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::debounce::Debouncer;
use super::device::DeviceSession;
use super::events::{EventBus, SessionEvent};
use crate::adb::{AdbRunner, CommandExecutor, DeviceDiscovery, DeviceIdentity, DeviceProfiler};
use crate::core::config::Config;
use crate::core::errors::{Result, UadError};
use crate::executor::{
    ActionExecutor, ActionRequest, BatchEvent, BatchReport, CancelToken, TaskHandle, spawn_task,
};
use crate::logger::ActionHistory;
use crate::recommend::{KnowledgeBase, RecommendationStore};
use crate::scanner::{PackageScanner, classify};
use crate::scripts::RestoreScriptGenerator;

/// Shared engine handle. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Engine {
    discovery: DeviceDiscovery,
    profiler: DeviceProfiler,
    scanner: PackageScanner,
    store: Arc<RecommendationStore>,
    kb_suffix: String,
    actions: ActionExecutor,
    restore: RestoreScriptGenerator,
    bus: Arc<EventBus>,
    filter_delay: Duration,
}

impl Engine {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        store: Arc<RecommendationStore>,
        kb_suffix: impl Into<String>,
        restore_dir: impl Into<PathBuf>,
    ) -> Self {
        let history = Arc::new(ActionHistory::new());
        Self {
            discovery: DeviceDiscovery::new(Arc::clone(&executor)),
            profiler: DeviceProfiler::new(Arc::clone(&executor)),
            scanner: PackageScanner::new(Arc::clone(&executor)),
            store,
            kb_suffix: kb_suffix.into(),
            actions: ActionExecutor::new(executor, history),
            restore: RestoreScriptGenerator::new(restore_dir),
            bus: Arc::new(EventBus::new()),
            filter_delay: Duration::from_millis(160),
        }
    }

    /// Engine driving a local `adb` as configured.
    pub fn from_config(config: &Config) -> Self {
        Self::with_executor(config, Arc::new(AdbRunner::new(config.resolved_adb_path())))
    }

    /// Engine honoring `config` but running commands through `executor`.
    pub fn with_executor(config: &Config, executor: Arc<dyn CommandExecutor>) -> Self {
        debug!(
            source = %config.knowledge_base.source,
            dir = %config.knowledge_base.dir.display(),
            "knowledge base source"
        );
        let mut engine = Self::new(
            executor,
            Arc::new(RecommendationStore::new(config.knowledge_base.dir.clone())),
            config.knowledge_base.suffix.clone(),
            config.restore_dir(),
        );
        engine.filter_delay = Duration::from_millis(config.filter.debounce_ms);
        engine
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn history(&self) -> &Arc<ActionHistory> {
        self.actions.history()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<RecommendationStore> {
        &self.store
    }

    #[must_use]
    pub fn restore_dir(&self) -> &std::path::Path {
        self.restore.base_dir()
    }

    /// Debouncer for filter queries, using the configured delay.
    #[must_use]
    pub fn filter_debouncer(&self) -> Debouncer {
        Debouncer::new(self.filter_delay)
    }

    pub fn list_devices(&self) -> Result<Vec<String>> {
        self.discovery.list_devices()
    }

    pub fn profile(&self, serial: &str) -> Result<DeviceIdentity> {
        self.profiler.profile(serial)
    }

    /// Knowledge base for a manufacturer through the shared cache.
    pub fn knowledge_base_for(&self, manufacturer: &str) -> Arc<KnowledgeBase> {
        self.store.load_for_manufacturer(manufacturer, &self.kb_suffix)
    }

    /// Profile `serial`, then load its knowledge base while scanning packages,
    /// and merge the two into a fresh session.
    ///
    /// An empty package list is still a session; callers decide how to report
    /// it.
    pub fn open_device(&self, serial: &str) -> Result<DeviceSession> {
        let identity = self.profiler.profile(serial)?;
        self.bus.emit(SessionEvent::DeviceChanged {
            identity: identity.clone(),
        });

        let (knowledge_base, scanned) = thread::scope(|scope| {
            let kb = scope.spawn(|| self.knowledge_base_for(&identity.manufacturer));
            let scanned = self.scanner.scan(serial);
            let kb = kb.join().map_err(|_| UadError::Runtime {
                details: "knowledge base loader panicked".to_string(),
            });
            (kb, scanned)
        });
        let knowledge_base = knowledge_base?;
        let records = classify(&scanned?, &knowledge_base);

        let classified = records
            .iter()
            .filter(|r| r.recommended_action.is_some())
            .count();
        info!(
            serial,
            packages = records.len(),
            classified,
            knowledge_base = knowledge_base.len(),
            "device opened"
        );
        self.bus.emit(SessionEvent::ScanReplaced {
            serial: serial.to_string(),
            total: records.len(),
            classified,
        });
        Ok(DeviceSession::new(identity, knowledge_base, records).with_events(Arc::clone(&self.bus)))
    }

    /// Run a batch, mirroring its progress onto the event bus.
    pub fn apply(&self, request: &ActionRequest, cancel: &CancelToken) -> BatchReport {
        self.bus.emit(SessionEvent::BatchStarted {
            operation: request.operation.clone(),
            device: request.device.clone(),
            total: request.targets.len(),
        });
        let bus = Arc::clone(&self.bus);
        let report = self
            .actions
            .apply_with(request, cancel, &mut |event| match event {
                BatchEvent::Progress {
                    index,
                    total,
                    identifier,
                } => bus.emit(SessionEvent::BatchProgress {
                    index,
                    total,
                    identifier,
                }),
                BatchEvent::Outcome {
                    index,
                    outcome,
                    history,
                } => {
                    if let Some(entry) = history {
                        bus.emit(SessionEvent::HistoryAppended { entry });
                    }
                    bus.emit(SessionEvent::OutcomeProduced { index, outcome });
                }
            });
        self.bus.emit(SessionEvent::BatchFinished {
            operation: report.operation.clone(),
            device: report.device.clone(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            cancelled: report.cancelled(),
        });
        report
    }

    pub fn generate_restore_scripts(&self, serial: &str, packages: &[String]) -> Result<PathBuf> {
        self.restore.generate(serial, packages)
    }

    pub fn clear_history(&self) {
        self.history().clear();
        self.bus.emit(SessionEvent::HistoryCleared);
    }

    pub fn spawn_list_devices(&self) -> Result<TaskHandle<Vec<String>>> {
        let engine = self.clone();
        spawn_task("list-devices", CancelToken::new(), move |_| {
            engine.list_devices()
        })
    }

    pub fn spawn_open_device(&self, serial: &str) -> Result<TaskHandle<DeviceSession>> {
        let engine = self.clone();
        let serial = serial.to_string();
        spawn_task("open-device", CancelToken::new(), move |_| {
            engine.open_device(&serial)
        })
    }

    /// Run a batch on a worker. `cancel` (or the handle) stops it between
    /// targets.
    pub fn spawn_apply(
        &self,
        request: ActionRequest,
        cancel: CancelToken,
    ) -> Result<TaskHandle<BatchReport>> {
        let engine = self.clone();
        spawn_task("apply", cancel, move |cancel| {
            Ok(engine.apply(&request, cancel))
        })
    }

    pub fn spawn_restore_scripts(
        &self,
        serial: &str,
        packages: Vec<String>,
    ) -> Result<TaskHandle<PathBuf>> {
        let engine = self.clone();
        let serial = serial.to_string();
        spawn_task("restore-scripts", CancelToken::new(), move |_| {
            engine.generate_restore_scripts(&serial, &packages)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::devices::{PROP_MANUFACTURER, PROP_MODEL, PROP_OS_VERSION};
    use crate::adb::fake::FakeExecutor;
    use crate::executor::Operation;

    const LISTING: &str = "package:/system/app/Bixby/Bixby.apk=com.samsung.android.bixby.agent\n\
        package:/data/app/x/base.apk=com.spotify.music\n";

    fn scripted_device(fake: &FakeExecutor) {
        fake.respond(&["-s", "S1", "shell", "getprop", PROP_MANUFACTURER], 0, "samsung\n")
            .respond(&["-s", "S1", "shell", "getprop", PROP_MODEL], 0, "SM-G991B\n")
            .respond(&["-s", "S1", "shell", "getprop", PROP_OS_VERSION], 0, "14\n")
            .respond(&["-s", "S1", "shell", "pm", "list", "packages", "-f"], 0, LISTING);
    }

    fn engine(fake: Arc<FakeExecutor>, packs: &std::path::Path, restore: &std::path::Path) -> Engine {
        Engine::new(
            fake,
            Arc::new(RecommendationStore::new(packs)),
            "-20251113.json",
            restore,
        )
    }

    #[test]
    fn open_device_merges_scan_and_knowledge_base() {
        let packs = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            packs.path().join("samsung-20251113.json"),
            r#"{"packages":[{"pkg":"com.samsung.android.bixby.agent","recommendedAction":"disable","risk":"medium","reason":"Assistant"}]}"#,
        )
        .expect("write pack");
        let fake = Arc::new(FakeExecutor::new());
        scripted_device(&fake);
        let engine = engine(fake, packs.path(), packs.path());
        let events = engine.events().subscribe();

        let session = engine.open_device("S1").expect("open");
        assert_eq!(session.identity().model, "SM-G991B");
        assert_eq!(session.records().len(), 2);
        assert!(session.records()[0].is_recommended());
        assert!(session.records()[1].recommended_action.is_none());

        assert!(matches!(events.try_recv(), Ok(SessionEvent::DeviceChanged { .. })));
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::ScanReplaced { total: 2, classified: 1, .. })
        ));
    }

    #[test]
    fn scan_failure_propagates_from_open_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = Arc::new(FakeExecutor::new());
        fake.respond_by_default(0, "");
        fake.respond(&["-s", "S1", "shell", "pm", "list", "packages", "-f"], 255, "error: closed");
        let err = engine(fake, dir.path(), dir.path())
            .open_device("S1")
            .expect_err("scan fails");
        assert_eq!(err.code(), "UAD-2002");
    }

    #[test]
    fn apply_mirrors_progress_on_the_bus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = Arc::new(FakeExecutor::new());
        fake.respond_by_default(0, "");
        let engine = engine(fake, dir.path(), dir.path());
        let events = engine.events().subscribe();

        let request = ActionRequest::new(
            Operation::Disable,
            "S1",
            vec!["com.a".to_string(), "com.b".to_string()],
        );
        let report = engine
            .spawn_apply(request, CancelToken::new())
            .expect("spawn")
            .wait()
            .expect("batch");
        assert_eq!(report.succeeded(), 2);

        let names: Vec<_> = events
            .try_iter()
            .map(|event| {
                serde_json::to_value(&event).expect("serialize")["event"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "batch_started",
                "batch_progress",
                "history_appended",
                "outcome_produced",
                "batch_progress",
                "history_appended",
                "outcome_produced",
                "batch_finished",
            ]
        );
        assert_eq!(engine.history().len(), 2);

        engine.clear_history();
        assert!(engine.history().is_empty());
        assert_eq!(events.try_recv().ok(), Some(SessionEvent::HistoryCleared));
    }
}
