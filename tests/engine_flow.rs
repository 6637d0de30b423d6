//! Library-level flow: open a device, filter, select, apply, restore.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use universal_adb_debloater::adb::fake::FakeExecutor;
use universal_adb_debloater::core::config::Config;
use universal_adb_debloater::executor::{ActionRequest, CancelToken, Operation};
use universal_adb_debloater::session::{Engine, SessionEvent};

const LISTING: &str = "package:/system/priv-app/Bixby/Bixby.apk=com.samsung.android.bixby.agent\n\
    package:/system/app/AppManager/AppManager.apk=com.facebook.appmanager\n\
    package:/product/app/Chrome/Chrome.apk=com.android.chrome\n\
    package:/data/app/~~x==/com.spotify.music-1/base.apk=com.spotify.music\n";

const PACK: &str = r#"{"packages":[
  {"pkg":"com.samsung.android.bixby.agent","recommendedAction":"disable","risk":"medium","reason":"Voice assistant"},
  {"pkg":"com.facebook.appmanager","recommendedAction":"Uninstall","risk":"High","reason":"Facebook stub"},
  {"pkg":"com.android.chrome","recommendedAction":"keep","risk":"low"}
]}"#;

struct Harness {
    dir: tempfile::TempDir,
    fake: Arc<FakeExecutor>,
    engine: Engine,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let packs = dir.path().join("packs");
    std::fs::create_dir_all(&packs).expect("packs");
    std::fs::write(packs.join("samsung-20251113.json"), PACK).expect("pack");

    let mut config = Config::default();
    config.knowledge_base.dir = packs;
    config.restore.dir = dir.path().join("restore");
    config.filter.debounce_ms = 30;

    let fake = Arc::new(FakeExecutor::new());
    fake.respond(&["devices", "-l"], 0, "List of devices attached\nS1 device usb:1\n")
        .respond(&["-s", "S1", "shell", "getprop", "ro.product.manufacturer"], 0, "Samsung\n")
        .respond(&["-s", "S1", "shell", "getprop", "ro.product.model"], 0, "SM-G991B\n")
        .respond(&["-s", "S1", "shell", "getprop", "ro.build.version.release"], 0, "14\n")
        .respond(&["-s", "S1", "shell", "pm", "list", "packages", "-f"], 0, LISTING)
        .respond(
            &["-s", "S1", "shell", "pm", "disable-user", "--user", "0", "com.facebook.appmanager"],
            0,
            "Failure [not installed for 0]",
        )
        .respond_by_default(0, "Package new state: disabled-user");

    let engine = Engine::with_executor(&config, fake.clone());
    Harness { dir, fake, engine }
}

#[test]
fn open_filter_select_apply_round() {
    let h = harness();
    assert_eq!(h.engine.list_devices().expect("devices"), vec!["S1"]);

    let mut session = h.engine.open_device("S1").expect("open");
    assert_eq!(session.identity().display_name(), "Samsung SM-G991B (S1)");
    assert_eq!(session.records().len(), 4);
    assert_eq!(session.knowledge_base().len(), 3);

    assert_eq!(session.set_filter("samsung"), 1);
    session.select_all(true);
    session.set_filter("");
    session.select("com.facebook.appmanager", true);
    assert_eq!(session.high_risk_selected(), 1);

    let targets = session.selected_identifiers();
    assert_eq!(
        targets,
        vec!["com.samsung.android.bixby.agent", "com.facebook.appmanager"]
    );

    let report = h.engine.apply(
        &ActionRequest::new(Operation::Disable, "S1", targets),
        &CancelToken::new(),
    );
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.all_succeeded());

    let summary = h.engine.history().summary();
    assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 1, 1));
    let exported = h.engine.history().export_to_text();
    assert!(exported.contains("✓ DISABLE   - com.samsung.android.bixby.agent"));
    assert!(exported.contains("✗ DISABLE   - com.facebook.appmanager"));
}

#[test]
fn knowledge_base_is_read_once_across_sessions() {
    let h = harness();
    h.engine.open_device("S1").expect("first open");
    h.engine.open_device("S1").expect("second open");
    assert_eq!(h.engine.store().file_reads(), 1);
    assert_eq!(h.engine.store().cached_keys(), vec!["samsung".to_string()]);
}

#[test]
fn cancelled_batch_skips_remaining_targets() {
    let h = harness();
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = h
        .engine
        .spawn_apply(
            ActionRequest::new(
                Operation::Uninstall,
                "S1",
                vec!["com.a".to_string(), "com.b".to_string()],
            ),
            cancel,
        )
        .expect("spawn")
        .wait()
        .expect("batch");

    assert!(report.was_cancelled());
    assert_eq!(report.cancelled(), 2);
    assert!(h.engine.history().is_empty());
    assert!(
        !h.fake
            .calls()
            .iter()
            .any(|call| call.iter().any(|arg| arg == "uninstall"))
    );
}

#[test]
fn debounced_filter_applies_only_the_last_query() {
    let h = harness();
    let session = Arc::new(Mutex::new(h.engine.open_device("S1").expect("open")));
    let events = h.engine.events().subscribe();
    let debouncer = h.engine.filter_debouncer();
    assert_eq!(debouncer.delay(), Duration::from_millis(30));

    let handles: Vec<_> = ["c", "ch", "chrome"]
        .into_iter()
        .map(|query| {
            let session = Arc::clone(&session);
            debouncer
                .submit(move || {
                    session.lock().set_filter(query);
                })
                .expect("submit")
        })
        .collect();
    for handle in handles {
        handle.wait().expect("debounce");
    }

    assert_eq!(session.lock().filter(), "chrome");
    let applied: Vec<_> = events
        .try_iter()
        .filter_map(|event| match event {
            SessionEvent::FilterApplied { query, visible, .. } => Some((query, visible)),
            _ => None,
        })
        .collect();
    assert_eq!(applied, vec![("chrome".to_string(), 1)]);
}

#[test]
fn restore_scripts_land_under_configured_dir() {
    let h = harness();
    let dir = h
        .engine
        .spawn_restore_scripts("S1", vec!["com.facebook.appmanager".to_string()])
        .expect("spawn")
        .wait()
        .expect("scripts");
    assert!(dir.starts_with(h.dir.path().join("restore")));
    let script = std::fs::read_to_string(dir.join("restore.sh")).expect("sh");
    assert!(script.contains("adb -s S1 shell pm enable com.facebook.appmanager"));
}
