use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use roster_core::{
    settings::{RemoteSettings, StoreSettings},
    ExternalId, IdentityKind, Settings,
};
use roster_daemon::{run_until, Reconciler};
use roster_sync::BatchReport;

fn settings(inbox: PathBuf) -> Settings {
    let mut settings = Settings::new(
        RemoteSettings::new("http://localhost/"),
        StoreSettings {
            students: PathBuf::from("students.json"),
            staff: PathBuf::from("staff.json"),
        },
        PathBuf::from("archive.json"),
    );
    settings.daemon.inbox = Some(inbox);
    settings.daemon.idle_interval_ms = 20;
    settings.daemon.backoff_secs = 1;
    settings
}

fn message(ids: &[&str]) -> String {
    let body: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({ "ADObjectID": id, "samaccountname": id }))
        .collect();
    serde_json::json!({ "message_type": "updatemessagetype", "body": body }).to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbox_messages_are_reconciled_by_kind_then_consumed() {
    let tmp = TempDir::new().unwrap();
    let inbox = tmp.path().join("inbox");
    fs::create_dir_all(inbox.join("students")).unwrap();
    fs::create_dir_all(inbox.join("staff")).unwrap();
    fs::write(inbox.join("students").join("001.json"), message(&["s1", "s2"])).unwrap();
    fs::write(inbox.join("staff").join("001.json"), message(&["t1"])).unwrap();

    let seen: Arc<Mutex<Vec<(IdentityKind, ExternalId)>>> = Arc::default();
    let reconciler: Reconciler = {
        let seen = seen.clone();
        Arc::new(move |kind: IdentityKind, id: &ExternalId| {
            seen.lock().unwrap().push((kind, id.clone()));
            Ok(BatchReport {
                processed: 1,
                ..Default::default()
            })
        })
    };

    let (shutdown_tx, _) = broadcast::channel(4);
    let daemon = tokio::spawn(run_until(
        Arc::new(settings(inbox.clone())),
        reconciler,
        shutdown_tx.clone(),
    ));

    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while seen.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "daemon did not process the inbox in time");

    // A message dropped in while the daemon idles is picked up too.
    fs::write(inbox.join("staff").join("002.json"), message(&["t2"])).unwrap();
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        while seen.lock().unwrap().len() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "daemon missed a late message");

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), daemon)
        .await
        .expect("daemon shut down")
        .unwrap();
    tokio_test::assert_ok!(result);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (IdentityKind::Student, ExternalId::from("s1")),
            (IdentityKind::Student, ExternalId::from("s2")),
            (IdentityKind::Teacher, ExternalId::from("t1")),
            (IdentityKind::Teacher, ExternalId::from("t2")),
        ]
    );
    assert!(!inbox.join("students").join("001.json").exists());
    assert!(!inbox.join("staff").join("002.json").exists());
}
