use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use pollmux::{CancellationToken, Config, Progress, Progresses, Session};
use tempfile::tempdir;
use tokio::time;

const TIMEOUT_2_SEC: Duration = Duration::from_millis(2000);

async fn wait_for(progress: &mut Progresses, expected: &Progress) {
    time::timeout(TIMEOUT_2_SEC, async {
        while let Some(notice) = progress.next_progress().await {
            if &notice == expected {
                return;
            }
        }
        panic!("session ended before {:?}", expected);
    })
    .await
    .expect("timed out waiting for progress");
}

#[tokio::test]
pub async fn test_deleted_file_is_forgotten_and_rediscovered() {
    let logdir = tempdir().unwrap();
    let root = logdir.path().canonicalize().unwrap();
    let logfile = root.join("foo.log");
    fs::write(&logfile, "foo\n").unwrap();

    let config = Config::new([&root]).with_delay(Duration::from_millis(20));
    let (session, mut batches, mut progress) = Session::new(config).unwrap();
    let registry = session.registry();
    let cancel = CancellationToken::new();
    let watch = tokio::spawn(session.watch(cancel.clone()));

    let batch = time::timeout(TIMEOUT_2_SEC, batches.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.source(), logfile.as_path());
    assert_eq!(batch.name(), "foo.log");
    assert_eq!(batch.lines(), &["foo".to_string()]);

    fs::remove_file(&logfile).unwrap();
    wait_for(&mut progress, &Progress::Removed(logfile.clone())).await;
    assert!(registry.get(&logfile).is_none());

    // Recreated files start over from their beginning.
    fs::write(&logfile, "bar\nbaz\n").unwrap();
    let batch = time::timeout(TIMEOUT_2_SEC, batches.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.lines(), &["bar".to_string(), "baz".to_string()]);

    cancel.cancel();
    assert!(watch.await.unwrap().is_ok());
}

#[tokio::test]
pub async fn test_truncated_file_is_read_from_start() {
    let logdir = tempdir().unwrap();
    let logfile = logdir.path().join("foo.log");
    fs::write(&logfile, "a fairly long first line\n").unwrap();

    let config = Config::new([logdir.path()]).with_delay(Duration::from_millis(20));
    let (session, mut batches, _progress) = Session::new(config).unwrap();
    let cancel = CancellationToken::new();
    let watch = tokio::spawn(session.watch(cancel.clone()));

    let batch = time::timeout(TIMEOUT_2_SEC, batches.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 1);

    fs::write(&logfile, "qux\n").unwrap();
    let batch = time::timeout(TIMEOUT_2_SEC, batches.next_batch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.lines(), &["qux".to_string()]);

    cancel.cancel();
    assert!(watch.await.unwrap().is_ok());
}

#[tokio::test]
pub async fn test_patterns_pair_with_roots() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let (a, b) = (
        dir_a.path().canonicalize().unwrap(),
        dir_b.path().canonicalize().unwrap(),
    );
    fs::write(a.join("x.log"), "from a log\n").unwrap();
    fs::write(a.join("x.txt"), "from a txt\n").unwrap();
    fs::write(b.join("y.txt"), "from b txt\n").unwrap();

    let config = Config::new([&a, &b])
        .with_patterns([r"\.log$"])
        .with_delay(Duration::from_millis(20));
    let (session, mut batches, _progress) = Session::new(config).unwrap();
    let registry = session.registry();
    let cancel = CancellationToken::new();
    let watch = tokio::spawn(session.watch(cancel.clone()));

    let mut seen = BTreeMap::<PathBuf, Vec<String>>::new();
    while seen.len() < 2 {
        let batch = time::timeout(TIMEOUT_2_SEC, batches.next_batch())
            .await
            .unwrap()
            .unwrap();
        let (source, lines) = batch.into_inner();
        seen.entry(source).or_default().extend(lines);
    }
    assert!(
        time::timeout(Duration::from_millis(200), batches.next_batch())
            .await
            .is_err()
    );

    assert_eq!(seen[&a.join("x.log")], vec!["from a log"]);
    assert_eq!(seen[&b.join("y.txt")], vec!["from b txt"]);
    assert_eq!(registry.len(), 2);
    assert!(registry.get(a.join("x.txt")).is_none());

    cancel.cancel();
    assert!(watch.await.unwrap().is_ok());
}
