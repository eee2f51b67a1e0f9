//! Integration tests for cohort duplicate detection.

use autocheck_core::duplicates::{DuplicateDetector, Signature};
use autocheck_core::RepositoryContent;
use std::sync::Arc;

fn submission(files: &[(&str, &str)]) -> RepositoryContent {
    RepositoryContent::from_files(files.iter().map(|(p, c)| (*p, *c)))
}

fn three_of_four_pair() -> (RepositoryContent, RepositoryContent) {
    let a = submission(&[
        ("README.md", "# Lab"),
        ("src/app.py", "print('app')"),
        ("src/util.py", "def util(): pass"),
        ("notes.txt", "alice's notes"),
    ]);
    let b = submission(&[
        ("README.md", "# Lab"),
        ("src/app.py", "print('app')"),
        ("src/util.py", "def util(): pass"),
        ("notes.txt", "bob's notes"),
    ]);
    (a, b)
}

/// Test: 3 of 4 identical files is 0.75, below the default threshold
#[test]
fn test_three_of_four_below_default_threshold() {
    let (a, b) = three_of_four_pair();
    let detector = DuplicateDetector::new(0.8);
    detector.register("alice", &a);
    detector.register("bob", &b);

    assert!(detector.report().is_empty());
}

/// Test: lowering the threshold to 0.75 yields exactly one match per direction
#[test]
fn test_three_of_four_at_lowered_threshold() {
    let (a, b) = three_of_four_pair();
    let detector = DuplicateDetector::new(0.75);
    detector.register("alice", &a);
    detector.register("bob", &b);

    let report = detector.report();
    let alice = &report["alice"];
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].suspect_id, "bob");
    assert_eq!(alice[0].similarity_score, 0.75);
    assert_eq!(alice[0].identical_files.len(), 3);
    assert_eq!(alice[0].common_files, 4);
    assert_eq!(report["bob"][0].similarity_score, 0.75);
}

/// Test: identical file sets are 1.0 in both directions
#[test]
fn test_identical_sets_are_symmetric() {
    let files = [("a.py", "1"), ("b.py", "2")];
    let detector = DuplicateDetector::default();
    detector.register("alice", &submission(&files));
    detector.register("bob", &submission(&files));

    let report = detector.report();
    assert_eq!(report["alice"][0].similarity_score, 1.0);
    assert_eq!(report["bob"][0].similarity_score, 1.0);
}

/// Test: registration order does not change the report
#[test]
fn test_report_is_order_independent() {
    let students = vec![
        ("alice", submission(&[("a.py", "1"), ("b.py", "2")])),
        ("bob", submission(&[("a.py", "1"), ("b.py", "2")])),
        ("carol", submission(&[("a.py", "1"), ("b.py", "3")])),
        ("dave", submission(&[("x.py", "9")])),
    ];

    let forward = DuplicateDetector::new(0.5);
    for (id, content) in &students {
        forward.register(id, content);
    }
    let backward = DuplicateDetector::new(0.5);
    for (id, content) in students.iter().rev() {
        backward.register(id, content);
    }

    assert_eq!(forward.report(), backward.report());
}

/// Test: ignored directories and binaries do not create matches
#[test]
fn test_ignored_paths_never_match() {
    let vendored = [
        ("node_modules/lib/index.js", "module.exports = 1"),
        (".git/HEAD", "ref: refs/heads/main"),
        ("logo.png", "not really a png"),
    ];
    let mut a_files = vendored.to_vec();
    a_files.push(("main.py", "print('alice')"));
    let mut b_files = vendored.to_vec();
    b_files.push(("main.py", "print('bob')"));

    let detector = DuplicateDetector::new(0.1);
    detector.register("alice", &submission(&a_files));
    detector.register("bob", &submission(&b_files));

    assert!(detector.report().is_empty());
}

/// Test: concurrent registration from many tasks loses nothing
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration() {
    let detector = Arc::new(DuplicateDetector::new(1.0));
    let mut handles = Vec::new();
    for i in 0..32 {
        let detector = Arc::clone(&detector);
        handles.push(tokio::spawn(async move {
            let shared = if i % 2 == 0 { "even" } else { "odd" };
            let content = submission(&[("main.py", shared)]);
            detector.register(&format!("student-{i}"), &content);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(detector.len(), 32);
    let report = detector.report();
    assert_eq!(report.len(), 32);
    assert!(report.values().all(|matches| matches.len() == 15));
}

/// Test: empty signatures never match each other
#[test]
fn test_empty_submissions_never_match() {
    let detector = DuplicateDetector::new(0.0);
    detector.register_signature("alice", Signature::default());
    detector.register_signature("bob", Signature::default());
    assert!(detector.report().is_empty());
}
