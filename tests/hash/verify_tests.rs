// Tests for the verification coordinator

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use passfail::config::EngineConfig;
use passfail::hash::{
    Algorithm, Coordinator, DictionarySource, DictionaryStatus, RunOutcome, VerificationRequest,
    VerifyError, VerifyEvent, VerifyOptions,
};
use tempfile::TempDir;

use super::{write_wordlist, Endless};

const MD5_PASSWORD: &str = "5f4dcc3b5aa765d61d8327deb882cf99";
const SHA1_EMPTY: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

fn fast_coordinator() -> Coordinator {
    Coordinator::new(EngineConfig {
        progress_interval: 10,
        ..EngineConfig::default()
    })
}

fn endless() -> DictionarySource {
    DictionarySource::stream("endless", Endless::new(b"not-it\n"))
}

#[test]
fn test_md5_password_is_found() {
    let dir = TempDir::new().unwrap();
    let list = write_wordlist(&dir, "common.txt", &["hello", "password", "world"]);

    let coordinator = Coordinator::default();
    let handle = coordinator
        .verify(MD5_PASSWORD, vec![DictionarySource::path(&list)], VerifyOptions::default())
        .unwrap();
    let report = handle.wait().unwrap();

    let result = report.outcome.matched().expect("expected a match");
    assert_eq!(result.plaintext, "password");
    assert_eq!(result.algorithm, Algorithm::Md5);
    assert_eq!(result.line_number, 2);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.algorithm, Algorithm::Md5);
    assert_eq!(report.dictionaries[0].status, DictionaryStatus::Matched);
}

#[test]
fn test_sha1_exhausts_without_match() {
    let dir = TempDir::new().unwrap();
    let list = write_wordlist(&dir, "abc.txt", &["a", "", "b", "c"]);

    let report = Coordinator::default()
        .verify(SHA1_EMPTY, vec![DictionarySource::path(&list)], VerifyOptions::default())
        .unwrap()
        .wait()
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Exhausted));
    assert_eq!(report.candidates_tested(), 3);
    assert_eq!(report.dictionaries[0].status, DictionaryStatus::Exhausted);
    let progress = report.dictionaries[0].progress.as_ref().unwrap();
    assert_eq!(progress.lines_processed, 4);
    assert_eq!(progress.total_lines, Some(4));
}

#[test]
fn test_validation_errors_are_synchronous() {
    let coordinator = Coordinator::default();

    let err = coordinator
        .verify(MD5_PASSWORD, Vec::new(), VerifyOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, VerifyError::NoDictionariesProvided));

    let err = coordinator
        .verify("xyz", vec![endless()], VerifyOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, VerifyError::InvalidDigest { .. }));

    let options = VerifyOptions {
        algorithm: Some(Algorithm::Sha256),
        ..VerifyOptions::default()
    };
    let err = coordinator
        .verify(MD5_PASSWORD, vec![endless()], options)
        .err()
        .unwrap();
    assert!(matches!(err, VerifyError::AlgorithmMismatch { .. }));

    // Nothing was started
    assert!(!coordinator.is_running());
}

#[test]
fn test_first_match_cancels_other_workers() {
    let sources = vec![
        endless(),
        DictionarySource::stream("small", Cursor::new(b"hello\npassword\n".to_vec())),
    ];

    let report = fast_coordinator()
        .verify(MD5_PASSWORD, sources, VerifyOptions::default())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome.matched().unwrap().dictionary.name, "small");
    assert_eq!(report.dictionaries[0].status, DictionaryStatus::Cancelled);
    assert_eq!(report.dictionaries[1].status, DictionaryStatus::Matched);
}

#[test]
fn test_first_match_stops_blank_stream() {
    let sources = vec![
        DictionarySource::stream("blank", Endless::new(b"   \n")),
        DictionarySource::stream("small", Cursor::new(b"password\n".to_vec())),
    ];

    let report = fast_coordinator()
        .verify(MD5_PASSWORD, sources, VerifyOptions::default())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome.matched().unwrap().dictionary.name, "small");
    assert_eq!(report.dictionaries[0].status, DictionaryStatus::Cancelled);
    assert_eq!(report.dictionaries[0].progress.as_ref().unwrap().candidates_tested, 0);
}

#[test]
fn test_cancel_stops_undecodable_stream() {
    let handle = fast_coordinator()
        .verify(
            MD5_PASSWORD,
            vec![DictionarySource::stream("latin1", Endless::new(b"caf\xe9\n"))],
            VerifyOptions::default(),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    handle.cancel();
    let report = handle.wait().unwrap();

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    let progress = report.dictionaries[0].progress.as_ref().unwrap();
    assert_eq!(progress.candidates_tested, 0);
    assert_eq!(progress.errors, progress.lines_processed);
}

#[test]
fn test_cancel_before_match_yields_cancelled() {
    let coordinator = fast_coordinator();
    let handle = coordinator
        .verify(MD5_PASSWORD, vec![endless(), endless()], VerifyOptions::default())
        .unwrap();

    handle.cancel();
    handle.cancel();
    let report = handle.wait().unwrap();

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert!(report.matches.is_empty());
    assert!(report
        .dictionaries
        .iter()
        .all(|d| d.status == DictionaryStatus::Cancelled));
}

#[test]
fn test_cancel_racing_exhaustion_is_cancelled() {
    let dir = TempDir::new().unwrap();
    let list = write_wordlist(&dir, "tiny.txt", &["a", "b"]);

    for _ in 0..20 {
        let handle = Coordinator::default()
            .verify(SHA1_EMPTY, vec![DictionarySource::path(&list)], VerifyOptions::default())
            .unwrap();
        handle.canceller().cancel();
        let report = handle.wait().unwrap();
        assert!(matches!(report.outcome, RunOutcome::Cancelled));
    }
}

#[test]
fn test_unreadable_dictionary_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let good = write_wordlist(&dir, "good.txt", &["one", "two", "three"]);
    let missing = dir.path().join("missing.txt");

    let handle = Coordinator::default()
        .verify(
            SHA1_EMPTY,
            vec![DictionarySource::path(&missing), DictionarySource::path(&good)],
            VerifyOptions::default(),
        )
        .unwrap();

    let mut warnings = 0;
    let mut report = None;
    for event in handle.events() {
        match event {
            VerifyEvent::DictionaryFailed(failure) => {
                assert_eq!(failure.dictionary.index, 0);
                warnings += 1;
            }
            VerifyEvent::Completed(r) => report = Some(r),
            _ => {}
        }
    }
    let report = report.unwrap();

    assert_eq!(warnings, 1);
    assert!(matches!(report.outcome, RunOutcome::Exhausted));
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.dictionaries[1].status, DictionaryStatus::Exhausted);
    assert_eq!(report.dictionaries[1].progress.as_ref().unwrap().candidates_tested, 3);
}

#[test]
fn test_all_dictionaries_unreadable_fails() {
    let dir = TempDir::new().unwrap();
    let sources = vec![
        DictionarySource::path(dir.path().join("a.txt")),
        DictionarySource::path(dir.path().join("b.txt")),
    ];

    let report = Coordinator::default()
        .verify(MD5_PASSWORD, sources, VerifyOptions::default())
        .unwrap()
        .wait()
        .unwrap();

    match report.outcome {
        RunOutcome::Failed(VerifyError::AllDictionariesUnreadable { dictionaries }) => {
            assert_eq!(dictionaries.len(), 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_all_matches_mode_reports_every_match() {
    let dir = TempDir::new().unwrap();
    let first = write_wordlist(&dir, "first.txt", &["letmein", "password"]);
    let second = write_wordlist(&dir, "second.txt", &["password"]);
    let third = write_wordlist(&dir, "third.txt", &["qwerty"]);

    let options = VerifyOptions {
        stop_on_first_match: false,
        ..VerifyOptions::default()
    };
    let report = Coordinator::default()
        .verify(
            MD5_PASSWORD,
            vec![
                DictionarySource::path(&first),
                DictionarySource::path(&second),
                DictionarySource::path(&third),
            ],
            options,
        )
        .unwrap()
        .wait()
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Matched(_)));
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.dictionaries[2].status, DictionaryStatus::Exhausted);
}

#[test]
fn test_cancel_after_match_in_all_matches_mode() {
    let options = VerifyOptions {
        stop_on_first_match: false,
        ..VerifyOptions::default()
    };
    let handle = fast_coordinator()
        .verify(
            MD5_PASSWORD,
            vec![
                endless(),
                DictionarySource::stream("small", Cursor::new(b"password\n".to_vec())),
            ],
            options,
        )
        .unwrap();

    let mut report = None;
    for event in handle.events() {
        match event {
            VerifyEvent::Match(_) => handle.cancel(),
            VerifyEvent::Completed(r) => report = Some(r),
            _ => {}
        }
    }
    let report = report.unwrap();

    // The match is still recorded, but the run ends as cancelled
    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.dictionaries[1].status, DictionaryStatus::Matched);
}

#[test]
fn test_cancel_after_first_match_keeps_match() {
    let handle = fast_coordinator()
        .verify(
            MD5_PASSWORD,
            vec![
                endless(),
                DictionarySource::stream("small", Cursor::new(b"password\n".to_vec())),
            ],
            VerifyOptions::default(),
        )
        .unwrap();

    let mut report = None;
    for event in handle.events() {
        match event {
            VerifyEvent::Match(_) => handle.cancel(),
            VerifyEvent::Completed(r) => report = Some(r),
            _ => {}
        }
    }

    assert!(report.unwrap().outcome.matched().is_some());
}

#[test]
fn test_request_counts_dictionaries() {
    let request = VerificationRequest::new(
        MD5_PASSWORD,
        vec![endless(), endless(), endless()],
        VerifyOptions::default(),
    )
    .unwrap();
    assert_eq!(request.dictionary_count(), 3);
    assert_eq!(request.algorithm(), Algorithm::Md5);
    assert!(request.stop_on_first_match());
}

#[test]
fn test_one_run_at_a_time() {
    let coordinator = fast_coordinator();
    let handle = coordinator
        .verify(MD5_PASSWORD, vec![endless()], VerifyOptions::default())
        .unwrap();
    assert!(coordinator.is_running());

    let err = coordinator
        .verify(MD5_PASSWORD, vec![endless()], VerifyOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, VerifyError::RunInProgress));

    handle.cancel();
    handle.wait().unwrap();
    assert!(!coordinator.is_running());

    let dir = TempDir::new().unwrap();
    let list = write_wordlist(&dir, "list.txt", &["password"]);
    let report = coordinator
        .verify(MD5_PASSWORD, vec![DictionarySource::path(&list)], VerifyOptions::default())
        .unwrap()
        .wait()
        .unwrap();
    assert!(report.outcome.matched().is_some());
}

#[test]
fn test_progress_is_non_decreasing_per_dictionary() {
    let dir = TempDir::new().unwrap();
    let words: Vec<String> = (0..95).map(|i| format!("w{}", i)).collect();
    let refs: Vec<&str> = words.iter().map(String::as_str).collect();
    let a = write_wordlist(&dir, "a.txt", &refs);
    let b = write_wordlist(&dir, "b.txt", &refs[..40]);

    let handle = fast_coordinator()
        .verify(
            SHA1_EMPTY,
            vec![DictionarySource::path(&a), DictionarySource::path(&b)],
            VerifyOptions::default(),
        )
        .unwrap();

    let mut last: HashMap<usize, u64> = HashMap::new();
    let mut ticks = 0;
    for event in handle.events() {
        if let VerifyEvent::Progress(progress) = event {
            let previous = last.insert(progress.dictionary.index, progress.lines_processed);
            assert!(previous.map_or(true, |p| p <= progress.lines_processed));
            ticks += 1;
        }
    }

    // 9 + 1 ticks for a.txt, 4 + 1 for b.txt
    assert_eq!(ticks, 15);
    assert_eq!(last[&0], 95);
    assert_eq!(last[&1], 40);
}

#[test]
fn test_report_json() {
    let report = Coordinator::default()
        .verify(
            MD5_PASSWORD,
            vec![DictionarySource::stream("inline", Cursor::new(b"password\n".to_vec()))],
            VerifyOptions::default(),
        )
        .unwrap()
        .wait()
        .unwrap();

    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["outcome"], "matched");
    assert_eq!(value["algorithm"], "MD5");
    assert_eq!(value["matches"][0]["plaintext"], "password");
    assert_eq!(value["dictionaries"][0]["status"], "matched");
}
