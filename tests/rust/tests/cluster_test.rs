//! End-to-end runs of a local cluster

use anyhow::Result;
use coordinator::{CollectorReport, CsvBatchSource, LocalCluster, MasterMessage, VecBatchSource};
use runtime_core::RuntimeConfig;
use search::sha256_hex;
use std::io::Write;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

fn config(workers: usize, batch_size: usize) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.worker.local_workers = workers;
    config.worker.heartbeat_interval = Duration::from_millis(100);
    config.coordinator.heartbeat_timeout = Duration::from_secs(5);
    config.coordinator.dead_worker_check_interval = Duration::from_millis(100);
    config.input.batch_size = batch_size;
    config
}

/// One `;`-separated input line with digested password and hints
fn record(id: u32, alphabet: &str, length: usize, password: &str, hints: &[&str]) -> String {
    let mut fields = vec![
        id.to_string(),
        format!("user{}", id),
        alphabet.to_string(),
        length.to_string(),
        sha256_hex(password),
    ];
    fields.extend(hints.iter().map(|h| sha256_hex(h)));
    fields.join(";")
}

async fn run(config: RuntimeConfig, text: &str) -> Result<CollectorReport> {
    let source = VecBatchSource::from_text(text, config.input.batch_size);
    let cluster = LocalCluster::start(config, source)?;
    Ok(timeout(RUN_TIMEOUT, cluster.wait()).await??)
}

fn sorted(mut results: Vec<String>) -> Vec<String> {
    results.sort();
    results
}

#[tokio::test]
async fn test_hint_reduces_alphabet_before_password_search() -> Result<()> {
    let input = record(1, "ab", 1, "a", &["a"]);

    let report = run(config(2, 10), &input).await?;

    assert_eq!(report.results, vec!["1: a"]);
    assert_eq!(report.prints, 1);
    Ok(())
}

#[tokio::test]
async fn test_hints_shrink_search_space() -> Result<()> {
    // Over the full alphabet the password sits past 8^10 candidates; the
    // hints rule out C..H, leaving 2^11
    let hints = ["ABDEFGH", "ABCEFGH", "ABCDFGH", "ABCDEGH", "ABCDEFH", "ABCDEFG"];
    let input = record(1, "ABCDEFGH", 11, "BABBABBAABA", &hints);

    let report = run(config(2, 10), &input).await?;

    assert_eq!(report.results, vec!["1: BABBABBAABA"]);
    Ok(())
}

#[tokio::test]
async fn test_multi_batch_dataset() -> Result<()> {
    let input = [
        record(1, "ABCD", 3, "ABA", &["DBA", "CAB"]),
        record(2, "ABCD", 3, "CCD", &["CDB", "DCA"]),
        record(3, "ABCD", 3, "DAB", &[]),
        record(4, "ABCD", 3, "ZZZ", &[]),
    ]
    .join("\n");

    let report = run(config(3, 2), &input).await?;

    assert_eq!(
        sorted(report.results),
        vec!["1: ABA", "2: CCD", "3: DAB", "4: <not found>"]
    );
    assert_eq!(report.prints, 1);
    assert!(report
        .progress
        .iter()
        .any(|p| p == "Processed batch of size 2"));
    assert_eq!(report.progress.last().map(String::as_str), Some("Input exhausted"));
    Ok(())
}

#[tokio::test]
async fn test_single_worker_runs_everything() -> Result<()> {
    let input = [
        record(10, "XYZ", 2, "ZZ", &["ZY"]),
        record(11, "XYZ", 2, "XY", &["YX"]),
    ]
    .join("\n");

    let report = run(config(1, 100), &input).await?;

    assert_eq!(sorted(report.results), vec!["10: ZZ", "11: XY"]);
    Ok(())
}

#[tokio::test]
async fn test_malformed_batch_is_skipped() -> Result<()> {
    let input = [
        record(1, "ab", 1, "b", &[]),
        "2;broken;ab;one;00".to_string(),
        record(3, "ab", 1, "a", &[]),
    ]
    .join("\n");

    let report = run(config(2, 1), &input).await?;

    assert_eq!(sorted(report.results), vec!["1: b", "3: a"]);
    assert!(report.progress.iter().any(|p| p.starts_with("Rejected batch")));
    Ok(())
}

#[tokio::test]
async fn test_empty_input_finishes_without_results() -> Result<()> {
    let report = run(config(2, 10), "").await?;

    assert!(report.results.is_empty());
    assert_eq!(report.prints, 1);
    Ok(())
}

#[tokio::test]
async fn test_csv_file_input() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "ID;Name;PasswordChars;PasswordLength;Password;Hint1")?;
    writeln!(file, "{}", record(1, "ABC", 2, "CA", &["AC"]))?;
    writeln!(file, "{}", record(2, "ABC", 2, "BB", &[]))?;

    let config = config(2, 10);
    let source = CsvBatchSource::open(file.path(), &config.input)?;
    let cluster = LocalCluster::start(config, source)?;
    let report = timeout(RUN_TIMEOUT, cluster.wait()).await??;

    assert_eq!(sorted(report.results), vec!["1: CA", "2: BB"]);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_csv_line_rejects_only_its_batch() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "{}", record(1, "ab", 1, "a", &[]))?;
    file.write_all(b"2;bad\xFFname;ab;1;00\n")?;
    writeln!(file, "{}", record(3, "ab", 1, "b", &[]))?;
    writeln!(file, "{}", record(4, "ab", 1, "a", &[]))?;

    let mut config = config(2, 1);
    config.input.has_headers = false;
    let source = CsvBatchSource::open(file.path(), &config.input)?;
    let cluster = LocalCluster::start(config, source)?;
    let report = timeout(RUN_TIMEOUT, cluster.wait()).await??;

    assert_eq!(sorted(report.results), vec!["1: a", "3: b", "4: a"]);
    assert!(report.progress.iter().any(|p| p.starts_with("Rejected batch")));
    Ok(())
}

#[tokio::test]
async fn test_late_worker_picks_up_pending_work() -> Result<()> {
    let input = record(1, "ab", 2, "ba", &[]);
    let mut cluster = LocalCluster::start(config(0, 10), VecBatchSource::from_text(&input, 10))?;

    // Nothing can progress without workers
    sleep(Duration::from_millis(200)).await;
    let status = cluster.master().status().await?;
    assert!(status.input_exhausted);
    assert_eq!(status.pending_hint_tasks, 2);

    cluster.spawn_worker();
    let report = timeout(RUN_TIMEOUT, cluster.wait()).await??;

    assert_eq!(report.results, vec!["1: ba"]);
    Ok(())
}

#[tokio::test]
async fn test_killed_worker_is_replaced() -> Result<()> {
    let input = [
        record(1, "ABCD", 3, "ABA", &["DBA"]),
        record(2, "ABCD", 3, "DDC", &[]),
    ]
    .join("\n");
    let mut cluster = LocalCluster::start(config(1, 10), VecBatchSource::from_text(&input, 10))?;

    for worker_id in cluster.worker_ids() {
        assert!(cluster.kill_worker(&worker_id));
    }
    assert!(!cluster.kill_worker("worker-unknown"));
    cluster.spawn_worker();

    let report = timeout(RUN_TIMEOUT, cluster.wait()).await??;

    assert_eq!(sorted(report.results), vec!["1: ABA", "2: DDC"]);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_prints_partial_results_once() -> Result<()> {
    let input = record(1, "ab", 1, "a", &[]);
    let cluster = LocalCluster::start(config(0, 10), VecBatchSource::from_text(&input, 10))?;

    assert!(cluster.master().tell(MasterMessage::Shutdown));
    let report = timeout(RUN_TIMEOUT, cluster.wait()).await??;

    assert!(report.results.is_empty());
    assert_eq!(report.prints, 1);
    Ok(())
}
