//! End-to-end recon runs against stand-in tools
//!
//! Covers the documented scenarios: a full run, single-tool mode, a single worker
//! slot, a missing binary, and an invalid thread count, plus output overwriting
//! and failure isolation.
//!
//! Every test is `#[serial]`: the built-in tool run changes `PATH`, which every
//! other spawn in this binary reads.

#![cfg(unix)]

mod common;

use common::{
    PathGuard, TARGET, config_with_tools, file_names, install_script, missing_tool, read,
    stand_in,
};
use madrecon::registry::{HTTPX, WAYBACK};
use madrecon::{Dispatcher, Outcome, RunConfig, ToolRegistry, run, run_with};
use serial_test::serial;
use std::time::Duration;

const WAYBACK_SCRIPT: &str = "echo https://{target}/a; echo https://{target}/b";
const HTTPX_SCRIPT: &str = "echo 'https://{target} [200]'";

#[tokio::test]
#[serial]
async fn full_run_writes_one_file_per_tool() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("recon_output");
    let config = config_with_tools(
        &out,
        vec![
            stand_in(WAYBACK, WAYBACK_SCRIPT),
            stand_in(HTTPX, HTTPX_SCRIPT),
        ],
    );

    let report = run(&config).await.unwrap();

    assert_eq!(report.tasks.len(), 2);
    assert!(report.all_succeeded());
    assert_eq!(
        file_names(&out),
        vec!["httpx_example.com.txt", "wayback_example.com.txt"]
    );
    assert_eq!(
        read(&out.join("wayback_example.com.txt")),
        "https://example.com/a\nhttps://example.com/b\n"
    );
    assert_eq!(
        read(&out.join("httpx_example.com.txt")),
        "https://example.com [200]\n"
    );
    assert_eq!(report.tasks[WAYBACK].bytes_written, 44);
}

#[tokio::test]
#[serial]
async fn tools_start_together_when_slots_allow() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_with_tools(
        temp.path(),
        vec![
            stand_in(WAYBACK, "sleep 0.3"),
            stand_in(HTTPX, "sleep 0.3"),
        ],
    );

    let report = run(&config).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.peak_concurrency, 2);
}

#[tokio::test]
#[serial]
async fn wayback_only_never_invokes_httpx() {
    let temp = tempfile::tempdir().unwrap();
    let marker = temp.path().join("httpx-was-run");
    let mut config = config_with_tools(
        temp.path(),
        vec![
            stand_in(WAYBACK, WAYBACK_SCRIPT),
            stand_in(HTTPX, &format!("touch {}", marker.display())),
        ],
    );
    config.selected_tasks = vec![WAYBACK.to_string()];

    let report = run(&config).await.unwrap();

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.outcome(WAYBACK), Some(&Outcome::Success));
    assert_eq!(file_names(temp.path()), vec!["wayback_example.com.txt"]);
    assert!(!marker.exists());
}

#[tokio::test]
#[serial]
async fn single_thread_runs_tools_sequentially() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_with_tools(
        temp.path(),
        vec![
            stand_in(WAYBACK, "sleep 0.2; echo done"),
            stand_in(HTTPX, "sleep 0.2; echo done"),
        ],
    );
    config.thread_count = 1;

    let report = run(&config).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.peak_concurrency, 1);
    assert!(temp.path().join("wayback_example.com.txt").exists());
    assert!(temp.path().join("httpx_example.com.txt").exists());
}

#[tokio::test]
#[serial]
async fn missing_httpx_does_not_affect_wayback() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_with_tools(
        temp.path(),
        vec![stand_in(WAYBACK, WAYBACK_SCRIPT), missing_tool(HTTPX)],
    );

    let report = tokio::time::timeout(Duration::from_secs(10), run(&config))
        .await
        .expect("run must not hang on a missing binary")
        .unwrap();

    assert_eq!(report.outcome(HTTPX), Some(&Outcome::ToolNotFound));
    assert_eq!(report.outcome(WAYBACK), Some(&Outcome::Success));
    assert_eq!(
        read(&temp.path().join("wayback_example.com.txt")),
        "https://example.com/a\nhttps://example.com/b\n"
    );
}

#[tokio::test]
#[serial]
async fn missing_binary_detected_without_precheck() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_with_tools(
        temp.path(),
        vec![stand_in(WAYBACK, WAYBACK_SCRIPT), missing_tool(HTTPX)],
    );
    config.precheck_tools = false;

    let report = run(&config).await.unwrap();

    assert_eq!(report.outcome(HTTPX), Some(&Outcome::ToolNotFound));
    assert_eq!(report.outcome(WAYBACK), Some(&Outcome::Success));
}

#[tokio::test]
#[serial]
async fn zero_threads_is_rejected_before_anything_runs() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("recon_output");
    let mut config = config_with_tools(
        &out,
        vec![
            stand_in(WAYBACK, WAYBACK_SCRIPT),
            stand_in(HTTPX, HTTPX_SCRIPT),
        ],
    );
    config.thread_count = 0;

    let err = run(&config).await.unwrap_err();

    assert!(err.is_config());
    assert!(!out.exists());
}

#[tokio::test]
#[serial]
async fn unknown_selection_is_a_configuration_error() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("recon_output");
    let mut config = config_with_tools(&out, vec![]);
    config.selected_tasks = vec!["nmap".to_string()];

    let err = run(&config).await.unwrap_err();

    assert!(err.is_config());
    assert!(!out.exists());
}

#[tokio::test]
#[serial]
async fn rerun_overwrites_previous_output() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_with_tools(
        temp.path(),
        vec![
            stand_in(WAYBACK, WAYBACK_SCRIPT),
            stand_in(HTTPX, HTTPX_SCRIPT),
        ],
    );

    run(&config).await.unwrap();
    let first_wayback = read(&temp.path().join("wayback_example.com.txt"));
    let first_httpx = read(&temp.path().join("httpx_example.com.txt"));

    run(&config).await.unwrap();

    assert_eq!(read(&temp.path().join("wayback_example.com.txt")), first_wayback);
    assert_eq!(read(&temp.path().join("httpx_example.com.txt")), first_httpx);
}

#[tokio::test]
#[serial]
async fn failing_tool_is_isolated() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_with_tools(
        temp.path(),
        vec![
            stand_in(WAYBACK, "echo partial; exit 7"),
            stand_in(HTTPX, "sleep 0.2; echo alive"),
        ],
    );

    let report = run(&config).await.unwrap();

    match report.outcome(WAYBACK) {
        Some(Outcome::Failed { reason }) => assert!(reason.contains("status 7"), "{reason}"),
        other => panic!("expected wayback to fail, got {other:?}"),
    }
    assert_eq!(report.outcome(HTTPX), Some(&Outcome::Success));
    assert_eq!(read(&temp.path().join("httpx_example.com.txt")), "alive\n");
    assert_eq!(read(&temp.path().join("wayback_example.com.txt")), "partial\n");
}

#[tokio::test]
#[serial]
async fn headers_reach_tools_that_accept_them() {
    let temp = tempfile::tempdir().unwrap();
    let mut httpx = stand_in(HTTPX, r#"printf '%s|' "$@"; printf '%s' "$MADRECON_HEADERS""#);
    httpx.header_flag = Some("-H".to_string());
    let mut config = config_with_tools(temp.path(), vec![httpx]);
    config.selected_tasks = vec![HTTPX.to_string()];
    config.headers = vec!["X-A: 1".to_string(), "X-B: 2".to_string()];

    let report = run(&config).await.unwrap();

    assert!(report.all_succeeded());
    // sh -c assigns the first extra argument to $0, the rest to "$@"
    assert_eq!(
        read(&temp.path().join("httpx_example.com.txt")),
        "X-A: 1|-H|X-B: 2|X-A: 1\nX-B: 2"
    );
}

#[tokio::test]
#[serial]
async fn many_tools_respect_the_thread_limit() {
    let temp = tempfile::tempdir().unwrap();
    let tools = (0..8)
        .map(|i| stand_in(&format!("tool{i}"), "sleep 0.1; echo {target}"))
        .collect();
    let mut config = config_with_tools(temp.path(), tools);
    config.thread_count = 3;
    config.selected_tasks = (0..8).map(|i| format!("tool{i}")).collect();

    let registry = ToolRegistry::from_config(&config.tools);
    let dispatcher = Dispatcher::for_config(&config);
    let report = run_with(&config, &registry, &dispatcher).await.unwrap();

    assert_eq!(report.tasks.len(), 8);
    assert!(report.all_succeeded());
    assert!(report.peak_concurrency <= 3);
    for i in 0..8 {
        assert_eq!(
            read(&temp.path().join(format!("tool{i}_{TARGET}.txt"))),
            "example.com\n"
        );
    }
}

#[tokio::test]
#[serial]
async fn builtin_tools_are_found_on_path() {
    let temp = tempfile::tempdir().unwrap();
    let bin = temp.path().join("bin");
    std::fs::create_dir(&bin).unwrap();
    install_script(&bin, "waybackurls", r#"echo "https://$1/archived""#);
    install_script(&bin, "httpx", r#"printf '%s|' "$@""#);
    let out = temp.path().join("recon_output");
    let config = RunConfig {
        output_dir: out.clone(),
        headers: vec!["X-Test: 1".to_string()],
        ..RunConfig::new(TARGET)
    };

    let report = {
        let _path = PathGuard::prepend(&bin);
        run(&config).await.unwrap()
    };

    assert!(report.all_succeeded(), "{:?}", report.tasks);
    assert_eq!(
        read(&out.join("wayback_example.com.txt")),
        "https://example.com/archived\n"
    );
    assert_eq!(
        read(&out.join("httpx_example.com.txt")),
        "-u|example.com|-silent|-status-code|-follow-redirects|-H|X-Test: 1|"
    );
}
