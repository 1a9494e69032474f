mod common;

use common::{BlockingRunner, ScriptedRunner};
use ocr_prep::{
    cancel::CancelToken,
    config::Config,
    error::PrepError,
    filter::{ImageFilter, PageStatus},
    split::SplitCoordinator,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn coordinator<R: ocr_prep::exec::Runner>(runner: R, workers: usize) -> SplitCoordinator<R> {
    SplitCoordinator::new(ImageFilter::new(&Config::default().filter, runner), workers)
}

#[test]
fn failed_page_falls_back_to_input() {
    let runner = ScriptedRunner::default().failing("p2.png");
    let split = coordinator(&runner, 2);

    let out = split
        .split(&paths(&["p1.png", "p2.png", "p3.png"]), &CancelToken::new())
        .unwrap();

    assert_eq!(out, paths(&["p1_split1.png", "p2.png", "p3_split1.png"]));
    assert_eq!(runner.filter_calls(), 3);
}

#[test]
fn output_order_matches_input_regardless_of_completion() {
    let names: Vec<String> = (0..17).map(|i| format!("scan/page{i:02}.tif")).collect();
    let mut runner = ScriptedRunner::default();
    for (i, n) in names.iter().enumerate() {
        // Earlier pages finish last.
        runner = runner.delayed(n, Duration::from_millis((17 - i as u64) * 3));
    }
    let inputs: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
    let expected: Vec<PathBuf> = (0..17)
        .map(|i| PathBuf::from(format!("scan/page{i:02}_split1.tif")))
        .collect();

    for workers in [1, 3, 8, 32] {
        let out = coordinator(&runner, workers)
            .split(&inputs, &CancelToken::new())
            .unwrap();
        assert_eq!(out, expected, "workers={workers}");
    }
}

#[test]
fn one_failure_does_not_touch_neighbours() {
    let names: Vec<String> = (0..9).map(|i| format!("p{i}.png")).collect();
    let inputs: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
    let runner = ScriptedRunner::default().failing("p4.png");

    let pages = coordinator(&runner, 4)
        .run_batch(&inputs, &CancelToken::new())
        .unwrap();

    assert_eq!(pages.len(), inputs.len());
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.input, inputs[i]);
        if i == 4 {
            assert_eq!(page.output, inputs[i]);
            match &page.status {
                PageStatus::Fallback { reason } => assert!(reason.contains("exit code 1")),
                other => panic!("expected fallback, got {other:?}"),
            }
        } else {
            assert!(page.is_filtered());
            assert_eq!(page.output, PathBuf::from(format!("p{i}_split1.png")));
        }
    }
}

#[test]
fn every_page_failing_still_returns_full_batch() {
    let inputs = paths(&["a.png", "b.png"]);
    let runner = ScriptedRunner::default().failing("a.png").failing("b.png");
    let out = coordinator(&runner, 4).split(&inputs, &CancelToken::new()).unwrap();
    assert_eq!(out, inputs);
}

#[test]
fn empty_batch_is_empty() {
    let runner = ScriptedRunner::default();
    let out = coordinator(&runner, 4).split(&[], &CancelToken::new()).unwrap();
    assert!(out.is_empty());
    assert_eq!(runner.filter_calls(), 0);
}

#[test]
fn cancellation_joins_workers_before_returning() {
    let runner = BlockingRunner::default();
    let inputs: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("p{i}.png"))).collect();
    let cancel = CancelToken::new();

    let trip = cancel.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trip.cancel();
    });

    let err = coordinator(&runner, 3).split(&inputs, &cancel).unwrap_err();
    assert!(matches!(err, PrepError::BatchCancelled));

    let started = runner.started.load(Ordering::SeqCst);
    let exited = runner.exited.load(Ordering::SeqCst);
    assert!(started >= 1 && started <= 3, "started={started}");
    assert_eq!(started, exited);
}

#[test]
fn already_cancelled_batch_runs_nothing() {
    let runner = ScriptedRunner::default();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = coordinator(&runner, 2)
        .split(&paths(&["p1.png"]), &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(runner.filter_calls(), 0);
}
