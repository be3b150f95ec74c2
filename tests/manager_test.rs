/*!
 * Render Manager Tests
 * Admission, queueing, fairness, and conversion scenarios
 */

mod common;

use common::{ConcurrencyProbe, RecordingSink, StubDriver};

use bytes::Bytes;
use docgen::core::limits::ENGINE_BASE_COST_BYTES;
use docgen::{
    ConvertError, JobEvent, JobPayload, ManagerConfig, RenderError, RenderManager,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

fn build_manager(
    config: ManagerConfig,
    driver: &Arc<StubDriver>,
    sink: &Arc<RecordingSink>,
) -> Arc<RenderManager> {
    Arc::new(
        RenderManager::builder()
            .with_config(config)
            .with_driver(Arc::clone(driver) as Arc<dyn docgen::EngineDriver>)
            .with_events(Arc::clone(sink) as Arc<dyn docgen::EventSink>)
            .build(),
    )
}

fn max_running_seen(events: &[JobEvent]) -> usize {
    events
        .iter()
        .filter_map(|event| match event {
            JobEvent::Started { gauges, .. }
            | JobEvent::Queued { gauges, .. }
            | JobEvent::Completed { gauges, .. }
            | JobEvent::Errored { gauges, .. }
            | JobEvent::TimedOut { gauges, .. }
            | JobEvent::Cleaned { gauges, .. }
            | JobEvent::SweepCompleted { gauges, .. } => Some(gauges.running_jobs),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}

fn started_order(events: &[JobEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            JobEvent::Started { job_id, .. } => Some(*job_id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn second_job_queues_when_capacity_is_one() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let config = ManagerConfig::default()
        .with_max_concurrent_jobs(1)
        .with_memory_budget(1_000_000_000_000)
        .with_job_timeout(Duration::from_secs(60));
    let manager = build_manager(config, &driver, &sink);

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .submit(
                    |_engine, _payload| async {
                        sleep(Duration::from_millis(200)).await;
                        Ok(Bytes::from_static(&[0x25, 0x50, 0x44, 0x46]))
                    },
                    JobPayload::new("html", "a"),
                )
                .await
        }
    });
    sleep(Duration::from_millis(20)).await;

    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .submit(
                    |_engine, _payload| async { Ok(Bytes::from_static(&[0x00])) },
                    JobPayload::new("html", "b"),
                )
                .await
        }
    });

    let result_a = a.await.unwrap().unwrap();
    let result_b = b.await.unwrap().unwrap();
    assert_eq!(&result_a[..], b"%PDF");
    assert_eq!(&result_b[..], &[0x00]);

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Queued { job_id: 2, .. })));
    assert_eq!(max_running_seen(&events), 1);
}

#[tokio::test]
async fn third_job_waits_for_a_free_slot() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let config = ManagerConfig::default()
        .with_max_concurrent_jobs(2)
        .with_job_timeout(Duration::from_secs(60));
    let manager = build_manager(config, &driver, &sink);
    let probe = ConcurrencyProbe::new();

    let mut handles = Vec::new();
    for index in 1u8..=3 {
        let manager = Arc::clone(&manager);
        let probe = Arc::clone(&probe);
        handles.push(tokio::spawn(async move {
            manager
                .submit(
                    move |_engine, _payload| async move {
                        probe.enter();
                        sleep(Duration::from_millis(40)).await;
                        probe.exit();
                        Ok(Bytes::from(vec![index]))
                    },
                    JobPayload::new("html", index.to_string()),
                )
                .await
        }));
        // Keep submission order deterministic
        sleep(Duration::from_millis(5)).await;
    }

    for (index, handle) in handles.into_iter().enumerate() {
        let bytes = handle.await.unwrap().unwrap();
        assert_eq!(&bytes[..], &[index as u8 + 1]);
    }

    assert!(probe.peak() <= 2);
    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Queued { job_id: 3, .. })));
    assert!(max_running_seen(&events) <= 2);
}

#[tokio::test]
async fn queued_jobs_are_admitted_in_submission_order() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let config = ManagerConfig::default()
        .with_max_concurrent_jobs(1)
        .with_job_timeout(Duration::from_secs(60));
    let manager = build_manager(config, &driver, &sink);

    let mut handles = Vec::new();
    for name in ["a", "b", "c"] {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .submit(
                    |_engine, _payload| async {
                        sleep(Duration::from_millis(50)).await;
                        Ok(Bytes::new())
                    },
                    JobPayload::new("html", name),
                )
                .await
        }));
        sleep(Duration::from_millis(10)).await;
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // b and c were both queued behind a; they must start in that order
    assert_eq!(started_order(&sink.snapshot()), vec![1, 2, 3]);
}

#[tokio::test]
async fn memory_budget_refusals_queue_and_recover() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    // Budget fits one job's cost but not two
    let config = ManagerConfig::default()
        .with_max_concurrent_jobs(10)
        .with_memory_budget(2 * ENGINE_BASE_COST_BYTES)
        .with_job_timeout(Duration::from_secs(60));
    let manager = build_manager(config, &driver, &sink);

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .submit(
                    |_engine, _payload| async {
                        sleep(Duration::from_millis(80)).await;
                        Ok(Bytes::new())
                    },
                    JobPayload::new("html", "first"),
                )
                .await
        }
    });
    sleep(Duration::from_millis(20)).await;

    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .submit(
                    |_engine, _payload| async { Ok(Bytes::new()) },
                    JobPayload::new("html", "second"),
                )
                .await
        }
    });

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Queued { job_id: 2, .. })));
    // All accounting released once both jobs finished
    assert_eq!(manager.memory_total(), 0);
    assert_eq!(manager.running_jobs(), 0);
}

#[tokio::test]
async fn timeout_frees_the_slot_without_failing_the_caller() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let config = ManagerConfig::default()
        .with_max_concurrent_jobs(1)
        .with_job_timeout(Duration::from_millis(40));
    let manager = build_manager(config, &driver, &sink);

    let started = Instant::now();
    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let result = manager
                .submit(
                    |_engine, _payload| async {
                        sleep(Duration::from_millis(250)).await;
                        Ok(Bytes::from_static(b"late"))
                    },
                    JobPayload::new("html", "slow"),
                )
                .await;
            (result, started.elapsed())
        }
    });
    sleep(Duration::from_millis(10)).await;

    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let result = manager
                .submit(
                    |_engine, _payload| async { Ok(Bytes::from_static(b"fast")) },
                    JobPayload::new("html", "quick"),
                )
                .await;
            (result, started.elapsed())
        }
    });

    let (result_a, elapsed_a) = a.await.unwrap();
    let (result_b, elapsed_b) = b.await.unwrap();

    // The slow job's timer only reclaimed its accounting slot: its render
    // finished in the background and still settled the caller
    assert_eq!(&result_a.unwrap()[..], b"late");
    assert!(elapsed_a >= Duration::from_millis(250));

    // The queued job was admitted on the timeout, well before A finished
    assert_eq!(&result_b.unwrap()[..], b"fast");
    assert!(elapsed_b < Duration::from_millis(200));

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::TimedOut { job_id: 1, .. })));
}

#[tokio::test]
async fn render_errors_reach_the_caller_and_release_accounting() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let manager = build_manager(ManagerConfig::default(), &driver, &sink);

    let result = manager
        .submit(
            |_engine, _payload| async {
                Err(RenderError::Engine(docgen::EngineError::InvalidPayload(
                    "corrupt".into(),
                )))
            },
            JobPayload::new("html", "x"),
        )
        .await;

    assert!(matches!(result, Err(RenderError::Engine(_))));
    assert_eq!(manager.running_jobs(), 0);
    assert_eq!(manager.memory_total(), 0);
    // The engine survived the failed job and returned to the pool
    assert_eq!(manager.idle_engines(), 1);

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Errored { job_id: 1, .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Cleaned { job_id: 1, .. })));
}

#[tokio::test]
async fn unsupported_format_rejects_before_any_engine_activity() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let manager = build_manager(ManagerConfig::default(), &driver, &sink);

    let result = manager
        .render_document(JobPayload::new("docx", "binary soup"))
        .await;

    match result {
        Err(RenderError::Convert(ConvertError::UnsupportedFormat(format))) => {
            assert_eq!(format, "docx")
        }
        other => panic!("expected unsupported-format rejection, got {:?}", other.map(|_| ())),
    }
    assert_eq!(driver.launch_count(), 0);
    assert!(sink.snapshot().is_empty());
}

#[tokio::test]
async fn render_document_converts_and_prints() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let manager = build_manager(ManagerConfig::default(), &driver, &sink);

    let result = manager
        .render_document(JobPayload::new("markdown", "# Hello"))
        .await
        .unwrap();

    // The stub engine tags output with the HTML length; the wrapped document
    // is far larger than the markdown source
    assert!(result.starts_with(b"%PDF:"));
    assert_eq!(driver.launch_count(), 1);
    assert_eq!(manager.idle_engines(), 1);

    let events = sink.snapshot();
    assert!(events
        .iter()
        .any(|event| matches!(event, JobEvent::Completed { job_id: 1, .. })));
}

#[tokio::test]
async fn job_ids_are_monotonic_across_submissions() {
    let driver = StubDriver::new();
    let sink = RecordingSink::new();
    let manager = build_manager(ManagerConfig::default(), &driver, &sink);

    for _ in 0..3 {
        manager
            .submit(
                |_engine, _payload| async { Ok(Bytes::new()) },
                JobPayload::new("html", "x"),
            )
            .await
            .unwrap();
    }

    assert_eq!(started_order(&sink.snapshot()), vec![1, 2, 3]);
}
