//! End-to-end collection runs against scripted controllers.

use svcmetrics::features::pool::POOL_LISTING_COMMAND;
use svcmetrics::features::volume::{volume_detail_command, VOLUME_LISTING_COMMAND};
use svcmetrics::shared::collector::collect_and_publish;
use svcmetrics::shared::testing::{target, MemoryPublisher, Reply, ScriptedExecutor, StepClock};
use svcmetrics::{default_collectors, FieldValue, RunCollector, StorageError, TimestampPolicy};

const POOLS: &str = "\
id,name,status,capacity,free_capacity,vdisk_count
0,Pool0,online,1099511627776,549755813888,2
";

const VOLUMES: &str = "\
id,name,status,capacity,vdisk_UID
v1,db01,online,10737418240,6005076801810000
";

const VOLUME_V1: &str = "\
id,v1
name,db01
status,online
capacity,10737418240
used_capacity,5368709120
vdisk_UID,6005076801810000
";

fn controller(executor: ScriptedExecutor, name: &str) -> ScriptedExecutor {
    executor
        .reply(name, POOL_LISTING_COMMAND, POOLS)
        .reply(name, VOLUME_LISTING_COMMAND, VOLUMES)
        .reply(name, &volume_detail_command("v1"), VOLUME_V1)
}

#[tokio::test]
async fn test_commands_are_issued_in_fixed_order() {
    let executor = controller(ScriptedExecutor::new(), "svcA");
    let clock = StepClock::new(1_000, 5);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batch = collector
        .collect(&target("svcA"), TimestampPolicy::PerCommand)
        .await;

    assert_eq!(
        executor.issued_for("svcA"),
        vec![
            POOL_LISTING_COMMAND.to_string(),
            VOLUME_LISTING_COMMAND.to_string(),
            volume_detail_command("v1"),
        ]
    );
    assert_eq!(batch.target, "svcA");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.points[0].measurement, "pool_capacity");
    assert_eq!(batch.points[1].measurement, "volume_capacity");
    assert_eq!(
        batch.points[1].fields.get("used_capacity"),
        Some(&FieldValue::Bytes(5368709120))
    );
}

#[tokio::test]
async fn test_fixed_timestamp_is_shared_across_targets() {
    let executor = controller(controller(ScriptedExecutor::new(), "svcA"), "svcB");
    let clock = StepClock::new(1_000, 5);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batches = collector
        .collect_run(&[target("svcA"), target("svcB")], true)
        .await;

    let timestamps: Vec<_> = batches
        .iter()
        .flat_map(|batch| batch.points.iter().map(|point| point.timestamp))
        .collect();
    assert_eq!(timestamps.len(), 4);
    assert!(timestamps.iter().all(|&t| t == 1_000));
}

#[tokio::test]
async fn test_per_command_timestamps_advance() {
    let executor = controller(ScriptedExecutor::new(), "svcA");
    let clock = StepClock::new(1_000, 5);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batches = collector.collect_run(&[target("svcA")], false).await;

    let points = &batches[0].points;
    assert_eq!(points.len(), 2);
    assert!(points[0].timestamp < points[1].timestamp);
    assert!(points
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test]
async fn test_unreachable_target_does_not_stop_the_run() {
    let executor = controller(ScriptedExecutor::new(), "svcB").unreachable("svcA");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batches = collector
        .collect_run(&[target("svcA"), target("svcB")], false)
        .await;

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].target, "svcA");
    assert!(batches[0].is_empty());
    assert!(batches[0].aborted);
    assert_eq!(batches[1].len(), 2);
    assert!(!batches[1].aborted);
    assert!(executor.issued_for("svcA").is_empty());
}

#[tokio::test]
async fn test_unreachable_target_makes_the_run_incomplete() {
    let executor = controller(ScriptedExecutor::new(), "svcB").unreachable("svcA");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let publisher = MemoryPublisher::new();

    let summary = collect_and_publish(
        &collector,
        &publisher,
        "svc",
        &[target("svcA"), target("svcB")],
        false,
    )
    .await
    .unwrap();

    assert_eq!(summary.published, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.unreachable, vec!["svcA".to_string()]);
    assert!(!summary.is_complete());
    assert_eq!(publisher.published_targets(), vec!["svcB".to_string()]);
}

#[tokio::test]
async fn test_target_without_volumes_is_still_complete() {
    let executor = ScriptedExecutor::new()
        .reply("svcA", POOL_LISTING_COMMAND, "id,name,capacity\n")
        .reply("svcA", VOLUME_LISTING_COMMAND, "id,name,status\n");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let publisher = MemoryPublisher::new();

    let summary = collect_and_publish(&collector, &publisher, "svc", &[target("svcA")], false)
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.published, 1);
}

#[tokio::test]
async fn test_connection_lost_mid_target_discards_its_points() {
    let executor = ScriptedExecutor::new()
        .reply("svcA", POOL_LISTING_COMMAND, POOLS)
        .script("svcA", VOLUME_LISTING_COMMAND, Reply::Disconnect);
    let executor = controller(executor, "svcB");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batches = collector
        .collect_run(&[target("svcA"), target("svcB")], false)
        .await;

    assert!(batches[0].is_empty());
    assert!(batches[0].aborted);
    assert_eq!(batches[1].len(), 2);
}

#[tokio::test]
async fn test_failed_command_keeps_the_rest_of_the_target() {
    let executor = ScriptedExecutor::new()
        .script("svcA", POOL_LISTING_COMMAND, Reply::Exit(1))
        .reply("svcA", VOLUME_LISTING_COMMAND, VOLUMES)
        .reply("svcA", &volume_detail_command("v1"), VOLUME_V1);
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());

    let batch = collector
        .collect(&target("svcA"), TimestampPolicy::PerCommand)
        .await;

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.points[0].measurement, "volume_capacity");
}

#[tokio::test]
async fn test_static_tags_reach_every_point() {
    let executor = controller(ScriptedExecutor::new(), "svcA");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let mut svc = target("svcA");
    svc.tags.insert("site".to_string(), "paris".to_string());

    let batch = collector.collect(&svc, TimestampPolicy::Fixed(9)).await;

    for point in &batch.points {
        assert_eq!(point.tags.get("target").map(String::as_str), Some("svcA"));
        assert_eq!(point.tags.get("site").map(String::as_str), Some("paris"));
    }
}

#[tokio::test]
async fn test_publish_failure_is_isolated_per_target() {
    let executor = controller(controller(ScriptedExecutor::new(), "svcA"), "svcB");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let publisher = MemoryPublisher::new().failing_for("svcA");

    let summary = collect_and_publish(
        &collector,
        &publisher,
        "svc2influxdb",
        &[target("svcA"), target("svcB")],
        true,
    )
    .await
    .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(summary.failed, vec!["svcA".to_string()]);
    assert!(!summary.is_complete());
    assert_eq!(publisher.published_targets(), vec!["svcB".to_string()]);
}

#[tokio::test]
async fn test_database_is_created_before_publishing() {
    let executor = controller(ScriptedExecutor::new(), "svcA");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let publisher = MemoryPublisher::new();

    let summary = collect_and_publish(&collector, &publisher, "svc", &[target("svcA")], false)
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(*publisher.databases.lock().unwrap(), vec!["svc".to_string()]);
}

#[tokio::test]
async fn test_unreachable_database_fails_the_run() {
    let executor = controller(ScriptedExecutor::new(), "svcA");
    let clock = StepClock::new(0, 1);
    let collector = RunCollector::new(&executor, &clock).with_collectors(default_collectors());
    let publisher = MemoryPublisher::new().database_unreachable();

    let result =
        collect_and_publish(&collector, &publisher, "svc", &[target("svcA")], false).await;

    assert!(matches!(result, Err(StorageError::Connection(_))));
    assert!(publisher.published_targets().is_empty());
}
