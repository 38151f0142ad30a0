//! Deposit monitor against scripted subscriptions.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{fast_monitor_config, malformed, notification, ScriptedSubscriptionGateway, Step};
use custody_agent::blockchain::keys::Pubkey;
use custody_agent::blockchain::types::{Commitment, GatewayError};
use custody_agent::deposits::{
    DepositMonitor, MonitorError, MonitorEvent, MonitorState, NotificationDecodeError,
};

fn account() -> Pubkey {
    Pubkey::new([3u8; 32])
}

/// Spawn a monitor that records every event it emits.
fn spawn_monitor(
    gateway: Arc<ScriptedSubscriptionGateway>,
) -> (
    custody_agent::deposits::MonitorHandle,
    Arc<Mutex<Vec<MonitorEvent>>>,
    tokio::task::JoinHandle<Result<(), MonitorError>>,
) {
    let monitor =
        DepositMonitor::new(gateway, account(), Commitment::Finalized, fast_monitor_config());
    let handle = monitor.stop_handle();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let task = tokio::spawn(monitor.run(move |event| sink.lock().unwrap().push(event)));
    (handle, events, task)
}

fn balances(events: &[MonitorEvent]) -> Vec<(u64, u64)> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::Balance(update) => Some((update.sequence, update.lamports)),
            _ => None,
        })
        .collect()
}

async fn wait_for_balances(events: &Arc<Mutex<Vec<MonitorEvent>>>, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while balances(&events.lock().unwrap()).len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("balance events not delivered in time");
}

#[tokio::test]
async fn test_notifications_delivered_in_order() {
    let gateway = Arc::new(ScriptedSubscriptionGateway::single(vec![
        notification(10, 1_000),
        notification(11, 2_000),
        notification(12, 1_500),
        notification(13, 9_000),
    ]));
    let (handle, events, task) = spawn_monitor(gateway.clone());

    wait_for_balances(&events, 4).await;
    assert_eq!(handle.state(), MonitorState::Streaming);
    handle.stop();
    task.await.unwrap().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        balances(&events),
        vec![(1, 1_000), (2, 2_000), (3, 1_500), (4, 9_000)]
    );
    for event in events.iter() {
        if let MonitorEvent::Balance(update) = event {
            assert_eq!(update.account, account());
            assert!(update.slot.is_some());
        }
    }
}

#[tokio::test]
async fn test_malformed_notification_is_skipped() {
    let gateway = Arc::new(ScriptedSubscriptionGateway::single(vec![
        notification(10, 1_000),
        malformed(),
        notification(11, 2_000),
        notification(12, 3_000),
    ]));
    let (handle, events, task) = spawn_monitor(gateway.clone());

    wait_for_balances(&events, 3).await;
    handle.stop();
    task.await.unwrap().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(balances(&events), vec![(1, 1_000), (2, 2_000), (3, 3_000)]);
    let decode_errors = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::DecodeError(NotificationDecodeError::Malformed(_))))
        .count();
    assert_eq!(decode_errors, 1);
    assert_eq!(gateway.subscribes(), 1);
}

#[tokio::test]
async fn test_stop_while_waiting_closes_once() {
    let gateway = Arc::new(ScriptedSubscriptionGateway::single(vec![]));
    let (handle, _events, task) = spawn_monitor(gateway.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.receive_calls.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("monitor never started receiving");

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("monitor did not stop in time");
    assert!(result.unwrap().is_ok());
    assert_eq!(gateway.closes(), 1);
    assert_eq!(handle.state(), MonitorState::Closed);

    // A second stop is harmless.
    handle.stop();
    assert_eq!(gateway.closes(), 1);
}

#[tokio::test]
async fn test_transport_errors_are_reported_without_ending_stream() {
    let gateway = Arc::new(ScriptedSubscriptionGateway::single(vec![
        notification(10, 1_000),
        Step::Fail(GatewayError::Transport("reset".to_string())),
        notification(11, 2_000),
    ]));
    let (handle, events, task) = spawn_monitor(gateway.clone());

    wait_for_balances(&events, 2).await;
    handle.stop();
    task.await.unwrap().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(balances(&events), vec![(1, 1_000), (2, 2_000)]);
    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::TransportError(GatewayError::Transport(_)))));
    assert_eq!(gateway.subscribes(), 1);
}

#[tokio::test]
async fn test_resubscribes_and_drops_replays() {
    let gateway = Arc::new(
        ScriptedSubscriptionGateway::new(vec![
            Ok(vec![notification(10, 1_000), notification(11, 2_000)]),
            Ok(vec![notification(11, 2_000), notification(12, 5_000)]),
        ])
        .closing_when_drained(),
    );
    let (handle, events, task) = spawn_monitor(gateway.clone());

    wait_for_balances(&events, 3).await;
    handle.stop();
    let _ = task.await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(balances(&events), vec![(1, 1_000), (2, 2_000), (3, 5_000)]);
    assert!(gateway.subscribes() >= 2);
    // Both opened subscriptions were released; later subscribes failed.
    assert_eq!(gateway.closes(), 2);
}

#[tokio::test]
async fn test_reconnect_exhaustion_returns_error() {
    let gateway = Arc::new(ScriptedSubscriptionGateway::new(vec![]));
    let (handle, events, task) = spawn_monitor(gateway.clone());

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("monitor did not give up")
        .unwrap();

    match result {
        Err(MonitorError::ReconnectExhausted { attempts, last_error }) => {
            assert_eq!(attempts, fast_monitor_config().max_reconnect_attempts);
            assert!(matches!(last_error, GatewayError::Transport(_)));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    // One initial subscribe plus one per allowed retry.
    assert_eq!(gateway.subscribes(), 4);
    assert_eq!(gateway.closes(), 0);
    assert_eq!(handle.state(), MonitorState::Closed);

    let reconnects = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Reconnecting { .. }))
        .count();
    assert_eq!(reconnects, 3);
}

#[tokio::test]
async fn test_quiet_account_keeps_resubscribing() {
    // Every subscribe is acknowledged and then dropped without a notification.
    let scripts = (0..1_000).map(|_| Ok(vec![])).collect();
    let gateway = Arc::new(ScriptedSubscriptionGateway::new(scripts).closing_when_drained());
    let (handle, events, task) = spawn_monitor(gateway.clone());

    let limit = fast_monitor_config().max_reconnect_attempts as usize;
    tokio::time::timeout(Duration::from_secs(5), async {
        while gateway.subscribes() < 2 * (limit + 1) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("monitor stopped resubscribing");
    assert!(!task.is_finished());

    handle.stop();
    task.await.unwrap().unwrap();
    assert_eq!(gateway.closes(), gateway.subscribes());

    let events = events.lock().unwrap();
    assert!(balances(&events).is_empty());
    assert!(events
        .iter()
        .all(|e| !matches!(e, MonitorEvent::Reconnecting { attempt, .. } if *attempt > 1)));
}
