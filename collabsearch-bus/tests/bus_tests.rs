use collabsearch_bus::{Bus, DEFAULT_CAPACITY};

// ── Publishing ───────────────────────────────────────────────────

#[test]
fn publish_without_subscriber_is_dropped() {
    let bus: Bus<u32> = Bus::new("numbers");
    assert_eq!(bus.publish(1), 0);
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(bus.name(), "numbers");
}

#[test]
fn every_subscriber_sees_every_value_in_order() {
    let bus = Bus::new("numbers");
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    assert_eq!(bus.publish(1), 2);
    bus.publish(2);
    bus.publish(3);

    assert_eq!(a.drain(), vec![1, 2, 3]);
    assert_eq!(b.drain(), vec![1, 2, 3]);
}

#[test]
fn late_subscriber_misses_earlier_values() {
    let bus = Bus::new("numbers");
    bus.publish(1);
    let mut late = bus.subscribe();
    bus.publish(2);
    assert_eq!(late.drain(), vec![2]);
}

#[test]
fn cloned_handle_publishes_on_same_channel() {
    let bus = Bus::new("numbers");
    let other = bus.clone();
    let mut sub = bus.subscribe();
    other.publish(7);
    assert_eq!(sub.try_recv(), Some(7));
    assert_eq!(sub.try_recv(), None);
}

#[test]
fn lagged_subscriber_keeps_newest_values() {
    let bus = Bus::with_capacity("tiny", 2);
    let mut sub = bus.subscribe();
    for i in 0..5 {
        bus.publish(i);
    }
    assert_eq!(sub.drain(), vec![3, 4]);
}

#[test]
fn default_capacity_is_reasonable() {
    assert!(DEFAULT_CAPACITY >= 64);
}

// ── Async receive ────────────────────────────────────────────────

#[tokio::test]
async fn recv_returns_none_after_bus_dropped() {
    let bus = Bus::new("closing");
    let mut sub = bus.subscribe();
    bus.publish("last");
    drop(bus);
    assert_eq!(sub.recv().await, Some("last"));
    assert_eq!(sub.recv().await, None);
}

#[tokio::test]
async fn recv_wakes_on_publish_from_task() {
    let bus = Bus::new("tasks");
    let mut sub = bus.subscribe();
    let publisher = bus.clone();
    tokio::spawn(async move {
        publisher.publish(42u8);
    });
    assert_eq!(sub.recv().await, Some(42));
}

#[test]
fn recv_is_pending_until_publish() {
    let bus = Bus::new("polled");
    let mut sub = bus.subscribe();
    let mut recv = tokio_test::task::spawn(sub.recv());

    tokio_test::assert_pending!(recv.poll());
    bus.publish(9u16);
    assert!(recv.is_woken());
    tokio_test::assert_ready_eq!(recv.poll(), Some(9));
}

#[test]
fn recv_is_ready_when_backlog_exists() {
    let bus = Bus::new("polled");
    let mut sub = bus.subscribe();
    bus.publish("queued");

    let mut recv = tokio_test::task::spawn(sub.recv());
    tokio_test::assert_ready_eq!(recv.poll(), Some("queued"));
}
