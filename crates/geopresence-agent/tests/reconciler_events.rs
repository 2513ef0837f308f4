//! EventReconciler: event -> store operation -> redraw -> notify.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{RecordingNotifier, RecordingSurface};
use geopresence_agent::notify::Notification;
use geopresence_agent::obs::AgentMetrics;
use geopresence_agent::reconciler::{EventReconciler, Reaction};
use geopresence_core::protocol::event::decode_event;
use geopresence_core::{GeoPresenceError, Identity, Location, PresenceEvent};

struct Harness {
    reconciler: EventReconciler,
    surface: RecordingSurface,
    notifier: RecordingNotifier,
    metrics: Arc<AgentMetrics>,
}

fn harness(strict_init: bool) -> Harness {
    let surface = RecordingSurface::default();
    let notifier = RecordingNotifier::default();
    let metrics = Arc::new(AgentMetrics::default());
    let reconciler = EventReconciler::new(
        Box::new(surface.clone()),
        Box::new(notifier.clone()),
        Arc::clone(&metrics),
        strict_init,
    );
    Harness {
        reconciler,
        surface,
        notifier,
        metrics,
    }
}

fn snapshot(members: &[&str], me: &str) -> PresenceEvent {
    PresenceEvent::SubscriptionSucceeded {
        members: members
            .iter()
            .map(|m| (Identity::from(*m), serde_json::Value::Null))
            .collect::<BTreeMap<_, _>>(),
        self_id: Identity::from(me),
    }
}

fn located(user: &str, lat: f64, lng: f64) -> PresenceEvent {
    PresenceEvent::LocationUpdate {
        user: Identity::from(user),
        location: Location::new(lat, lng).unwrap(),
    }
}

fn added(id: &str) -> PresenceEvent {
    PresenceEvent::MemberAdded {
        id: Identity::from(id),
        info: None,
    }
}

fn removed(id: &str) -> PresenceEvent {
    PresenceEvent::MemberRemoved {
        id: Identity::from(id),
    }
}

#[test]
fn snapshot_starts_acquisition_and_notifies() {
    let mut h = harness(true);
    let reaction = h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();

    assert_eq!(reaction, Reaction::StartAcquisition);
    assert_eq!(h.notifier.all(), vec![Notification::Synced { online: 2 }]);
    assert_eq!(
        h.surface.last_roster().unwrap(),
        vec![Identity::from("A"), Identity::from("B")]
    );
    assert!(h.metrics.is_synced());
    assert!(h.surface.markers().is_empty());
}

#[test]
fn remote_location_projects_with_remote_label() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();
    assert_eq!(h.reconciler.apply(located("B", 1.0, 2.0)).unwrap(), Reaction::None);

    let markers = h.surface.markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].label, "B's location");
    assert_eq!((markers[0].lat, markers[0].lng), (1.0, 2.0));
    assert_eq!(h.metrics.markers.get(), 1);
}

#[test]
fn every_mutation_redraws() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    h.reconciler.apply(added("B")).unwrap();
    h.reconciler.apply(located("B", 1.0, 1.0)).unwrap();
    h.reconciler.apply(located("B", 2.0, 2.0)).unwrap();
    h.reconciler.apply(removed("B")).unwrap();

    assert_eq!(h.surface.clear_count(), 5);
    assert!(h.surface.markers().is_empty());
}

#[test]
fn location_racing_ahead_of_join_appears_on_join() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    h.reconciler.apply(located("C", 5.0, 6.0)).unwrap();
    assert!(h.surface.markers().is_empty());
    assert_eq!(h.metrics.orphan_locations.get(), 1);

    h.reconciler.apply(added("C")).unwrap();
    let markers = h.surface.markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].label, "C's location");
    assert_eq!((markers[0].lat, markers[0].lng), (5.0, 6.0));
    assert_eq!(h.metrics.orphan_locations.get(), 0);
}

#[test]
fn member_removed_drops_roster_entry_and_marker() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();
    h.reconciler.apply(located("B", 1.0, 2.0)).unwrap();
    h.reconciler.apply(removed("B")).unwrap();

    assert!(!h.reconciler.store().is_member("B"));
    assert!(h.surface.markers().is_empty());
    assert_eq!(h.surface.last_roster().unwrap(), vec![Identity::from("A")]);
    assert_eq!(
        h.notifier.all().last().unwrap(),
        &Notification::Left(Identity::from("B"))
    );
}

#[test]
fn redundant_join_and_leave_notify_once() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    h.reconciler.apply(added("B")).unwrap();
    h.reconciler.apply(added("B")).unwrap();
    h.reconciler.apply(removed("B")).unwrap();
    h.reconciler.apply(removed("B")).unwrap();

    assert_eq!(
        h.notifier.all(),
        vec![
            Notification::Synced { online: 1 },
            Notification::Joined(Identity::from("B")),
            Notification::Left(Identity::from("B")),
        ]
    );
    assert_eq!(
        h.metrics.events_applied.get(&[("event", "pusher:member_added")]),
        2
    );
}

#[test]
fn rejoin_does_not_resurrect_stale_location() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();
    h.reconciler.apply(located("B", 1.0, 2.0)).unwrap();
    h.reconciler.apply(removed("B")).unwrap();
    h.reconciler.apply(added("B")).unwrap();
    assert!(h.surface.markers().is_empty());

    h.reconciler.apply(located("B", 3.0, 4.0)).unwrap();
    assert_eq!(h.surface.markers()[0].lat, 3.0);
}

#[test]
fn local_location_uses_self_label() {
    let mut h = harness(true);
    assert!(h
        .reconciler
        .record_self_location(Location::new(10.0, 20.0).unwrap())
        .is_none());

    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    let me = h
        .reconciler
        .record_self_location(Location::new(10.0, 20.0).unwrap())
        .unwrap();
    h.reconciler.reproject();

    assert_eq!(me.as_str(), "A");
    let markers = h.surface.markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].label, "My location");
}

#[test]
fn strict_mode_rejects_second_snapshot() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    let err = h.reconciler.apply(snapshot(&["Z"], "Z")).unwrap_err();
    assert!(matches!(err, GeoPresenceError::DoubleInitialization));
    assert_eq!(h.reconciler.store().self_id().unwrap().as_str(), "A");
}

#[test]
fn lenient_mode_ignores_second_snapshot() {
    let mut h = harness(false);
    h.reconciler.apply(snapshot(&["A"], "A")).unwrap();
    let reaction = h.reconciler.apply(snapshot(&["Z"], "Z")).unwrap();

    assert_eq!(reaction, Reaction::Ignored);
    assert!(!h.reconciler.store().is_member("Z"));
    assert_eq!(h.metrics.events_ignored.get(&[("reason", "double_init")]), 1);
}

#[test]
fn removal_of_local_user_is_ignored() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();
    h.reconciler
        .record_self_location(Location::new(10.0, 20.0).unwrap())
        .unwrap();
    h.reconciler.reproject();
    let clears = h.surface.clear_count();

    assert_eq!(h.reconciler.apply(removed("A")).unwrap(), Reaction::Ignored);
    assert!(h.reconciler.store().is_member("A"));
    assert!(h.reconciler.store().location_of("A").is_some());
    assert_eq!(h.surface.clear_count(), clears);
    assert!(!h.notifier.all().contains(&Notification::Left(Identity::from("A"))));
    assert_eq!(h.metrics.events_ignored.get(&[("reason", "self_removed")]), 1);
    assert_eq!(h.metrics.events_applied.get(&[("event", "pusher:member_removed")]), 0);

    // later samples still project as the local marker
    h.reconciler
        .record_self_location(Location::new(11.0, 21.0).unwrap())
        .unwrap();
    h.reconciler.reproject();
    let markers = h.surface.markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].label, "My location");
    assert_eq!(markers[0].lat, 11.0);
}

#[test]
fn end_discards_state_and_clears_surface() {
    let mut h = harness(true);
    h.reconciler.apply(snapshot(&["A", "B"], "A")).unwrap();
    h.reconciler.apply(located("B", 1.0, 2.0)).unwrap();

    h.reconciler.end();
    assert!(!h.reconciler.store().is_initialized());
    assert!(h.surface.markers().is_empty());
    assert_eq!(h.surface.last_roster().unwrap(), Vec::<Identity>::new());
    assert!(!h.metrics.is_synced());

    // a new lifecycle may snapshot again
    assert_eq!(
        h.reconciler.apply(snapshot(&["C"], "C")).unwrap(),
        Reaction::StartAcquisition
    );
}

#[test]
fn decoded_frames_drive_the_reconciler() {
    let mut h = harness(true);
    let frames = [
        r#"{"event":"pusher:subscription_succeeded","channel":"presence-channel","data":{"members":{"A":{},"B":{}},"myID":"A"}}"#,
        r#"{"event":"location-update","channel":"presence-channel","data":"{\"username\":\"B\",\"location\":{\"lat\":1,\"lng\":2}}"}"#,
        r#"{"event":"pusher:member_removed","channel":"presence-channel","data":{"user_id":"B"}}"#,
    ];

    for f in frames {
        h.reconciler.apply(decode_event(f.as_bytes()).unwrap()).unwrap();
    }
    assert!(h.surface.markers().is_empty());
    assert_eq!(h.reconciler.store().online_users(), vec![Identity::from("A")]);
}
