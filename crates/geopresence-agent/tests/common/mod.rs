//! Shared fixtures for agent integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::{watch, Semaphore};

use geopresence_agent::config::{self, AgentConfig};
use geopresence_agent::notify::{Notification, Notifier};
use geopresence_agent::publisher::PersistenceSink;
use geopresence_agent::surface::{MapSnapshot, MapSurface};
use geopresence_core::error::{GeoPresenceError, Result};
use geopresence_core::protocol::location::LocationUpdate;
use geopresence_core::{Identity, MarkerView, Viewport};

pub const CHANNEL: &str = "presence-channel";

pub fn test_config(extra: &str) -> AgentConfig {
    let base = r#"
version: 1
transport:
  app_key: "test-key"
  auth_endpoint: "http://localhost:3000/pusher/auth"
  cluster: "ap2"
backend:
  api_base_url: "http://localhost:3000"
"#;
    config::load_from_str(&format!("{base}{extra}")).expect("test config")
}

pub fn strict(strict_init: bool) -> String {
    format!("session:\n  strict_init: {strict_init}\n")
}

// ---- frames

pub fn snapshot(members: &[&str], me: &str) -> Bytes {
    let members: serde_json::Map<String, serde_json::Value> = members
        .iter()
        .map(|m| (m.to_string(), json!({})))
        .collect();
    frame("pusher:subscription_succeeded", json!({ "members": members, "myID": me }))
}

pub fn location(user: &str, lat: f64, lng: f64) -> Bytes {
    frame(
        "location-update",
        json!({ "username": user, "location": { "lat": lat, "lng": lng } }),
    )
}

pub fn member_added(id: &str) -> Bytes {
    frame("pusher:member_added", json!({ "id": id }))
}

pub fn member_removed(id: &str) -> Bytes {
    frame("pusher:member_removed", json!({ "id": id }))
}

pub fn frame(event: &str, data: serde_json::Value) -> Bytes {
    Bytes::from(
        json!({ "event": event, "channel": CHANNEL, "data": data }).to_string(),
    )
}

// ---- surface

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCmd {
    Viewport(Viewport),
    Clear,
    Draw(MarkerView),
    Roster(Vec<Identity>),
}

/// Surface recording every command; `markers()` returns the last redraw.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    pub cmds: Arc<Mutex<Vec<SurfaceCmd>>>,
}

impl RecordingSurface {
    pub fn markers(&self) -> Vec<MarkerView> {
        let cmds = self.cmds.lock().unwrap();
        let last_clear = cmds
            .iter()
            .rposition(|c| *c == SurfaceCmd::Clear)
            .map(|i| i + 1)
            .unwrap_or(0);
        cmds[last_clear..]
            .iter()
            .filter_map(|c| match c {
                SurfaceCmd::Draw(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.cmds
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                SurfaceCmd::Viewport(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn clear_count(&self) -> usize {
        self.cmds
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == SurfaceCmd::Clear)
            .count()
    }

    pub fn last_roster(&self) -> Option<Vec<Identity>> {
        self.cmds
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                SurfaceCmd::Roster(r) => Some(r.clone()),
                _ => None,
            })
    }
}

impl MapSurface for RecordingSurface {
    fn set_viewport(&mut self, viewport: Viewport) {
        self.cmds.lock().unwrap().push(SurfaceCmd::Viewport(viewport));
    }

    fn clear_markers(&mut self) {
        self.cmds.lock().unwrap().push(SurfaceCmd::Clear);
    }

    fn draw_marker(&mut self, marker: &MarkerView) {
        self.cmds.lock().unwrap().push(SurfaceCmd::Draw(marker.clone()));
    }

    fn set_roster(&mut self, online: &[Identity]) {
        self.cmds.lock().unwrap().push(SurfaceCmd::Roster(online.to_vec()));
    }
}

// ---- notifier

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, n: Notification) {
        self.seen.lock().unwrap().push(n);
    }
}

// ---- persistence sinks

/// Records bodies; fails with a non-200 status when `fail` is set. When a gate
/// is present every call waits for one permit first.
#[derive(Clone, Default)]
pub struct FakeSink {
    pub bodies: Arc<Mutex<Vec<LocationUpdate>>>,
    pub fail: bool,
    pub gate: Option<Arc<Semaphore>>,
}

impl FakeSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

#[async_trait]
impl PersistenceSink for FakeSink {
    async fn update_location(&self, body: &LocationUpdate) -> Result<()> {
        self.bodies.lock().unwrap().push(body.clone());
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.unwrap();
            permit.forget();
        }
        if self.fail {
            return Err(GeoPresenceError::Persistence("unexpected status 500".into()));
        }
        Ok(())
    }
}

// ---- waiting helpers

/// Poll `cond` every 5ms for up to 2s.
pub async fn eventually<F: FnMut() -> bool>(what: &str, mut cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the published map snapshot satisfies `cond`.
pub async fn snapshot_until<F: Fn(&MapSnapshot) -> bool>(
    rx: &mut watch::Receiver<MapSnapshot>,
    what: &str,
    cond: F,
) -> MapSnapshot {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let snap = rx.borrow_and_update();
                if cond(&snap) {
                    return snap.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("surface dropped while waiting for: {what}");
            }
        }
    })
    .await;
    waited.unwrap_or_else(|_| panic!("timed out waiting for: {what}"))
}
