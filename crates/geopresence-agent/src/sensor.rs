//! Device position sensor seam.
//!
//! A `LocationSource` is started once and yields readings until it is dropped.
//! It cannot be restarted: a second `watch` fails.

use std::fs;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use geopresence_core::error::{GeoPresenceError, Result};
use geopresence_core::{Sample, SensorFailure};

use crate::config::SensorSection;

pub type SensorReading = std::result::Result<Sample, SensorFailure>;
pub type SampleStream = BoxStream<'static, SensorReading>;

pub trait LocationSource: Send {
    /// Start the continuous subscription.
    ///
    /// Returns `SensorUnavailable` when the device has no geolocation.
    fn watch(&mut self) -> Result<SampleStream>;
}

fn already_started() -> GeoPresenceError {
    GeoPresenceError::Internal("location source already started".into())
}

/// Device without geolocation capability.
#[derive(Debug, Default)]
pub struct UnavailableSensor;

impl LocationSource for UnavailableSensor {
    fn watch(&mut self) -> Result<SampleStream> {
        Err(GeoPresenceError::SensorUnavailable)
    }
}

/// Sensor fed through an mpsc channel (embedding and tests).
pub struct ChannelSensor {
    rx: Option<mpsc::Receiver<SensorReading>>,
}

impl ChannelSensor {
    pub fn new(capacity: usize) -> (mpsc::Sender<SensorReading>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx: Some(rx) })
    }
}

impl LocationSource for ChannelSensor {
    fn watch(&mut self) -> Result<SampleStream> {
        let rx = self.rx.take().ok_or_else(already_started)?;
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|reading| (reading, rx))
        })
        .boxed())
    }
}

/// Replays a fixed list of samples, one per interval.
pub struct ReplaySensor {
    samples: Option<Vec<Sample>>,
    interval: Duration,
}

impl ReplaySensor {
    pub fn new(samples: Vec<Sample>, interval: Duration) -> Self {
        Self {
            samples: Some(samples),
            interval,
        }
    }

    /// Load samples from a YAML list of `{ location: {lat, lng}, accuracy_m }`.
    pub fn from_file(path: &str, interval: Duration) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| GeoPresenceError::Config(format!("read replay file failed: {e}")))?;
        let samples: Vec<Sample> = serde_yaml::from_str(&s)
            .map_err(|e| GeoPresenceError::Config(format!("invalid replay file: {e}")))?;
        Ok(Self::new(samples, interval))
    }
}

impl LocationSource for ReplaySensor {
    fn watch(&mut self) -> Result<SampleStream> {
        let samples = self.samples.take().ok_or_else(already_started)?;
        let interval = self.interval;
        Ok(stream::iter(samples)
            .then(move |sample| async move {
                tokio::time::sleep(interval).await;
                Ok::<_, SensorFailure>(sample)
            })
            .boxed())
    }
}

/// Build the configured source.
pub fn from_config(cfg: &SensorSection) -> Result<Box<dyn LocationSource>> {
    if !cfg.enabled {
        return Ok(Box::new(UnavailableSensor));
    }
    match &cfg.replay_file {
        Some(path) => Ok(Box::new(ReplaySensor::from_file(
            path,
            Duration::from_millis(cfg.replay_interval_ms),
        )?)),
        None => Ok(Box::new(UnavailableSensor)),
    }
}
