//! Real-time target tracking for a competition robot.
//!
//! The daemon repeatedly captures camera frames, locates a known target
//! pattern by color segmentation and shape matching, publishes target
//! coordinates to a shared tuning/telemetry store, and serves the
//! annotated video as a live MJPEG stream to any number of monitoring
//! clients.
//!
//! # Architecture
//!
//! Two core components share exactly one object:
//!
//! - the [`pipeline::DetectionPipeline`] runs a self-pacing cycle
//!   (capture → segment → detect → annotate → encode → publish) and is
//!   the sole writer of the [`framebuf::FrameBuffer`] and of the
//!   published detection keys;
//! - the [`stream::StreamServer`] accepts TCP connections and fans the
//!   latest encoded frame out, each connection on its own worker with
//!   its own timing loop.
//!
//! They never hold a common lock; the frame slot is replaced wholesale on
//! publish, so readers always see one complete frame. Tunables live in
//! the [`store::TuningStore`], read as one full snapshot per pipeline
//! cycle.
//!
//! # Module Structure
//!
//! - `store`: shared tunables and published results
//! - `ingest`: camera frame sources (stub, still image, V4L2)
//! - `detect`: masking, contours, shape matching, overlays
//! - `pipeline`: the detection cycle and its schedule
//! - `framebuf` / `stream`: latest-frame slot and MJPEG fan-out
//! - `camctl` / `repl` / `config`: hardware knobs, console tuning, setup

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod camctl;
pub mod config;
pub mod detect;
pub mod framebuf;
pub mod ingest;
pub mod pipeline;
pub mod repl;
pub mod store;
pub mod stream;

pub use camctl::CameraControl;
pub use config::TargetdConfig;
pub use detect::TargetTemplate;
pub use framebuf::FrameBuffer;
pub use ingest::CameraSource;
pub use pipeline::DetectionPipeline;
pub use store::TuningStore;
pub use stream::StreamServer;

/// Milliseconds since the Unix epoch, for `lastUpdated` stamps and debug
/// capture filenames.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// -------------------- Core data model --------------------

/// The six segmentation bounds. Re-read in full at the start of every
/// cycle; never partially applied mid-cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub low_h: i64,
    pub low_s: i64,
    pub low_l: i64,
    pub high_h: i64,
    pub high_s: i64,
    pub high_l: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_h: store::DEFAULT_THRESHOLD_LOW_H,
            low_s: store::DEFAULT_THRESHOLD_LOW_S,
            low_l: store::DEFAULT_THRESHOLD_LOW_L,
            high_h: store::DEFAULT_THRESHOLD_HIGH_H,
            high_s: store::DEFAULT_THRESHOLD_HIGH_S,
            high_l: store::DEFAULT_THRESHOLD_HIGH_L,
        }
    }
}

/// Per-cycle runtime state, snapshotted together with the thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    pub fps: i64,
    pub quality: i64,
    pub display_mask: bool,
    pub capture_next_frame: bool,
    pub brightness: i64,
    pub absolute_exposure: i64,
}

/// One published detection. Exactly one is published per completed cycle,
/// acquired or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub acquired: bool,
    pub x: i64,
    pub y: i64,
    pub last_updated_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_documented_values() {
        let t = ThresholdConfig::default();
        assert_eq!(
            (t.low_h, t.low_s, t.low_l, t.high_h, t.high_s, t.high_l),
            (20, 60, 40, 40, 255, 255)
        );
    }

    #[test]
    fn now_ms_is_monotone_enough_for_stamps() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000, "epoch millis expected");
    }
}
