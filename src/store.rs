//! Shared tuning and telemetry store.
//!
//! The store is the daemon's single shared-state surface: the tuning REPL
//! and any external dashboard write tunables into it, the detection
//! pipeline reads one full snapshot per cycle and publishes results back,
//! and streaming connections read the FPS setting on every iteration.
//!
//! Semantics are last-write-wins per key with no cross-key transaction
//! guarantee. Consistency for the pipeline comes from snapshotting: all
//! tunables are read in one call at cycle start, so a tuning change takes
//! effect at the next cycle boundary and never mid-cycle.
//!
//! A missing or wrongly-typed entry always falls back to its documented
//! default; a degraded store is never fatal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::{now_ms, CycleState, DetectionResult, ThresholdConfig};

/// Well-known store keys.
pub mod keys {
    pub const THRESHOLD_LOW_H: &str = "thresholdLowH";
    pub const THRESHOLD_LOW_S: &str = "thresholdLowS";
    pub const THRESHOLD_LOW_L: &str = "thresholdLowL";
    pub const THRESHOLD_HIGH_H: &str = "thresholdHighH";
    pub const THRESHOLD_HIGH_S: &str = "thresholdHighS";
    pub const THRESHOLD_HIGH_L: &str = "thresholdHighL";
    pub const QUALITY: &str = "quality";
    pub const FPS: &str = "fps";
    pub const DISPLAY_MASK: &str = "displayMask";
    pub const CAPTURE_NEXT_FRAME: &str = "captureNextFrame";
    pub const BRIGHTNESS: &str = "brightness";
    pub const ABSOLUTE_EXPOSURE: &str = "absoluteExposure";
    pub const TARGET_ACQUIRED: &str = "targetAcquired";
    pub const TARGET_X: &str = "targetX";
    pub const TARGET_Y: &str = "targetY";
    pub const LAST_UPDATED: &str = "lastUpdated";
    pub const VERSION: &str = "version";
    pub const AUTHOR: &str = "author";
}

pub const DEFAULT_THRESHOLD_LOW_H: i64 = 20;
pub const DEFAULT_THRESHOLD_LOW_S: i64 = 60;
pub const DEFAULT_THRESHOLD_LOW_L: i64 = 40;
pub const DEFAULT_THRESHOLD_HIGH_H: i64 = 40;
pub const DEFAULT_THRESHOLD_HIGH_S: i64 = 255;
pub const DEFAULT_THRESHOLD_HIGH_L: i64 = 255;
pub const DEFAULT_QUALITY: i64 = 50;
pub const DEFAULT_FPS: i64 = 5;
pub const DEFAULT_DISPLAY_MASK: bool = false;
pub const DEFAULT_CAPTURE_NEXT_FRAME: bool = false;
pub const DEFAULT_BRIGHTNESS: i64 = 120;
pub const DEFAULT_ABSOLUTE_EXPOSURE: i64 = 6;
pub const DEFAULT_TARGET_ACQUIRED: bool = false;
pub const DEFAULT_TARGET_X: i64 = 0;
pub const DEFAULT_TARGET_Y: i64 = 0;
pub const DEFAULT_LAST_UPDATED: i64 = -1;

/// A single store entry. Keys are dynamically typed; readers request a
/// concrete type and get the documented default on a mismatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// Thread-safe tuning/telemetry store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct TuningStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl TuningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw put. Last write wins.
    pub fn put(&self, key: &str, value: Value) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
    }

    /// Raw get.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn put_int(&self, key: &str, value: i64) {
        self.put(key, Value::Int(value));
    }

    pub fn put_bool(&self, key: &str, value: bool) {
        self.put(key, Value::Bool(value));
    }

    pub fn put_text(&self, key: &str, value: &str) {
        self.put(key, Value::Text(value.to_string()));
    }

    /// Integer read with fallback. A missing or non-integer entry yields
    /// the default.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Int(v)) => v,
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(v)) => v,
            _ => default,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::Text(v)) => Some(v),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Tunable accessors
    // ------------------------------------------------------------------

    pub fn fps(&self) -> i64 {
        self.get_int(keys::FPS, DEFAULT_FPS)
    }

    pub fn set_fps(&self, value: i64) {
        self.put_int(keys::FPS, value);
    }

    pub fn quality(&self) -> i64 {
        self.get_int(keys::QUALITY, DEFAULT_QUALITY)
    }

    pub fn set_quality(&self, value: i64) {
        self.put_int(keys::QUALITY, value);
    }

    pub fn display_mask(&self) -> bool {
        self.get_bool(keys::DISPLAY_MASK, DEFAULT_DISPLAY_MASK)
    }

    pub fn set_display_mask(&self, value: bool) {
        self.put_bool(keys::DISPLAY_MASK, value);
    }

    pub fn capture_next_frame(&self) -> bool {
        self.get_bool(keys::CAPTURE_NEXT_FRAME, DEFAULT_CAPTURE_NEXT_FRAME)
    }

    pub fn set_capture_next_frame(&self, value: bool) {
        self.put_bool(keys::CAPTURE_NEXT_FRAME, value);
    }

    pub fn brightness(&self) -> i64 {
        self.get_int(keys::BRIGHTNESS, DEFAULT_BRIGHTNESS)
    }

    pub fn set_brightness(&self, value: i64) {
        self.put_int(keys::BRIGHTNESS, value);
    }

    pub fn absolute_exposure(&self) -> i64 {
        self.get_int(keys::ABSOLUTE_EXPOSURE, DEFAULT_ABSOLUTE_EXPOSURE)
    }

    pub fn set_absolute_exposure(&self, value: i64) {
        self.put_int(keys::ABSOLUTE_EXPOSURE, value);
    }

    pub fn set_threshold_low_h(&self, value: i64) {
        self.put_int(keys::THRESHOLD_LOW_H, value);
    }

    pub fn set_threshold_low_s(&self, value: i64) {
        self.put_int(keys::THRESHOLD_LOW_S, value);
    }

    pub fn set_threshold_low_l(&self, value: i64) {
        self.put_int(keys::THRESHOLD_LOW_L, value);
    }

    pub fn set_threshold_high_h(&self, value: i64) {
        self.put_int(keys::THRESHOLD_HIGH_H, value);
    }

    pub fn set_threshold_high_s(&self, value: i64) {
        self.put_int(keys::THRESHOLD_HIGH_S, value);
    }

    pub fn set_threshold_high_l(&self, value: i64) {
        self.put_int(keys::THRESHOLD_HIGH_L, value);
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// One full threshold read. Taken once at cycle start so a mid-cycle
    /// tuning change is never partially applied.
    pub fn threshold_snapshot(&self) -> ThresholdConfig {
        ThresholdConfig {
            low_h: self.get_int(keys::THRESHOLD_LOW_H, DEFAULT_THRESHOLD_LOW_H),
            low_s: self.get_int(keys::THRESHOLD_LOW_S, DEFAULT_THRESHOLD_LOW_S),
            low_l: self.get_int(keys::THRESHOLD_LOW_L, DEFAULT_THRESHOLD_LOW_L),
            high_h: self.get_int(keys::THRESHOLD_HIGH_H, DEFAULT_THRESHOLD_HIGH_H),
            high_s: self.get_int(keys::THRESHOLD_HIGH_S, DEFAULT_THRESHOLD_HIGH_S),
            high_l: self.get_int(keys::THRESHOLD_HIGH_L, DEFAULT_THRESHOLD_HIGH_L),
        }
    }

    /// One full cycle-state read, paired with [`threshold_snapshot`] at
    /// the top of every pipeline cycle.
    ///
    /// [`threshold_snapshot`]: TuningStore::threshold_snapshot
    pub fn cycle_snapshot(&self) -> CycleState {
        CycleState {
            fps: self.fps(),
            quality: self.quality(),
            display_mask: self.display_mask(),
            capture_next_frame: self.capture_next_frame(),
            brightness: self.brightness(),
            absolute_exposure: self.absolute_exposure(),
        }
    }

    /// Publish one detection result. Called exactly once per completed
    /// pipeline cycle, success or failure.
    pub fn publish_detection(&self, result: &DetectionResult) {
        self.put_bool(keys::TARGET_ACQUIRED, result.acquired);
        self.put_int(keys::TARGET_X, result.x);
        self.put_int(keys::TARGET_Y, result.y);
        self.put_int(keys::LAST_UPDATED, result.last_updated_ms);
    }

    /// Read back the last published detection.
    pub fn last_detection(&self) -> DetectionResult {
        DetectionResult {
            acquired: self.get_bool(keys::TARGET_ACQUIRED, DEFAULT_TARGET_ACQUIRED),
            x: self.get_int(keys::TARGET_X, DEFAULT_TARGET_X),
            y: self.get_int(keys::TARGET_Y, DEFAULT_TARGET_Y),
            last_updated_ms: self.get_int(keys::LAST_UPDATED, DEFAULT_LAST_UPDATED),
        }
    }

    /// Announce build metadata once at startup.
    pub fn announce_version(&self, version: &str, author: &str) {
        self.put_text(keys::VERSION, version);
        self.put_text(keys::AUTHOR, author);
    }
}

/// Convenience for publishing an acquired result stamped with the current
/// wall clock.
pub fn acquired_at(x: i64, y: i64) -> DetectionResult {
    DetectionResult {
        acquired: true,
        x,
        y,
        last_updated_ms: now_ms(),
    }
}

/// Convenience for publishing a miss stamped with the current wall clock.
pub fn not_acquired() -> DetectionResult {
    DetectionResult {
        acquired: false,
        x: 0,
        y: 0,
        last_updated_ms: now_ms(),
    }
}
