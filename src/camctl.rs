//! Camera hardware control via `v4l2-ctl`.
//!
//! Brightness and exposure are driver controls, not per-frame data, so
//! they are pushed out-of-band by shelling out to `v4l2-ctl`. All calls
//! are fire-and-forget: a missing binary or an unhappy driver is logged
//! and never propagated into the pipeline. Setters cache the last applied
//! value and only shell out when it changes.

use std::process::Command;

const V4L2_CTL: &str = "/usr/bin/v4l2-ctl";

/// Cached, fire-and-forget camera control writer.
#[derive(Default)]
pub struct CameraControl {
    brightness: Option<i64>,
    absolute_exposure: Option<i64>,
}

impl CameraControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the driver to manual exposure. Applied once at startup so
    /// the absolute-exposure control takes effect.
    pub fn set_manual_exposure(&self) {
        run_control("exposure_auto=1");
    }

    /// Apply a brightness value if it differs from the last one applied.
    pub fn apply_brightness(&mut self, value: i64) {
        if self.brightness == Some(value) {
            return;
        }
        self.brightness = Some(value);
        run_control(&format!("brightness={value}"));
    }

    /// Apply an absolute exposure value if it differs from the last one
    /// applied.
    pub fn apply_absolute_exposure(&mut self, value: i64) {
        if self.absolute_exposure == Some(value) {
            return;
        }
        self.absolute_exposure = Some(value);
        run_control(&format!("exposure_absolute={value}"));
    }
}

fn run_control(ctrl: &str) {
    match Command::new(V4L2_CTL).arg("--set-ctrl").arg(ctrl).spawn() {
        Ok(_) => log::debug!("camera control applied: {ctrl}"),
        Err(err) => log::error!("could not apply camera control {ctrl}: {err}"),
    }
}
