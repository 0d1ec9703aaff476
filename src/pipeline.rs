//! Detection pipeline: capture → segment → detect → annotate → encode →
//! publish, on a self-pacing schedule.
//!
//! One cycle reads a full tunables snapshot, pulls one frame, finds the
//! best template match among plausible contours, publishes exactly one
//! detection result, and swaps the encoded frame into the shared slot.
//! Nothing inside a cycle may take the schedule down: every failure is
//! caught at the cycle boundary, logged, and swallowed.
//!
//! Pacing is deadline-based on the monotonic clock: the next cycle starts
//! `max(0, period − elapsed)` after this one began, where
//! `period = 1000 / fps` ms. A slow cycle shrinks the following delay
//! toward zero but cycles are never skipped or doubled to catch up; at
//! most one cycle is ever in flight.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};

use crate::camctl::CameraControl;
use crate::detect::annotate::{
    draw_contour, draw_filled_circle, draw_hollow_rect, COLOR_GRAY, COLOR_RED, COLOR_WHITE,
    COLOR_YELLOW,
};
use crate::detect::{
    find_external_contours, in_range, mask_to_rgb, plausible_target_size, rgb_to_hls,
    select_candidate, Contour, TargetTemplate,
};
use crate::framebuf::FrameBuffer;
use crate::ingest::CameraSource;
use crate::store::{acquired_at, not_acquired, TuningStore};
use crate::now_ms;

/// Midpoint marker radius, matching the overlay the drive team trains on.
const MARKER_RADIUS: i64 = 6;

/// Period for a target frame rate. Zero or negative rates degrade to a
/// zero period (run as fast as possible) rather than failing.
pub fn period_for_fps(fps: i64) -> Duration {
    if fps <= 0 {
        return Duration::ZERO;
    }
    Duration::from_millis((1000.0 / fps as f64) as u64)
}

pub struct DetectionPipeline {
    source: CameraSource,
    store: TuningStore,
    frames: FrameBuffer,
    template: TargetTemplate,
    camera: CameraControl,
    capture_dir: PathBuf,
}

impl DetectionPipeline {
    pub fn new(
        source: CameraSource,
        store: TuningStore,
        frames: FrameBuffer,
        template: TargetTemplate,
        camera: CameraControl,
        capture_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            store,
            frames,
            template,
            camera,
            capture_dir,
        }
    }

    /// Run cycles until the shutdown flag is raised.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!(
            "detection pipeline running on {} ({} fps target)",
            self.source.device(),
            self.store.fps()
        );
        while !shutdown.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();
            self.run_cycle();
            let delay = period_for_fps(self.store.fps()).saturating_sub(cycle_start.elapsed());
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        log::info!("detection pipeline stopped");
    }

    /// Execute one cycle. Failures are logged and swallowed here so the
    /// schedule always continues.
    pub fn run_cycle(&mut self) {
        if let Err(err) = self.process() {
            log::error!("cycle failed: {err:#}");
        }
    }

    fn process(&mut self) -> Result<()> {
        // One full snapshot of all tunables; a tuning change lands at the
        // next cycle boundary, never mid-cycle.
        let state = self.store.cycle_snapshot();
        let thresholds = self.store.threshold_snapshot();

        self.camera.apply_brightness(state.brightness);
        self.camera.apply_absolute_exposure(state.absolute_exposure);

        let frame = self.source.read().context("capture frame")?;
        let stamp_ms = now_ms();

        if state.capture_next_frame {
            self.save_rgb("original", stamp_ms, &frame);
        }

        let hls = rgb_to_hls(&frame);
        let mask = in_range(&hls, &thresholds);

        if state.capture_next_frame {
            self.save_gray("mask", stamp_ms, &mask);
        }

        // Visualization only; detection keeps using the mask either way.
        let mut working = if state.display_mask {
            mask_to_rgb(&mask)
        } else {
            frame
        };

        let contours = find_external_contours(&mask);
        for contour in &contours {
            draw_contour(&mut working, contour, COLOR_GRAY);
        }

        let survivors: Vec<&Contour> = contours
            .iter()
            .filter(|c| plausible_target_size(c.bounding_box()))
            .collect();
        for contour in &survivors {
            draw_contour(&mut working, contour, COLOR_YELLOW);
        }

        let result = match select_candidate(&survivors, &self.template) {
            Some(candidate) => {
                let bbox = candidate.bounding_box();
                let (x, y) = bbox.midpoint();
                draw_hollow_rect(&mut working, bbox, COLOR_WHITE);
                draw_filled_circle(&mut working, x, y, MARKER_RADIUS, COLOR_RED);
                acquired_at(x, y)
            }
            None => not_acquired(),
        };

        // Result before frame: a reader that already sees the new frame
        // also sees the matching coordinates.
        self.store.publish_detection(&result);

        let jpeg = encode_jpeg(&working, state.quality).context("encode frame")?;
        self.frames.publish(jpeg);

        if state.capture_next_frame {
            self.save_rgb("marked", stamp_ms, &working);
            self.store.set_capture_next_frame(false);
        }

        Ok(())
    }

    fn save_rgb(&self, kind: &str, stamp_ms: i64, image: &RgbImage) {
        let path = self.capture_dir.join(format!("{kind}_{stamp_ms}.jpg"));
        match image.save(&path) {
            Ok(()) => log::info!("captured {}", path.display()),
            Err(err) => log::error!("could not save {}: {err}", path.display()),
        }
    }

    fn save_gray(&self, kind: &str, stamp_ms: i64, image: &GrayImage) {
        let path = self.capture_dir.join(format!("{kind}_{stamp_ms}.jpg"));
        match image.save(&path) {
            Ok(()) => log::info!("captured {}", path.display()),
            Err(err) => log::error!("could not save {}: {err}", path.display()),
        }
    }
}

/// Encode the working image as JPEG at the configured quality.
fn encode_jpeg(image: &RgbImage, quality: i64) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    let quality = quality.clamp(1, 100) as u8;
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(image)
        .context("JPEG encode")?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SYNTHETIC_TARGET;
    use crate::store::keys;
    use crate::ThresholdConfig;
    use image::Rgb;

    fn template_for_synthetic_target() -> TargetTemplate {
        // Half-scale copy of the synthetic bar; shape scoring is scale
        // invariant, so it still matches best.
        let mut reference = RgbImage::new(160, 120);
        for y in 40..60 {
            for x in 20..80 {
                reference.put_pixel(x, y, Rgb([255, 255, 0]));
            }
        }
        TargetTemplate::from_image(&reference, &ThresholdConfig::default()).unwrap()
    }

    fn pipeline_with_stub(store: TuningStore, frames: FrameBuffer, dir: PathBuf) -> DetectionPipeline {
        DetectionPipeline::new(
            CameraSource::open("stub://test").unwrap(),
            store,
            frames,
            template_for_synthetic_target(),
            CameraControl::new(),
            dir,
        )
    }

    #[test]
    fn period_degrades_to_zero_for_non_positive_fps() {
        assert_eq!(period_for_fps(0), Duration::ZERO);
        assert_eq!(period_for_fps(-3), Duration::ZERO);
        assert_eq!(period_for_fps(5), Duration::from_millis(200));
        assert_eq!(period_for_fps(3), Duration::from_millis(333));
    }

    #[test]
    fn cycle_acquires_synthetic_target_at_midpoint() {
        let store = TuningStore::new();
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();

        let detection = store.last_detection();
        assert!(detection.acquired);
        let (tx, ty, tw, th) = SYNTHETIC_TARGET;
        assert_eq!(detection.x, (tx + tw / 2) as i64);
        assert_eq!(detection.y, (ty + th / 2) as i64);
        assert!(detection.last_updated_ms > 0);
    }

    #[test]
    fn frame_buffer_holds_jpeg_after_successful_cycle() {
        let store = TuningStore::new();
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();

        let snap = frames.snapshot();
        assert!(!snap.is_empty());
        assert_eq!(&snap[0..2], &[0xFF, 0xD8], "JPEG magic bytes");
    }

    #[test]
    fn out_of_threshold_scene_publishes_not_acquired() {
        let store = TuningStore::new();
        // Move the hue window away from the synthetic yellow target.
        store.set_threshold_low_h(100);
        store.set_threshold_high_h(120);
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();

        let detection = store.last_detection();
        assert!(!detection.acquired);
        assert_eq!((detection.x, detection.y), (0, 0));
        assert!(detection.last_updated_ms > 0, "miss is still published");
    }

    #[test]
    fn capture_next_frame_is_one_shot_and_persists_three_images() {
        let store = TuningStore::new();
        store.set_capture_next_frame(true);
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();

        assert!(!store.capture_next_frame(), "flag cleared after the cycle");
        let mut kinds: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        kinds.sort();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.iter().any(|n| n.starts_with("original_")));
        assert!(kinds.iter().any(|n| n.starts_with("mask_")));
        assert!(kinds.iter().any(|n| n.starts_with("marked_")));

        // Next cycle must not write again.
        pipeline.run_cycle();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn display_mask_changes_visualization_not_detection() {
        let store = TuningStore::new();
        store.set_display_mask(true);
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();

        assert!(store.last_detection().acquired);
        assert!(!frames.snapshot().is_empty());
    }

    #[test]
    fn blank_scene_publishes_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("blank.png");
        RgbImage::new(64, 64).save(&scene).unwrap();
        let source = CameraSource::open(scene.to_str().unwrap()).unwrap();

        let store = TuningStore::new();
        let frames = FrameBuffer::new();
        let mut pipeline = DetectionPipeline::new(
            source,
            store.clone(),
            frames,
            template_for_synthetic_target(),
            CameraControl::new(),
            dir.path().to_path_buf(),
        );
        pipeline.run_cycle();
        let detection = store.last_detection();
        assert!(!detection.acquired);
        assert_eq!((detection.x, detection.y), (0, 0));
    }

    #[test]
    fn store_keys_updated_for_every_completed_cycle() {
        let store = TuningStore::new();
        let frames = FrameBuffer::new();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            pipeline_with_stub(store.clone(), frames.clone(), dir.path().to_path_buf());

        pipeline.run_cycle();
        let first = store.get_int(keys::LAST_UPDATED, -1);
        assert!(first > 0);
    }
}
