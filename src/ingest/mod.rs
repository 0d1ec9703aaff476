//! Frame sources.
//!
//! A source hands the pipeline one decoded RGB frame per `read()`. Three
//! backends sit behind one type, selected by the device string:
//! - `stub://<name>`: deterministic synthetic scene (always available,
//!   used by tests and bench runs without hardware);
//! - a path to a still image: the same decoded frame on every read;
//! - `/dev/video*`: a live V4L2 capture device (feature `ingest-v4l2`).
//!
//! Capture failures are reported per read; the pipeline logs them and
//! keeps its schedule.

#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

/// Default capture geometry.
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// A camera (or camera stand-in) producing RGB frames.
pub struct CameraSource {
    backend: Backend,
    device: String,
    frames_captured: u64,
}

enum Backend {
    Synthetic(SyntheticSource),
    Still(StillImageSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::V4l2Device),
}

impl CameraSource {
    /// Open a source for the given device string.
    pub fn open(device: &str) -> Result<Self> {
        let backend = if device.starts_with("stub://") {
            Backend::Synthetic(SyntheticSource::new(DEFAULT_WIDTH, DEFAULT_HEIGHT))
        } else if device.starts_with("/dev/") {
            #[cfg(feature = "ingest-v4l2")]
            {
                Backend::Device(v4l2::V4l2Device::open(device)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                anyhow::bail!("device '{device}' requires the ingest-v4l2 feature")
            }
        } else {
            Backend::Still(StillImageSource::open(device)?)
        };
        Ok(Self {
            backend,
            device: device.to_string(),
            frames_captured: 0,
        })
    }

    /// Request a capture geometry. Backends that cannot honour it keep
    /// their native geometry and log the difference.
    pub fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        match &mut self.backend {
            Backend::Synthetic(source) => {
                source.width = width;
                source.height = height;
                Ok(())
            }
            Backend::Still(_) => Ok(()),
            #[cfg(feature = "ingest-v4l2")]
            Backend::Device(device) => device.configure(width, height),
        }
    }

    /// Capture one frame.
    pub fn read(&mut self) -> Result<RgbImage> {
        let frame = match &mut self.backend {
            Backend::Synthetic(source) => Ok::<_, anyhow::Error>(source.next_frame()),
            Backend::Still(source) => Ok(source.frame.clone()),
            #[cfg(feature = "ingest-v4l2")]
            Backend::Device(device) => device.read(),
        }?;
        self.frames_captured += 1;
        Ok(frame)
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and hardware-free runs
// ----------------------------------------------------------------------------

/// Geometry of the synthetic scene's target bar. Yellow on black, so it
/// falls inside the default threshold bounds; midpoint lands at the frame
/// centre for the default 640x480 geometry.
pub const SYNTHETIC_TARGET: (u32, u32, u32, u32) = (260, 220, 120, 40);

struct SyntheticSource {
    width: u32,
    height: u32,
}

impl SyntheticSource {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn next_frame(&mut self) -> RgbImage {
        let (tx, ty, tw, th) = SYNTHETIC_TARGET;
        let mut frame = RgbImage::new(self.width, self.height);
        for y in ty..(ty + th).min(self.height) {
            for x in tx..(tx + tw).min(self.width) {
                frame.put_pixel(x, y, Rgb([255, 255, 0]));
            }
        }
        frame
    }
}

// ----------------------------------------------------------------------------
// Still-image source
// ----------------------------------------------------------------------------

struct StillImageSource {
    frame: RgbImage,
}

impl StillImageSource {
    fn open(path: &str) -> Result<Self> {
        let frame = image::open(path)
            .with_context(|| format!("open still-image source {path}"))?
            .to_rgb8();
        Ok(Self { frame })
    }
}
