//! V4L2 capture backend.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates an RGB24
//! format at the requested geometry, and memory-maps a small buffer ring.
//! If the driver refuses the requested format or geometry the negotiated
//! values win and the difference is logged.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

/// Live V4L2 capture device.
pub struct V4l2Device {
    path: String,
    width: u32,
    height: u32,
    state: Option<V4l2State>,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Device {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            path: path.to_string(),
            width: crate::ingest::DEFAULT_WIDTH,
            height: crate::ingest::DEFAULT_HEIGHT,
            state: None,
        })
    }

    /// Negotiate format and start the capture stream. Called lazily from
    /// the first `read()` if `configure` was never invoked.
    pub fn configure(&mut self, width: u32, height: u32) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        self.state = None;

        let mut device = v4l::Device::with_path(&self.path)
            .with_context(|| format!("open v4l2 device {}", self.path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = width;
        format.height = height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {}: {}", self.path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            bail!(
                "device {} cannot supply RGB24 (negotiated {})",
                self.path,
                format.fourcc
            );
        }
        if format.width != width || format.height != height {
            log::warn!(
                "device {} negotiated {}x{} instead of {}x{}",
                self.path,
                format.width,
                format.height,
                width,
                height
            );
        }
        self.width = format.width;
        self.height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "camera connected: {} ({}x{})",
            self.path,
            self.width,
            self.height
        );
        Ok(())
    }

    pub fn read(&mut self) -> Result<RgbImage> {
        use v4l::io::traits::CaptureStream;

        if self.state.is_none() {
            let (width, height) = (self.width, self.height);
            self.configure(width, height)?;
        }
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_stream_mut(|stream| stream.next())
            .context("capture v4l2 frame")?;

        let expected = (self.width * self.height * 3) as usize;
        if buf.len() < expected {
            bail!(
                "short v4l2 frame: got {} bytes, expected {}",
                buf.len(),
                expected
            );
        }
        RgbImage::from_raw(self.width, self.height, buf[..expected].to_vec())
            .context("assemble RGB frame from v4l2 buffer")
    }
}
