use crate::foundation::core::{Fps, FrameIndex, FrameRGBA};
use crate::foundation::error::{VidloomError, VidloomResult};
use std::path::PathBuf;

/// Handed to a [`FrameSink`] once, before the first frame.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Raw PCM track to mux alongside the frames, if any.
    pub audio: Option<AudioInputConfig>,
}

impl SinkConfig {
    /// Reject configurations no sink can encode.
    pub fn validate(&self) -> VidloomResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VidloomError::render("sink width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(VidloomError::render("sink fps must be non-zero"));
        }
        if let Some(audio) = self.audio.as_ref() {
            audio.validate()?;
        }
        Ok(())
    }

    /// Byte length of one RGBA8 frame at this resolution.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A raw PCM audio input for sinks that mux audio.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

impl AudioInputConfig {
    /// PCM input at the mixing defaults, 48 kHz stereo.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sample_rate: 48_000,
            channels: 2,
        }
    }

    fn validate(&self) -> VidloomResult<()> {
        if self.sample_rate == 0 {
            return Err(VidloomError::render("audio sample_rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(VidloomError::render("audio channels must be non-zero"));
        }
        Ok(())
    }
}

/// Consumer of rendered frames in output order.
///
/// `push_frame` is called with strictly increasing `FrameIndex` values between one
/// `begin` and one `end`.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> VidloomResult<()>;
    /// Push one frame in strictly increasing order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> VidloomResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> VidloomResult<()>;
}

/// Sink that keeps every frame in memory, for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured by `begin`, if `begin` ran.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> VidloomResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> VidloomResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> VidloomResult<()> {
        Ok(())
    }
}
