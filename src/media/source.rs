//! Frame and sample extraction: still images decoded in-process, video frames
//! and audio pulled through ffmpeg, with a bounded per-source frame cache.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use crate::foundation::error::{VidloomError, VidloomResult};
use crate::foundation::math::mul_div255_u8;
use crate::media::probe::{MediaInfo, probe_media};

/// Interleaved f32 PCM pulled from a media file.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Playable length in seconds.
    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.interleaved_f32.len() as f64 / (f64::from(self.sample_rate) * f64::from(self.channels))
    }

    /// Shorten to at most `secs`, keeping whole sample frames.
    pub fn truncate_to(&mut self, secs: f64) {
        if secs <= 0.0 {
            self.interleaved_f32.clear();
            return;
        }
        let per_channel = (secs * f64::from(self.sample_rate)).floor() as usize;
        let max_len = per_channel.saturating_mul(usize::from(self.channels));
        if self.interleaved_f32.len() > max_len {
            self.interleaved_f32.truncate(max_len);
        }
    }

    /// Serialize as little-endian f32 bytes, the layout ffmpeg's `f32le` reader expects.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.interleaved_f32.len() * 4);
        for sample in &self.interleaved_f32 {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}

/// Decode the full audio track of `path` to stereo f32 at `sample_rate`.
///
/// Files without an audio stream decode to empty PCM rather than an error, so
/// callers can treat silent video inputs uniformly.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> VidloomResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| VidloomError::render(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a missing audio stream as an error; map that to empty PCM.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate,
                channels: 2,
                interleaved_f32: Vec::new(),
            });
        }
        return Err(VidloomError::render(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(VidloomError::render(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: pcm,
    })
}

pub(crate) fn decode_video_frames_rgba8(
    info: &MediaInfo,
    start_time_s: f64,
    frame_count: u32,
) -> VidloomResult<Vec<Vec<u8>>> {
    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{start_time_s:.9}")])
        .arg("-i")
        .arg(&info.source_path)
        .args([
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| VidloomError::render(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(VidloomError::render(format!(
            "ffmpeg video decode failed for '{}': {}",
            info.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let frame_len = info.width as usize * info.height as usize * 4;
    if frame_len == 0 {
        return Err(VidloomError::render(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if out.stdout.len() < frame_len || !out.stdout.len().is_multiple_of(frame_len) {
        return Err(VidloomError::render(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {frame_len}",
            out.stdout.len()
        )));
    }

    let available = (out.stdout.len() / frame_len).min(frame_count as usize);
    let mut frames = Vec::with_capacity(available);
    for idx in 0..available {
        let off = idx * frame_len;
        frames.push(out.stdout[off..off + frame_len].to_vec());
    }
    Ok(frames)
}

fn decode_video_frame_rgba8(info: &MediaInfo, source_time_s: f64) -> VidloomResult<Vec<u8>> {
    let mut frames = decode_video_frames_rgba8(info, source_time_s, 1)?;
    frames.pop().ok_or_else(|| {
        VidloomError::render(format!(
            "ffmpeg returned no video frames for '{}' at {source_time_s:.3}s",
            info.source_path.display()
        ))
    })
}

/// A still image decoded once and held as a premultiplied paint.
#[derive(Clone, Debug)]
pub struct StillSource {
    width: u32,
    height: u32,
    paint: vello_cpu::Image,
}

impl StillSource {
    pub fn open(path: &Path) -> VidloomResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            VidloomError::render(format!("cannot read image '{}': {e}", path.display()))
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| {
            VidloomError::render(format!("cannot decode image '{}': {e}", path.display()))
        })?;
        Self::from_decoded(decoded)
    }

    pub fn from_bytes(bytes: &[u8]) -> VidloomResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| VidloomError::render(format!("image decode failed: {e}")))?;
        Self::from_decoded(decoded)
    }

    fn from_decoded(decoded: image::DynamicImage) -> VidloomResult<Self> {
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        premultiply_rgba8_in_place(&mut data);
        let pixmap = premul_bytes_to_pixmap(&data, width, height)?;
        Ok(Self {
            width,
            height,
            paint: pixmap_paint(pixmap),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Paint handle; clones share the underlying pixmap.
    pub fn paint(&self) -> vello_cpu::Image {
        self.paint.clone()
    }
}

/// Frame-addressable video source with a bounded LRU cache and read-ahead, so
/// sequential composition does not shell out to ffmpeg once per output frame.
#[derive(Debug)]
pub struct VideoClipSource {
    info: MediaInfo,
    frame_cache: HashMap<u64, vello_cpu::Image>,
    lru: VecDeque<u64>,
    capacity: usize,
    prefetch_frames: u32,
}

/// Cached decoded frames per source.
const FRAME_CACHE_CAPACITY: usize = 64;
/// Frames decoded per ffmpeg invocation.
const PREFETCH_FRAMES: u32 = 12;

impl VideoClipSource {
    pub fn open(path: &Path) -> VidloomResult<Self> {
        Ok(Self::from_info(probe_media(path)?))
    }

    pub fn from_info(info: MediaInfo) -> Self {
        Self {
            info,
            frame_cache: HashMap::new(),
            lru: VecDeque::new(),
            capacity: FRAME_CACHE_CAPACITY,
            prefetch_frames: PREFETCH_FRAMES,
        }
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// Map a composite-local time onto the source by wrapping at its natural
    /// duration, so the clip repeats seamlessly. The result stays inside the
    /// last decodable frame.
    pub fn looped_time(&self, t: f64) -> f64 {
        let duration = self.info.duration_s;
        if duration <= 0.0 {
            return 0.0;
        }
        let wrapped = t.rem_euclid(duration);
        wrapped.min((duration - self.info.frame_step_s()).max(0.0))
    }

    /// Map a composite-local time onto the source by freezing at the last
    /// frame once `t` runs past the natural duration.
    pub fn clamped_time(&self, t: f64) -> f64 {
        let duration = self.info.duration_s;
        if duration <= 0.0 {
            return t.max(0.0);
        }
        t.clamp(0.0, (duration - self.info.frame_step_s()).max(0.0))
    }

    /// Premultiplied paint for the frame at `source_time_s`.
    pub fn frame_at(&mut self, source_time_s: f64) -> VidloomResult<vello_cpu::Image> {
        let key = self.key_for_time(source_time_s);
        if let Some(img) = self.frame_cache.get(&key).cloned() {
            self.touch(key);
            return Ok(img);
        }

        if self.prefetch_for_key(key).is_ok()
            && let Some(img) = self.frame_cache.get(&key).cloned()
        {
            self.touch(key);
            return Ok(img);
        }

        // Sparse request outside the prefetch window: decode the single frame.
        let rgba = decode_video_frame_rgba8(&self.info, source_time_s)?;
        let image = self.rgba_to_image(&rgba)?;
        self.insert_frame(key, image.clone());
        Ok(image)
    }

    fn key_for_time(&self, source_time_s: f64) -> u64 {
        (source_time_s.max(0.0) * 1000.0).round() as u64
    }

    fn prefetch_for_key(&mut self, key_ms: u64) -> VidloomResult<()> {
        let source_fps = self.info.source_fps();
        let step_ms = if source_fps.is_finite() && source_fps > 0.0 {
            1000.0 / source_fps
        } else {
            1.0
        };
        let window_ms = (step_ms * f64::from(self.prefetch_frames)).max(step_ms);
        let bucket = (key_ms as f64 / window_ms).floor();
        let start_key_ms = (bucket * window_ms).round().max(0.0) as u64;
        let start_time_s = start_key_ms as f64 / 1000.0;
        let frames = decode_video_frames_rgba8(&self.info, start_time_s, self.prefetch_frames)?;

        for (offset, rgba) in frames.iter().enumerate() {
            let key = (start_key_ms as f64 + offset as f64 * step_ms).round() as u64;
            if self.frame_cache.contains_key(&key) {
                self.touch(key);
                continue;
            }
            let image = self.rgba_to_image(rgba)?;
            self.insert_frame(key, image);
        }
        Ok(())
    }

    fn rgba_to_image(&self, rgba: &[u8]) -> VidloomResult<vello_cpu::Image> {
        let pixmap = premul_bytes_to_pixmap(rgba, self.info.width, self.info.height)?;
        Ok(pixmap_paint(pixmap))
    }

    fn insert_frame(&mut self, key: u64, image: vello_cpu::Image) {
        self.frame_cache.insert(key, image);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frame_cache.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|x| *x == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

fn pixmap_paint(pixmap: vello_cpu::Pixmap) -> vello_cpu::Image {
    vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    }
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

pub(crate) fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> VidloomResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| VidloomError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| VidloomError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(VidloomError::render("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
