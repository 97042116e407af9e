use std::path::{Path, PathBuf};

use crate::foundation::error::{VidloomError, VidloomResult};

/// Sample rate every audio track is resampled to before muxing.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Stream facts for a video file, as reported by ffprobe.
#[derive(Clone, Debug)]
pub struct MediaInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_s: f64,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Source frame rate as a float, `0.0` when the denominator is zero.
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    /// Duration of one source frame in seconds, `0.0` for unknown frame rates.
    pub fn frame_step_s(&self) -> f64 {
        let fps = self.source_fps();
        if fps.is_finite() && fps > 0.0 { 1.0 / fps } else { 0.0 }
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

fn run_ffprobe(path: &Path, show_streams: bool) -> VidloomResult<ProbeOut> {
    let mut cmd = std::process::Command::new("ffprobe");
    cmd.args(["-v", "error", "-print_format", "json", "-show_format"]);
    if show_streams {
        cmd.arg("-show_streams");
    }
    let out = cmd
        .arg(path)
        .output()
        .map_err(|e| VidloomError::render(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(VidloomError::render(format!(
            "ffprobe could not read '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    serde_json::from_slice(&out.stdout)
        .map_err(|e| VidloomError::render(format!("ffprobe json parse failed: {e}")))
}

/// Probe a video file for its dimensions, frame rate, duration and audio presence.
pub fn probe_media(path: &Path) -> VidloomResult<MediaInfo> {
    let parsed = run_ffprobe(path, true)?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            VidloomError::render(format!("no video stream in '{}'", path.display()))
        })?;
    let width = video_stream
        .width
        .ok_or_else(|| VidloomError::render("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| VidloomError::render("missing video height from ffprobe"))?;
    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| VidloomError::render("invalid video r_frame_rate from ffprobe"))?;
    let duration_s = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        source_path: path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_s,
        has_audio,
    })
}

/// Container duration in seconds of any media file (audio or video).
pub fn probe_duration_s(path: &Path) -> VidloomResult<f64> {
    let parsed = run_ffprobe(path, false)?;
    parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            VidloomError::render(format!(
                "could not determine duration of '{}'",
                path.display()
            ))
        })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ff_ratio_parsing() {
        assert_eq!(parse_ff_ratio("30/1"), Some((30, 1)));
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("0/0"), None);
        assert_eq!(parse_ff_ratio("nope"), None);
        assert_eq!(parse_ff_ratio("30"), None);
    }

    #[test]
    fn source_fps_handles_zero_denominator() {
        let info = MediaInfo {
            source_path: PathBuf::from("x.mp4"),
            width: 640,
            height: 480,
            fps_num: 24,
            fps_den: 0,
            duration_s: 1.0,
            has_audio: false,
        };
        assert_eq!(info.source_fps(), 0.0);
        assert_eq!(info.frame_step_s(), 0.0);
    }

    #[test]
    fn frame_step_is_reciprocal_fps() {
        let info = MediaInfo {
            source_path: PathBuf::from("x.mp4"),
            width: 640,
            height: 480,
            fps_num: 24,
            fps_den: 1,
            duration_s: 1.0,
            has_audio: true,
        };
        assert!((info.frame_step_s() - 1.0 / 24.0).abs() < 1e-12);
    }

    #[test]
    fn probe_stream_json_shape_parses() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "24/1"},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "3.500000"}
        }"#;
        let parsed: ProbeOut = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.streams[0].width, Some(1280));
        assert_eq!(parsed.format.unwrap().duration.as_deref(), Some("3.500000"));
    }
}
