use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, FrameRGBA};
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::foundation::math::mul_div255_u16;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to stdin.
///
/// Video arrives on `pipe:0` as rawvideo RGBA; when `SinkConfig.audio` is set the PCM
/// file becomes a second input and both are muxed with `-shortest`.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    /// Assemble the full `ffmpeg` invocation for `cfg`.
    fn encode_command(&self, cfg: &SinkConfig) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });

        // Input 0: rawvideo RGBA on stdin. `-r` before `-i` sets the input frame rate;
        // rational fps goes through as `num/den`.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
        ]);

        match cfg.audio.as_ref() {
            Some(audio) => {
                // Input 1: the raw PCM scratch file. `-shortest` stops the mux when
                // either stream runs out.
                cmd.args([
                    "-f",
                    "f32le",
                    "-ar",
                    &audio.sample_rate.to_string(),
                    "-ac",
                    &audio.channels.to_string(),
                    "-i",
                ])
                .arg(&audio.path)
                .args(["-c:a", "aac", "-shortest"]);
            }
            None => {
                cmd.arg("-an");
            }
        }

        cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"])
            .arg(&self.opts.out_path);
        cmd
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> VidloomResult<()> {
        cfg.validate()?;
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(VidloomError::render(
                "output width/height must be even for yuv420p mp4",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(VidloomError::render(format!(
                "refusing to overwrite existing output '{}'",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(VidloomError::render(
                "mp4 encoding needs ffmpeg on PATH",
            ));
        }

        let mut child = self
            .encode_command(&cfg)
            .spawn()
            .map_err(|e| VidloomError::render(format!("could not start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VidloomError::render("ffmpeg child has no stdin pipe"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidloomError::render("ffmpeg child has no stderr pipe"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; cfg.frame_bytes()];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> VidloomResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| VidloomError::render("sink has not been started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(VidloomError::render(
                "frame indices must be strictly increasing",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(VidloomError::render(format!(
                "frame is {}x{} but the sink was started at {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != cfg.frame_bytes() {
            return Err(VidloomError::render(
                "frame byte length does not match its dimensions",
            ));
        }

        flatten_over_bg_to_opaque_rgba8(&mut self.scratch, frame, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VidloomError::render("sink is already closed"));
        };

        use std::io::Write as _;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| VidloomError::render(format!("writing frame to ffmpeg failed: {e}")))?;
        Ok(())
    }

    fn end(&mut self) -> VidloomResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| VidloomError::render("sink has not been started"))?;

        let status = child
            .wait()
            .map_err(|e| VidloomError::render(format!("waiting on ffmpeg failed: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| VidloomError::render("stderr reader thread panicked"))?
                .map_err(|e| VidloomError::render(format!("reading ffmpeg stderr failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VidloomError::render(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }

        self.cfg = None;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Abandoned sink (error path): close stdin and reap the child so no zombie is left.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

/// Flatten a frame over an opaque background into `dst`, honoring `frame.premultiplied`.
fn flatten_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    frame: &FrameRGBA,
    bg_rgba: [u8; 4],
) -> VidloomResult<()> {
    if dst.len() != frame.data.len() || !dst.len().is_multiple_of(4) {
        return Err(VidloomError::render(
            "flatten needs equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst
        .chunks_exact_mut(4)
        .zip(frame.data.chunks_exact(4))
    {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let (sr, sg, sb) = if frame.premultiplied {
            (s[0] as u16, s[1] as u16, s[2] as u16)
        } else {
            (
                mul_div255_u16(s[0] as u16, a),
                mul_div255_u16(s[1] as u16, a),
                mul_div255_u16(s[2] as u16, a),
            )
        };

        let r = sr + mul_div255_u16(bg_r, inv);
        let g = sg + mul_div255_u16(bg_g, inv);
        let b = sb + mul_div255_u16(bg_b, inv);

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> VidloomResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_responds("ffmpeg")
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    tool_responds("ffprobe")
}

fn tool_responds(name: &str) -> bool {
    std::process::Command::new(name)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Staging path next to `final_path`, unique per process, same extension so container
/// detection still works.
pub(crate) fn staging_path_for(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    let ext = final_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("mp4");
    final_path.with_file_name(format!("{stem}.tmp{}.{ext}", std::process::id()))
}

/// Atomically move a finished staging file into its final place.
pub(crate) fn promote_staging(staging: &Path, final_path: &Path) -> VidloomResult<()> {
    use anyhow::Context as _;
    std::fs::rename(staging, final_path).with_context(|| {
        format!(
            "failed to move '{}' into place at '{}'",
            staging.display(),
            final_path.display()
        )
    })?;
    Ok(())
}

/// Removes the held path on drop unless disarmed first.
pub(crate) struct TempPathGuard(pub(crate) Option<PathBuf>);

impl TempPathGuard {
    pub(crate) fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for TempPathGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::AudioInputConfig;
    use crate::foundation::core::Fps;

    fn frame(data: Vec<u8>, premultiplied: bool) -> FrameRGBA {
        FrameRGBA {
            width: 1,
            height: (data.len() / 4) as u32,
            data,
            premultiplied,
        }
    }

    fn cfg(audio: Option<AudioInputConfig>) -> SinkConfig {
        SinkConfig {
            width: 32,
            height: 32,
            fps: Fps { num: 30, den: 1 },
            audio,
        }
    }

    #[test]
    fn flatten_premul_alpha_0_returns_bg() {
        let f = frame(vec![0u8, 0, 0, 0], true);
        let mut dst = vec![0u8; 4];
        flatten_over_bg_to_opaque_rgba8(&mut dst, &f, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn flatten_premul_alpha_255_is_identity() {
        let f = frame(vec![1u8, 2, 3, 255], true);
        let mut dst = vec![0u8; 4];
        flatten_over_bg_to_opaque_rgba8(&mut dst, &f, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, f.data);
    }

    #[test]
    fn flatten_straight_half_alpha_over_black() {
        let f = frame(vec![200u8, 100, 50, 128], false);
        let mut dst = vec![0u8; 4];
        flatten_over_bg_to_opaque_rgba8(&mut dst, &f, [0, 0, 0, 255]).unwrap();
        // (c*128 + 127)/255 for each channel, over black.
        assert_eq!(dst, vec![100, 50, 25, 255]);
    }

    #[test]
    fn begin_rejects_odd_dimensions() {
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("/tmp/never-written.mp4"));
        let cfg = SinkConfig {
            width: 33,
            height: 32,
            fps: Fps { num: 24, den: 1 },
            audio: None,
        };
        assert!(sink.begin(cfg).is_err());
    }

    fn args_of(cmd: &std::process::Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn has_pair(args: &[String], key: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == key && w[1] == value)
    }

    #[test]
    fn command_muxes_audio_only_when_configured() {
        let sink = FfmpegSink::new(FfmpegSinkOpts::new("/tmp/never-written.mp4"));

        let silent = args_of(&sink.encode_command(&cfg(None)));
        assert!(silent.contains(&"-an".to_string()));
        assert!(!has_pair(&silent, "-c:a", "aac"));

        let audio = AudioInputConfig::new("/tmp/mix.f32le");
        let muxed = args_of(&sink.encode_command(&cfg(Some(audio))));
        assert!(has_pair(&muxed, "-c:a", "aac"));
        assert!(has_pair(&muxed, "-ar", "48000"));
        assert!(has_pair(&muxed, "-ac", "2"));
        assert!(muxed.contains(&"-shortest".to_string()));
        assert!(!muxed.contains(&"-an".to_string()));
    }

    #[test]
    fn command_passes_rational_fps_to_the_video_input() {
        let sink = FfmpegSink::new(FfmpegSinkOpts::new("/tmp/never-written.mp4"));
        let mut cfg = cfg(None);
        cfg.fps = Fps { num: 30000, den: 1001 };
        let args = args_of(&sink.encode_command(&cfg));
        assert!(has_pair(&args, "-r", "30000/1001"));
        assert!(has_pair(&args, "-s", "32x32"));
    }

    #[test]
    fn staging_path_keeps_extension() {
        let p = staging_path_for(Path::new("/tmp/clips/text/3.mp4"));
        assert_eq!(p.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("3.tmp"))
        );
        assert_eq!(p.parent(), Some(Path::new("/tmp/clips/text")));
    }
}