//! Encoding sinks.
//!
//! Sinks consume rendered frames in output order; `FfmpegSink` streams them into a system
//! `ffmpeg` child process, `InMemorySink` captures them for tests.

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
