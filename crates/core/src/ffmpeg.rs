//! FFmpeg/FFprobe backed [`VideoSource`].
//!
//! `ffprobe` supplies the frame rate and resolution; `ffmpeg` decodes the
//! first video stream to raw RGB24 on stdout, which is read back one frame
//! at a time. RGB24 is the channel order the classifier expects, so frames
//! need no further conversion.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};

use crate::emotion::AnalysisError;
use crate::video::{VideoDecoder, VideoSource};

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("no video stream in file")]
    NoVideoStream,
}

impl From<FfmpegError> for AnalysisError {
    fn from(err: FfmpegError) -> Self {
        AnalysisError::VideoOpen(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    #[serde(default)]
    pub side_data_list: Vec<FfprobeSideData>,
    #[serde(default)]
    pub tags: Option<FfprobeTags>,
}

/// Stream side data. Only the display-matrix rotation is read.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeSideData {
    pub rotation: Option<f64>,
}

/// Stream tags. Older ffprobe builds report rotation as a `rotate` tag.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeTags {
    pub rotate: Option<String>,
}

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
pub fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Nominal frame rate of the first video stream, `0.0` if unavailable.
///
/// Prefers `avg_frame_rate` and falls back to `r_frame_rate`; ffprobe
/// reports `"0/0"` for streams where the average is unknown.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    let Some(stream) = first_video_stream(probe) else {
        return 0.0;
    };
    let avg = stream.avg_frame_rate.as_deref().map(parse_fraction);
    match avg {
        Some(fps) if fps > 0.0 => fps,
        _ => stream
            .r_frame_rate
            .as_deref()
            .map(parse_fraction)
            .unwrap_or(0.0),
    }
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
        return 0.0;
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Find the first video stream's resolution.
pub fn parse_resolution(probe: &FfprobeOutput) -> (u32, u32) {
    first_video_stream(probe)
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0))
}

/// Display rotation of a stream in degrees, normalised to `0..360`.
///
/// Reads the display-matrix side data first and falls back to the legacy
/// `rotate` tag.
pub fn parse_rotation(stream: &FfprobeStream) -> i32 {
    let raw = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    if !raw.is_finite() {
        return 0;
    }
    (raw.round() as i32).rem_euclid(360)
}

/// Largest frame accepted from probe metadata (8K UHD).
pub const MAX_FRAME_PIXELS: u64 = 7680 * 4320;

/// Dimensions of the frames `ffmpeg` will emit for the first video stream.
///
/// ffmpeg applies the display rotation while decoding, so a quarter turn
/// swaps the coded width and height.
pub fn frame_geometry(probe: &FfprobeOutput) -> Result<(u32, u32), FfmpegError> {
    let stream = first_video_stream(probe).ok_or(FfmpegError::NoVideoStream)?;
    let (width, height) = parse_resolution(probe);
    if width == 0 || height == 0 {
        return Err(FfmpegError::ParseError(format!(
            "invalid video resolution {width}x{height}"
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_FRAME_PIXELS {
        return Err(FfmpegError::ParseError(format!(
            "video resolution {width}x{height} exceeds the supported maximum"
        )));
    }

    match parse_rotation(stream) {
        90 | 270 => Ok((height, width)),
        _ => Ok((width, height)),
    }
}

// ---------------------------------------------------------------------------
// Frame source
// ---------------------------------------------------------------------------

/// Splits a raw RGB24 byte stream into fixed-size frames.
#[derive(Debug)]
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    done: bool,
}

impl<R: AsyncRead + Unpin> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            done: false,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// `true` once the stream has ended.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the next complete frame, reassembling it across short reads.
    ///
    /// Returns `None` at end of stream. A truncated trailing frame is
    /// discarded, and every call after the end also returns `None`.
    pub async fn read_frame(&mut self) -> Result<Option<RgbImage>, AnalysisError> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(|e| AnalysisError::VideoRead(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < buf.len() {
            self.done = true;
            if filled > 0 {
                tracing::warn!(
                    bytes = filled,
                    expected = buf.len(),
                    "Discarding truncated trailing frame"
                );
            }
            return Ok(None);
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| AnalysisError::VideoRead("frame buffer size mismatch".into()))
    }
}

/// Decodes a video file frame by frame through an `ffmpeg` child process.
///
/// The child is killed when the source is dropped, so abandoning the
/// analysis early never leaves a decoder running.
#[derive(Debug)]
pub struct FfmpegVideoSource {
    child: Child,
    frames: RawFrameReader<ChildStdout>,
    frame_rate: f64,
    reaped: bool,
}

impl FfmpegVideoSource {
    /// Probe `path` and start decoding its first video stream.
    pub async fn open(path: &Path) -> Result<Self, FfmpegError> {
        let probe = probe_video(path).await?;
        let (width, height) = frame_geometry(&probe)?;
        let frame_rate = parse_framerate(&probe);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(FfmpegError::NotFound)?;

        let stdout = child.stdout.take().ok_or_else(|| FfmpegError::ExecutionFailed {
            exit_code: None,
            stderr: "ffmpeg stdout was not captured".to_string(),
        })?;

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            frame_rate,
            "Opened video for decoding"
        );

        Ok(Self {
            child,
            frames: RawFrameReader::new(stdout, width, height),
            frame_rate,
            reaped: false,
        })
    }

    /// Reap the child once stdout is drained. A non-zero exit after output
    /// ends is treated as end of stream, same as a decoder that stops
    /// yielding frames.
    async fn reap(&mut self) {
        self.reaped = true;
        match self.child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!(exit_code = ?status.code(), "ffmpeg exited with failure, ending stream");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to reap ffmpeg process");
            }
        }
    }
}

#[async_trait]
impl VideoSource for FfmpegVideoSource {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    async fn next_frame(&mut self) -> Result<Option<RgbImage>, AnalysisError> {
        let frame = self.frames.read_frame().await?;
        if frame.is_none() && self.frames.is_done() && !self.reaped {
            self.reap().await;
        }
        Ok(frame)
    }
}

/// [`VideoDecoder`] that opens files with [`FfmpegVideoSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegDecoder;

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError> {
        let source = FfmpegVideoSource::open(path).await?;
        Ok(Box::new(source))
    }
}
