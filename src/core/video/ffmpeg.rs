//! 基于 ffmpeg 子进程的视频源
//!
//! ffprobe 读取元数据，ffmpeg 把首个视频流解码为 rgb24 原始帧写到 stdout。
//! 向前 seek 通过丢弃字节实现，帧号精确；不支持向后 seek。

use super::error::VideoError;
use super::frame::{Frame, CHANNELS};
use super::source::{VideoInfo, VideoSource};
use log::{debug, info};
use serde::Deserialize;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

/// FFprobe JSON 输出
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// 读取视频元数据
pub fn probe_video(path: &Path) -> Result<VideoInfo, VideoError> {
    if !path.exists() {
        return Err(VideoError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffprobe").map_err(|_| VideoError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(VideoError::ProbeFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> Result<VideoInfo, VideoError> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().map_or(true, |t| t == "video"))
        .ok_or(VideoError::NoVideoStream)?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VideoError::ProbeFailed("missing frame dimensions".into())),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok());

    // 容器未写 nb_frames 时按时长估算
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| match duration {
            Some(d) if d > 0.0 && fps > 0.0 => Some((d * fps).round() as u64),
            _ => None,
        });

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// 解析帧率字符串（"30/1" 或 "29.97"）
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

/// 按帧读取 rgb24 原始字节流
///
/// 只能向前 seek：跳过的帧直接丢弃。读到 EOF 后进入耗尽状态，
/// 之后 read_frame 一律返回 None。
pub(crate) struct RawFrameReader<R> {
    inner: R,
    width: u32,
    height: u32,
    frame_size: usize,
    cursor: u64,
    exhausted: bool,
}

impl<R: Read> RawFrameReader<R> {
    pub(crate) fn new(inner: R, width: u32, height: u32) -> Self {
        Self {
            inner,
            width,
            height,
            frame_size: width as usize * height as usize * CHANNELS,
            cursor: 0,
            exhausted: false,
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn seek(&mut self, position: u64) -> Result<(), VideoError> {
        if position < self.cursor {
            return Err(VideoError::SeekBackward {
                current: self.cursor,
                target: position,
            });
        }
        if !self.exhausted && position > self.cursor {
            let skip_bytes = (position - self.cursor) * self.frame_size as u64;
            let skipped = io::copy(&mut self.inner.by_ref().take(skip_bytes), &mut io::sink())?;
            if skipped < skip_bytes {
                debug!("end of stream while seeking to frame {}", position);
                self.exhausted = true;
            }
        }
        self.cursor = position;
        Ok(())
    }

    pub(crate) fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut data = vec![0u8; self.frame_size];
        let filled = self.fill(&mut data)?;
        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if filled < self.frame_size {
            self.exhausted = true;
            return Err(VideoError::DecodeFailed(format!(
                "truncated frame at {}: {} of {} bytes",
                self.cursor, filled, self.frame_size
            )));
        }

        let position = self.cursor;
        self.cursor += 1;
        Frame::new(self.width, self.height, data, position)
            .map(Some)
            .map_err(|e| VideoError::DecodeFailed(e.to_string()))
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// 从 `ffmpeg -version` 首行取 (major, minor)
fn parse_ffmpeg_version(banner: &str) -> Option<(u32, u32)> {
    let version = banner
        .lines()
        .next()?
        .strip_prefix("ffmpeg version ")?
        .trim_start_matches(|c: char| !c.is_ascii_digit());
    let mut parts = version.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// 逐帧直通的同步参数：5.1 起为 -fps_mode，更早版本只认 -vsync
fn passthrough_args(version: Option<(u32, u32)>) -> [&'static str; 2] {
    match version {
        Some(v) if v < (5, 1) => ["-vsync", "passthrough"],
        _ => ["-fps_mode", "passthrough"],
    }
}

fn ffmpeg_version() -> Option<(u32, u32)> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    parse_ffmpeg_version(&String::from_utf8_lossy(&output.stdout))
}

pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    frames: RawFrameReader<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    exit_checked: bool,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let path = path.as_ref();
        let info = probe_video(path)?;
        which::which("ffmpeg").map_err(|_| VideoError::ToolNotFound("ffmpeg"))?;

        info!("🎬 File {}:", path.display());
        info!("\tFPS: {:.3}", info.fps);
        match info.frame_count {
            Some(n) => info!("\tLength: {} frames", n),
            None => info!("\tLength: unknown"),
        }
        if let Some(duration) = info.duration() {
            info!("\tDuration: {:.1}s", duration.as_secs_f64());
        }

        let version = ffmpeg_version();
        debug!("ffmpeg version: {:?}", version);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0"])
            .args(passthrough_args(version))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::DecodeFailed("ffmpeg stdout unavailable".into()))?;
        // stderr 单独排空，避免管道写满卡住 ffmpeg
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut message = String::new();
                let _ = pipe.read_to_string(&mut message);
                message
            })
        });
        let frame_size = info.width as usize * info.height as usize * CHANNELS;
        let frames = RawFrameReader::new(
            BufReader::with_capacity(frame_size, stdout),
            info.width,
            info.height,
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            frames,
            stderr,
            exit_checked: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 帧流耗尽后检查一次 ffmpeg 退出状态
    fn check_exit(&mut self) -> Result<(), VideoError> {
        if !self.frames.is_exhausted() || self.exit_checked {
            return Ok(());
        }
        self.exit_checked = true;
        let status = self.child.wait()?;
        if status.success() {
            return Ok(());
        }
        let message = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Err(VideoError::DecodeFailed(format!(
            "ffmpeg exited with {}: {}",
            status,
            message.trim()
        )))
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn position(&self) -> u64 {
        self.frames.position()
    }

    fn seek(&mut self, position: u64) -> Result<(), VideoError> {
        self.frames.seek(position)?;
        self.check_exit()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, VideoError> {
        match self.frames.read_frame() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => self.check_exit().map(|_| None),
            // ffmpeg 自身报错时其信息更有用
            Err(e) => Err(self.check_exit().err().unwrap_or(e)),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!("🗑️ ffmpeg source released: {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_with_frame_count() {
        let json = br#"{
            "streams": [{
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "nb_frames": "1500",
                "avg_frame_rate": "25/1"
            }],
            "format": { "duration": "60.000000" }
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.frame_count, Some(1500));
        assert!((info.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_estimates_frame_count() {
        let json = br#"{
            "streams": [{
                "codec_type": "video",
                "width": 640,
                "height": 360,
                "avg_frame_rate": "0/0",
                "r_frame_rate": "30/1"
            }],
            "format": { "duration": "10.0" }
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn test_parse_probe_without_video() {
        let json = br#"{ "streams": [{ "codec_type": "audio" }] }"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(VideoError::NoVideoStream)
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let result = FfmpegSource::open("/definitely/not/here.mp4");
        assert!(matches!(result, Err(VideoError::FileNotFound(_))));
    }

    /// 2x1 帧，第 i 帧所有字节为 i
    fn raw_stream(frames: u8, trailing: usize) -> Cursor<Vec<u8>> {
        let mut bytes: Vec<u8> = (0..frames).flat_map(|i| [i; 6]).collect();
        bytes.extend(std::iter::repeat(0xFF).take(trailing));
        Cursor::new(bytes)
    }

    #[test]
    fn test_reader_reads_sequentially() {
        let mut reader = RawFrameReader::new(raw_stream(3, 0), 2, 1);
        for i in 0..3u8 {
            let frame = reader.read_frame().unwrap().unwrap();
            assert_eq!(frame.position, i as u64);
            assert!(frame.data().iter().all(|&b| b == i));
        }
        assert!(reader.read_frame().unwrap().is_none());
        assert!(reader.is_exhausted());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_reader_seek_lands_on_exact_frame() {
        let mut reader = RawFrameReader::new(raw_stream(10, 0), 2, 1);
        reader.read_frame().unwrap();
        reader.seek(7).unwrap();
        assert_eq!(reader.position(), 7);

        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.position, 7);
        assert!(frame.data().iter().all(|&b| b == 7));
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_reader_seek_past_end() {
        let mut reader = RawFrameReader::new(raw_stream(4, 0), 2, 1);
        reader.seek(10).unwrap();
        assert!(reader.is_exhausted());
        assert_eq!(reader.position(), 10);
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_reader_seek_to_exact_end_is_not_exhausted_yet() {
        let mut reader = RawFrameReader::new(raw_stream(4, 0), 2, 1);
        reader.seek(4).unwrap();
        assert!(!reader.is_exhausted());
        assert!(reader.read_frame().unwrap().is_none());
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_reader_truncated_frame_is_decode_failure() {
        let mut reader = RawFrameReader::new(raw_stream(2, 4), 2, 1);
        reader.seek(2).unwrap();
        assert!(matches!(
            reader.read_frame(),
            Err(VideoError::DecodeFailed(_))
        ));
        assert!(reader.is_exhausted());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_reader_rejects_backward_seek() {
        let mut reader = RawFrameReader::new(raw_stream(10, 0), 2, 1);
        reader.seek(5).unwrap();
        assert!(matches!(
            reader.seek(3),
            Err(VideoError::SeekBackward {
                current: 5,
                target: 3
            })
        ));
        assert_eq!(reader.position(), 5);
        reader.seek(5).unwrap();
    }

    #[test]
    fn test_parse_ffmpeg_version() {
        assert_eq!(
            parse_ffmpeg_version("ffmpeg version 4.4.2-0ubuntu0.22.04.1 Copyright (c) 2000-2021"),
            Some((4, 4))
        );
        assert_eq!(parse_ffmpeg_version("ffmpeg version n6.1 Copyright"), Some((6, 1)));
        assert_eq!(parse_ffmpeg_version("ffmpeg version 7.0"), Some((7, 0)));
        assert_eq!(parse_ffmpeg_version("avconv version 9"), None);
    }

    #[test]
    fn test_passthrough_args_follow_version() {
        assert_eq!(passthrough_args(Some((4, 4))), ["-vsync", "passthrough"]);
        assert_eq!(passthrough_args(Some((5, 0))), ["-vsync", "passthrough"]);
        assert_eq!(passthrough_args(Some((5, 1))), ["-fps_mode", "passthrough"]);
        assert_eq!(passthrough_args(None), ["-fps_mode", "passthrough"]);
    }

    /// 需要 PATH 中有 ffmpeg 与 ffprobe
    #[test]
    fn test_decodes_generated_clip() {
        if which::which("ffmpeg").is_err() || which::which("ffprobe").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        let status = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-f", "lavfi", "-i"])
            .arg("testsrc=size=32x24:rate=10")
            .args(["-frames:v", "12", "-c:v", "mpeg4", "-pix_fmt", "yuv420p"])
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());

        let mut source = FfmpegSource::open(&clip).unwrap();
        assert_eq!((source.info().width, source.info().height), (32, 24));
        assert_eq!(source.info().frame_count, Some(12));

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(first.data().len(), 32 * 24 * 3);

        source.seek(5).unwrap();
        assert_eq!(source.read_frame().unwrap().unwrap().position, 5);
        assert!(source.seek(2).is_err());

        source.seek(20).unwrap();
        assert!(source.read_frame().unwrap().is_none());
    }
}
