// src/video.rs - ffmpeg-backed frame reader and writer
//
// Both ends stream raw RGB24 through a pipe, so frames are decoded lazily and
// never cached. The ffmpeg child is owned by the reader/writer and is killed
// on drop, whichever way the session ends.
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::RgbImage;

use crate::error::VideoError;

const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Somewhere annotated frames can be written, in order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError>;
}

fn spawn_ffmpeg(command: &mut Command) -> Result<Child, VideoError> {
    command.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => VideoError::FfmpegMissing,
        _ => VideoError::Io(e),
    })
}

fn parse_frame_rate(raw: &str) -> Option<f64> {
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => raw.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Parses `width,height,r_frame_rate` as printed by ffprobe.
fn parse_probe_output(path: &Path, output: &str) -> Result<VideoInfo, VideoError> {
    let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 3 {
        return Err(VideoError::InvalidFormat(format!(
            "unexpected ffprobe output {line:?} for {}",
            path.display()
        )));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| VideoError::InvalidFormat("invalid video width".into()))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| VideoError::InvalidFormat("invalid video height".into()))?;
    if width == 0 || height == 0 {
        return Err(VideoError::InvalidFormat("video has no picture".into()));
    }

    let fps = parse_frame_rate(parts[2]).unwrap_or_else(|| {
        tracing::warn!(raw = parts[2], "unknown frame rate, assuming {DEFAULT_FPS}");
        DEFAULT_FPS
    });

    Ok(VideoInfo {
        width,
        height,
        fps,
    })
}

pub fn probe(path: &Path) -> Result<VideoInfo, VideoError> {
    let output = spawn_ffmpeg(
        Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,r_frame_rate"])
            .args(["-of", "csv=p=0"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped()),
    )?
    .wait_with_output()?;

    if !output.status.success() {
        return Err(VideoError::InvalidFormat(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
}

/// Lazily decodes a video file into RGB frames.
///
/// The iterator is finite and cannot be rewound.
pub struct VideoFileReader {
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    finished: bool,
}

impl VideoFileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VideoError::NotFound(path.to_path_buf()));
        }
        if let Err(source) = File::open(path) {
            return Err(VideoError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }

        let info = probe(path)?;

        let mut child = spawn_ffmpeg(
            Command::new("ffmpeg")
                .args(["-v", "error", "-nostdin", "-i"])
                .arg(path)
                .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit()),
        )?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::Ffmpeg {
                stage: "decode",
                message: "no stdout pipe".into(),
            });
        };

        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "opened video"
        );
        Ok(Self {
            info,
            child,
            stdout: BufReader::new(stdout),
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Stops the decoder early and reaps it.
    fn abort(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.finished = true;
    }

    fn finish_decoding(&mut self) -> Option<VideoError> {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(VideoError::Ffmpeg {
                stage: "decode",
                message: format!("exited with {status}"),
            }),
            Err(e) => Some(VideoError::Io(e)),
        }
    }
}

impl Iterator for VideoFileReader {
    type Item = Result<RgbImage, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = vec![0u8; self.info.width as usize * self.info.height as usize * 3];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => RgbImage::from_raw(self.info.width, self.info.height, buf).map(Ok),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => self.finish_decoding().map(Err),
            Err(e) => {
                self.abort();
                Some(Err(VideoError::Io(e)))
            }
        }
    }
}

impl Drop for VideoFileReader {
    fn drop(&mut self) {
        if !self.finished {
            self.abort();
        }
    }
}

/// Encodes RGB frames into an H.264 mp4.
///
/// Call [`VideoFileWriter::finish`] to flush the file; dropping the writer
/// without finishing aborts the encode.
pub struct VideoFileWriter {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    frames_written: usize,
    finished: bool,
}

impl VideoFileWriter {
    pub fn create(path: impl AsRef<Path>, width: u32, height: u32, fps: f64) -> Result<Self, VideoError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut child = spawn_ffmpeg(
            Command::new("ffmpeg")
                .args(["-y", "-v", "error"])
                .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
                .args(["-s", &format!("{width}x{height}")])
                .args(["-r", &fps.to_string()])
                .args(["-i", "pipe:0"])
                // libx264 with yuv420p needs even dimensions.
                .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
                .args(["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"])
                .arg(&path)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::inherit()),
        )?;
        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VideoError::Ffmpeg {
                stage: "encode",
                message: "no stdin pipe".into(),
            });
        };

        Ok(Self {
            path,
            width,
            height,
            child,
            stdin: Some(BufWriter::new(stdin)),
            frames_written: 0,
            finished: false,
        })
    }

    pub fn finish(mut self) -> Result<PathBuf, VideoError> {
        self.finished = true;
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let status = self.child.wait()?;
        if !status.success() {
            return Err(VideoError::Ffmpeg {
                stage: "encode",
                message: format!("exited with {status}"),
            });
        }
        tracing::info!(path = %self.path.display(), frames = self.frames_written, "video written");
        Ok(self.path.clone())
    }
}

impl FrameSink for VideoFileWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(VideoError::FrameSize {
                expected: (self.width, self.height),
                actual: frame.dimensions(),
            });
        }
        let stdin = self.stdin.as_mut().ok_or(VideoError::Ffmpeg {
            stage: "encode",
            message: "writer already finished".into(),
        })?;
        stdin.write_all(frame.as_raw())?;
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for VideoFileWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// A sink whose failures never reach the caller.
///
/// The first failed write is logged and the inner sink is dropped; later
/// frames are discarded. Used for optional outputs such as debug videos.
pub struct BestEffortSink<S> {
    inner: Option<S>,
}

impl<S: FrameSink> BestEffortSink<S> {
    pub fn new(inner: Option<S>) -> Self {
        Self { inner }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// The inner sink, if it never failed.
    pub fn into_inner(self) -> Option<S> {
        self.inner
    }
}

impl<S: FrameSink> FrameSink for BestEffortSink<S> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        if let Some(inner) = self.inner.as_mut() {
            if let Err(e) = inner.write_frame(frame) {
                tracing::warn!(error = %e, "frame sink failed, further frames are dropped");
                self.inner = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn frame_rate_parsing() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("30000/1001").map(|f| (f * 100.0).round()), Some(2997.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("0/1"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }

    #[test]
    fn probe_output_is_parsed() {
        let info = parse_probe_output(Path::new("a.mp4"), "1280,720,60/1\n").unwrap();
        assert_eq!((info.width, info.height, info.fps), (1280, 720, 60.0));
    }

    #[test]
    fn unknown_frame_rate_falls_back() {
        let info = parse_probe_output(Path::new("a.mp4"), "640,480,0/0").unwrap();
        assert_eq!(info.fps, DEFAULT_FPS);
    }

    #[test]
    fn truncated_probe_output_is_invalid() {
        assert_matches!(
            parse_probe_output(Path::new("a.mp4"), ""),
            Err(VideoError::InvalidFormat(_))
        );
        assert_matches!(
            parse_probe_output(Path::new("a.mp4"), "0,480,30/1"),
            Err(VideoError::InvalidFormat(_))
        );
    }

    #[cfg(unix)]
    #[test]
    fn abort_reaps_a_decoder_that_is_still_running() {
        use std::time::{Duration, Instant};

        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let mut reader = VideoFileReader {
            info: VideoInfo {
                width: 2,
                height: 2,
                fps: DEFAULT_FPS,
            },
            child,
            stdout: BufReader::new(stdout),
            finished: false,
        };

        let started = Instant::now();
        reader.abort();
        assert!(reader.child.try_wait().unwrap().is_some());
        assert!(reader.next().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    struct FlakySink {
        written: usize,
        fail_at: usize,
    }

    impl FrameSink for FlakySink {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), VideoError> {
            if self.written == self.fail_at {
                return Err(VideoError::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.written += 1;
            Ok(())
        }
    }

    #[test]
    fn best_effort_sink_swallows_the_first_failure_and_stops() {
        let mut sink = BestEffortSink::new(Some(FlakySink {
            written: 0,
            fail_at: 2,
        }));
        let frame = RgbImage::new(2, 2);

        for _ in 0..5 {
            assert!(sink.write_frame(&frame).is_ok());
        }
        assert!(!sink.is_active());
        assert!(sink.into_inner().is_none());
    }

    #[test]
    fn best_effort_sink_without_inner_is_a_no_op() {
        let mut sink = BestEffortSink::<FlakySink>::new(None);
        assert!(sink.write_frame(&RgbImage::new(2, 2)).is_ok());
        assert!(!sink.is_active());
    }

    #[test]
    fn missing_file_is_reported_before_ffmpeg_runs() {
        let err = VideoFileReader::open("/definitely/not/here.mp4")
            .err()
            .expect("open should fail");
        assert_matches!(err, VideoError::NotFound(_));
    }
}
