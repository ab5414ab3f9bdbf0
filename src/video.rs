use crate::all::*;

use serde::Deserialize;
use std::process::{Child, ChildStdout, Command, Stdio};

// Sequential access to the frames of one camera. Frames must be consumed in
// increasing order within a pass; going back requires `reset()`.
pub trait FrameSource {
  fn frame_count(&self) -> usize;

  fn fps(&self) -> f64;

  // Index of the frame that the next `read()` returns.
  fn position(&self) -> usize;

  fn reset(&mut self) -> Result<()>;

  // `None` at the end of the stream or when the frame could not be decoded.
  fn read(&mut self) -> Result<Option<&Image>>;

  // Skips forward by reading, restarts the stream when the target is behind.
  fn seek(&mut self, frame: usize) -> Result<()> {
    if frame < self.position() {
      self.reset()?;
    }
    while self.position() < frame {
      let before = self.position();
      self.read()?;
      // End of stream.
      if self.position() == before { break }
    }
    Ok(())
  }
}

pub struct VideoInput {
  path: PathBuf,
  child: Option<Child>,
  child_stdout: Option<ChildStdout>,
  video_frame: Image,
  info: VideoInfo,
  position: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct VideoInfo {
  pub width: usize,
  pub height: usize,
  pub fps: f64,
  pub frame_count: usize,
}

#[derive(Deserialize)]
struct ProbeRoot {
  streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
  width: usize,
  height: usize,
  r_frame_rate: String,
  nb_read_packets: Option<String>,
}

impl VideoInput {
  pub fn new(path: &Path) -> Result<VideoInput> {
    let info = probe(path)
      .context(format!("Failed to probe video {}.", path.display()))?;
    debug!("{}: {}x{}, {} frames at {} fps.",
      path.display(), info.width, info.height, info.frame_count, info.fps);
    Ok(VideoInput::with_info(path, info))
  }

  // The decoder is started by the first `read()`.
  fn with_info(path: &Path, info: VideoInfo) -> VideoInput {
    VideoInput {
      path: path.to_path_buf(),
      child: None,
      child_stdout: None,
      video_frame: Image::empty(),
      info,
      position: 0,
    }
  }

  fn start(&mut self) -> Result<()> {
    let mut child = Command::new("ffmpeg")
      .arg("-i").arg(&self.path)
      .args(["-f", "rawvideo", "-vcodec", "rawvideo", "-vsync", "passthrough", "-pix_fmt", "rgb24", "-"])
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .spawn()
      .context("Failed to start ffmpeg.")?;
    self.child_stdout = child.stdout.take();
    self.child = Some(child);
    Ok(())
  }

  fn stop(&mut self) {
    self.child_stdout = None;
    if let Some(mut child) = self.child.take() {
      // The decoder may still be writing; it is not needed anymore.
      let _ = child.kill();
      let _ = child.wait();
    }
  }
}

impl FrameSource for VideoInput {
  fn frame_count(&self) -> usize { self.info.frame_count }

  fn fps(&self) -> f64 { self.info.fps }

  fn position(&self) -> usize { self.position }

  fn reset(&mut self) -> Result<()> {
    self.stop();
    self.position = 0;
    Ok(())
  }

  fn read(&mut self) -> Result<Option<&Image>> {
    // After the end of the stream the child is kept, without its stdout.
    if self.child.is_none() {
      self.start()?;
    }
    let stdout = match self.child_stdout.as_mut() {
      Some(x) => x,
      None => return Ok(None),
    };
    let n = Image::byte_len(self.info.width, self.info.height);
    if self.video_frame.data.len() != n {
      self.video_frame.data.resize(n, 0);
    }
    if let Err(err) = stdout.read_exact(&mut self.video_frame.data) {
      debug!("End of {} at frame {}: {}", self.path.display(), self.position, err);
      self.child_stdout = None;
      return Ok(None);
    }
    self.video_frame.width = self.info.width;
    self.video_frame.height = self.info.height;
    self.position += 1;
    Ok(Some(&self.video_frame))
  }
}

impl Drop for VideoInput {
  fn drop(&mut self) {
    self.stop();
  }
}

fn probe(path: &Path) -> Result<VideoInfo> {
  let output = Command::new("ffprobe")
    .args(["-v", "error", "-select_streams", "v:0", "-count_packets",
      "-show_entries", "stream=width,height,r_frame_rate,nb_read_packets", "-of", "json"])
    .arg(path)
    .output()
    .context("Failed to run ffprobe.")?;
  if !output.status.success() {
    bail!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr).trim());
  }
  parse_probe(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe(s: &str) -> Result<VideoInfo> {
  let root: ProbeRoot = serde_json::from_str(s)
    .context("Unexpected ffprobe output.")?;
  let stream = root.streams.into_iter().next()
    .ok_or(anyhow!("No video stream."))?;
  let fps = parse_rate(&stream.r_frame_rate)?;
  let frame_count = match stream.nb_read_packets {
    Some(n) => n.parse::<usize>().context("Bad packet count.")?,
    None => bail!("Frame count is unknown."),
  };
  Ok(VideoInfo {
    width: stream.width,
    height: stream.height,
    fps,
    frame_count,
  })
}

// ffprobe reports rates as fractions such as `30000/1001`.
fn parse_rate(s: &str) -> Result<f64> {
  let (num, den) = match s.split_once('/') {
    Some((num, den)) => (num, den),
    None => (s, "1"),
  };
  let num = num.parse::<f64>().map_err(|_| anyhow!("Bad frame rate {}.", s))?;
  let den = den.parse::<f64>().map_err(|_| anyhow!("Bad frame rate {}.", s))?;
  if !(num > 0.) || !(den > 0.) {
    bail!("Bad frame rate {}.", s);
  }
  Ok(num / den)
}

#[cfg(test)]
pub mod tests {
  use super::*;

  // Frames kept in memory. `None` entries behave like undecodable frames.
  pub struct MemoryVideo {
    pub frames: Vec<Option<Image>>,
    pub fps: f64,
    pub position: usize,
    pub resets: usize,
    // Every frame index handed out by `read()`, in order.
    pub reads: Vec<usize>,
  }

  impl MemoryVideo {
    pub fn new(frames: Vec<Option<Image>>, fps: f64) -> MemoryVideo {
      MemoryVideo {
        frames,
        fps,
        position: 0,
        resets: 0,
        reads: vec![],
      }
    }
  }

  impl FrameSource for MemoryVideo {
    fn frame_count(&self) -> usize { self.frames.len() }

    fn fps(&self) -> f64 { self.fps }

    fn position(&self) -> usize { self.position }

    fn reset(&mut self) -> Result<()> {
      self.position = 0;
      self.resets += 1;
      Ok(())
    }

    fn read(&mut self) -> Result<Option<&Image>> {
      if self.position >= self.frames.len() { return Ok(None) }
      let i = self.position;
      self.position += 1;
      self.reads.push(i);
      Ok(self.frames[i].as_ref())
    }
  }

  #[test]
  fn test_seek() {
    let frames = (0..5).map(|i| Some(Image::filled(2, 2, [i, 0, 0]))).collect();
    let mut video = MemoryVideo::new(frames, 10.);
    video.seek(3).unwrap();
    assert_eq!(video.read().unwrap().unwrap().pixel(0, 0), [3, 0, 0]);
    video.seek(1).unwrap();
    assert_eq!(video.resets, 1);
    assert_eq!(video.read().unwrap().unwrap().pixel(0, 0), [1, 0, 0]);
    video.seek(10).unwrap();
    assert!(video.read().unwrap().is_none());
  }

  #[test]
  fn test_parse_probe() {
    let s = r#"{"programs": [], "streams": [{"width": 1920, "height": 1080,
      "r_frame_rate": "30000/1001", "nb_read_packets": "2141"}]}"#;
    let info = parse_probe(s).unwrap();
    assert_eq!((info.width, info.height, info.frame_count), (1920, 1080, 2141));
    assert!((info.fps - 29.97002997).abs() < 1e-6);
    assert_eq!(parse_rate("10").unwrap(), 10.);
    assert!(parse_rate("0/0").is_err());
    assert!(parse_probe(r#"{"streams": []}"#).is_err());
  }

  #[test]
  fn test_decoder_starts_on_read() {
    let info = VideoInfo { width: 4, height: 2, fps: 10., frame_count: 3 };
    let mut video = VideoInput::with_info(Path::new("missing.avi"), info);
    assert!(video.child.is_none());
    video.reset().unwrap();
    video.reset().unwrap();
    assert!(video.child.is_none());
    assert_eq!(video.position(), 0);
    assert_eq!(video.frame_count(), 3);
    assert_eq!(video.fps(), 10.);
  }
}
