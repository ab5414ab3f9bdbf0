use crate::all::*;

use serde::Serialize;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

// Appearance model. Returns one vector per input image, in input order.
pub trait Encoder {
  // Identifies the model, e.g. in embedding cache file names.
  fn name(&self) -> &str;

  fn encode(&mut self, images: &[Image]) -> Result<Vec<Embedding>>;
}

// Joint RGB color histogram, normalized to unit mass. Needs no model weights,
// useful as a baseline and for dry runs of the pipeline.
pub struct HistogramEncoder {
  bins: usize,
  name: String,
}

impl HistogramEncoder {
  pub fn new(bins: usize) -> Result<HistogramEncoder> {
    if bins == 0 || bins > 256 {
      bail!("Histogram bins must be in 1..=256, got {}.", bins);
    }
    Ok(HistogramEncoder {
      bins,
      name: format!("hist{}", bins),
    })
  }

  fn histogram(&self, image: &Image) -> Embedding {
    let b = self.bins;
    let mut h = DVector::zeros(b * b * b);
    let n = image.width * image.height;
    if n == 0 { return h }
    let bin = |v: u8| v as usize * b / 256;
    for pixel in image.data.chunks_exact(CHANNELS) {
      h[(bin(pixel[0]) * b + bin(pixel[1])) * b + bin(pixel[2])] += 1.;
    }
    h / n as f64
  }
}

impl Encoder for HistogramEncoder {
  fn name(&self) -> &str { &self.name }

  fn encode(&mut self, images: &[Image]) -> Result<Vec<Embedding>> {
    Ok(images.iter().map(|x| self.histogram(x)).collect())
  }
}

// Runs the appearance model in a separate long-lived process. Each batch is
// sent as one JSON header line `{"sizes":[[w,h],...]}` followed by the raw RGB
// bytes of every image, and answered with one JSON line `[[f, ...], ...]`.
pub struct CommandEncoder {
  name: String,
  child: Child,
  stdin: ChildStdin,
  stdout: BufReader<ChildStdout>,
  line: String,
}

#[derive(Serialize)]
struct BatchHeader {
  sizes: Vec<[usize; 2]>,
}

impl CommandEncoder {
  pub fn new(command: &str, model: &Path) -> Result<CommandEncoder> {
    let name = model.file_stem()
      .and_then(|x| x.to_str())
      .ok_or(anyhow!("Failed to parse model path {}.", model.display()))?
      .to_string();
    // `bash -c` splits the command into tokens.
    let mut child = Command::new("bash")
      .args(["-c", &format!("{} {}", command, model.display())])
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .spawn()
      .context(format!("Failed to start encoder `{}`.", command))?;
    let stdin = child.stdin.take().ok_or(anyhow!("Encoder has no stdin."))?;
    let stdout = child.stdout.take().ok_or(anyhow!("Encoder has no stdout."))?;
    Ok(CommandEncoder {
      name,
      child,
      stdin,
      stdout: BufReader::new(stdout),
      line: String::new(),
    })
  }
}

impl Encoder for CommandEncoder {
  fn name(&self) -> &str { &self.name }

  fn encode(&mut self, images: &[Image]) -> Result<Vec<Embedding>> {
    if images.is_empty() { return Ok(vec![]) }
    let header = BatchHeader {
      sizes: images.iter().map(|x| [x.width, x.height]).collect(),
    };
    serde_json::to_writer(&mut self.stdin, &header)?;
    self.stdin.write_all(b"\n")?;
    for image in images {
      self.stdin.write_all(&image.data)?;
    }
    self.stdin.flush().context("Failed to send batch to encoder.")?;

    self.line.clear();
    if self.stdout.read_line(&mut self.line)? == 0 {
      bail!("Encoder process closed its output.");
    }
    let vectors: Vec<Vec<f64>> = serde_json::from_str(&self.line)
      .context("Encoder answered with malformed JSON.")?;
    Ok(vectors.into_iter().map(DVector::from_vec).collect())
  }
}

impl Drop for CommandEncoder {
  fn drop(&mut self) {
    let _ = self.child.kill();
    let _ = self.child.wait();
  }
}
