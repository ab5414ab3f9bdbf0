use crate::all::*;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

pub type Embeddings = PerCamera<Embedding>;

// Tracks without usable crops have no embedding and cannot be matched.
pub fn embedding_of<'e>(embeddings: &'e Embeddings, key: &TrackKey) -> Option<&'e Embedding> {
  embeddings.get(&key.camera)?.get(&key.id)
}

// Common length of all vectors, `None` when there are none. Vectors of zero
// or differing length cannot be compared.
pub fn common_dimension(embeddings: &Embeddings) -> Result<Option<usize>> {
  let mut dimension = None;
  for (camera, tracks) in embeddings {
    for (id, v) in tracks {
      if v.is_empty() {
        bail!("Embedding of {}/{} is empty.", camera, id);
      }
      match dimension {
        Some(d) if d != v.len() => {
          bail!("Embedding of {}/{} has dimension {}, expected {}.", camera, id, v.len(), d);
        },
        _ => dimension = Some(v.len()),
      }
    }
  }
  Ok(dimension)
}

pub struct EmbeddingAggregator<'a> {
  encoder: &'a mut dyn Encoder,
  mode: EmbeddingMode,
  max_views: usize,
  batch_size: usize,
  rng: Xoshiro256PlusPlus,
}

// Running mean of the per-crop embeddings of each track.
#[derive(Default)]
struct MeanPool {
  sums: BTreeMap<TrackId, (Embedding, usize)>,
  dimension: Option<usize>,
}

impl MeanPool {
  fn add(&mut self, id: TrackId, embedding: Embedding) -> Result<()> {
    match self.dimension {
      Some(d) if d != embedding.len() => {
        bail!("Encoder returned a vector of dimension {}, expected {}.", embedding.len(), d);
      },
      _ => self.dimension = Some(embedding.len()),
    }
    match self.sums.get_mut(&id) {
      Some((sum, n)) => {
        *sum += embedding;
        *n += 1;
      },
      None => {
        self.sums.insert(id, (embedding, 1));
      },
    }
    Ok(())
  }

  fn means(self) -> BTreeMap<TrackId, Embedding> {
    self.sums.into_iter()
      .map(|(id, (sum, n))| (id, sum / n as f64))
      .collect()
  }
}

// Crops waiting for the encoder, with the tracks they belong to.
struct Batch {
  images: Vec<Image>,
  ids: Vec<TrackId>,
}

impl Batch {
  fn new() -> Batch {
    Batch { images: vec![], ids: vec![] }
  }

  fn len(&self) -> usize { self.images.len() }

  fn push(&mut self, id: TrackId, image: Image) {
    self.images.push(image);
    self.ids.push(id);
  }

  fn flush(&mut self, encoder: &mut dyn Encoder, pool: &mut MeanPool) -> Result<()> {
    if self.images.is_empty() { return Ok(()) }
    let embeddings = encoder.encode(&self.images)
      .context(format!("Encoder {} failed on a batch of {}.", encoder.name(), self.images.len()))?;
    if embeddings.len() != self.images.len() {
      bail!("Encoder returned {} vectors for {} images.", embeddings.len(), self.images.len());
    }
    for (id, embedding) in self.ids.iter().zip(embeddings) {
      pool.add(*id, embedding)?;
    }
    self.images.clear();
    self.ids.clear();
    Ok(())
  }
}

impl<'a> EmbeddingAggregator<'a> {
  pub fn new(encoder: &'a mut dyn Encoder, p: &ParameterSet) -> EmbeddingAggregator<'a> {
    EmbeddingAggregator {
      encoder,
      mode: p.embedding_mode,
      max_views: p.max_views.max(1),
      batch_size: p.batch_size.max(1),
      rng: Xoshiro256PlusPlus::seed_from_u64(p.seed),
    }
  }

  pub fn model_name(&self) -> &str {
    self.encoder.name()
  }

  pub fn compute(
    &mut self,
    tracks_by_cam: &PerCamera<Track>,
    sources: &mut BTreeMap<CameraId, Box<dyn FrameSource>>,
  ) -> Result<Embeddings> {
    let mut embeddings = Embeddings::new();
    for (camera, tracks) in tracks_by_cam {
      let source = sources.get_mut(camera)
        .ok_or(anyhow!("No video for camera {}.", camera))?;
      info!("Computing embeddings for camera {} ({} tracks).", camera, tracks.len());
      let camera_embeddings = self.compute_camera(tracks, &mut **source)
        .context(format!("Failed to compute embeddings for camera {}.", camera))?;
      if camera_embeddings.len() < tracks.len() {
        warn!("Camera {}: {} tracks had no usable crops.", camera, tracks.len() - camera_embeddings.len());
      }
      embeddings.insert(camera.clone(), camera_embeddings);
      common_dimension(&embeddings)
        .context(format!("Encoder {} changed its output on camera {}.", self.encoder.name(), camera))?;
    }
    Ok(embeddings)
  }

  pub fn compute_camera(
    &mut self,
    tracks: &Tracks,
    source: &mut dyn FrameSource,
  ) -> Result<BTreeMap<TrackId, Embedding>> {
    if tracks.is_empty() { return Ok(BTreeMap::new()) }
    match self.mode {
      EmbeddingMode::Sampled => self.sampled(tracks, source),
      EmbeddingMode::Sequential => self.sequential(tracks, source),
    }
  }

  // Up to `max_views` random detections per track, one encoder call per track.
  // The samples of all tracks are read in a single forward pass over the video.
  fn sampled(
    &mut self,
    tracks: &Tracks,
    source: &mut dyn FrameSource,
  ) -> Result<BTreeMap<TrackId, Embedding>> {
    let mut samples: Vec<&Detection> = vec![];
    for track in tracks.values() {
      let n = track.len().min(self.max_views);
      let indices = rand::seq::index::sample(&mut self.rng, track.len(), n);
      samples.extend(indices.iter().map(|i| &track.detections()[i]));
    }

    let mut crops: BTreeMap<TrackId, Vec<Image>> = BTreeMap::new();
    source.reset()?;
    for detections in group_by_frame(samples).values() {
      let frame = detections[0].frame;
      source.seek(frame)?;
      if source.position() != frame { break }
      let image = match source.read()? {
        Some(x) => x,
        None => continue,
      };
      for detection in detections {
        if let Some(crop) = image.crop(&detection.bbox) {
          crops.entry(detection.id).or_default().push(crop);
        }
      }
    }

    let mut pool = MeanPool::default();
    for (id, images) in crops {
      let mut batch = Batch::new();
      for image in images {
        batch.push(id, image);
      }
      batch.flush(&mut *self.encoder, &mut pool)?;
    }
    Ok(pool.means())
  }

  // Every detection of every track, reading each frame once. Crops are
  // encoded whenever `batch_size` of them have accumulated.
  fn sequential(
    &mut self,
    tracks: &Tracks,
    source: &mut dyn FrameSource,
  ) -> Result<BTreeMap<TrackId, Embedding>> {
    let detections_by_frame = group_by_frame(tracks.values().flat_map(|x| x.detections()));
    let mut pool = MeanPool::default();
    let mut batch = Batch::new();
    source.reset()?;
    let length = source.frame_count();
    for _ in 0..length {
      let frame = source.position();
      let image = match source.read()? {
        Some(x) => x,
        None => {
          if source.position() == frame { break }
          debug!("Skipping unreadable frame {}.", frame);
          continue;
        },
      };
      let detections = match detections_by_frame.get(&frame) {
        Some(x) => x,
        None => continue,
      };
      for detection in detections {
        if let Some(crop) = image.crop(&detection.bbox) {
          batch.push(detection.id, crop);
        }
      }
      if batch.len() >= self.batch_size {
        batch.flush(&mut *self.encoder, &mut pool)?;
      }
    }
    batch.flush(&mut *self.encoder, &mut pool)?;
    Ok(pool.means())
  }
}

// Embeddings persisted per (sequence, model), so that the video pass runs once.
pub struct EmbeddingCache {
  path: PathBuf,
  sequence: String,
  model: String,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
  sequence: String,
  model: String,
  embeddings: BTreeMap<CameraId, BTreeMap<u32, Vec<f64>>>,
}

impl EmbeddingCache {
  pub fn new(dir: &Path, sequence: &str, model: &str) -> EmbeddingCache {
    let file_name = format!("{}_{}.json", sequence, model).replace(|c: char| c == '/' || c == '\\', "_");
    EmbeddingCache {
      path: dir.join(file_name),
      sequence: sequence.to_string(),
      model: model.to_string(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  // `Ok(None)` when there is no cache yet.
  pub fn load(&self) -> Result<Option<Embeddings>> {
    if !self.path.exists() { return Ok(None) }
    let file = File::open(&self.path)
      .context(format!("Failed to open {}.", self.path.display()))?;
    let cache: CacheFile = serde_json::from_reader(BufReader::new(file))
      .context(format!("Failed to parse {}.", self.path.display()))?;
    if cache.sequence != self.sequence || cache.model != self.model {
      bail!("{} holds embeddings of {}/{}, expected {}/{}.", self.path.display(),
        cache.sequence, cache.model, self.sequence, self.model);
    }
    let embeddings: Embeddings = cache.embeddings.into_iter()
      .map(|(camera, tracks)| {
        let tracks = tracks.into_iter()
          .map(|(id, v)| (TrackId(id), DVector::from_vec(v)))
          .collect();
        (camera, tracks)
      })
      .collect();
    common_dimension(&embeddings)
      .context(format!("Inconsistent embeddings in {}.", self.path.display()))?;
    Ok(Some(embeddings))
  }

  pub fn save(&self, embeddings: &Embeddings) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      std::fs::create_dir_all(dir)
        .context(format!("Failed to create directory {}.", dir.display()))?;
    }
    let cache = CacheFile {
      sequence: self.sequence.clone(),
      model: self.model.clone(),
      embeddings: embeddings.iter()
        .map(|(camera, tracks)| {
          let tracks = tracks.iter()
            .map(|(id, v)| (id.0, v.iter().copied().collect()))
            .collect();
          (camera.clone(), tracks)
        })
        .collect(),
    };
    let file = File::create(&self.path)
      .context(format!("Failed to create {}.", self.path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &cache)?;
    writer.flush()?;
    Ok(())
  }

  // A corrupt cache is reported and then overwritten with fresh results.
  pub fn load_or_compute<F>(&self, compute: F) -> Result<Embeddings>
  where F: FnOnce() -> Result<Embeddings> {
    match self.load() {
      Ok(Some(embeddings)) => {
        info!("Loaded embeddings from {}.", self.path.display());
        return Ok(embeddings);
      },
      Ok(None) => {},
      Err(err) => warn!("Ignoring embedding cache: {:#}", err),
    }
    let embeddings = compute()?;
    self.save(&embeddings)?;
    info!("Saved embeddings to {}.", self.path.display());
    Ok(embeddings)
  }
}
