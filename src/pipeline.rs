use crate::all::*;

pub const DETECTIONS_FILE: &'static str = "mtsc/mtsc_tc_mask_rcnn.txt";
pub const VIDEO_FILE: &'static str = "vdo.avi";
pub const CALIBRATION_FILE: &'static str = "calibration.txt";

// Files of one sequence under a dataset root:
//   <root>/train/<seq>/<camera>/{mtsc/mtsc_tc_mask_rcnn.txt, vdo.avi, calibration.txt}
//   <root>/cam_timestamp/<seq>.txt
//   <root>/cam_positions/<seq>.json
pub struct Dataset {
  root: PathBuf,
  sequence: String,
}

// Everything the association stages read, per camera.
pub struct Sequence {
  pub name: String,
  pub cameras: BTreeMap<CameraId, Camera>,
  pub tracks_by_cam: PerCamera<Track>,
  pub sources: BTreeMap<CameraId, Box<dyn FrameSource>>,
}

impl Dataset {
  pub fn new(root: &Path, sequence: &str) -> Dataset {
    Dataset {
      root: root.to_path_buf(),
      sequence: sequence.to_string(),
    }
  }

  pub fn sequence_dir(&self) -> PathBuf {
    self.root.join("train").join(&self.sequence)
  }

  pub fn camera_dir(&self, camera: &str) -> PathBuf {
    self.sequence_dir().join(camera)
  }

  pub fn timestamps_path(&self) -> PathBuf {
    self.root.join("cam_timestamp").join(format!("{}.txt", self.sequence))
  }

  pub fn positions_path(&self) -> PathBuf {
    self.root.join("cam_positions").join(format!("{}.json", self.sequence))
  }

  // Sorted non-hidden sub-directories of the sequence.
  pub fn camera_names(&self) -> Result<Vec<CameraId>> {
    let dir = self.sequence_dir();
    let mut names = vec![];
    let entries = std::fs::read_dir(&dir)
      .context(format!("Failed to list sequence directory {}.", dir.display()))?;
    for entry in entries {
      let entry = entry?;
      if !entry.file_type()?.is_dir() { continue }
      let name = entry.file_name().to_string_lossy().to_string();
      if name.starts_with('.') { continue }
      names.push(name);
    }
    names.sort();
    if names.is_empty() {
      bail!("No cameras in {}.", dir.display());
    }
    Ok(names)
  }

  // Cameras and their raw tracks, without opening the videos. `fps` gives the
  // frame rate of each camera.
  pub fn load_cameras(
    &self,
    fps: &BTreeMap<CameraId, f64>,
  ) -> Result<(BTreeMap<CameraId, Camera>, PerCamera<Track>)> {
    let timestamps = read_timestamps(&self.timestamps_path())?;
    let positions = read_positions(&self.positions_path())?;
    let mut cameras = BTreeMap::new();
    let mut tracks_by_cam = PerCamera::new();
    for (name, fps) in fps {
      let dir = self.camera_dir(name);
      let calibration = read_calibration(&dir.join(CALIBRATION_FILE))?;
      let time_offset = *timestamps.get(name)
        .ok_or(anyhow!("No timestamp for camera {} in {}.", name, self.timestamps_path().display()))?;
      let position = *positions.get(name)
        .ok_or(anyhow!("No position for camera {} in {}.", name, self.positions_path().display()))?;
      let detections = parse_annotations(&dir.join(DETECTIONS_FILE), name)?;
      let tracks = group_in_tracks(detections, name);
      debug!("Camera {}: {} tracks, offset {} s, {} fps.", name, tracks.len(), time_offset, fps);
      cameras.insert(name.clone(), Camera {
        calibration,
        position,
        time_offset,
        fps: *fps,
      });
      tracks_by_cam.insert(name.clone(), tracks);
    }
    Ok((cameras, tracks_by_cam))
  }

  pub fn load(&self) -> Result<Sequence> {
    let mut sources: BTreeMap<CameraId, Box<dyn FrameSource>> = BTreeMap::new();
    let mut fps = BTreeMap::new();
    for name in self.camera_names()? {
      let video = VideoInput::new(&self.camera_dir(&name).join(VIDEO_FILE))?;
      fps.insert(name.clone(), video.fps());
      sources.insert(name, Box::new(video));
    }
    let (cameras, tracks_by_cam) = self.load_cameras(&fps)?;
    info!("Loaded sequence {} with {} cameras.", self.sequence, cameras.len());
    Ok(Sequence {
      name: self.sequence.clone(),
      cameras,
      tracks_by_cam,
      sources,
    })
  }
}

// Runs the stages in order: static track filter, embeddings for every camera,
// then the cross-camera association and the labeled results.
pub struct Pipeline<'a> {
  encoder: &'a mut dyn Encoder,
  method: Method,
  cache_dir: Option<PathBuf>,
  p: ParameterSet,
}

impl<'a> Pipeline<'a> {
  pub fn new(
    encoder: &'a mut dyn Encoder,
    method: Method,
    cache_dir: Option<&Path>,
    p: &ParameterSet,
  ) -> Pipeline<'a> {
    Pipeline {
      encoder,
      method,
      cache_dir: cache_dir.map(|x| x.to_path_buf()),
      p: p.clone(),
    }
  }

  pub fn run(&mut self, mut sequence: Sequence) -> Result<BTreeMap<CameraId, Vec<ResultLine>>> {
    let tracks_by_cam: PerCamera<Track> = std::mem::take(&mut sequence.tracks_by_cam).into_iter()
      .map(|(camera, tracks)| (camera, filter_static(tracks, self.p.static_threshold)))
      .collect();
    let track_count: usize = tracks_by_cam.values().map(|x| x.len()).sum();
    info!("{} moving tracks in {} cameras.", track_count, tracks_by_cam.len());

    let embeddings = {
      let mut aggregator = EmbeddingAggregator::new(&mut *self.encoder, &self.p);
      let sources = &mut sequence.sources;
      match &self.cache_dir {
        Some(dir) => {
          let cache = EmbeddingCache::new(dir, &sequence.name, aggregator.model_name());
          debug!("Embedding cache {}.", cache.path().display());
          cache.load_or_compute(|| aggregator.compute(&tracks_by_cam, sources))?
        },
        None => aggregator.compute(&tracks_by_cam, sources)?,
      }
    };

    let filter = CandidateFilter::new(&sequence.cameras, &tracks_by_cam, &self.p)?;
    let groups = match self.method {
      Method::Chain => GreedyChaining::new(&self.p).associate(&filter, &embeddings).chains(),
      Method::Graph => GraphClustering::new(&self.p).associate(&filter, &embeddings),
    };
    let ids = assign_global_ids(&groups, &tracks_by_cam);
    Ok(materialize(&tracks_by_cam, &ids))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::candidates::tests::{camera, straight_track};
  use crate::encoder::tests::MeanColorEncoder;
  use crate::video::tests::MemoryVideo;
  use clap::Parser;

  fn parameters(args: &[&str]) -> ParameterSet {
    let mut all = vec!["mtmc", "--static-threshold", "5"];
    all.extend_from_slice(args);
    ParameterSet::parse_from(all)
  }

  // One car driving along +x past camera a and, two seconds later, past
  // camera b. The crops of camera a are a flat red of 10, those of camera b a
  // red of 12, so the mean color embeddings are 2.0 apart.
  fn sequence() -> Sequence {
    let mut cameras = BTreeMap::new();
    let mut tracks_by_cam = PerCamera::new();
    let mut sources: BTreeMap<CameraId, Box<dyn FrameSource>> = BTreeMap::new();
    let setup = [("a", 1000., 0., 10), ("b", 2000., 2., 12)];
    for (name, x, offset, red) in setup {
      cameras.insert(name.to_string(), camera(Vector2d::new(x, 40.), offset));
      let track = straight_track(name, 1, 0, 10, Vector2d::new(10., 40.), Vector2d::new(50., 40.));
      let mut tracks = Tracks::new();
      tracks.insert(TrackId(1), track);
      // A parked car.
      tracks.insert(TrackId(2), straight_track(name, 2, 0, 10, Vector2d::new(5., 60.), Vector2d::new(6., 60.)));
      tracks_by_cam.insert(name.to_string(), tracks);
      let frames = (0..10).map(|_| Some(Image::filled(64, 64, [red, 0, 0]))).collect();
      sources.insert(name.to_string(), Box::new(MemoryVideo::new(frames, 10.)));
    }
    Sequence {
      name: "S00".to_string(),
      cameras,
      tracks_by_cam,
      sources,
    }
  }

  fn ids(results: &BTreeMap<CameraId, Vec<ResultLine>>) -> Vec<(String, u32)> {
    let mut ids: Vec<(String, u32)> = results.iter()
      .flat_map(|(camera, lines)| lines.iter().map(move |x| (camera.clone(), x.id)))
      .collect();
    ids.dedup();
    ids
  }

  fn run(method: Method, args: &[&str]) -> BTreeMap<CameraId, Vec<ResultLine>> {
    let mut encoder = MeanColorEncoder::new();
    let p = parameters(args);
    Pipeline::new(&mut encoder, method, None, &p).run(sequence()).unwrap()
  }

  #[test]
  fn test_chain() {
    let results = run(Method::Chain, &["--chain-threshold", "3"]);
    assert_eq!(ids(&results), vec![("a".to_string(), 1), ("b".to_string(), 1)]);
    // Parked cars are not reported.
    assert_eq!(results["a"].len(), 10);

    let results = run(Method::Chain, &["--chain-threshold", "1"]);
    assert_eq!(ids(&results), vec![("a".to_string(), 1), ("b".to_string(), 2)]);
  }

  #[test]
  fn test_graph() {
    let results = run(Method::Graph, &["--eps", "3"]);
    assert_eq!(ids(&results), vec![("a".to_string(), 1), ("b".to_string(), 1)]);

    let results = run(Method::Graph, &["--eps", "1"]);
    assert_eq!(ids(&results), vec![("a".to_string(), 1), ("b".to_string(), 2)]);
  }

  #[test]
  fn test_cached_embeddings() {
    let dir = std::env::temp_dir().join(format!("mtmc-pipeline-{}", std::process::id()));
    let p = parameters(&["--chain-threshold", "3"]);
    let mut encoder = MeanColorEncoder::new();
    let first = Pipeline::new(&mut encoder, Method::Chain, Some(&dir), &p).run(sequence()).unwrap();
    assert!(dir.join("S00_mean_color.json").exists());
    let calls = encoder.calls.len();
    assert!(calls > 0);
    let second = Pipeline::new(&mut encoder, Method::Chain, Some(&dir), &p).run(sequence()).unwrap();
    assert_eq!(encoder.calls.len(), calls);
    assert_eq!(first, second);
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_dataset() {
    let root = std::env::temp_dir().join(format!("mtmc-dataset-{}", std::process::id()));
    let dataset = Dataset::new(&root, "S01");
    for camera in ["c002", "c001"] {
      let dir = dataset.camera_dir(camera);
      std::fs::create_dir_all(dir.join("mtsc")).unwrap();
      std::fs::write(dir.join(CALIBRATION_FILE), "Homography matrix: 2 0 0;0 2 0;0 0 1\n").unwrap();
      std::fs::write(dir.join(DETECTIONS_FILE), "1,3,10,10,20,20,0.9,-1,-1,-1\n2,3,12,10,20,20,0.9,-1,-1,-1\n").unwrap();
    }
    std::fs::create_dir_all(dataset.sequence_dir().join(".cache")).unwrap();
    std::fs::create_dir_all(root.join("cam_timestamp")).unwrap();
    std::fs::write(dataset.timestamps_path(), "c001 0\nc002 1.5\n").unwrap();
    std::fs::create_dir_all(root.join("cam_positions")).unwrap();
    std::fs::write(dataset.positions_path(), r#"{"c001": [0, 0], "c002": [100, 50]}"#).unwrap();

    assert_eq!(dataset.camera_names().unwrap(), vec!["c001".to_string(), "c002".to_string()]);
    let fps: BTreeMap<CameraId, f64> = [("c001".to_string(), 10.), ("c002".to_string(), 10.)].into_iter().collect();
    let (cameras, tracks_by_cam) = dataset.load_cameras(&fps).unwrap();
    assert_eq!(cameras["c002"].time_offset, 1.5);
    assert_eq!(cameras["c002"].position, Vector2d::new(100., 50.));
    // Bottom center (20, 30) of the first box, halved.
    let track = &tracks_by_cam["c001"][&TrackId(3)];
    let ground = cameras["c001"].ground_position(track.first().unwrap());
    assert!((ground - Vector2d::new(10., 15.)).norm() < 1e-9);
    assert_eq!(track.len(), 2);

    // A camera missing from the timestamps.
    std::fs::write(dataset.timestamps_path(), "c001 0\n").unwrap();
    assert!(dataset.load_cameras(&fps).is_err());
    std::fs::remove_dir_all(&root).unwrap();
  }
}
