use crate::all::*;

pub const RESULT_FILE_NAME: &'static str = "results.txt";

// Global identity of every track of the sequence.
pub type GlobalIds = BTreeMap<TrackKey, u32>;

// One detection labeled with its global identity, in MOTChallenge layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultLine {
  // Zero-based, written one-based.
  pub frame: usize,
  pub id: u32,
  pub bbox: BoundingBox,
  pub score: f64,
}

impl fmt::Display for ResultLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{},{},{},{},{},{},-1,-1,-1",
      self.frame + 1,
      self.id,
      self.bbox.xtl as i64,
      self.bbox.ytl as i64,
      self.bbox.width() as i64,
      self.bbox.height() as i64,
      self.score,
    )
  }
}

// Groups get ids 1, 2, ... in order; tracks outside every group then get
// their own ids in camera and track order.
pub fn assign_global_ids(groups: &[Vec<TrackKey>], tracks_by_cam: &PerCamera<Track>) -> GlobalIds {
  let mut ids = GlobalIds::new();
  let mut next_id = 1;
  for group in groups {
    let mut used = false;
    for key in group {
      if ids.contains_key(key) {
        warn!("Track {} is in more than one identity group, keeping the first.", key);
        continue;
      }
      ids.insert(key.clone(), next_id);
      used = true;
    }
    if used { next_id += 1 }
  }
  let grouped = ids.len();
  for tracks in tracks_by_cam.values() {
    for track in tracks.values() {
      let key = track.key();
      if ids.contains_key(&key) { continue }
      ids.insert(key, next_id);
      next_id += 1;
    }
  }
  info!("{} tracks in {} identities, {} of the tracks matched across cameras.",
    ids.len(), next_id - 1, grouped);
  ids
}

pub fn materialize(tracks_by_cam: &PerCamera<Track>, ids: &GlobalIds) -> BTreeMap<CameraId, Vec<ResultLine>> {
  let mut results = BTreeMap::new();
  for (camera, tracks) in tracks_by_cam {
    let mut lines = vec![];
    for track in tracks.values() {
      let id = match ids.get(&track.key()) {
        Some(x) => *x,
        None => continue,
      };
      lines.extend(track.detections().iter().map(|d| ResultLine {
        frame: d.frame,
        id,
        bbox: d.bbox,
        score: d.score,
      }));
    }
    lines.sort_by_key(|x| x.frame);
    results.insert(camera.clone(), lines);
  }
  results
}

// `<dir>/<camera>/results.txt` for every camera.
pub fn write_results(results: &BTreeMap<CameraId, Vec<ResultLine>>, dir: &Path) -> Result<()> {
  for (camera, lines) in results {
    let camera_dir = dir.join(camera);
    std::fs::create_dir_all(&camera_dir)
      .context(format!("Failed to create directory {}.", camera_dir.display()))?;
    let path = camera_dir.join(RESULT_FILE_NAME);
    let file = File::create(&path)
      .context(format!("Failed to create {}.", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
      writeln!(writer, "{}", line)?;
    }
    writer.flush().context(format!("Failed to write {}.", path.display()))?;
    debug!("Wrote {} lines to {}.", lines.len(), path.display());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::track::tests::detection;

  fn tracks_by_cam() -> PerCamera<Track> {
    let mut tracks_by_cam = PerCamera::new();
    let c1 = group_in_tracks(vec![
      detection("c1", 1, 4, 50., 50.),
      detection("c1", 1, 2, 40., 50.),
      detection("c1", 2, 3, 10., 10.),
      detection("c1", 2, 0, 12., 10.),
    ], "c1");
    let c2 = group_in_tracks(vec![
      detection("c2", 7, 9, 100., 10.),
      detection("c2", 8, 1, 100., 10.),
    ], "c2");
    tracks_by_cam.insert("c1".to_string(), c1);
    tracks_by_cam.insert("c2".to_string(), c2);
    tracks_by_cam
  }

  #[test]
  fn test_assign_global_ids() {
    let groups = vec![
      vec![TrackKey::new("c1", 2), TrackKey::new("c2", 8)],
      // Overlap with the first group is ignored.
      vec![TrackKey::new("c2", 8)],
    ];
    let ids = assign_global_ids(&groups, &tracks_by_cam());
    assert_eq!(ids[&TrackKey::new("c1", 2)], 1);
    assert_eq!(ids[&TrackKey::new("c2", 8)], 1);
    // Singletons follow.
    assert_eq!(ids[&TrackKey::new("c1", 1)], 2);
    assert_eq!(ids[&TrackKey::new("c2", 7)], 3);
    assert_eq!(ids.len(), 4);
  }

  #[test]
  fn test_materialize() {
    let tracks_by_cam = tracks_by_cam();
    let ids = assign_global_ids(&[vec![TrackKey::new("c1", 2), TrackKey::new("c2", 8)]], &tracks_by_cam);
    let results = materialize(&tracks_by_cam, &ids);
    let frames: Vec<usize> = results["c1"].iter().map(|x| x.frame).collect();
    assert_eq!(frames, vec![0, 2, 3, 4]);
    assert!(results.values().all(|lines| lines.windows(2).all(|w| w[0].frame <= w[1].frame)));
    assert_eq!(results["c1"][0].to_string(), "1,1,2,0,20,20,1,-1,-1,-1");
    assert_eq!(results["c1"][1].to_string(), "3,2,30,40,20,20,1,-1,-1,-1");
    assert_eq!(results["c2"].len(), 2);
  }

  #[test]
  fn test_write_results() {
    let dir = std::env::temp_dir().join(format!("mtmc-results-{}", std::process::id()));
    let tracks_by_cam = tracks_by_cam();
    let ids = assign_global_ids(&[], &tracks_by_cam);
    write_results(&materialize(&tracks_by_cam, &ids), &dir).unwrap();
    let path = dir.join("c2").join(RESULT_FILE_NAME);
    let s = std::fs::read_to_string(&path).unwrap();
    assert_eq!(s, "2,4,90,0,20,20,1,-1,-1,-1\n10,3,90,0,20,20,1,-1,-1,-1\n");
    // Results parse back as detections.
    let detections = parse_annotations(&path, "c2").unwrap();
    assert_eq!(detections[0].frame, 1);
    assert_eq!(detections[0].id, TrackId(4));
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
