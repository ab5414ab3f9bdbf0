use crate::all::*;

// Detections of one object within one camera, ordered by frame.
#[derive(Clone, Debug)]
pub struct Track {
  pub camera: CameraId,
  pub id: TrackId,
  detections: Vec<Detection>,
}

impl Track {
  pub fn new(camera: &str, id: TrackId, mut detections: Vec<Detection>) -> Track {
    detections.sort_by_key(|x| x.frame);
    Track {
      camera: camera.to_string(),
      id,
      detections,
    }
  }

  pub fn key(&self) -> TrackKey {
    TrackKey {
      camera: self.camera.clone(),
      id: self.id,
    }
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn first(&self) -> Option<&Detection> {
    self.detections.first()
  }

  pub fn last(&self) -> Option<&Detection> {
    self.detections.last()
  }
}

pub type Tracks = BTreeMap<TrackId, Track>;

pub fn group_in_tracks(detections: Vec<Detection>, camera: &str) -> Tracks {
  let mut by_id: BTreeMap<TrackId, Vec<Detection>> = BTreeMap::new();
  for detection in detections {
    by_id.entry(detection.id).or_default().push(detection);
  }
  by_id.into_iter()
    .map(|(id, detections)| (id, Track::new(camera, id, detections)))
    .collect()
}

// Parked cars and spurious detections barely move: the population standard
// deviation of the box centers is below `threshold` pixels on both axes.
pub fn is_static(track: &Track, threshold: f64) -> bool {
  let n = track.len();
  if n == 0 { return true }
  let mean = track.detections().iter()
    .fold(Vector2d::zeros(), |acc, x| acc + x.center()) / n as f64;
  let variance = track.detections().iter()
    .fold(Vector2d::zeros(), |acc, x| {
      let d = x.center() - mean;
      acc + d.component_mul(&d)
    }) / n as f64;
  variance.iter().all(|v| v.sqrt() < threshold)
}

pub fn filter_static(tracks: Tracks, threshold: f64) -> Tracks {
  let before = tracks.len();
  let tracks: Tracks = tracks.into_iter()
    .filter(|(_, track)| !is_static(track, threshold))
    .collect();
  debug!("Kept {} of {} tracks.", tracks.len(), before);
  tracks
}
