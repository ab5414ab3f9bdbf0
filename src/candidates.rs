use crate::all::*;

// Ground-plane motion of a track where it enters and leaves its camera.
#[derive(Clone, Debug)]
pub struct TrackMotion {
  // Displacement over the first second.
  pub entry_heading: Vector2d,
  // Displacement over the last second.
  pub exit_heading: Vector2d,
  pub exit_position: Vector2d,
  pub time_range: TimeRange,
}

impl TrackMotion {
  pub fn new(track: &Track, camera: &Camera) -> Option<TrackMotion> {
    let detections = track.detections();
    let last = detections.len().checked_sub(1)?;
    // Tracks shorter than a second use all they have.
    let lookback = camera.frames_per_second().min(last);
    let ground = |i: usize| camera.ground_position(&detections[i]);
    let exit_position = ground(last);
    Some(TrackMotion {
      entry_heading: ground(lookback) - ground(0),
      exit_heading: exit_position - ground(last - lookback),
      exit_position,
      time_range: camera.time_range(track)?,
    })
  }

  // Whether the object leaves in the direction of a camera at `position`.
  pub fn approaches(&self, position: &Vector2d, max_angle: f64) -> bool {
    match angle_between(&self.exit_heading, &(position - self.exit_position)) {
      Some(angle) => angle < max_angle,
      None => false,
    }
  }

  // Whether `next` can be the same object seen later in another camera.
  pub fn can_continue_as(&self, next: &TrackMotion, max_heading_angle: f64) -> bool {
    if next.time_range.start < self.time_range.start { return false }
    match angle_between(&self.exit_heading, &next.entry_heading) {
      Some(angle) => angle < max_heading_angle,
      None => false,
    }
  }
}

// Prunes cross-camera matching to tracks that are plausible continuations in
// space and time.
pub struct CandidateFilter<'a> {
  cameras: &'a BTreeMap<CameraId, Camera>,
  motions: PerCamera<TrackMotion>,
  max_camera_angle: f64,
  max_heading_angle: f64,
}

impl<'a> CandidateFilter<'a> {
  pub fn new(
    cameras: &'a BTreeMap<CameraId, Camera>,
    tracks_by_cam: &PerCamera<Track>,
    p: &ParameterSet,
  ) -> Result<CandidateFilter<'a>> {
    let mut motions = PerCamera::new();
    for (name, tracks) in tracks_by_cam {
      let camera = cameras.get(name)
        .ok_or(anyhow!("No calibration for camera {}.", name))?;
      let camera_motions: BTreeMap<TrackId, TrackMotion> = tracks.iter()
        .filter_map(|(id, track)| Some((*id, TrackMotion::new(track, camera)?)))
        .collect();
      motions.insert(name.clone(), camera_motions);
    }
    Ok(CandidateFilter {
      cameras,
      motions,
      max_camera_angle: p.max_camera_angle,
      max_heading_angle: p.max_heading_angle,
    })
  }

  pub fn motion(&self, key: &TrackKey) -> Option<&TrackMotion> {
    self.motions.get(&key.camera)?.get(&key.id)
  }

  // Every known track, in camera and id order.
  pub fn keys(&self) -> impl Iterator<Item = TrackKey> + '_ {
    self.motions.iter()
      .flat_map(|(camera, tracks)| tracks.keys().map(move |id| TrackKey { camera: camera.clone(), id: *id }))
  }

  // Tracks in other cameras that `source` may continue as. With `links`, only
  // tracks without a predecessor qualify, and a source that already has a
  // successor gets none.
  pub fn candidates(&self, source: &TrackKey, links: Option<&AssociationTable>) -> Vec<TrackKey> {
    let mut candidates = vec![];
    let motion = match self.motion(source) {
      Some(x) => x,
      None => return candidates,
    };
    if let Some(links) = links {
      if links.next(source).is_some() { return candidates }
    }
    for (name, camera) in self.cameras {
      if *name == source.camera { continue }
      // Moving away from the camera, it will not see this object next.
      if !motion.approaches(&camera.position, self.max_camera_angle) { continue }
      let tracks = match self.motions.get(name) {
        Some(x) => x,
        None => continue,
      };
      for (id, other) in tracks {
        if !motion.can_continue_as(other, self.max_heading_angle) { continue }
        let key = TrackKey { camera: name.clone(), id: *id };
        if let Some(links) = links {
          if links.prev(&key).is_some() { continue }
        }
        candidates.push(key);
      }
    }
    candidates
  }
}
