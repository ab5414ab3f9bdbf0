use crate::all::*;

// Everything known about one camera of a sequence.
#[derive(Clone, Debug)]
pub struct Camera {
  pub calibration: Calibration,
  // Ground-plane location of the camera itself.
  pub position: Vector2d,
  // Start of recording in seconds on the shared clock of the sequence.
  pub time_offset: f64,
  pub fps: f64,
}

#[derive(Clone, Debug)]
pub struct Calibration {
  // Inverse of the homography that maps ground-plane coordinates to pixels.
  pub image_to_ground: Matrix3d,
}

impl Calibration {
  pub fn new(ground_to_image: Matrix3d) -> Result<Calibration> {
    let image_to_ground = ground_to_image.try_inverse()
      .ok_or(anyhow!("Homography is not invertible."))?;
    Ok(Calibration { image_to_ground })
  }

  // Pixels are ground coordinates.
  #[allow(dead_code)]
  pub fn identity() -> Calibration {
    Calibration { image_to_ground: Matrix3d::identity() }
  }

  pub fn pixel_to_ground(&self, pixel: Vector2d) -> Vector2d {
    let p = self.image_to_ground * Vector3d::new(pixel[0], pixel[1], 1.);
    Vector2d::new(p[0] / p[2], p[1] / p[2])
  }

  pub fn bbox_to_ground(&self, bbox: &BoundingBox) -> Vector2d {
    self.pixel_to_ground(bbox.bottom_center())
  }
}

// Seconds on the shared clock between the first and last detection of a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
  pub start: f64,
  pub end: f64,
}

impl Camera {
  pub fn frame_time(&self, frame: usize) -> f64 {
    frame as f64 / self.fps + self.time_offset
  }

  pub fn time_range(&self, track: &Track) -> Option<TimeRange> {
    Some(TimeRange {
      start: self.frame_time(track.first()?.frame),
      end: self.frame_time(track.last()?.frame),
    })
  }

  pub fn ground_position(&self, detection: &Detection) -> Vector2d {
    self.calibration.bbox_to_ground(&detection.bbox)
  }

  // Number of frames that span roughly one second, at least one.
  pub fn frames_per_second(&self) -> usize {
    (self.fps as usize).max(1)
  }
}
