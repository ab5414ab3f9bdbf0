use crate::all::*;

// Eigen-like aliases.
pub type Vector2d = nalgebra::Vector2::<f64>;
pub type Vector3d = nalgebra::Vector3::<f64>;
pub type Matrix3d = nalgebra::Matrix3::<f64>;

// Appearance descriptor of a whole track.
pub type Embedding = DVector<f64>;

pub type CameraId = String;

// Local id assigned by the single-camera tracker. Only unique within one camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

// Globally unique handle of a track: camera plus local id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackKey {
  pub camera: CameraId,
  pub id: TrackId,
}

impl TrackKey {
  pub fn new(camera: &str, id: u32) -> TrackKey {
    TrackKey {
      camera: camera.to_string(),
      id: TrackId(id),
    }
  }
}

impl fmt::Display for TrackKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.camera, self.id)
  }
}

// Camera → local id → value, ordered so that every pass is deterministic.
pub type PerCamera<T> = BTreeMap<CameraId, BTreeMap<TrackId, T>>;
