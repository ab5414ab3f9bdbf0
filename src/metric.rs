use crate::all::*;

// Distance between two appearance descriptors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Metric {
  #[default]
  Euclidean,
  // One minus cosine similarity, in [0, 2].
  Cosine,
  Manhattan,
}

impl Metric {
  pub fn distance(&self, a: &Embedding, b: &Embedding) -> f64 {
    assert_eq!(a.len(), b.len());
    match self {
      Metric::Euclidean => (a - b).norm(),
      Metric::Cosine => {
        let n = a.norm() * b.norm();
        if n > 0. { 1. - a.dot(b) / n } else { 1. }
      },
      Metric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
    }
  }

  // Distances from `a` to each of `others`, in order.
  pub fn distances(&self, a: &Embedding, others: &[&Embedding]) -> Vec<f64> {
    others.iter().map(|b| self.distance(a, b)).collect()
  }
}

impl FromStr for Metric {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "euclidean" => Ok(Metric::Euclidean),
      "cosine" => Ok(Metric::Cosine),
      "manhattan" | "cityblock" => Ok(Metric::Manhattan),
      _ => Err(format!("Unknown metric {}.", s)),
    }
  }
}
