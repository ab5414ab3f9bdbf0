// Density-based clustering (DBSCAN) for the handful of points that a source
// track and its candidates make. Pairwise distances are computed up front.
//
// Neighborhoods include the point itself and every point within `eps`
// (inclusive), and a point is a core point when its neighborhood has at least
// `min_samples` members.

use crate::all::*;

pub struct Dbscan {
  pub eps: f64,
  pub min_samples: usize,
  pub metric: Metric,
}

impl Dbscan {
  pub fn new(p: &ParameterSet) -> Dbscan {
    Dbscan {
      eps: p.eps,
      min_samples: p.min_samples,
      metric: p.metric,
    }
  }

  // Cluster label per point, `None` for noise.
  pub fn fit(&self, points: &[&Embedding]) -> Vec<Option<usize>> {
    let n = points.len();
    let neighbors: Vec<Vec<usize>> = (0..n)
      .map(|i| (0..n).filter(|&j| self.metric.distance(points[i], points[j]) <= self.eps).collect())
      .collect();
    let is_core = |i: usize| neighbors[i].len() >= self.min_samples;

    let mut labels = vec![None; n];
    let mut cluster = 0;
    for i in 0..n {
      if labels[i].is_some() || !is_core(i) { continue }
      labels[i] = Some(cluster);
      let mut stack = vec![i];
      while let Some(j) = stack.pop() {
        for &k in &neighbors[j] {
          if labels[k].is_some() { continue }
          labels[k] = Some(cluster);
          // Border points join the cluster but do not extend it.
          if is_core(k) { stack.push(k) }
        }
      }
      cluster += 1;
    }
    labels
  }
}
