use crate::all::*;

// Successor and predecessor of each linked track. Every track has at most one
// of each, so the links form simple chains.
#[derive(Clone, Debug, Default)]
pub struct AssociationTable {
  next: BTreeMap<TrackKey, TrackKey>,
  prev: BTreeMap<TrackKey, TrackKey>,
}

impl AssociationTable {
  pub fn new() -> AssociationTable {
    AssociationTable::default()
  }

  pub fn next(&self, key: &TrackKey) -> Option<&TrackKey> {
    self.next.get(key)
  }

  pub fn prev(&self, key: &TrackKey) -> Option<&TrackKey> {
    self.prev.get(key)
  }

  pub fn len(&self) -> usize {
    self.next.len()
  }

  // Returns false and changes nothing if the link would give `from` a second
  // successor, `to` a second predecessor, or close a loop.
  pub fn link(&mut self, from: &TrackKey, to: &TrackKey) -> bool {
    if from == to || self.next.contains_key(from) || self.prev.contains_key(to) { return false }
    // `to` has no predecessor, so it starts a chain; walk it looking for `from`.
    let mut key = Some(to);
    while let Some(k) = key {
      if k == from { return false }
      key = self.next.get(k);
    }
    self.next.insert(from.clone(), to.clone());
    self.prev.insert(to.clone(), from.clone());
    true
  }

  // Tracks that start a chain of at least two.
  pub fn heads(&self) -> Vec<TrackKey> {
    self.next.keys()
      .filter(|k| !self.prev.contains_key(k))
      .cloned()
      .collect()
  }

  // Each chain from its head to the track without a successor.
  pub fn chains(&self) -> Vec<Vec<TrackKey>> {
    self.heads().into_iter()
      .map(|head| {
        let mut chain = vec![head.clone()];
        let mut key = head;
        while let Some(next) = self.next.get(&key) {
          chain.push(next.clone());
          key = next.clone();
        }
        chain
      })
      .collect()
  }
}

// Links each track to the most similar plausible successor, one pass in track
// order without revisiting earlier decisions.
pub struct GreedyChaining {
  metric: Metric,
  threshold: f64,
}

impl GreedyChaining {
  pub fn new(p: &ParameterSet) -> GreedyChaining {
    GreedyChaining {
      metric: p.metric,
      threshold: p.chain_threshold,
    }
  }

  pub fn associate(&self, filter: &CandidateFilter, embeddings: &Embeddings) -> AssociationTable {
    let mut links = AssociationTable::new();
    for source in filter.keys() {
      let e1 = match embedding_of(embeddings, &source) {
        Some(x) => x,
        None => continue,
      };
      let candidates: Vec<(TrackKey, &Embedding)> = filter.candidates(&source, Some(&links))
        .into_iter()
        .filter_map(|key| {
          let e2 = embedding_of(embeddings, &key)?;
          Some((key, e2))
        })
        .collect();
      if candidates.is_empty() { continue }

      let others: Vec<&Embedding> = candidates.iter().map(|x| x.1).collect();
      let distances = self.metric.distances(e1, &others);
      let (best, distance) = distances.iter().enumerate()
        .fold((0, f64::INFINITY), |(bi, bd), (i, d)| if *d < bd { (i, *d) } else { (bi, bd) });
      let target = &candidates[best].0;
      if distance < self.threshold && links.link(&source, target) {
        debug!("Linked {} -> {} at distance {:.3}.", source, target, distance);
      }
      else {
        debug!("Closest candidate of {} is {} at distance {:.3}, not linked.", source, target, distance);
      }
    }
    info!("Greedy chaining made {} links.", links.len());
    links
  }
}
