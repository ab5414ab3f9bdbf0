use crate::all::*;

// Undirected graph over tracks, edges join tracks judged to be one object.
#[derive(Clone, Debug, Default)]
pub struct Graph {
  adjacency: BTreeMap<TrackKey, BTreeSet<TrackKey>>,
}

impl Graph {
  pub fn new() -> Graph {
    Graph::default()
  }

  pub fn add_edge(&mut self, a: &TrackKey, b: &TrackKey) {
    if a == b { return }
    self.adjacency.entry(a.clone()).or_default().insert(b.clone());
    self.adjacency.entry(b.clone()).or_default().insert(a.clone());
  }

  pub fn node_count(&self) -> usize {
    self.adjacency.len()
  }

  pub fn edge_count(&self) -> usize {
    self.adjacency.values().map(|x| x.len()).sum::<usize>() / 2
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.adjacency.is_empty()
  }

  #[allow(dead_code)]
  pub fn has_edge(&self, a: &TrackKey, b: &TrackKey) -> bool {
    self.adjacency.get(a).map_or(false, |x| x.contains(b))
  }

  #[allow(dead_code)]
  pub fn nodes(&self) -> impl Iterator<Item = &TrackKey> {
    self.adjacency.keys()
  }

  // Removes the nodes and their edges. Their neighbors stay, possibly isolated.
  pub fn remove_nodes(&mut self, nodes: &[TrackKey]) {
    for node in nodes {
      if let Some(neighbors) = self.adjacency.remove(node) {
        for neighbor in neighbors {
          if let Some(x) = self.adjacency.get_mut(&neighbor) {
            x.remove(node);
          }
        }
      }
    }
  }

  // All maximal cliques, each sorted. Bron–Kerbosch with pivoting; exponential
  // in the worst case, fine for the sparse graphs of a few cameras.
  pub fn maximal_cliques(&self) -> Vec<Vec<TrackKey>> {
    let mut cliques = vec![];
    let p: BTreeSet<TrackKey> = self.adjacency.keys().cloned().collect();
    self.bron_kerbosch(&mut vec![], p, BTreeSet::new(), &mut cliques);
    cliques
  }

  fn bron_kerbosch(
    &self,
    r: &mut Vec<TrackKey>,
    mut p: BTreeSet<TrackKey>,
    mut x: BTreeSet<TrackKey>,
    cliques: &mut Vec<Vec<TrackKey>>,
  ) {
    if p.is_empty() {
      // An empty `r` only happens on an empty graph, which has no cliques.
      if x.is_empty() && !r.is_empty() {
        let mut clique = r.clone();
        clique.sort();
        cliques.push(clique);
      }
      return;
    }
    // Neighbors of the pivot are covered by the branch of the pivot itself.
    let pivot = p.iter().chain(x.iter())
      .max_by_key(|u| self.adjacency[*u].intersection(&p).count())
      .cloned();
    let branches: Vec<TrackKey> = match pivot {
      Some(u) => p.difference(&self.adjacency[&u]).cloned().collect(),
      None => vec![],
    };
    for v in branches {
      let neighbors = &self.adjacency[&v];
      r.push(v.clone());
      self.bron_kerbosch(
        r,
        p.intersection(neighbors).cloned().collect(),
        x.intersection(neighbors).cloned().collect(),
        cliques,
      );
      r.pop();
      p.remove(&v);
      x.insert(v);
    }
  }

  // The largest clique; among equally large ones the smallest in track order.
  pub fn maximum_clique(&self) -> Option<Vec<TrackKey>> {
    self.maximal_cliques().into_iter()
      .min_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)))
  }

  pub fn connected_components(&self) -> Vec<Vec<TrackKey>> {
    let mut seen = BTreeSet::new();
    let mut components = vec![];
    for start in self.adjacency.keys() {
      if seen.contains(start) { continue }
      seen.insert(start.clone());
      let mut component = vec![];
      let mut stack = vec![start.clone()];
      while let Some(node) = stack.pop() {
        for neighbor in &self.adjacency[&node] {
          if seen.insert(neighbor.clone()) {
            stack.push(neighbor.clone());
          }
        }
        component.push(node);
      }
      component.sort();
      components.push(component);
    }
    components
  }
}

// Repeatedly takes out the largest clique until no node is left. Every node
// ends up in exactly one group.
pub fn extract_cliques(mut graph: Graph) -> Vec<Vec<TrackKey>> {
  let mut groups = vec![];
  while let Some(clique) = graph.maximum_clique() {
    graph.remove_nodes(&clique);
    groups.push(clique);
  }
  groups
}

pub fn extract_groups(graph: Graph, grouping: Grouping) -> Vec<Vec<TrackKey>> {
  match grouping {
    Grouping::Clique => extract_cliques(graph),
    Grouping::Components => graph.connected_components(),
  }
}

// Confirms spatiotemporal candidates by appearance: the source and its
// candidates are clustered, and the source is joined to the candidates in its
// own cluster.
pub struct GraphClustering {
  dbscan: Dbscan,
  grouping: Grouping,
}

impl GraphClustering {
  pub fn new(p: &ParameterSet) -> GraphClustering {
    GraphClustering {
      dbscan: Dbscan::new(p),
      grouping: p.grouping,
    }
  }

  pub fn build_graph(&self, filter: &CandidateFilter, embeddings: &Embeddings) -> Graph {
    let mut graph = Graph::new();
    for source in filter.keys() {
      let e1 = match embedding_of(embeddings, &source) {
        Some(x) => x,
        None => continue,
      };
      let candidates: Vec<(TrackKey, &Embedding)> = filter.candidates(&source, None)
        .into_iter()
        .filter_map(|key| {
          let e2 = embedding_of(embeddings, &key)?;
          Some((key, e2))
        })
        .collect();
      if candidates.is_empty() { continue }

      let mut points = vec![e1];
      points.extend(candidates.iter().map(|x| x.1));
      let labels = self.dbscan.fit(&points);
      let label = match labels[0] {
        Some(x) => x,
        None => continue,
      };
      for ((key, _), other) in candidates.iter().zip(&labels[1..]) {
        if *other == Some(label) {
          debug!("Edge {} - {}.", source, key);
          graph.add_edge(&source, key);
        }
      }
    }
    graph
  }

  pub fn associate(&self, filter: &CandidateFilter, embeddings: &Embeddings) -> Vec<Vec<TrackKey>> {
    let graph = self.build_graph(filter, embeddings);
    info!("Track graph has {} nodes and {} edges.", graph.node_count(), graph.edge_count());
    let groups = extract_groups(graph, self.grouping);
    info!("Extracted {} identity groups.", groups.len());
    groups
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::candidates::tests::{parameters, road};
  use nalgebra::dvector;

  fn key(id: u32) -> TrackKey {
    TrackKey::new(&format!("c{}", id / 10), id)
  }

  fn graph(edges: &[(u32, u32)]) -> Graph {
    let mut graph = Graph::new();
    for (a, b) in edges {
      graph.add_edge(&key(*a), &key(*b));
    }
    graph
  }

  fn keys(ids: &[u32]) -> Vec<TrackKey> {
    let mut keys: Vec<TrackKey> = ids.iter().map(|x| key(*x)).collect();
    keys.sort();
    keys
  }

  #[test]
  fn test_graph() {
    let mut g = graph(&[(1, 2), (2, 3), (2, 2)]);
    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 2);
    assert!(g.has_edge(&key(2), &key(1)));
    assert!(!g.has_edge(&key(1), &key(3)));
    g.remove_nodes(&[key(2)]);
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.edge_count(), 0);
  }

  #[test]
  fn test_maximal_cliques() {
    // Triangle 1-2-3 with a tail 3-4, and a separate edge 5-6.
    let g = graph(&[(1, 2), (2, 3), (1, 3), (3, 4), (5, 6)]);
    let mut cliques = g.maximal_cliques();
    cliques.sort();
    assert_eq!(cliques, vec![keys(&[1, 2, 3]), keys(&[3, 4]), keys(&[5, 6])]);
    assert_eq!(g.maximum_clique(), Some(keys(&[1, 2, 3])));
  }

  #[test]
  fn test_empty_graph() {
    assert!(Graph::new().maximal_cliques().is_empty());
    assert_eq!(Graph::new().maximum_clique(), None);
    assert!(extract_cliques(Graph::new()).is_empty());
    assert!(extract_groups(Graph::new(), Grouping::Components).is_empty());
    // Removing the last clique leaves an empty graph behind.
    let mut g = graph(&[(1, 2)]);
    g.remove_nodes(&keys(&[1, 2]));
    assert_eq!(g.maximum_clique(), None);
    assert_eq!(extract_cliques(graph(&[(1, 2)])), vec![keys(&[1, 2])]);
  }

  #[test]
  fn test_extract_cliques() {
    // Two triangles bridged through 3-11; components would merge them.
    let g = graph(&[(1, 2), (2, 3), (1, 3), (3, 11), (11, 12), (12, 13), (11, 13), (13, 21)]);
    let groups = extract_cliques(g.clone());
    assert_eq!(groups, vec![keys(&[1, 2, 3]), keys(&[11, 12, 13]), keys(&[21])]);
    let components = extract_groups(g, Grouping::Components);
    assert_eq!(components, vec![keys(&[1, 2, 3, 11, 12, 13, 21])]);
  }

  #[test]
  fn test_extract_partition() {
    let mut edges = vec![];
    for a in 0..30u32 {
      for b in (a + 1)..30 {
        if (a * 31 + b * 17) % 5 == 0 {
          edges.push((a, b));
        }
      }
    }
    let g = graph(&edges);
    let nodes: BTreeSet<TrackKey> = g.nodes().cloned().collect();
    let groups = extract_cliques(g.clone());
    let mut seen = BTreeSet::new();
    for group in &groups {
      for (i, a) in group.iter().enumerate() {
        assert!(seen.insert(a.clone()));
        for b in &group[(i + 1)..] {
          assert!(g.has_edge(a, b));
        }
      }
    }
    assert_eq!(seen, nodes);
    // Groups come out largest first.
    assert!(groups.windows(2).all(|w| w[0].len() >= w[1].len()));
  }

  fn embeddings(values: &[(&str, u32, f64)]) -> Embeddings {
    let mut embeddings = Embeddings::new();
    for (camera, id, v) in values {
      embeddings.entry(camera.to_string()).or_default().insert(TrackId(*id), dvector![*v]);
    }
    embeddings
  }

  #[test]
  fn test_build_graph() {
    let (cameras, tracks_by_cam) = road();
    let p = parameters();
    let filter = CandidateFilter::new(&cameras, &tracks_by_cam, &p).unwrap();
    // c0/1 looks like c1/1 and c2/1, c2/2 looks different. c1/1 looks like c2/1.
    let embeddings = embeddings(&[
      ("c0", 1, 0.), ("c1", 1, 0.1), ("c1", 2, 0.),
      ("c2", 1, 0.2), ("c2", 2, 3.), ("c2", 3, 0.),
    ]);
    let clustering = GraphClustering::new(&p);
    let g = clustering.build_graph(&filter, &embeddings);
    assert_eq!(g.node_count(), 3);
    assert!(g.has_edge(&TrackKey::new("c0", 1), &TrackKey::new("c1", 1)));
    assert!(g.has_edge(&TrackKey::new("c0", 1), &TrackKey::new("c2", 1)));
    assert!(g.has_edge(&TrackKey::new("c1", 1), &TrackKey::new("c2", 1)));
    assert_eq!(clustering.associate(&filter, &embeddings), vec![vec![
      TrackKey::new("c0", 1), TrackKey::new("c1", 1), TrackKey::new("c2", 1),
    ]]);
  }

  #[test]
  fn test_noise_source() {
    let (cameras, tracks_by_cam) = road();
    let p = parameters();
    let filter = CandidateFilter::new(&cameras, &tracks_by_cam, &p).unwrap();
    // c0/1 is far from all its candidates, which cluster among themselves.
    let embeddings = embeddings(&[
      ("c0", 1, 9.), ("c1", 1, 0.), ("c2", 1, 5.), ("c2", 2, 0.1),
    ]);
    let g = GraphClustering::new(&p).build_graph(&filter, &embeddings);
    assert!(g.is_empty());
  }
}
