use crate::all::*;

lazy_static! {
  pub static ref PARAMETER_SET: Mutex<ParameterSet> = Mutex::new(ParameterSet::default());
}

#[derive(Clone, Debug, Default)]
#[derive(clap::Parser)]
pub struct ParameterSet {
  // Track aggregation. Standard deviation of detection centers in pixels.
  #[clap(long, default_value = "175")]
  pub static_threshold: f64,

  // Embedding aggregation.
  #[clap(long, default_value = "sequential")]
  pub embedding_mode: EmbeddingMode,
  #[clap(long, default_value = "32")]
  pub max_views: usize,
  #[clap(long, default_value = "512")]
  pub batch_size: usize,
  #[clap(long, default_value = "0")]
  pub seed: u64,

  // Spatiotemporal candidate filter, degrees.
  #[clap(long, default_value = "45")]
  pub max_camera_angle: f64,
  #[clap(long, default_value = "15")]
  pub max_heading_angle: f64,

  // Appearance matching.
  #[clap(long, default_value = "euclidean")]
  pub metric: Metric,
  #[clap(long, default_value = "10")]
  pub chain_threshold: f64,
  #[clap(long, default_value = "0.3")]
  pub eps: f64,
  #[clap(long, default_value = "2")]
  pub min_samples: usize,
  #[clap(long, default_value = "clique")]
  pub grouping: Grouping,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum EmbeddingMode {
  // Random subset of each track, frames read per track.
  Sampled,
  // One pass over every frame of the video, crops batched across tracks.
  #[default]
  Sequential,
}

impl FromStr for EmbeddingMode {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "sampled" => Ok(EmbeddingMode::Sampled),
      "sequential" => Ok(EmbeddingMode::Sequential),
      _ => Err(format!("Unknown embedding mode {}.", s)),
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Grouping {
  #[default]
  Clique,
  // Cheaper but merges objects that are only transitively similar.
  Components,
}

impl FromStr for Grouping {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "clique" => Ok(Grouping::Clique),
      "components" => Ok(Grouping::Components),
      _ => Err(format!("Unknown grouping {}.", s)),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Method {
  // Greedy nearest neighbour chaining.
  Chain,
  // Density clustering into a graph, then clique extraction.
  Graph,
}

impl FromStr for Method {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s {
      "chain" => Ok(Method::Chain),
      "graph" => Ok(Method::Graph),
      _ => Err(format!("Unknown re-identification method {}.", s)),
    }
  }
}
