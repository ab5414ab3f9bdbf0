// NOTE This kind of import-all file isn't a common Rust idiom.

pub use crate::{
  annotations::*,
  camera::*,
  camera_setup::*,
  candidates::*,
  chaining::*,
  dbscan::*,
  embedding::*,
  encoder::*,
  graph::*,
  image::*,
  metric::*,
  parameters::*,
  pipeline::*,
  results::*,
  track::*,
  types::*,
  util::*,
  video::*,
};

pub use {
  std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
  },
  log::{debug, error, info, warn, LevelFilter},
  nalgebra::DVector,
  anyhow::{anyhow, bail, Context as AnyhowContext, Result},
};
