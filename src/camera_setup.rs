use crate::all::*;

const HOMOGRAPHY_PREFIX: &'static str = "Homography matrix:";

// `calibration.txt` next to each video, e.g.
//   Homography matrix: 1 0 0;0 1 0;0 0 1
//   Reprojection error: 3.2
pub fn read_calibration(path: &Path) -> Result<Calibration> {
  let s = std::fs::read_to_string(path)
    .context(format!("Failed to read file {}.", path.display()))?;
  let line = s.lines()
    .find(|x| x.trim_start().starts_with(HOMOGRAPHY_PREFIX))
    .ok_or(anyhow!("No homography in {}.", path.display()))?;
  let h = parse_homography(&line.trim_start()[HOMOGRAPHY_PREFIX.len()..])
    .context(format!("Failed to parse {}.", path.display()))?;
  Calibration::new(h)
    .context(format!("Bad calibration in {}.", path.display()))
}

fn parse_homography(s: &str) -> Result<Matrix3d> {
  let rows: Vec<&str> = s.split(';').collect();
  if rows.len() != 3 {
    bail!("Homography must have 3 rows, got {}.", rows.len());
  }
  let mut values = vec![];
  for row in rows {
    let row = row.split_whitespace()
      .map(|x| x.parse::<f64>().map_err(|_| anyhow!("Not a number: {:?}", x)))
      .collect::<Result<Vec<_>>>()?;
    if row.len() != 3 {
      bail!("Homography rows must have 3 values, got {}.", row.len());
    }
    values.extend(row);
  }
  Ok(Matrix3d::from_row_slice(&values))
}

// `cam_timestamp/<seq>.txt`: one `camera offset` pair per line, offsets in seconds.
pub fn read_timestamps(path: &Path) -> Result<BTreeMap<CameraId, f64>> {
  let file = File::open(path)
    .context(format!("Failed to open timestamps {}.", path.display()))?;
  let mut timestamps = BTreeMap::new();
  for (i, line) in BufReader::new(file).lines().enumerate() {
    let line = line?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() { continue }
    if tokens.len() != 2 {
      bail!("{}:{}: expected `camera offset`.", path.display(), i + 1);
    }
    let offset = tokens[1].parse::<f64>()
      .map_err(|_| anyhow!("{}:{}: offset is not a number.", path.display(), i + 1))?;
    timestamps.insert(tokens[0].to_string(), offset);
  }
  Ok(timestamps)
}

// `cam_positions/<seq>.json`: `{ "c010": [x, y], ... }` in ground-plane coordinates.
pub fn read_positions(path: &Path) -> Result<BTreeMap<CameraId, Vector2d>> {
  let s = std::fs::read_to_string(path)
    .context(format!("Failed to read file {}.", path.display()))?;
  let positions: BTreeMap<CameraId, [f64; 2]> = serde_json::from_str(&s)
    .context(format!("Failed to parse {}.", path.display()))?;
  Ok(positions.into_iter()
    .map(|(camera, p)| (camera, Vector2d::new(p[0], p[1])))
    .collect())
}
