use crate::all::*;

// Image-plane box in pixels, top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
  pub xtl: f64,
  pub ytl: f64,
  pub xbr: f64,
  pub ybr: f64,
}

impl BoundingBox {
  pub fn new(xtl: f64, ytl: f64, xbr: f64, ybr: f64) -> BoundingBox {
    BoundingBox { xtl, ytl, xbr, ybr }
  }

  pub fn width(&self) -> f64 { self.xbr - self.xtl }

  pub fn height(&self) -> f64 { self.ybr - self.ytl }

  pub fn center(&self) -> Vector2d {
    Vector2d::new(0.5 * (self.xtl + self.xbr), 0.5 * (self.ytl + self.ybr))
  }

  // Where a vehicle touches the road; the point that the homography is valid for.
  pub fn bottom_center(&self) -> Vector2d {
    Vector2d::new(0.5 * (self.xtl + self.xbr), self.ybr)
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
  pub camera: CameraId,
  // Zero-based.
  pub frame: usize,
  pub id: TrackId,
  pub bbox: BoundingBox,
  pub score: f64,
}

impl Detection {
  pub fn center(&self) -> Vector2d { self.bbox.center() }
}

pub fn parse_annotations(path: &Path, camera: &str) -> Result<Vec<Detection>> {
  match path.extension().and_then(|x| x.to_str()) {
    Some("txt") => parse_annotations_from_txt(path, camera),
    _ => bail!("Invalid detection file {}.", path.display()),
  }
}

// MOTChallenge format `frame,id,left,top,width,height,conf,-1,-1,-1` with
// one-based frame numbers, e.g. `1,7,882.263,92.697,55.811,47.536,0.906,-1,-1,-1`.
// Rows with id -1 belong to no track and are skipped.
pub fn parse_annotations_from_txt(path: &Path, camera: &str) -> Result<Vec<Detection>> {
  let file = File::open(path)
    .context(format!("Failed to open annotations {}.", path.display()))?;
  let mut detections = vec![];
  let mut unassigned = 0;
  for (i, line) in BufReader::new(file).lines().enumerate() {
    let line = line.context(format!("Failed to read {}.", path.display()))?;
    if line.trim().is_empty() { continue }
    let detection = parse_mot_line(&line, camera)
      .context(format!("{}:{}: malformed annotation line.", path.display(), i + 1))?;
    match detection {
      Some(d) => detections.push(d),
      None => unassigned += 1,
    }
  }
  if unassigned > 0 {
    debug!("{}: skipped {} detections without a track.", path.display(), unassigned);
  }
  Ok(detections)
}

// `None` for a detection that no track claims.
pub fn parse_mot_line(line: &str, camera: &str) -> Result<Option<Detection>> {
  let fields: Vec<&str> = line.trim().split(',').map(|x| x.trim()).collect();
  if fields.len() < 7 {
    bail!("Expected at least 7 fields, got {}.", fields.len());
  }
  let number = |i: usize| -> Result<f64> {
    fields[i].parse::<f64>()
      .map_err(|_| anyhow!("Field {} is not a number: {:?}", i + 1, fields[i]))
  };
  let frame = fields[0].parse::<usize>()
    .map_err(|_| anyhow!("Frame is not a positive integer: {:?}", fields[0]))?;
  if frame == 0 {
    bail!("Frame numbers start from 1.");
  }
  let id = fields[1].parse::<i64>()
    .map_err(|_| anyhow!("Track id is not an integer: {:?}", fields[1]))?;
  if id == -1 { return Ok(None) }
  if id < 0 || id > u32::MAX as i64 {
    bail!("Invalid track id {}.", id);
  }
  let left = number(2)?;
  let top = number(3)?;
  let width = number(4)?;
  let height = number(5)?;
  Ok(Some(Detection {
    camera: camera.to_string(),
    frame: frame - 1,
    id: TrackId(id as u32),
    bbox: BoundingBox::new(left, top, left + width, top + height),
    score: number(6)?,
  }))
}

pub fn group_by_frame<'a, I>(detections: I) -> BTreeMap<usize, Vec<&'a Detection>>
where I: IntoIterator<Item = &'a Detection> {
  let mut by_frame: BTreeMap<usize, Vec<&Detection>> = BTreeMap::new();
  for detection in detections {
    by_frame.entry(detection.frame).or_default().push(detection);
  }
  by_frame
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_mot_line() {
    let d = parse_mot_line("1,7,882.25,92.5,55.75,47.5,0.906,-1,-1,-1", "c010").unwrap().unwrap();
    assert_eq!(d.frame, 0);
    assert_eq!(d.id, TrackId(7));
    assert_eq!(d.camera, "c010");
    assert_eq!(d.bbox, BoundingBox::new(882.25, 92.5, 938., 140.));
    assert_eq!(d.bbox.width(), 55.75);
    assert_eq!(d.bbox.height(), 47.5);
    assert_eq!(d.center(), Vector2d::new(910.125, 116.25));
    assert_eq!(d.score, 0.906);

    assert!(parse_mot_line("1,7,882.25,92.5", "c010").is_err());
    assert!(parse_mot_line("0,7,1,1,1,1,1", "c010").is_err());
    assert!(parse_mot_line("1,-1,882.263,92.697,55.811,47.536,0.906,-1,-1,-1", "c010").unwrap().is_none());
    assert!(parse_mot_line("1,-2,1,1,1,1,1", "c010").is_err());
    assert!(parse_mot_line("1,7,a,1,1,1,1", "c010").is_err());
  }

  #[test]
  fn test_unknown_extension() {
    let err = parse_annotations(Path::new("annotations.xml"), "c010").unwrap_err();
    assert!(err.to_string().contains("Invalid detection file"));
  }

  #[test]
  fn test_parse_file() {
    let dir = std::env::temp_dir().join(format!("mtmc-annotations-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("det.txt");
    std::fs::write(&path, "2,1,0,0,10,10,0.5,-1,-1,-1\n\n1,-1,5,5,10,10,0.9,-1,-1,-1\n1,1,5,5,10,10,0.9,-1,-1,-1\n").unwrap();
    let detections = parse_annotations(&path, "c001").unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].frame, 1);
    let by_frame = group_by_frame(&detections);
    assert_eq!(by_frame.keys().copied().collect::<Vec<_>>(), vec![0, 1]);

    std::fs::write(&path, "1,1,0,0,10,10,0.5\nbroken\n").unwrap();
    let err = parse_annotations(&path, "c001").unwrap_err();
    assert!(format!("{:#}", err).contains("det.txt:2"));
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
