use crate::all::*;

pub fn format_log(
  buf: &mut env_logger::fmt::Formatter,
  record: &log::Record,
) -> std::io::Result<()> {
  let mut style = buf.style();
  use env_logger::fmt::Color::*;
  use log::Level::*;
  style.set_color(match record.level() {
    Error => Red,
    Warn => Rgb(200, 200, 200),
    Info => Green,
    Debug => Magenta,
    Trace => Blue,
  });

  // Long pipeline stages log from many modules, keep the location column aligned.
  let s = format!("{:30}{}",
    format!("{}:{}",
      record.file().unwrap_or("?").trim_start_matches("src/"),
      record.line().unwrap_or(0),
    ),
    record.args()
  );
  writeln!(buf, "{}", style.value(s))
}

// Unsigned angle in degrees between two directions, in [0, 180].
// A zero-length direction has no angle.
pub fn angle_between(a: &Vector2d, b: &Vector2d) -> Option<f64> {
  let n = a.norm() * b.norm();
  if n <= 0. || !n.is_finite() { return None }
  let c = (a.dot(b) / n).clamp(-1., 1.);
  Some(c.acos().to_degrees())
}
