use crate::all::*;

pub const CHANNELS: usize = 3;

// Row-major interleaved RGB image storage, the `rgb24` layout ffmpeg writes.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
  pub data: Vec<u8>,
  pub width: usize,
  pub height: usize,
}

impl Image {
  pub fn empty() -> Image {
    Image {
      data: vec![],
      width: 0,
      height: 0,
    }
  }

  pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Image {
    let mut data = Vec::with_capacity(width * height * CHANNELS);
    for _ in 0..(width * height) {
      data.extend_from_slice(&rgb);
    }
    Image { data, width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn byte_len(width: usize, height: usize) -> usize {
    width * height * CHANNELS
  }

  #[inline(always)]
  pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let i = (y * self.width + x) * CHANNELS;
    [self.data[i], self.data[i + 1], self.data[i + 2]]
  }

  pub fn get_sub_image(
    &self,
    ax: usize,
    ay: usize,
    width: usize,
    height: usize,
  ) -> Image {
    let mut data = Vec::with_capacity(Image::byte_len(width, height));
    for y in ay..(ay + height) {
      let row = (y * self.width + ax) * CHANNELS;
      data.extend_from_slice(&self.data[row .. row + width * CHANNELS]);
    }
    Image { data, width, height }
  }

  // Pixels inside the box, with the box clipped to the image. Coordinates are
  // truncated to whole pixels. `None` when nothing of the box is visible.
  pub fn crop(&self, bbox: &BoundingBox) -> Option<Image> {
    let clip = |v: f64, max: usize| -> usize {
      if !(v > 0.) { 0 } else { (v as usize).min(max) }
    };
    let x0 = clip(bbox.xtl, self.width);
    let y0 = clip(bbox.ytl, self.height);
    let x1 = clip(bbox.xbr, self.width);
    let y1 = clip(bbox.ybr, self.height);
    if x1 <= x0 || y1 <= y0 { return None }
    Some(self.get_sub_image(x0, y0, x1 - x0, y1 - y0))
  }
}
