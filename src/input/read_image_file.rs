// 该文件是 Tianyan （天眼） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use crate::{FromUrl, FromUrlWithScheme, frame::PixelFrame};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid repeat count: {0}")]
  InvalidRepeat(String),
}

/// 静态图像输入，按 `repeat` 次数重复产出同一帧
pub struct ImageFileInput {
  frame: PixelFrame,
  repeat: usize,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let repeat = match url.query_pairs().find(|(k, _)| k == "repeat") {
      Some((_, v)) => v
        .parse()
        .map_err(|_| ImageFileInputError::InvalidRepeat(v.to_string()))?,
      None => 1,
    };

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!("读取图像: {} ({}x{})", path, image.width(), image.height());

    Ok(ImageFileInput {
      frame: PixelFrame::from(image),
      repeat,
    })
  }
}

impl ImageFileInput {
  pub fn new(frame: PixelFrame, repeat: usize) -> Self {
    Self { frame, repeat }
  }

  pub fn into_frames(self) -> ImageFileFrames {
    ImageFileFrames {
      frame: self.frame,
      remaining: self.repeat,
    }
  }
}

pub struct ImageFileFrames {
  frame: PixelFrame,
  remaining: usize,
}

impl Iterator for ImageFileFrames {
  type Item = PixelFrame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    Some(self.frame.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::PixelFormat;

  #[test]
  fn repeats_the_same_frame() {
    let frame = PixelFrame::filled(2, 2, PixelFormat::Rgb, 9);
    let frames: Vec<_> = ImageFileInput::new(frame.clone(), 3).into_frames().collect();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| *f == frame));
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let url = Url::parse("image:///definitely/not/here.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
