// 该文件是 Tianyan （天眼） 项目的一部分。
// src/frame.rs - 像素帧定义
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

use std::borrow::Cow;

use image::{ImageBuffer, Rgb, RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("无效帧: {0}")]
  InvalidFrame(String),
}

impl FrameError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    FrameError::InvalidFrame(msg.into())
  }
}

/// 交错存储的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb,
  Rgba,
}

impl PixelFormat {
  pub const fn channels(self) -> usize {
    match self {
      PixelFormat::Rgb => 3,
      PixelFormat::Rgba => 4,
    }
  }
}

/// 行优先、通道交错的像素帧
///
/// 缓冲区长度恒等于 `width * height * channels`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame {
  width: u32,
  height: u32,
  format: PixelFormat,
  data: Box<[u8]>,
}

impl PixelFrame {
  pub fn new(
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = width as usize * height as usize * format.channels();
    if data.len() != expected {
      return Err(FrameError::invalid(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      width,
      height,
      format,
      data: data.into_boxed_slice(),
    })
  }

  /// 以同一个采样值填满整帧
  pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8) -> Self {
    let size = width as usize * height as usize * format.channels();
    Self {
      width,
      height,
      format,
      data: vec![value; size].into_boxed_slice(),
    }
  }

  // 调用方保证长度一致
  pub(crate) fn from_raw_parts(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
    debug_assert_eq!(
      data.len(),
      width as usize * height as usize * format.channels()
    );
    Self {
      width,
      height,
      format,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn channels(&self) -> usize {
    self.format.channels()
  }

  pub fn is_zero_area(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.data.into_vec()
  }

  /// 像素 (x, y) 的全部通道
  pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let channels = self.channels();
    let start = (y as usize * self.width as usize + x as usize) * channels;
    Some(&self.data[start..start + channels])
  }

  /// 丢弃 alpha 通道；已是 RGB 时不复制
  pub fn to_rgb(&self) -> Cow<'_, PixelFrame> {
    match self.format {
      PixelFormat::Rgb => Cow::Borrowed(self),
      PixelFormat::Rgba => {
        let data: Vec<u8> = self
          .data
          .chunks_exact(4)
          .flat_map(|p| [p[0], p[1], p[2]])
          .collect();
        Cow::Owned(Self {
          width: self.width,
          height: self.height,
          format: PixelFormat::Rgb,
          data: data.into_boxed_slice(),
        })
      }
    }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    let channels = self.channels();
    let width = self.width as usize;
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * width + x as usize) * channels;
      Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    })
  }
}

impl From<RgbImage> for PixelFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      format: PixelFormat::Rgb,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<RgbaImage> for PixelFrame {
  fn from(image: RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      format: PixelFormat::Rgba,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}
