// 该文件是 Tianyan （天眼） 项目的一部分。
// src/transform.rs - 帧裁剪、缩放与旋转
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

use std::str::FromStr;

use image::{RgbImage, imageops};
use tracing::debug;

use crate::frame::{FrameError, PixelFrame};

/// 相机传感器相对显示方向的固定旋转
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  None,
  #[default]
  QuarterTurn,
}

impl FromStr for Rotation {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "none" | "0" => Ok(Rotation::None),
      "quarter" | "90" => Ok(Rotation::QuarterTurn),
      other => Err(format!("未知的旋转方式: {}", other)),
    }
  }
}

/// 把原始相机帧变换到模型要求的像素网格
///
/// 依次执行：居中裁剪到目标宽高比、双线性缩放、四分之一转重排。
/// 开启旋转时，裁剪与缩放使用旋转前的网格（宽高互换），
/// 因此输出尺寸总是恰好等于目标尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTransform {
  target_width: u32,
  target_height: u32,
  rotation: Rotation,
}

impl FrameTransform {
  pub fn new(target_width: u32, target_height: u32) -> Self {
    Self {
      target_width,
      target_height,
      rotation: Rotation::default(),
    }
  }

  pub fn with_rotation(mut self, rotation: Rotation) -> Self {
    self.rotation = rotation;
    self
  }

  pub fn target_size(&self) -> (u32, u32) {
    (self.target_width, self.target_height)
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }

  fn grid_size(&self) -> (u32, u32) {
    match self.rotation {
      Rotation::None => (self.target_width, self.target_height),
      Rotation::QuarterTurn => (self.target_height, self.target_width),
    }
  }

  pub fn apply(&self, frame: &PixelFrame) -> Result<PixelFrame, FrameError> {
    if frame.is_zero_area() {
      return Err(FrameError::invalid(format!(
        "源帧面积为零: {}x{}",
        frame.width(),
        frame.height()
      )));
    }
    if self.target_width == 0 || self.target_height == 0 {
      return Err(FrameError::invalid(format!(
        "目标尺寸为零: {}x{}",
        self.target_width, self.target_height
      )));
    }

    let rgb = frame.to_rgb();
    let image = RgbImage::from_raw(rgb.width(), rgb.height(), rgb.as_bytes().to_vec())
      .ok_or_else(|| FrameError::invalid("无法构造 RGB 图像"))?;

    let (grid_w, grid_h) = self.grid_size();
    let cropped = crop_center(&image, grid_w, grid_h);
    let scaled = resize_bilinear(&cropped, grid_w, grid_h);
    debug!(
      "帧变换: {}x{} -> 裁剪 {}x{} -> 缩放 {}x{}",
      frame.width(),
      frame.height(),
      cropped.width(),
      cropped.height(),
      grid_w,
      grid_h
    );

    let scaled = PixelFrame::from(scaled);
    Ok(match self.rotation {
      Rotation::None => scaled,
      Rotation::QuarterTurn => rotate_quarter(&scaled),
    })
  }
}

/// 计算宽高比为 `aspect_w:aspect_h` 的最大居中区域，返回 (x, y, w, h)
pub fn center_crop_region(
  src_w: u32,
  src_h: u32,
  aspect_w: u32,
  aspect_h: u32,
) -> (u32, u32, u32, u32) {
  let (sw, sh) = (src_w as u64, src_h as u64);
  let (aw, ah) = (aspect_w as u64, aspect_h as u64);

  if sw * ah == sh * aw {
    (0, 0, src_w, src_h)
  } else if sw * ah > sh * aw {
    // 源更宽，裁左右
    let crop_w = ((sh * aw) / ah).max(1) as u32;
    ((src_w - crop_w) / 2, 0, crop_w, src_h)
  } else {
    let crop_h = ((sw * ah) / aw).max(1) as u32;
    (0, (src_h - crop_h) / 2, src_w, crop_h)
  }
}

/// 居中裁剪到目标宽高比；宽高比已一致时原样返回
pub fn crop_center(image: &RgbImage, aspect_w: u32, aspect_h: u32) -> RgbImage {
  let (x, y, w, h) = center_crop_region(image.width(), image.height(), aspect_w, aspect_h);
  if (w, h) == image.dimensions() {
    return image.clone();
  }
  imageops::crop_imm(image, x, y, w, h).to_image()
}

/// 宽、高各自独立地双线性缩放；尺寸一致时原样返回
pub fn resize_bilinear(image: &RgbImage, width: u32, height: u32) -> RgbImage {
  if image.dimensions() == (width, height) {
    return image.clone();
  }
  imageops::resize(image, width, height, imageops::FilterType::Triangle)
}

/// 四分之一转像素重排
///
/// W×H 的输入得到 H×W 的输出，`out[x * H + y] = in[y * W + x]`，
/// 逐像素搬运全部通道，不做任何插值。相机纹理按自底向上的行序存放，
/// 这一重排在显示坐标下即为一次四分之一转。
pub fn rotate_quarter(frame: &PixelFrame) -> PixelFrame {
  let (w, h) = (frame.width() as usize, frame.height() as usize);
  let channels = frame.channels();
  let src = frame.as_bytes();
  let mut out = vec![0u8; src.len()];

  for y in 0..h {
    for x in 0..w {
      let from = (y * w + x) * channels;
      let to = (x * h + y) * channels;
      out[to..to + channels].copy_from_slice(&src[from..from + channels]);
    }
  }

  PixelFrame::from_raw_parts(frame.height(), frame.width(), frame.format(), out)
}
