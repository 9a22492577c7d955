// 该文件是 Tianyan （天眼） 项目的一部分。
// src/input/v4l_input.rs - V4L 相机输入
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

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{PixelFormat, PixelFrame},
};

use thiserror::Error;
use tracing::{error, info};
use url::Url;
use v4l::{Device, FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, video::Capture};

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
  #[error("Captured buffer too small: expected {expected}, got {actual}")]
  ShortBuffer { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SensorFormat {
  Rgb3,
  Yuyv,
}

/// 相机输入，每次捕获一帧
pub struct V4lInput {
  device: Device,
  width: u32,
  height: u32,
  format: SensorFormat,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemaMismatch);
    }

    // v4l:///dev/video0
    let device_path = if url.path().is_empty() || url.path() == "/" {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    let device = Device::with_path(&device_path)?;

    // 优先请求 RGB24，驱动不支持时退回当前格式
    let mut format = device.format()?;
    format.fourcc = FourCC::new(b"RGB3");
    let format = device.set_format(&format)?;

    let sensor = match &format.fourcc.repr {
      b"RGB3" => SensorFormat::Rgb3,
      b"YUYV" => SensorFormat::Yuyv,
      _ => {
        return Err(V4lInputError::UnsupportedPixelFormat(
          format.fourcc.to_string(),
        ));
      }
    };
    info!(
      "打开相机 {}: {}x{} {}",
      device_path, format.width, format.height, format.fourcc
    );

    Ok(V4lInput {
      device,
      width: format.width,
      height: format.height,
      format: sensor,
    })
  }
}

/// BT.601 YUYV 到 RGB24
fn yuyv_to_rgb(data: &[u8], pixels: usize) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(pixels * 3);
  let convert = |y: u8, u: u8, v: u8| {
    let (y, u, v) = (y as f32, u as f32 - 128.0, v as f32 - 128.0);
    [
      (y + 1.402 * v).clamp(0.0, 255.0) as u8,
      (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
      (y + 1.772 * u).clamp(0.0, 255.0) as u8,
    ]
  };
  for chunk in data.chunks_exact(4) {
    let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
    rgb.extend_from_slice(&convert(y0, u, v));
    rgb.extend_from_slice(&convert(y1, u, v));
  }
  rgb.truncate(pixels * 3);
  rgb
}

impl V4lInput {
  pub fn into_frames(self) -> V4lFrames {
    V4lFrames { inner: self }
  }

  fn capture_frame(&mut self) -> Result<PixelFrame, V4lInputError> {
    let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, 4)?;
    let (buf, _meta) = stream.next()?;

    let pixels = self.width as usize * self.height as usize;
    let (expected, data) = match self.format {
      SensorFormat::Rgb3 => (pixels * 3, buf.get(..pixels * 3).map(<[u8]>::to_vec)),
      SensorFormat::Yuyv => (
        pixels * 2,
        buf.get(..pixels * 2).map(|raw| yuyv_to_rgb(raw, pixels)),
      ),
    };
    let data = data.ok_or(V4lInputError::ShortBuffer {
      expected,
      actual: buf.len(),
    })?;

    PixelFrame::new(self.width, self.height, PixelFormat::Rgb, data)
      .map_err(|e| V4lInputError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
  }
}

pub struct V4lFrames {
  inner: V4lInput,
}

impl Iterator for V4lFrames {
  type Item = PixelFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.inner.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("Failed to capture frame: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yuyv_grey_stays_grey() {
    let rgb = yuyv_to_rgb(&[128, 128, 64, 128], 2);
    assert_eq!(rgb, vec![128, 128, 128, 64, 64, 64]);
  }
}
