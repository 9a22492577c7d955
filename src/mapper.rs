// 该文件是 Tianyan （天眼） 项目的一部分。
// src/mapper.rs - 模型坐标到显示坐标的映射
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

use serde::Serialize;

use crate::model::{Detection, DetectionSet};

/// 屏幕当前朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayOrientation {
  #[default]
  Portrait,
  PortraitUpsideDown,
  LandscapeLeft,
  LandscapeRight,
}

impl DisplayOrientation {
  pub fn is_landscape(self) -> bool {
    matches!(
      self,
      DisplayOrientation::LandscapeLeft | DisplayOrientation::LandscapeRight
    )
  }
}

impl FromStr for DisplayOrientation {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "portrait" => Ok(DisplayOrientation::Portrait),
      "portrait-upside-down" => Ok(DisplayOrientation::PortraitUpsideDown),
      "landscape-left" | "landscape" => Ok(DisplayOrientation::LandscapeLeft),
      "landscape-right" => Ok(DisplayOrientation::LandscapeRight),
      other => Err(format!("未知的屏幕朝向: {}", other)),
    }
  }
}

/// 屏幕的自然尺寸（竖屏）与当前朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGeometry {
  pub width: u32,
  pub height: u32,
  pub orientation: DisplayOrientation,
}

impl DisplayGeometry {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      orientation: DisplayOrientation::default(),
    }
  }

  pub fn with_orientation(mut self, orientation: DisplayOrientation) -> Self {
    self.orientation = orientation;
    self
  }

  /// 按当前朝向的有效宽高，横屏时宽高互换
  pub fn effective_size(&self) -> (u32, u32) {
    if self.orientation.is_landscape() {
      (self.height, self.width)
    } else {
      (self.width, self.height)
    }
  }
}

/// 显示坐标系中的检测框
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub class_id: usize,
  pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMapper {
  model_width: u32,
  model_height: u32,
}

impl CoordinateMapper {
  pub fn new(model_width: u32, model_height: u32) -> Self {
    Self {
      model_width,
      model_height,
    }
  }

  /// 返回 (scale, shift_x, shift_y)
  ///
  /// 等比缩放系数取两边最短边之比，平移只施加在缩放后仍有余量的轴上。
  pub fn scale_and_shift(&self, display: &DisplayGeometry) -> (f32, f32, f32) {
    let (dw, dh) = display.effective_size();
    let (dw, dh) = (dw as f32, dh as f32);
    let (mw, mh) = (self.model_width as f32, self.model_height as f32);

    let model_min = mw.min(mh);
    if model_min <= 0.0 {
      return (0.0, 0.0, 0.0);
    }
    let scale = dw.min(dh) / model_min;

    let shift = |display: f32, model: f32| {
      let scaled = model * scale;
      if display > scaled {
        (display - scaled) / 2.0
      } else {
        0.0
      }
    };

    (scale, shift(dw, mw), shift(dh, mh))
  }

  pub fn map(&self, detection: &Detection, display: &DisplayGeometry) -> DisplayBox {
    let (scale, shift_x, shift_y) = self.scale_and_shift(display);
    apply(detection, scale, shift_x, shift_y)
  }

  /// 每次调用都按当前朝向重新计算
  pub fn map_all(&self, detections: &DetectionSet, display: &DisplayGeometry) -> Vec<DisplayBox> {
    let (scale, shift_x, shift_y) = self.scale_and_shift(display);
    detections
      .iter()
      .map(|d| apply(d, scale, shift_x, shift_y))
      .collect()
  }
}

fn apply(detection: &Detection, scale: f32, shift_x: f32, shift_y: f32) -> DisplayBox {
  DisplayBox {
    x: detection.x * scale + shift_x,
    y: detection.y * scale + shift_y,
    width: detection.width * scale,
    height: detection.height * scale,
    class_id: detection.class_id,
    score: detection.score,
  }
}
