// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  model::{Detection, DetectionSet, LabelList},
  output::{label_of, visible},
};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;

/// 在模型帧上画出检测框（模型像素坐标）
pub struct Draw {
  color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  fn draw_bbox(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = (detection.x.floor() as i32).clamp(0, w - 1);
    let y_min = (detection.y.floor() as i32).clamp(0, h - 1);
    let x_max = ((detection.x + detection.width).ceil() as i32).clamp(0, w - 1);
    let y_max = ((detection.y + detection.height).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 逐层向内收缩
    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detections(
    &self,
    image: &mut RgbImage,
    detections: &DetectionSet,
    min_score: f32,
  ) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    for detection in visible(detections, min_score) {
      self.draw_bbox(image, detection);
    }
  }
}

/// 原图之外另存一份文本记录
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  /// 每行: `类别, 分数, x, y, w, h`，坐标为模型像素
  pub fn record(
    &self,
    detections: &DetectionSet,
    labels: &LabelList,
    min_score: f32,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    let records: Vec<String> = visible(detections, min_score)
      .map(|d| {
        let name = if self.label_with_name {
          label_of(labels, d.class_id)
        } else {
          d.class_id.to_string()
        };
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, d.score, d.x, d.y, d.width, d.height
        )
      })
      .collect();
    std::fs::write(path.with_extension("txt"), records.join("\n"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn draws_only_visible_boxes() {
    let set = DetectionSet::new(
      vec![
        Detection {
          x: 2.0,
          y: 2.0,
          width: 5.0,
          height: 5.0,
          class_id: 0,
          score: 0.9,
        },
        Detection {
          x: 10.0,
          y: 10.0,
          width: 4.0,
          height: 4.0,
          class_id: 1,
          score: 0.1,
        },
      ],
      Duration::ZERO,
    );
    let mut image = RgbImage::new(16, 16);
    Draw::default().draw_detections(&mut image, &set, 0.5);

    assert_eq!(image.get_pixel(2, 2), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(7, 4), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(10, 10), &Rgb([0, 0, 0]));
  }

  #[test]
  fn boxes_outside_the_frame_are_ignored() {
    let set = DetectionSet::new(
      vec![Detection {
        x: -50.0,
        y: -50.0,
        width: 10.0,
        height: 10.0,
        class_id: 0,
        score: 1.0,
      }],
      Duration::ZERO,
    );
    let mut image = RgbImage::new(8, 8);
    Draw::default().draw_detections(&mut image, &set, 0.0);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }
}
