// 该文件是 Tianyan （天眼） 项目的一部分。
// src/model.rs - 模型输出与检测结果
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

use std::{path::Path, time::Duration};

use ndarray::{Array3, ArrayView3};
use serde::Serialize;
use thiserror::Error;

/// 每个锚点前 4 行为框参数 {cx, cy, w, h}
pub const BOX_ROWS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputShapeError {
  #[error("输出张量维度应为 3, 实际形状 {0:?}")]
  Rank(Vec<i64>),
  #[error("输出张量形状无效: {0:?}, 期望 [1, 4+K, N] 且 K >= 1")]
  Layout(Vec<i64>),
  #[error("输出张量长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual}")]
  Length {
    shape: Vec<i64>,
    expected: usize,
    actual: usize,
  },
}

/// 单次推理的原始输出，形状 `[1, 4+K, N]`
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  tensor: Array3<f32>,
  processing: Duration,
}

impl RawOutput {
  pub fn from_shape_vec(shape: &[i64], data: Vec<f32>) -> Result<Self, OutputShapeError> {
    let &[batch, rows, anchors] = shape else {
      return Err(OutputShapeError::Rank(shape.to_vec()));
    };
    if batch != 1 || rows <= BOX_ROWS as i64 || anchors < 0 {
      return Err(OutputShapeError::Layout(shape.to_vec()));
    }

    let (rows, anchors) = (rows as usize, anchors as usize);
    let expected = rows * anchors;
    if data.len() != expected {
      return Err(OutputShapeError::Length {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }

    let tensor = Array3::from_shape_vec((1, rows, anchors), data)
      .map_err(|_| OutputShapeError::Layout(shape.to_vec()))?;

    Ok(Self {
      tensor,
      processing: Duration::ZERO,
    })
  }

  /// 记录后端报告的推理耗时
  pub fn with_processing(mut self, processing: Duration) -> Self {
    self.processing = processing;
    self
  }

  pub fn num_anchors(&self) -> usize {
    self.tensor.shape()[2]
  }

  pub fn num_classes(&self) -> usize {
    self.tensor.shape()[1] - BOX_ROWS
  }

  pub fn shape(&self) -> [i64; 3] {
    let s = self.tensor.shape();
    [s[0] as i64, s[1] as i64, s[2] as i64]
  }

  pub fn view(&self) -> ArrayView3<'_, f32> {
    self.tensor.view()
  }

  pub fn processing(&self) -> Duration {
    self.processing
  }
}

/// 模型像素空间中的一个检测框（左上角为原点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub class_id: usize,
  pub score: f32,
}

/// 一帧的全部检测结果，按锚点顺序排列
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DetectionSet {
  detections: Vec<Detection>,
  processing_ms: u64,
  #[serde(skip)]
  processing: Duration,
}

impl DetectionSet {
  pub fn new(detections: Vec<Detection>, processing: Duration) -> Self {
    Self {
      detections,
      processing_ms: processing.as_millis() as u64,
      processing,
    }
  }

  pub fn count(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn processing_ms(&self) -> u64 {
    self.processing_ms
  }

  pub fn processing(&self) -> Duration {
    self.processing
  }

  pub fn get(&self, i: usize) -> Option<&Detection> {
    self.detections.get(i)
  }

  pub fn x(&self, i: usize) -> Option<f32> {
    self.get(i).map(|d| d.x)
  }

  pub fn y(&self, i: usize) -> Option<f32> {
    self.get(i).map(|d| d.y)
  }

  pub fn width(&self, i: usize) -> Option<f32> {
    self.get(i).map(|d| d.width)
  }

  pub fn height(&self, i: usize) -> Option<f32> {
    self.get(i).map(|d| d.height)
  }

  pub fn class_id(&self, i: usize) -> Option<usize> {
    self.get(i).map(|d| d.class_id)
  }

  pub fn score(&self, i: usize) -> Option<f32> {
    self.get(i).map(|d| d.score)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.detections.iter()
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.detections
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.detections.iter()
  }
}

/// 类别名称表，第 i 行对应类别 i
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelList {
  labels: Vec<String>,
}

impl LabelList {
  /// 按任意换行符切分，丢弃空行
  pub fn parse(text: &str) -> Self {
    let labels = text
      .split(['\n', '\r'])
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    Self { labels }
  }

  pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
    Ok(Self::parse(&std::fs::read_to_string(path)?))
  }

  pub fn label(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn raw_output_validates_layout() {
    assert!(matches!(
      RawOutput::from_shape_vec(&[84, 10], vec![0.0; 840]),
      Err(OutputShapeError::Rank(_))
    ));
    assert!(matches!(
      RawOutput::from_shape_vec(&[1, 4, 10], vec![0.0; 40]),
      Err(OutputShapeError::Layout(_))
    ));
    assert!(matches!(
      RawOutput::from_shape_vec(&[1, 84, 10], vec![0.0; 839]),
      Err(OutputShapeError::Length { expected: 840, .. })
    ));

    let raw = RawOutput::from_shape_vec(&[1, 84, 10], vec![0.0; 840]).unwrap();
    assert_eq!(raw.num_anchors(), 10);
    assert_eq!(raw.num_classes(), 80);
    assert_eq!(raw.shape(), [1, 84, 10]);
  }

  #[test]
  fn zero_anchor_output_is_valid() {
    let raw = RawOutput::from_shape_vec(&[1, 84, 0], Vec::new()).unwrap();
    assert_eq!(raw.num_anchors(), 0);
  }

  #[test]
  fn detection_set_accessors() {
    let set = DetectionSet::new(
      vec![Detection {
        x: 1.0,
        y: 2.0,
        width: 3.0,
        height: 4.0,
        class_id: 5,
        score: 0.5,
      }],
      Duration::from_micros(12_900),
    );
    assert_eq!(set.count(), 1);
    assert_eq!(set.processing_ms(), 12);
    assert_eq!(set.x(0), Some(1.0));
    assert_eq!(set.height(0), Some(4.0));
    assert_eq!(set.class_id(0), Some(5));
    assert_eq!(set.score(1), None);
  }

  #[test]
  fn labels_split_on_any_newline() {
    let labels = LabelList::parse("person\r\nbicycle\n\ncar\rmotorcycle\n");
    assert_eq!(labels.len(), 4);
    assert_eq!(labels.label(0), Some("person"));
    assert_eq!(labels.label(2), Some("car"));
    assert_eq!(labels.label(3), Some("motorcycle"));
    assert_eq!(labels.label(4), None);
  }
}
