// 该文件是 Tianyan （天眼） 项目的一部分。
// src/decode.rs - 原始输出解码
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

use thiserror::Error;
use tracing::debug;

use crate::model::{BOX_ROWS, Detection, DetectionSet, RawOutput};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("类别数量不匹配: 期望 {expected}, 实际 {actual}")]
  ClassCountMismatch { expected: usize, actual: usize },
}

/// 把 `[1, 4+K, N]` 的原始输出解码为 N 个检测
///
/// 不做阈值过滤，也不做重叠抑制；每个锚点恰好产生一个检测，
/// 顺序与锚点顺序一致。分数按模型原值使用，不做 sigmoid。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decoder {
  expected_classes: Option<usize>,
}

impl Decoder {
  pub fn new() -> Self {
    Self::default()
  }

  /// 要求输出恰好包含 `classes` 个类别
  pub fn with_expected_classes(mut self, classes: usize) -> Self {
    self.expected_classes = Some(classes);
    self
  }

  pub fn decode(&self, raw: &RawOutput) -> Result<DetectionSet, DecodeError> {
    let classes = raw.num_classes();
    if let Some(expected) = self.expected_classes
      && expected != classes
    {
      return Err(DecodeError::ClassCountMismatch {
        expected,
        actual: classes,
      });
    }

    let view = raw.view();
    let anchors = raw.num_anchors();
    let mut detections = Vec::with_capacity(anchors);

    for i in 0..anchors {
      let cx = view[[0, 0, i]];
      let cy = view[[0, 1, i]];
      let w = view[[0, 2, i]];
      let h = view[[0, 3, i]];

      // 严格大于：并列时保留索引最小的类别
      let mut class_id = 0;
      let mut score = view[[0, BOX_ROWS, i]];
      for c in 1..classes {
        let s = view[[0, BOX_ROWS + c, i]];
        if s > score {
          score = s;
          class_id = c;
        }
      }

      detections.push(Detection {
        x: cx - w / 2.0,
        y: cy - h / 2.0,
        width: w,
        height: h,
        class_id,
        score,
      });
    }

    debug!("解码 {} 个锚点, {} 个类别", anchors, classes);
    Ok(DetectionSet::new(detections, raw.processing()))
  }
}
