// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/log_output.rs - 日志输出
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
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  mapper::{CoordinateMapper, DisplayBox, DisplayGeometry, DisplayOrientation},
  model::LabelList,
  output::{Render, label_of, parse_min_score, visible},
  pipeline::FrameReport,
};

const DEFAULT_DISPLAY: (u32, u32) = (1080, 1920);

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数错误: {0}")]
  InvalidParam(String),
}

/// 把检测框映射到屏幕坐标并写入日志
pub struct LogOutput {
  display: DisplayGeometry,
  min_score: f32,
  labels: LabelList,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

fn parse_display(value: &str) -> Result<(u32, u32), LogOutputError> {
  let invalid = || LogOutputError::InvalidParam(format!("display '{}' 应为 WxH", value));
  let (w, h) = value.split_once('x').ok_or_else(invalid)?;
  let w = w.parse().map_err(|_| invalid())?;
  let h = h.parse().map_err(|_| invalid())?;
  Ok((w, h))
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut size = DEFAULT_DISPLAY;
    let mut orientation = DisplayOrientation::default();
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "display" => size = parse_display(&v)?,
        "orientation" => orientation = v.parse().map_err(LogOutputError::InvalidParam)?,
        _ => {}
      }
    }
    let min_score = parse_min_score(url).map_err(LogOutputError::InvalidParam)?;

    Ok(LogOutput {
      display: DisplayGeometry::new(size.0, size.1).with_orientation(orientation),
      min_score,
      labels: LabelList::default(),
    })
  }
}

impl LogOutput {
  pub fn new(display: DisplayGeometry) -> Self {
    Self {
      display,
      min_score: crate::output::DEFAULT_MIN_SCORE,
      labels: LabelList::default(),
    }
  }

  pub fn with_labels(mut self, labels: LabelList) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_min_score(mut self, min_score: f32) -> Self {
    self.min_score = min_score;
    self
  }

  pub fn display(&self) -> &DisplayGeometry {
    &self.display
  }

  /// 通过展示阈值的框，已映射到屏幕坐标
  pub fn display_boxes(&self, report: &FrameReport) -> Vec<DisplayBox> {
    let mapper = CoordinateMapper::new(report.model_frame.width(), report.model_frame.height());
    visible(&report.detections, self.min_score)
      .map(|d| mapper.map(d, &self.display))
      .collect()
  }
}

impl Render for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, report: &FrameReport) -> Result<(), Self::Error> {
    let boxes = self.display_boxes(report);
    for b in &boxes {
      info!(
        "{} {:.2} @ ({:.1}, {:.1}) {:.1}x{:.1}",
        label_of(&self.labels, b.class_id),
        b.score,
        b.x,
        b.y,
        b.width,
        b.height
      );
    }
    info!("显示 {} / {} 个检测 | {}", boxes.len(), report.detections.count(), report);
    Ok(())
  }
}
