// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::LabelList,
  output::{
    Render,
    draw::{Draw, Record},
    parse_min_score, visible,
  },
  pipeline::FrameReport,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数错误: {0}")]
  InvalidParam(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Draw),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    report: &FrameReport,
    labels: &LabelList,
    min_score: f32,
  ) -> Result<(), DirectoryRecordOutputError> {
    let mut image = report.model_frame.to_rgb_image();
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detections(&mut image, &report.detections, min_score);
        image.save(path)?;
      }
      DrawWrapper::Record(record) => {
        image.save(path)?;
        record.record(&report.detections, labels, min_score, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      "record-id" => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      _ => DrawWrapper::Draw(Draw::default()),
    }
  }
}

/// 按日期分目录保存帧
///
/// 默认只保存存在可见检测的帧，`always` 时每帧都保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
  min_score: f32,
  labels: LabelList,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = match uri.query_pairs().find(|(k, _)| k == "record") {
      Some((_, v)) if v == "id" => "record-id",
      Some(_) => "record-name",
      None => "draw",
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let min_score = parse_min_score(uri).map_err(DirectoryRecordOutputError::InvalidParam)?;

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: DrawWrapper::with(kind),
      frame_counter: AtomicU16::new(0),
      always,
      min_score,
      labels: LabelList::default(),
    })
  }
}

impl DirectoryRecordOutput {
  pub fn with_labels(mut self, labels: LabelList) -> Self {
    self.labels = labels;
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, report: &FrameReport) -> Result<(), Self::Error> {
    if !self.always && visible(&report.detections, self.min_score).next().is_none() {
      return Ok(());
    }
    let path = self.frame_path()?;
    self
      .draw
      .save_result(&path, report, &self.labels, self.min_score)?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}
