// 该文件是 Tianyan （天眼） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detection, DetectionSet, LabelList},
  pipeline::FrameReport,
};

pub trait Render: Sized {
  type Error;
  fn render_result(&self, report: &FrameReport) -> Result<(), Self::Error>;
}

/// 渲染器的展示阈值，不影响检测结果本身
pub const DEFAULT_MIN_SCORE: f32 = 0.25;

pub(crate) fn visible(
  detections: &DetectionSet,
  min_score: f32,
) -> impl Iterator<Item = &Detection> {
  detections.iter().filter(move |d| d.score >= min_score)
}

pub(crate) fn label_of(labels: &LabelList, class_id: usize) -> String {
  labels
    .label(class_id)
    .map(str::to_string)
    .unwrap_or_else(|| format!("class-{}", class_id))
}

pub(crate) fn parse_min_score(url: &Url) -> Result<f32, String> {
  match url.query_pairs().find(|(k, _)| k == "min_score") {
    Some((_, v)) => v
      .parse()
      .map_err(|e| format!("min_score '{}' 无效: {}", v, e)),
    None => Ok(DEFAULT_MIN_SCORE),
  }
}

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Log(LogOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 为渲染器附上类别名称
  pub fn with_labels(self, labels: LabelList) -> Self {
    match self {
      OutputWrapper::Log(output) => OutputWrapper::Log(output.with_labels(labels)),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_labels(labels))
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        OutputWrapper::DirectoryRecordOutput(output.with_labels(labels))
      }
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, report: &FrameReport) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.render_result(report).map_err(OutputError::from),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        output.render_result(report).map_err(OutputError::from)
      }
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => {
        output.render_result(report).map_err(OutputError::from)
      }
    }
  }
}
