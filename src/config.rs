// 该文件是 Tianyan （天眼） 项目的一部分。
// src/config.rs - 检测器配置
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

use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  backend::{
    BackendKind, DEFAULT_AUX_INPUT_NAME, DEFAULT_INPUT_NAME, EmbeddedRuntime, InferenceBackend,
    ModelLoadError, NativeDelegate, OrtNativeModule, load_bounded,
  },
  decode::Decoder,
  model::LabelList,
  pipeline::Pipeline,
  tensor::{AuxConfig, TensorPacker},
  transform::{FrameTransform, Rotation},
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("参数 '{key}' 的值 '{value}' 无效: {reason}")]
  InvalidParam {
    key: String,
    value: String,
    reason: String,
  },
  #[error("标签文件读取错误: {0}")]
  Labels(std::io::Error),
  #[error("模型加载错误: {0}")]
  ModelLoad(#[from] ModelLoadError),
}

fn parse_param<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: ToString,
{
  value.parse().map_err(|e: T::Err| ConfigError::InvalidParam {
    key: key.to_string(),
    value: value.to_string(),
    reason: e.to_string(),
  })
}

fn parse_aux(value: &str) -> Result<AuxConfig, ConfigError> {
  let parts: Vec<f32> = value
    .split(',')
    .map(|v| parse_param("config", v.trim()))
    .collect::<Result<_, _>>()?;
  let &[max_detections, iou_threshold, score_threshold] = parts.as_slice() else {
    return Err(ConfigError::InvalidParam {
      key: "config".into(),
      value: value.to_string(),
      reason: "需要 3 个逗号分隔的数值".into(),
    });
  };
  Ok(AuxConfig {
    max_detections,
    iou_threshold,
    score_threshold,
  })
}

/// 模型与推理后端的全部配置
///
/// `onnx:///path/model.onnx?backend=native&width=320&height=320&rotate=none`
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  pub model_path: PathBuf,
  pub backend: BackendKind,
  pub width: u32,
  pub height: u32,
  pub rotation: Rotation,
  pub labels: Option<PathBuf>,
  pub aux: AuxConfig,
  pub load_timeout: Duration,
  pub input_name: String,
  pub aux_input_name: String,
  pub classes: Option<usize>,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      model_path: PathBuf::new(),
      backend: BackendKind::default(),
      width: DEFAULT_INPUT_SIZE,
      height: DEFAULT_INPUT_SIZE,
      rotation: Rotation::default(),
      labels: None,
      aux: AuxConfig::default(),
      load_timeout: DEFAULT_LOAD_TIMEOUT,
      input_name: DEFAULT_INPUT_NAME.to_string(),
      aux_input_name: DEFAULT_AUX_INPUT_NAME.to_string(),
      classes: None,
    }
  }
}

impl FromUrlWithScheme for DetectorConfig {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for DetectorConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConfigError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut config = DetectorConfig {
      model_path: PathBuf::from(url.path()),
      ..Default::default()
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "backend" => config.backend = parse_param(&key, &value)?,
        "width" => config.width = parse_param(&key, &value)?,
        "height" => config.height = parse_param(&key, &value)?,
        "size" => {
          let size = parse_param(&key, &value)?;
          config.width = size;
          config.height = size;
        }
        "rotate" => config.rotation = parse_param(&key, &value)?,
        "labels" => config.labels = Some(PathBuf::from(value.as_ref())),
        "config" => config.aux = parse_aux(&value)?,
        "load_timeout_ms" => {
          config.load_timeout = Duration::from_millis(parse_param(&key, &value)?)
        }
        "input" => config.input_name = value.into_owned(),
        "aux_input" => config.aux_input_name = value.into_owned(),
        "classes" => config.classes = Some(parse_param(&key, &value)?),
        other => debug!("忽略未知参数: {}", other),
      }
    }

    if config.width == 0 || config.height == 0 {
      return Err(ConfigError::InvalidParam {
        key: "width/height".into(),
        value: format!("{}x{}", config.width, config.height),
        reason: "输入尺寸必须大于零".into(),
      });
    }

    Ok(config)
  }
}

impl DetectorConfig {
  pub fn transform(&self) -> FrameTransform {
    FrameTransform::new(self.width, self.height).with_rotation(self.rotation)
  }

  pub fn decoder(&self) -> Decoder {
    match self.classes {
      Some(classes) => Decoder::new().with_expected_classes(classes),
      None => Decoder::new(),
    }
  }

  /// 按配置选择具体后端
  pub fn build_backend(&self) -> Box<dyn InferenceBackend> {
    match self.backend {
      BackendKind::Embedded => Box::new(EmbeddedRuntime::new()),
      BackendKind::Native => Box::new(NativeDelegate::new(OrtNativeModule::new())),
    }
  }

  pub fn load_labels(&self) -> Result<LabelList, ConfigError> {
    match &self.labels {
      Some(path) => {
        let labels = LabelList::from_path(path).map_err(ConfigError::Labels)?;
        info!("加载 {} 个类别标签: {}", labels.len(), path.display());
        Ok(labels)
      }
      None => Ok(LabelList::default()),
    }
  }

  /// 读取模型文件并在限定时间内完成加载
  pub fn build_pipeline(&self) -> Result<Pipeline<Box<dyn InferenceBackend>>, ConfigError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model = std::fs::read(&self.model_path).map_err(ModelLoadError::from)?;
    self.pipeline_from_bytes(self.build_backend(), model)
  }

  /// 用给定后端和模型字节组装流水线
  ///
  /// 模型声明了辅助输入时附带配置张量。
  pub fn pipeline_from_bytes<B: InferenceBackend + 'static>(
    &self,
    backend: B,
    model: Vec<u8>,
  ) -> Result<Pipeline<B>, ConfigError> {
    info!("使用 {} 后端, 加载时限 {:?}", backend.kind(), self.load_timeout);
    let (backend, handle) = load_bounded(backend, model, self.load_timeout)?;

    let mut packer = TensorPacker::new(self.input_name.clone());
    if handle.wants_aux(&self.aux_input_name) {
      debug!("模型需要辅助输入 '{}': {:?}", self.aux_input_name, self.aux);
      packer = packer.with_aux(self.aux_input_name.clone(), self.aux);
    }

    Ok(Pipeline::new(
      backend,
      self.transform(),
      packer,
      self.decoder(),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_from_bare_url() {
    let url = Url::parse("onnx:///models/yolo.onnx").unwrap();
    let config = DetectorConfig::from_url(&url).unwrap();
    assert_eq!(config.model_path, PathBuf::from("/models/yolo.onnx"));
    assert_eq!(config.backend, BackendKind::Embedded);
    assert_eq!((config.width, config.height), (640, 640));
    assert_eq!(config.rotation, Rotation::QuarterTurn);
    assert_eq!(config.aux, AuxConfig::default());
    assert_eq!(config.load_timeout, DEFAULT_LOAD_TIMEOUT);
    assert_eq!(config.input_name, "images");
    assert_eq!(config.aux_input_name, "config");
  }

  #[test]
  fn query_overrides() {
    let url = Url::parse(
      "onnx:///m.onnx?backend=native&width=320&height=224&rotate=none&config=50,0.5,0.25&load_timeout_ms=1500&labels=/tmp/l.txt&classes=80",
    )
    .unwrap();
    let config = DetectorConfig::from_url(&url).unwrap();
    assert_eq!(config.backend, BackendKind::Native);
    assert_eq!(config.transform().target_size(), (320, 224));
    assert_eq!(config.rotation, Rotation::None);
    assert_eq!(config.aux.max_detections, 50.0);
    assert_eq!(config.aux.score_threshold, 0.25);
    assert_eq!(config.load_timeout, Duration::from_millis(1500));
    assert_eq!(config.labels, Some(PathBuf::from("/tmp/l.txt")));
    assert_eq!(config.classes, Some(80));
    assert_eq!(config.build_backend().kind(), BackendKind::Native);
  }

  #[test]
  fn rejects_bad_input() {
    let wrong = Url::parse("tflite:///m.tflite").unwrap();
    assert!(matches!(
      DetectorConfig::from_url(&wrong),
      Err(ConfigError::SchemeMismatch { .. })
    ));

    let bad = Url::parse("onnx:///m.onnx?config=1,2").unwrap();
    assert!(matches!(
      DetectorConfig::from_url(&bad),
      Err(ConfigError::InvalidParam { .. })
    ));

    let zero = Url::parse("onnx:///m.onnx?width=0").unwrap();
    assert!(DetectorConfig::from_url(&zero).is_err());

    let backend = Url::parse("onnx:///m.onnx?backend=tpu").unwrap();
    assert!(DetectorConfig::from_url(&backend).is_err());
  }
}
