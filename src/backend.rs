// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend.rs - 推理后端
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

use std::{fmt, str::FromStr, time::Duration};

use thiserror::Error;

use crate::{
  model::{OutputShapeError, RawOutput},
  tensor::ModelInputs,
};

pub const DEFAULT_INPUT_NAME: &str = "images";
pub const DEFAULT_AUX_INPUT_NAME: &str = "config";

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("推理运行时拒绝模型: {0}")]
  Runtime(String),
  #[error("原生模块创建会话失败")]
  SessionRejected,
  #[error("模型没有声明任何输入")]
  NoInputs,
  #[error("模型加载超时: {0:?}")]
  Timeout(Duration),
  #[error("模型加载被取消")]
  Cancelled,
  #[error("模型加载线程意外退出")]
  WorkerLost,
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("尚未加载模型")]
  NotLoaded,
  #[error("模型没有名为 '{0}' 的输入")]
  UnknownInput(String),
  #[error("推理运行时错误: {0}")]
  Runtime(String),
  #[error("原生模块错误: {0}")]
  Native(String),
  #[error("跨边界编解码错误: {0}")]
  Wire(#[from] self::wire::WireError),
  #[error("输出张量错误: {0}")]
  Output(#[from] OutputShapeError),
}

/// 已加载模型的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
  pub input_count: usize,
  /// 原生边界只报告输入数量，此时为 `None`
  pub input_names: Option<Vec<String>>,
}

impl ModelHandle {
  pub fn declares_input(&self, name: &str) -> Option<bool> {
    self
      .input_names
      .as_ref()
      .map(|names| names.iter().any(|n| n == name))
  }

  /// 模型是否需要辅助配置张量
  ///
  /// 输入名未知时，按输入数量不少于 2 判断。
  pub fn wants_aux(&self, aux_name: &str) -> bool {
    self
      .declares_input(aux_name)
      .unwrap_or(self.input_count >= 2)
  }

  /// 检查本次调用的输入名是否都由模型声明
  pub fn check_inputs(&self, inputs: &ModelInputs) -> Result<(), InferenceError> {
    if self.declares_input(&inputs.input_name) == Some(false) {
      return Err(InferenceError::UnknownInput(inputs.input_name.clone()));
    }
    if let Some(aux) = &inputs.aux
      && self.declares_input(&aux.name) == Some(false)
    {
      return Err(InferenceError::UnknownInput(aux.name.clone()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
  #[default]
  Embedded,
  Native,
}

impl FromStr for BackendKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "embedded" => Ok(BackendKind::Embedded),
      "native" => Ok(BackendKind::Native),
      other => Err(format!("未知的推理后端: {}", other)),
    }
  }
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BackendKind::Embedded => write!(f, "embedded"),
      BackendKind::Native => write!(f, "native"),
    }
  }
}

/// 持有且仅持有一个模型的推理后端
///
/// 重新加载会替换之前的模型；加载失败后后端处于未加载状态，
/// 之后的 `run` 返回 [`InferenceError::NotLoaded`]。
pub trait InferenceBackend: Send {
  fn kind(&self) -> BackendKind;
  fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError>;
  fn run(&mut self, inputs: &ModelInputs) -> Result<RawOutput, InferenceError>;
  fn handle(&self) -> Option<&ModelHandle>;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
  fn kind(&self) -> BackendKind {
    (**self).kind()
  }

  fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
    (**self).load(model)
  }

  fn run(&mut self, inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
    (**self).run(inputs)
  }

  fn handle(&self) -> Option<&ModelHandle> {
    (**self).handle()
  }
}

mod embedded;
mod loader;
mod native;
mod ort_session;
pub mod wire;

pub use self::embedded::EmbeddedRuntime;
pub use self::loader::{LoadTask, load_bounded};
pub use self::native::{NativeDelegate, NativeModule, OrtNativeModule};
