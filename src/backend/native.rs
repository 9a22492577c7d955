// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend/native.rs - 平台原生模块委托后端
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

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
  backend::{
    BackendKind, InferenceBackend, InferenceError, ModelHandle, ModelLoadError,
    ort_session::{NamedInput, OrtSession},
    wire::{PropagateRequest, PropagateResponse},
  },
  model::RawOutput,
  tensor::ModelInputs,
};

/// 原生模块的调用边界
///
/// `create_session` 返回模型声明的输入数量，失败时返回 -1。
/// `propagate_model` 收发的都是 [`crate::backend::wire`] 中的编组结构。
pub trait NativeModule: Send {
  fn create_session(&mut self, model: &[u8]) -> i64;
  fn propagate_model(&mut self, request: &[u8]) -> Result<Vec<u8>, String>;
}

impl<M: NativeModule + ?Sized> NativeModule for Box<M> {
  fn create_session(&mut self, model: &[u8]) -> i64 {
    (**self).create_session(model)
  }

  fn propagate_model(&mut self, request: &[u8]) -> Result<Vec<u8>, String> {
    (**self).propagate_model(request)
  }
}

/// 把推理委托给原生模块，只依赖边界两侧的布局一致
pub struct NativeDelegate<M: NativeModule> {
  module: M,
  handle: Option<ModelHandle>,
}

impl<M: NativeModule> NativeDelegate<M> {
  pub fn new(module: M) -> Self {
    Self {
      module,
      handle: None,
    }
  }

  pub fn module(&self) -> &M {
    &self.module
  }
}

impl<M: NativeModule> InferenceBackend for NativeDelegate<M> {
  fn kind(&self) -> BackendKind {
    BackendKind::Native
  }

  fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
    self.handle = None;

    info!("通过原生模块创建会话");
    let count = self.module.create_session(model);
    if count < 0 {
      error!("原生模块拒绝模型, 返回值: {}", count);
      return Err(ModelLoadError::SessionRejected);
    }
    if count == 0 {
      error!("模型没有声明任何输入");
      return Err(ModelLoadError::NoInputs);
    }

    let handle = ModelHandle {
      input_count: count as usize,
      input_names: None,
    };
    self.handle = Some(handle.clone());
    info!("原生会话创建完成, 输入数量: {}", count);
    Ok(handle)
  }

  fn run(&mut self, inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
    if self.handle.is_none() {
      return Err(InferenceError::NotLoaded);
    }

    let request = PropagateRequest::from_inputs(inputs).encode()?;
    let reply = self.module.propagate_model(&request).map_err(|e| {
      error!("原生模块推理失败: {}", e);
      InferenceError::Native(e)
    })?;
    let response = PropagateResponse::decode(&reply)?;
    debug!(
      "原生推理完成, 输出形状: {:?}, 耗时: {} ms",
      response.output_shape, response.processing_ms
    );

    Ok(
      RawOutput::from_shape_vec(&response.output_shape, response.output_data)?
        .with_processing(Duration::from_millis(response.processing_ms)),
    )
  }

  fn handle(&self) -> Option<&ModelHandle> {
    self.handle.as_ref()
  }
}

/// 基于 ONNX Runtime 的原生模块实现
#[derive(Default)]
pub struct OrtNativeModule {
  session: Option<OrtSession>,
}

impl OrtNativeModule {
  pub fn new() -> Self {
    Self::default()
  }

  fn propagate(&mut self, request: &[u8]) -> Result<PropagateResponse, String> {
    let session = self.session.as_mut().ok_or("会话未创建")?;
    let request = PropagateRequest::decode(request).map_err(|e| e.to_string())?;

    let main = NamedInput {
      name: &request.input_name,
      shape: request.shape.clone(),
      data: &request.tensor_data,
    };
    let aux = request.aux.as_ref().map(|aux| NamedInput {
      name: &aux.name,
      shape: aux.shape.clone(),
      data: &aux.data,
    });
    let output = session.run(main, aux).map_err(|e| e.to_string())?;

    Ok(PropagateResponse {
      processing_ms: output.elapsed.as_millis() as u64,
      output_shape: output.shape,
      output_data: output.data,
    })
  }
}

impl NativeModule for OrtNativeModule {
  fn create_session(&mut self, model: &[u8]) -> i64 {
    self.session = None;
    match OrtSession::from_memory(model) {
      Ok(session) => {
        let count = session.input_names().len() as i64;
        self.session = Some(session);
        count
      }
      Err(e) => {
        warn!("创建会话失败: {}", e);
        -1
      }
    }
  }

  fn propagate_model(&mut self, request: &[u8]) -> Result<Vec<u8>, String> {
    self
      .propagate(request)?
      .encode()
      .map_err(|e| e.to_string())
  }
}
