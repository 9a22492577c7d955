// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend/embedded.rs - 进程内 ONNX Runtime 后端
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

use tracing::{debug, error, info};

use crate::{
  backend::{
    BackendKind, InferenceBackend, InferenceError, ModelHandle, ModelLoadError,
    ort_session::{NamedInput, OrtSession},
  },
  model::RawOutput,
  tensor::ModelInputs,
};

/// 在调用方进程内执行模型
#[derive(Default)]
pub struct EmbeddedRuntime {
  session: Option<OrtSession>,
  handle: Option<ModelHandle>,
}

impl EmbeddedRuntime {
  pub fn new() -> Self {
    Self::default()
  }
}

impl InferenceBackend for EmbeddedRuntime {
  fn kind(&self) -> BackendKind {
    BackendKind::Embedded
  }

  fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
    self.session = None;
    self.handle = None;

    info!("创建进程内推理会话");
    let session = OrtSession::from_memory(model).map_err(|e| {
      error!("创建推理会话失败: {}", e);
      ModelLoadError::Runtime(e.to_string())
    })?;

    let names = session.input_names().to_vec();
    if names.is_empty() {
      error!("模型没有声明任何输入");
      return Err(ModelLoadError::NoInputs);
    }

    let handle = ModelHandle {
      input_count: names.len(),
      input_names: Some(names),
    };
    self.session = Some(session);
    self.handle = Some(handle.clone());
    info!("模型加载完成, 输入数量: {}", handle.input_count);
    Ok(handle)
  }

  fn run(&mut self, inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
    let (Some(session), Some(handle)) = (self.session.as_mut(), self.handle.as_ref()) else {
      return Err(InferenceError::NotLoaded);
    };
    handle.check_inputs(inputs)?;

    let main = NamedInput {
      name: &inputs.input_name,
      shape: inputs.tensor.shape().to_vec(),
      data: inputs.tensor.as_slice(),
    };
    let aux = inputs.aux.as_ref().map(|aux| NamedInput {
      name: &aux.name,
      shape: aux.tensor.shape().to_vec(),
      data: aux.tensor.as_slice(),
    });

    let output = session
      .run(main, aux)
      .map_err(|e| InferenceError::Runtime(e.to_string()))?;
    debug!("进程内推理完成, 耗时: {:.2?}", output.elapsed);

    Ok(RawOutput::from_shape_vec(&output.shape, output.data)?.with_processing(output.elapsed))
  }

  fn handle(&self) -> Option<&ModelHandle> {
    self.handle.as_ref()
  }
}
