// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend/wire.rs - 原生模块调用的编组格式
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

//! 跨边界调用只有一个编组面：平铺的浮点缓冲区加整数形状数组进，
//! 固定字段的结果结构出。两端都校验形状与缓冲区长度一致。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::ModelInputs;

#[derive(Error, Debug)]
pub enum WireError {
  #[error("JSON 编解码错误: {0}")]
  Codec(#[from] serde_json::Error),
  #[error("'{name}' 的形状 {shape:?} 与数据长度 {len} 不一致")]
  Shape {
    name: String,
    shape: Vec<i64>,
    len: usize,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxInput {
  pub name: String,
  pub data: Vec<f32>,
  pub shape: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagateRequest {
  pub input_name: String,
  pub tensor_data: Vec<f32>,
  pub shape: Vec<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub aux: Option<AuxInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagateResponse {
  pub processing_ms: u64,
  pub output_shape: Vec<i64>,
  pub output_data: Vec<f32>,
}

/// 形状各维之积；出现负维度时返回 `None`
pub fn element_count(shape: &[i64]) -> Option<usize> {
  shape.iter().try_fold(1usize, |acc, &d| {
    usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
  })
}

fn check_shape(name: &str, shape: &[i64], len: usize) -> Result<(), WireError> {
  if element_count(shape) == Some(len) {
    Ok(())
  } else {
    Err(WireError::Shape {
      name: name.to_string(),
      shape: shape.to_vec(),
      len,
    })
  }
}

impl PropagateRequest {
  pub fn from_inputs(inputs: &ModelInputs) -> Self {
    Self {
      input_name: inputs.input_name.clone(),
      tensor_data: inputs.tensor.as_slice().to_vec(),
      shape: inputs.tensor.shape().to_vec(),
      aux: inputs.aux.as_ref().map(|aux| AuxInput {
        name: aux.name.clone(),
        data: aux.tensor.as_slice().to_vec(),
        shape: aux.tensor.shape().to_vec(),
      }),
    }
  }

  pub fn validate(&self) -> Result<(), WireError> {
    check_shape(&self.input_name, &self.shape, self.tensor_data.len())?;
    if let Some(aux) = &self.aux {
      check_shape(&aux.name, &aux.shape, aux.data.len())?;
    }
    Ok(())
  }

  pub fn encode(&self) -> Result<Vec<u8>, WireError> {
    self.validate()?;
    Ok(serde_json::to_vec(self)?)
  }

  pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
    let request: Self = serde_json::from_slice(bytes)?;
    request.validate()?;
    Ok(request)
  }
}

impl PropagateResponse {
  pub fn validate(&self) -> Result<(), WireError> {
    check_shape("output", &self.output_shape, self.output_data.len())
  }

  pub fn encode(&self) -> Result<Vec<u8>, WireError> {
    self.validate()?;
    Ok(serde_json::to_vec(self)?)
  }

  pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
    let response: Self = serde_json::from_slice(bytes)?;
    response.validate()?;
    Ok(response)
  }
}
