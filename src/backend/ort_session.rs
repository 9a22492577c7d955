// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend/ort_session.rs - ONNX Runtime 会话封装
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

use std::time::{Duration, Instant};

use ort::{session::Session, value::Tensor};
use tracing::{debug, info};

/// 一个命名输入，数据按行优先平铺
pub(crate) struct NamedInput<'a> {
  pub name: &'a str,
  pub shape: Vec<i64>,
  pub data: &'a [f32],
}

/// 会话的第一个输出
pub(crate) struct SessionOutput {
  pub shape: Vec<i64>,
  pub data: Vec<f32>,
  pub elapsed: Duration,
}

pub(crate) struct OrtSession {
  session: Session,
  input_names: Vec<String>,
}

impl OrtSession {
  pub fn from_memory(model: &[u8]) -> ort::Result<Self> {
    debug!(
      "模型大小: {:.2} MB",
      model.len() as f64 / (1024.0 * 1024.0)
    );
    let session = Session::builder()?.commit_from_memory(model)?;
    let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
    info!("ONNX Runtime 会话已创建, 输入: {:?}", input_names);
    Ok(Self {
      session,
      input_names,
    })
  }

  pub fn input_names(&self) -> &[String] {
    &self.input_names
  }

  /// 执行一次推理，只计量 `Session::run` 本身的耗时
  pub fn run(
    &mut self,
    main: NamedInput<'_>,
    aux: Option<NamedInput<'_>>,
  ) -> ort::Result<SessionOutput> {
    let main_value = Tensor::from_array((main.shape, main.data.to_vec().into_boxed_slice()))?;
    let inputs = match aux {
      Some(aux) => {
        let aux_value = Tensor::from_array((aux.shape, aux.data.to_vec().into_boxed_slice()))?;
        ort::inputs![main.name => main_value, aux.name => aux_value]
      }
      None => ort::inputs![main.name => main_value],
    };

    let start = Instant::now();
    let outputs = self.session.run(inputs)?;
    let elapsed = start.elapsed();

    let Some((name, value)) = outputs.iter().next() else {
      return Err(ort::Error::new("模型没有输出"));
    };
    let (shape, data) = value.try_extract_tensor::<f32>()?;
    debug!("输出 '{}' 形状: {:?}, 耗时: {:.2?}", name, shape, elapsed);

    Ok(SessionOutput {
      shape: shape.to_vec(),
      data: data.to_vec(),
      elapsed,
    })
  }
}
