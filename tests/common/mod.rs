// 该文件是 Tianyan （天眼） 项目的一部分。
// tests/common/mod.rs - 测试用推理后端
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

#![allow(dead_code)]

use std::{thread, time::Duration};

use tianyan::{
  BackendKind, InferenceBackend, RawOutput,
  backend::{InferenceError, ModelHandle, ModelLoadError},
  tensor::ModelInputs,
};

pub const NUM_CLASSES: usize = 80;

/// 单个锚点：中心 (320, 320)，100x100，类别 5 得分 0.9
pub fn single_box_output() -> (Vec<i64>, Vec<f32>) {
  let mut data = vec![320.0, 320.0, 100.0, 100.0];
  let mut scores = vec![0.0; NUM_CLASSES];
  scores[5] = 0.9;
  scores[7] = 0.3;
  data.extend(scores);
  (vec![1, (4 + NUM_CLASSES) as i64, 1], data)
}

/// 返回固定输出的后端，记录最后一次输入
pub struct StubBackend {
  pub input_names: Vec<String>,
  pub output_shape: Vec<i64>,
  pub output_data: Vec<f32>,
  pub load_delay: Duration,
  pub fail_runs: usize,
  pub runs: usize,
  pub last_inputs: Option<ModelInputs>,
  handle: Option<ModelHandle>,
}

impl StubBackend {
  pub fn new() -> Self {
    let (output_shape, output_data) = single_box_output();
    Self {
      input_names: vec!["images".into()],
      output_shape,
      output_data,
      load_delay: Duration::ZERO,
      fail_runs: 0,
      runs: 0,
      last_inputs: None,
      handle: None,
    }
  }

  pub fn with_inputs(mut self, names: &[&str]) -> Self {
    self.input_names = names.iter().map(|n| n.to_string()).collect();
    self
  }

  pub fn with_load_delay(mut self, delay: Duration) -> Self {
    self.load_delay = delay;
    self
  }

  pub fn failing(mut self, runs: usize) -> Self {
    self.fail_runs = runs;
    self
  }
}

impl InferenceBackend for StubBackend {
  fn kind(&self) -> BackendKind {
    BackendKind::Embedded
  }

  fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
    self.handle = None;
    thread::sleep(self.load_delay);
    if model.is_empty() {
      return Err(ModelLoadError::Runtime("empty model".into()));
    }
    let handle = ModelHandle {
      input_count: self.input_names.len(),
      input_names: Some(self.input_names.clone()),
    };
    self.handle = Some(handle.clone());
    Ok(handle)
  }

  fn run(&mut self, inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
    let handle = self.handle.as_ref().ok_or(InferenceError::NotLoaded)?;
    handle.check_inputs(inputs)?;
    self.runs += 1;
    if self.fail_runs > 0 {
      self.fail_runs -= 1;
      return Err(InferenceError::Runtime("stub failure".into()));
    }
    self.last_inputs = Some(inputs.clone());
    Ok(
      RawOutput::from_shape_vec(&self.output_shape, self.output_data.clone())?
        .with_processing(Duration::from_millis(4)),
    )
  }

  fn handle(&self) -> Option<&ModelHandle> {
    self.handle.as_ref()
  }
}
