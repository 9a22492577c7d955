// 该文件是 Tianyan （天眼） 项目的一部分。
// tests/native.rs - 原生委托后端测试
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

mod common;

use std::sync::{Arc, Mutex};

use tianyan::{
  DetectorConfig, InferenceBackend, NativeDelegate, PixelFormat, PixelFrame, Rotation,
  TickOutcome,
  backend::{
    InferenceError, NativeModule,
    wire::{PropagateRequest, PropagateResponse},
  },
  pipeline::PipelineError,
};

use common::{StubBackend, single_box_output};

/// 按编组协议应答的原生模块
struct FakeModule {
  inputs: i64,
  requests: Arc<Mutex<Vec<PropagateRequest>>>,
  reply: Option<Vec<u8>>,
}

impl FakeModule {
  fn new(inputs: i64) -> Self {
    Self {
      inputs,
      requests: Arc::default(),
      reply: None,
    }
  }
}

impl NativeModule for FakeModule {
  fn create_session(&mut self, model: &[u8]) -> i64 {
    if model.is_empty() { -1 } else { self.inputs }
  }

  fn propagate_model(&mut self, request: &[u8]) -> Result<Vec<u8>, String> {
    let request = PropagateRequest::decode(request).map_err(|e| e.to_string())?;
    self
      .requests
      .lock()
      .map_err(|e| e.to_string())?
      .push(request);
    if let Some(reply) = &self.reply {
      return Ok(reply.clone());
    }
    let (output_shape, output_data) = single_box_output();
    PropagateResponse {
      processing_ms: 4,
      output_shape,
      output_data,
    }
    .encode()
    .map_err(|e| e.to_string())
  }
}

fn config() -> DetectorConfig {
  DetectorConfig {
    rotation: Rotation::None,
    ..Default::default()
  }
}

fn detections_of(outcome: TickOutcome) -> tianyan::DetectionSet {
  match outcome {
    TickOutcome::Completed(report) => report.detections,
    TickOutcome::Skipped => panic!("帧被意外丢弃"),
  }
}

#[test]
fn native_and_embedded_agree() {
  let frame = PixelFrame::filled(640, 640, PixelFormat::Rgb, 0);

  let embedded = config()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let native = config()
    .pipeline_from_bytes(NativeDelegate::new(FakeModule::new(1)), b"model".to_vec())
    .unwrap();

  let a = detections_of(embedded.tick(&frame).unwrap());
  let b = detections_of(native.tick(&frame).unwrap());
  assert_eq!(a, b);
  assert_eq!(b.class_id(0), Some(5));
  assert_eq!(b.x(0), Some(270.0));
}

#[test]
fn request_carries_planar_tensor_and_aux() {
  let module = FakeModule::new(2);
  let requests = module.requests.clone();
  let pipeline = config()
    .pipeline_from_bytes(NativeDelegate::new(module), b"model".to_vec())
    .unwrap();
  assert!(pipeline.packer().has_aux());

  let frame = PixelFrame::filled(640, 640, PixelFormat::Rgb, 255);
  detections_of(pipeline.tick(&frame).unwrap());

  let requests = requests.lock().unwrap();
  let request = &requests[0];
  assert_eq!(request.input_name, "images");
  assert_eq!(request.shape, vec![1, 3, 640, 640]);
  assert_eq!(request.tensor_data.len(), 3 * 640 * 640);
  assert!(request.tensor_data.iter().all(|&v| v == 1.0));

  let aux = request.aux.as_ref().unwrap();
  assert_eq!(aux.name, "config");
  assert_eq!(aux.shape, vec![3]);
  assert_eq!(aux.data, vec![100.0, 0.7, 0.2]);
}

#[test]
fn single_input_model_gets_no_aux() {
  let module = FakeModule::new(1);
  let requests = module.requests.clone();
  let pipeline = config()
    .pipeline_from_bytes(NativeDelegate::new(module), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 0);
  detections_of(pipeline.tick(&frame).unwrap());
  assert!(requests.lock().unwrap()[0].aux.is_none());
}

#[test]
fn inconsistent_reply_is_an_error() {
  let mut module = FakeModule::new(1);
  module.reply = Some(br#"{"processing_ms":1,"output_shape":[1,84,2],"output_data":[0.0]}"#.to_vec());
  let pipeline = config()
    .pipeline_from_bytes(NativeDelegate::new(module), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 0);
  assert!(matches!(
    pipeline.tick(&frame),
    Err(PipelineError::Inference(InferenceError::Wire(_)))
  ));
  assert!(!pipeline.is_busy());
}

#[test]
fn rejected_session_leaves_backend_unloaded() {
  let mut backend = NativeDelegate::new(FakeModule::new(1));
  assert!(backend.load(&[]).is_err());
  assert!(backend.handle().is_none());
}
