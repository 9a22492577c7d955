// 该文件是 Tianyan （天眼） 项目的一部分。
// tests/pipeline.rs - 流水线端到端测试
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

use std::{thread, time::Duration};

use crossbeam_channel::{Receiver, Sender, bounded};
use tianyan::{
  BackendKind, Decoder, Detection, DetectorConfig, DisplayGeometry, InferenceBackend, PixelFormat,
  PixelFrame, Pipeline, RawOutput, Rotation, TensorPacker, TickOutcome,
  backend::{InferenceError, ModelHandle, ModelLoadError},
  config::ConfigError,
  output::LogOutput,
  pipeline::PipelineError,
  tensor::{AuxTensor, ModelInputs},
  transform::FrameTransform,
};

use common::{StubBackend, single_box_output};

fn unrotated() -> DetectorConfig {
  DetectorConfig {
    rotation: Rotation::None,
    ..Default::default()
  }
}

fn completed(outcome: TickOutcome) -> tianyan::FrameReport {
  match outcome {
    TickOutcome::Completed(report) => report,
    TickOutcome::Skipped => panic!("帧被意外丢弃"),
  }
}

#[test]
fn zero_frame_yields_top_left_box() {
  let pipeline = unrotated()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  assert!(!pipeline.packer().has_aux());

  let frame = PixelFrame::filled(640, 640, PixelFormat::Rgb, 0);
  let report = completed(pipeline.tick(&frame).unwrap());

  assert_eq!(report.detections.count(), 1);
  assert_eq!(
    report.detections.get(0),
    Some(&Detection {
      x: 270.0,
      y: 270.0,
      width: 100.0,
      height: 100.0,
      class_id: 5,
      score: 0.9,
    })
  );
  assert_eq!(report.detections.processing_ms(), 4);
  assert_eq!(report.stats.last_detected_objects(), 1);
  assert_eq!(
    (report.model_frame.width(), report.model_frame.height()),
    (640, 640)
  );

  let backend = pipeline.into_backend();
  let inputs = backend.last_inputs.unwrap();
  assert_eq!(inputs.input_name, "images");
  assert_eq!(inputs.tensor.shape(), [1, 3, 640, 640]);
  assert!(inputs.tensor.as_slice().iter().all(|&v| v == 0.0));
  assert!(inputs.aux.is_none());
}

#[test]
fn white_frame_packs_to_ones() {
  let pipeline = unrotated()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(1280, 720, PixelFormat::Rgba, 255);
  completed(pipeline.tick(&frame).unwrap());

  let inputs = pipeline.into_backend().last_inputs.unwrap();
  assert_eq!(inputs.tensor.shape(), [1, 3, 640, 640]);
  assert!(inputs.tensor.as_slice().iter().all(|&v| v == 1.0));
}

#[test]
fn aux_tensor_attached_when_declared() {
  let backend = StubBackend::new().with_inputs(&["images", "config"]);
  let pipeline = unrotated()
    .pipeline_from_bytes(backend, b"model".to_vec())
    .unwrap();
  assert!(pipeline.packer().has_aux());

  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 10);
  completed(pipeline.tick(&frame).unwrap());

  let aux = pipeline.into_backend().last_inputs.unwrap().aux.unwrap();
  assert_eq!(aux.name, "config");
  assert_eq!(aux.tensor, AuxTensor([100.0, 0.7, 0.2]));
}

#[test]
fn undeclared_input_name_is_rejected() {
  let backend = StubBackend::new().with_inputs(&["pixel_values"]);
  let pipeline = unrotated()
    .pipeline_from_bytes(backend, b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 10);
  assert!(matches!(
    pipeline.tick(&frame),
    Err(PipelineError::Inference(InferenceError::UnknownInput(name))) if name == "images"
  ));
}

#[test]
fn gate_released_after_failure() {
  let backend = StubBackend::new().failing(1);
  let pipeline = unrotated()
    .pipeline_from_bytes(backend, b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 10);

  assert!(matches!(
    pipeline.tick(&frame),
    Err(PipelineError::Inference(InferenceError::Runtime(_)))
  ));
  assert!(!pipeline.is_busy());

  let report = completed(pipeline.tick(&frame).unwrap());
  assert_eq!(report.detections.count(), 1);
  assert_eq!(pipeline.into_backend().runs, 2);
}

#[test]
fn zero_area_frame_is_rejected() {
  let pipeline = unrotated()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(0, 0, PixelFormat::Rgb, 0);
  assert!(matches!(pipeline.tick(&frame), Err(PipelineError::Frame(_))));
  assert!(!pipeline.is_busy());
  assert_eq!(pipeline.into_backend().runs, 0);
}

/// 在 `run` 中阻塞，直到测试放行
struct BlockingBackend {
  entered: Sender<()>,
  release: Receiver<()>,
  handle: Option<ModelHandle>,
}

impl InferenceBackend for BlockingBackend {
  fn kind(&self) -> BackendKind {
    BackendKind::Embedded
  }

  fn load(&mut self, _model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
    let handle = ModelHandle {
      input_count: 1,
      input_names: None,
    };
    self.handle = Some(handle.clone());
    Ok(handle)
  }

  fn run(&mut self, _inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
    let _ = self.entered.send(());
    let _ = self.release.recv();
    let (shape, data) = single_box_output();
    Ok(RawOutput::from_shape_vec(&shape, data)?)
  }

  fn handle(&self) -> Option<&ModelHandle> {
    self.handle.as_ref()
  }
}

#[test]
fn busy_pipeline_skips_frames() {
  let (entered_tx, entered_rx) = bounded(1);
  let (release_tx, release_rx) = bounded(1);
  let mut backend = BlockingBackend {
    entered: entered_tx,
    release: release_rx,
    handle: None,
  };
  backend.load(b"model").unwrap();

  let pipeline = Pipeline::new(
    backend,
    FrameTransform::new(32, 32).with_rotation(Rotation::None),
    TensorPacker::new("images"),
    Decoder::new(),
  );
  let frame = PixelFrame::filled(32, 32, PixelFormat::Rgb, 1);

  thread::scope(|s| {
    let first = s.spawn(|| pipeline.tick(&frame));

    entered_rx.recv().unwrap();
    assert!(pipeline.is_busy());
    assert!(matches!(pipeline.tick(&frame), Ok(TickOutcome::Skipped)));

    release_tx.send(()).unwrap();
    let report = completed(first.join().unwrap().unwrap());
    assert_eq!(report.detections.count(), 1);
  });

  assert!(!pipeline.is_busy());
}

#[test]
fn slow_load_times_out() {
  let config = DetectorConfig {
    load_timeout: Duration::from_millis(20),
    ..unrotated()
  };
  let backend = StubBackend::new().with_load_delay(Duration::from_millis(500));
  assert!(matches!(
    config.pipeline_from_bytes(backend, b"model".to_vec()),
    Err(ConfigError::ModelLoad(ModelLoadError::Timeout(_)))
  ));
}

#[test]
fn rejected_model_surfaces_load_error() {
  assert!(matches!(
    unrotated().pipeline_from_bytes(StubBackend::new(), Vec::new()),
    Err(ConfigError::ModelLoad(ModelLoadError::Runtime(_)))
  ));
}

#[test]
fn class_count_checked_when_configured() {
  let config = DetectorConfig {
    classes: Some(10),
    ..unrotated()
  };
  let pipeline = config
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 10);
  assert!(matches!(pipeline.tick(&frame), Err(PipelineError::Decode(_))));
  assert!(!pipeline.is_busy());
}

#[test]
fn report_maps_onto_portrait_display() {
  let pipeline = unrotated()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(640, 640, PixelFormat::Rgb, 0);
  let report = completed(pipeline.tick(&frame).unwrap());

  let output = LogOutput::new(DisplayGeometry::new(1080, 1920));
  let boxes = output.display_boxes(&report);
  assert_eq!(boxes.len(), 1);
  let b = boxes[0];
  assert!((b.x - 270.0 * 1.6875).abs() < 1e-3);
  assert!((b.y - (270.0 * 1.6875 + 420.0)).abs() < 1e-3);
  assert!((b.width - 168.75).abs() < 1e-3);
  assert_eq!(b.class_id, 5);
}

#[test]
fn stats_track_consecutive_frames() {
  let pipeline = unrotated()
    .pipeline_from_bytes(StubBackend::new(), b"model".to_vec())
    .unwrap();
  let frame = PixelFrame::filled(64, 64, PixelFormat::Rgb, 10);
  for _ in 0..3 {
    completed(pipeline.tick(&frame).unwrap());
  }
  let stats = pipeline.stats();
  assert_eq!(stats.last_detected_objects(), 1);
  assert_eq!(stats.last_inference_ms(), 4.0);
  assert!(stats.mean_inference_ms() > 0.0);
  assert!(stats.mean_inference_ms() < 4.0);
}
