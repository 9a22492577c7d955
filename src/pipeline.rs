// 该文件是 Tianyan （天眼） 项目的一部分。
// src/pipeline.rs - 单帧检测流水线
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

use std::{
  fmt,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use thiserror::Error;
use tracing::{debug, error};

use crate::{
  backend::{InferenceBackend, InferenceError},
  decode::{DecodeError, Decoder},
  frame::{FrameError, PixelFrame},
  model::DetectionSet,
  stats::{RunningStats, StatsTracker},
  tensor::TensorPacker,
  transform::FrameTransform,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("{0}")]
  Frame(#[from] FrameError),
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
}

/// 单槽准入：同一时刻至多一次流水线运行
#[derive(Debug, Default)]
pub struct AdmissionGate {
  busy: AtomicBool,
}

impl AdmissionGate {
  pub fn new() -> Self {
    Self::default()
  }

  /// 非阻塞获取；已有运行时返回 `None`，调用方应丢弃本帧
  pub fn try_acquire(&self) -> Option<AdmissionPermit<'_>> {
    self
      .busy
      .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
      .ok()
      .map(|_| AdmissionPermit { gate: self })
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }
}

/// 释放时归还准入，包括出错提前返回的路径
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
  gate: &'a AdmissionGate,
}

impl Drop for AdmissionPermit<'_> {
  fn drop(&mut self) {
    self.gate.busy.store(false, Ordering::Release);
  }
}

/// 一次完整运行的结果
#[derive(Debug, Clone)]
pub struct FrameReport {
  pub detections: DetectionSet,
  pub stats: RunningStats,
  pub frame_ms: f64,
  /// 送入模型的帧（裁剪、缩放、旋转之后）
  pub model_frame: PixelFrame,
}

impl fmt::Display for FrameReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.stats, f)
  }
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
  /// 上一次运行尚未结束，本帧被丢弃
  Skipped,
  Completed(FrameReport),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Pipeline<B> {
  backend: Mutex<B>,
  transform: FrameTransform,
  packer: TensorPacker,
  decoder: Decoder,
  gate: AdmissionGate,
  stats: Mutex<StatsTracker>,
}

impl<B: InferenceBackend> Pipeline<B> {
  pub fn new(backend: B, transform: FrameTransform, packer: TensorPacker, decoder: Decoder) -> Self {
    Self {
      backend: Mutex::new(backend),
      transform,
      packer,
      decoder,
      gate: AdmissionGate::new(),
      stats: Mutex::new(StatsTracker::new()),
    }
  }

  pub fn transform(&self) -> &FrameTransform {
    &self.transform
  }

  pub fn packer(&self) -> &TensorPacker {
    &self.packer
  }

  pub fn stats(&self) -> RunningStats {
    lock(&self.stats).snapshot()
  }

  pub fn is_busy(&self) -> bool {
    self.gate.is_busy()
  }

  pub fn into_backend(self) -> B {
    self.backend.into_inner().unwrap_or_else(PoisonError::into_inner)
  }

  /// 处理一帧相机图像
  ///
  /// 推理同步阻塞，无超时。出错时本帧不产生检测，准入照常释放。
  pub fn tick(&self, frame: &PixelFrame) -> Result<TickOutcome, PipelineError> {
    let Some(_permit) = self.gate.try_acquire() else {
      debug!("上一帧仍在处理, 丢弃本帧");
      return Ok(TickOutcome::Skipped);
    };

    let start = Instant::now();
    let model_frame = self.transform.apply(frame)?;
    let inputs = self.packer.pack(&model_frame);

    let raw = lock(&self.backend).run(&inputs).map_err(|e| {
      error!("推理失败: {}", e);
      e
    })?;
    let detections = self.decoder.decode(&raw)?;

    let frame_ms = start.elapsed().as_secs_f64() * 1000.0;
    let inference_ms = raw.processing().as_secs_f64() * 1000.0;
    let stats = lock(&self.stats).update(inference_ms, frame_ms, detections.count());
    debug!("帧处理完成: {}", stats);

    Ok(TickOutcome::Completed(FrameReport {
      detections,
      stats,
      frame_ms,
      model_frame,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gate_admits_one_at_a_time() {
    let gate = AdmissionGate::new();
    let permit = gate.try_acquire();
    assert!(permit.is_some());
    assert!(gate.is_busy());
    assert!(gate.try_acquire().is_none());

    drop(permit);
    assert!(!gate.is_busy());
    assert!(gate.try_acquire().is_some());
  }
}
