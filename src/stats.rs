// 该文件是 Tianyan （天眼） 项目的一部分。
// src/stats.rs - 延迟统计
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

use std::fmt;

use serde::Serialize;

/// 平均推理耗时的平滑系数
pub const EMA_ALPHA: f64 = 0.05;

/// 最近一帧的耗时与检测数，以及推理耗时的指数滑动平均（毫秒）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningStats {
  last_inference_ms: f64,
  last_frame_ms: f64,
  mean_inference_ms: f64,
  last_detected_objects: usize,
}

impl RunningStats {
  pub fn last_inference_ms(&self) -> f64 {
    self.last_inference_ms
  }

  pub fn last_frame_ms(&self) -> f64 {
    self.last_frame_ms
  }

  pub fn mean_inference_ms(&self) -> f64 {
    self.mean_inference_ms
  }

  pub fn last_detected_objects(&self) -> usize {
    self.last_detected_objects
  }
}

impl fmt::Display for RunningStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:.3} | {:.3} | {} | {:.3}",
      self.last_inference_ms,
      self.last_frame_ms,
      self.last_detected_objects,
      self.mean_inference_ms
    )
  }
}

/// 统计量的唯一写入者
#[derive(Debug, Default)]
pub struct StatsTracker {
  stats: RunningStats,
}

impl StatsTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, inference_ms: f64, frame_ms: f64, detections: usize) -> RunningStats {
    let stats = &mut self.stats;
    stats.last_inference_ms = inference_ms;
    stats.last_frame_ms = frame_ms;
    stats.last_detected_objects = detections;
    stats.mean_inference_ms =
      (1.0 - EMA_ALPHA) * stats.mean_inference_ms + EMA_ALPHA * inference_ms;
    *stats
  }

  pub fn snapshot(&self) -> RunningStats {
    self.stats
  }
}
