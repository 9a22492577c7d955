// 该文件是 Tianyan （天眼） 项目的一部分。
// src/task.rs - 任务循环
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
  sync::mpsc,
  thread,
  time::{Duration, Instant},
};
use tracing::{error, info, warn};

use crate::{
  backend::InferenceBackend,
  frame::PixelFrame,
  output::Render,
  pipeline::{FrameReport, Pipeline, PipelineError, TickOutcome},
  stats::RunningStats,
};

pub trait Task<I, B, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, pipeline: &Pipeline<B>, output: O)
  -> Result<Self::Output, Self::Error>;
}

pub struct OneShotTask;

impl<I, B, O, RE> Task<I, B, O> for OneShotTask
where
  I: Iterator<Item = PixelFrame>,
  B: InferenceBackend,
  O: Render<Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Output = FrameReport;
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: &Pipeline<B>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始推理...", frame.width(), frame.height());
    let now = Instant::now();
    let TickOutcome::Completed(report) = pipeline.tick(&frame)? else {
      anyhow::bail!("流水线正忙，无法处理输入帧");
    };
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&report)?;
    info!("渲染完成: {}", report);

    Ok(report)
  }
}

/// 同一帧重复推理，用于测量延迟
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

/// 重复任务的汇总
#[derive(Debug, Clone)]
pub struct RepeatSummary {
  pub runs: usize,
  /// 去掉前两次预热后的平均单帧耗时
  pub mean_frame: Duration,
  pub stats: RunningStats,
}

impl<I, B, O, RE> Task<I, B, O> for RepeatShotTask
where
  I: Iterator<Item = PixelFrame>,
  B: InferenceBackend,
  O: Render<Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Output = RepeatSummary;
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: &Pipeline<B>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    const WARMUP: usize = 2;

    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let TickOutcome::Completed(report) = pipeline.tick(&frame)? else {
        warn!("({})流水线正忙，跳过", i);
        continue;
      };
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&report)?;
      times.push(elapsed);
    }

    let measured = if times.len() > WARMUP {
      &times[WARMUP..]
    } else {
      &times[..]
    };
    let mean_frame = if measured.is_empty() {
      Duration::ZERO
    } else {
      measured.iter().sum::<Duration>() / measured.len() as u32
    };
    let stats = pipeline.stats();
    warn!("平均单帧耗时: {:.2?}", mean_frame);
    warn!("统计: {}", stats);

    Ok(RepeatSummary {
      runs: times.len(),
      mean_frame,
      stats,
    })
  }
}

/// 连续任务的汇总
#[derive(Debug, Clone, Default)]
pub struct ContinuousSummary {
  pub completed: usize,
  pub skipped: usize,
  pub failed: usize,
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后退出循环
  pub fn with_interrupt(mut self) -> Self {
    self.handle_interrupt = true;
    self
  }

  fn install_interrupt(&self) -> anyhow::Result<Option<mpsc::Receiver<()>>> {
    if !self.handle_interrupt {
      return Ok(None);
    }
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }
}

impl<I, B, O, RE> Task<I, B, O> for ContinuousTask
where
  I: Iterator<Item = PixelFrame>,
  B: InferenceBackend,
  O: Render<Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Output = ContinuousSummary;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    pipeline: &Pipeline<B>,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let interrupt = self.install_interrupt()?;

    let mut summary = ContinuousSummary::default();
    let mut frame_index = 0usize;
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      match pipeline.tick(&frame) {
        Ok(TickOutcome::Completed(report)) => {
          summary.completed += 1;
          output.render_result(&report)?;
          info!("第 {} 帧: {}", frame_index, report);
        }
        Ok(TickOutcome::Skipped) => {
          summary.skipped += 1;
          warn!("第 {} 帧被丢弃，累计丢弃 {} 帧", frame_index, summary.skipped);
        }
        Err(e @ (PipelineError::Frame(_) | PipelineError::Inference(_))) => {
          summary.failed += 1;
          error!("第 {} 帧处理失败: {}", frame_index, e);
        }
        Err(e) => return Err(e.into()),
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，退出: 完成 {} 帧, 丢弃 {} 帧, 失败 {} 帧",
      summary.completed, summary.skipped, summary.failed
    );
    Ok(summary)
  }
}
