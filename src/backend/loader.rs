// 该文件是 Tianyan （天眼） 项目的一部分。
// src/backend/loader.rs - 有界模型加载
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
  thread,
  time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, bounded, never, select};
use tracing::{error, info, warn};

use crate::backend::{InferenceBackend, ModelHandle, ModelLoadError};

type LoadResult<B> = (B, Result<ModelHandle, ModelLoadError>);

/// 在后台线程执行 `load`，调用方在有限时间内等待
///
/// 超时或取消后调用方立即得到错误，后端随加载线程一起被丢弃。
pub struct LoadTask<B> {
  rx: Receiver<LoadResult<B>>,
  started: Instant,
}

impl<B: InferenceBackend + 'static> LoadTask<B> {
  pub fn spawn(mut backend: B, model: Vec<u8>) -> Self {
    let (tx, rx) = bounded(1);
    let spawned = thread::Builder::new()
      .name("model-load".into())
      .spawn(move || {
        let result = backend.load(&model);
        // 调用方可能已放弃等待
        let _ = tx.send((backend, result));
      });
    if let Err(e) = spawned {
      error!("无法启动模型加载线程: {}", e);
    }

    Self {
      rx,
      started: Instant::now(),
    }
  }

  pub fn wait(self, timeout: Duration) -> Result<(B, ModelHandle), ModelLoadError> {
    self.wait_inner(timeout, &never())
  }

  /// `cancel` 收到消息或断开时放弃等待
  pub fn wait_or_cancel(
    self,
    timeout: Duration,
    cancel: &Receiver<()>,
  ) -> Result<(B, ModelHandle), ModelLoadError> {
    self.wait_inner(timeout, cancel)
  }

  fn wait_inner(
    self,
    timeout: Duration,
    cancel: &Receiver<()>,
  ) -> Result<(B, ModelHandle), ModelLoadError> {
    select! {
      recv(self.rx) -> msg => match msg {
        Ok((backend, Ok(handle))) => {
          info!("模型加载完成, 耗时: {:.2?}", self.started.elapsed());
          Ok((backend, handle))
        }
        Ok((_, Err(e))) => {
          error!("模型加载失败: {}", e);
          Err(e)
        }
        Err(_) => {
          error!("模型加载线程意外退出");
          Err(ModelLoadError::WorkerLost)
        }
      },
      recv(cancel) -> _ => {
        warn!("模型加载被取消");
        Err(ModelLoadError::Cancelled)
      },
      default(timeout) => {
        warn!("模型加载超过 {:?}, 放弃等待", timeout);
        Err(ModelLoadError::Timeout(timeout))
      },
    }
  }
}

/// 加载并等待至多 `timeout`
pub fn load_bounded<B: InferenceBackend + 'static>(
  backend: B,
  model: Vec<u8>,
  timeout: Duration,
) -> Result<(B, ModelHandle), ModelLoadError> {
  LoadTask::spawn(backend, model).wait(timeout)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    backend::{BackendKind, InferenceError},
    model::RawOutput,
    tensor::ModelInputs,
  };

  #[derive(Debug)]
  struct Slow {
    delay: Duration,
    handle: Option<ModelHandle>,
  }

  impl InferenceBackend for Slow {
    fn kind(&self) -> BackendKind {
      BackendKind::Embedded
    }

    fn load(&mut self, model: &[u8]) -> Result<ModelHandle, ModelLoadError> {
      thread::sleep(self.delay);
      if model.is_empty() {
        return Err(ModelLoadError::Runtime("empty".into()));
      }
      let handle = ModelHandle {
        input_count: 1,
        input_names: None,
      };
      self.handle = Some(handle.clone());
      Ok(handle)
    }

    fn run(&mut self, _inputs: &ModelInputs) -> Result<RawOutput, InferenceError> {
      Err(InferenceError::NotLoaded)
    }

    fn handle(&self) -> Option<&ModelHandle> {
      self.handle.as_ref()
    }
  }

  fn slow(ms: u64) -> Slow {
    Slow {
      delay: Duration::from_millis(ms),
      handle: None,
    }
  }

  #[test]
  fn fast_load_returns_backend() {
    let (backend, handle) = load_bounded(slow(0), vec![1], Duration::from_secs(5)).unwrap();
    assert_eq!(handle.input_count, 1);
    assert!(backend.handle().is_some());
  }

  #[test]
  fn load_error_is_forwarded() {
    let err = load_bounded(slow(0), Vec::new(), Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, ModelLoadError::Runtime(_)));
  }

  #[test]
  fn slow_load_times_out() {
    let started = Instant::now();
    let err = load_bounded(slow(2_000), vec![1], Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, ModelLoadError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_millis(1_500));
  }

  #[test]
  fn cancel_stops_waiting() {
    let (cancel_tx, cancel_rx) = bounded(1);
    cancel_tx.send(()).unwrap();
    let err = LoadTask::spawn(slow(2_000), vec![1])
      .wait_or_cancel(Duration::from_secs(10), &cancel_rx)
      .unwrap_err();
    assert!(matches!(err, ModelLoadError::Cancelled));
  }
}
