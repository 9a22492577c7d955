// 该文件是 Tianyan （天眼） 项目的一部分。
// src/tensor.rs - 平面张量打包
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

use thiserror::Error;
use tracing::debug;

use crate::frame::PixelFrame;

pub const RGB_CHANNELS: usize = 3;
pub const AUX_TENSOR_LEN: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual}")]
  ShapeMismatch {
    shape: Vec<i64>,
    expected: usize,
    actual: usize,
  },
}

/// 通道优先（CHW）的归一化浮点张量
///
/// `index(c, y, x) = c * H * W + y * W + x`
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarTensor {
  channels: usize,
  height: usize,
  width: usize,
  data: Vec<f32>,
}

impl PlanarTensor {
  pub fn new(
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
  ) -> Result<Self, TensorError> {
    let expected = channels * height * width;
    if data.len() != expected {
      return Err(TensorError::ShapeMismatch {
        shape: vec![1, channels as i64, height as i64, width as i64],
        expected,
        actual: data.len(),
      });
    }
    Ok(Self {
      channels,
      height,
      width,
      data,
    })
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  #[inline]
  pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
    c * self.height * self.width + y * self.width + x
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
    if c >= self.channels || y >= self.height || x >= self.width {
      return None;
    }
    Some(self.data[self.index(c, y, x)])
  }

  /// 带批维度的形状 `[1, C, H, W]`
  pub fn shape(&self) -> [i64; 4] {
    [
      1,
      self.channels as i64,
      self.height as i64,
      self.width as i64,
    ]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data
  }
}

/// 辅助配置张量中的三个常量
///
/// 原样交给模型，主机侧不解释其含义。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxConfig {
  pub max_detections: f32,
  pub iou_threshold: f32,
  pub score_threshold: f32,
}

impl Default for AuxConfig {
  fn default() -> Self {
    Self {
      max_detections: 100.0,
      iou_threshold: 0.7,
      score_threshold: 0.2,
    }
  }
}

impl AuxConfig {
  pub fn to_tensor(&self) -> AuxTensor {
    AuxTensor([
      self.max_detections,
      self.iou_threshold,
      self.score_threshold,
    ])
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuxTensor(pub [f32; AUX_TENSOR_LEN]);

impl AuxTensor {
  pub fn shape(&self) -> [i64; 1] {
    [AUX_TENSOR_LEN as i64]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuxInputTensor {
  pub name: String,
  pub tensor: AuxTensor,
}

/// 一次推理调用所需的全部命名输入
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
  pub input_name: String,
  pub tensor: PlanarTensor,
  pub aux: Option<AuxInputTensor>,
}

#[derive(Debug, Clone)]
pub struct TensorPacker {
  input_name: String,
  aux: Option<(String, AuxConfig)>,
}

impl TensorPacker {
  pub fn new(input_name: impl Into<String>) -> Self {
    Self {
      input_name: input_name.into(),
      aux: None,
    }
  }

  /// 模型声明了辅助输入时附带配置张量
  pub fn with_aux(mut self, name: impl Into<String>, config: AuxConfig) -> Self {
    self.aux = Some((name.into(), config));
    self
  }

  pub fn input_name(&self) -> &str {
    &self.input_name
  }

  pub fn has_aux(&self) -> bool {
    self.aux.is_some()
  }

  /// 按行优先遍历帧，R、G、B 各写入独立平面，采样值除以 255
  ///
  /// 不检查与模型是否匹配，那是后端的职责。alpha 通道被跳过。
  pub fn pack(&self, frame: &PixelFrame) -> ModelInputs {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    let plane = w * h;
    let stride = frame.channels();
    let src = frame.as_bytes();
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    for (i, pixel) in src.chunks_exact(stride).enumerate() {
      for c in 0..RGB_CHANNELS {
        data[c * plane + i] = pixel[c] as f32 / 255.0;
      }
    }
    debug!("打包张量: [1, {}, {}, {}]", RGB_CHANNELS, h, w);

    let tensor = PlanarTensor {
      channels: RGB_CHANNELS,
      height: h,
      width: w,
      data,
    };
    let aux = self.aux.as_ref().map(|(name, config)| AuxInputTensor {
      name: name.clone(),
      tensor: config.to_tensor(),
    });

    ModelInputs {
      input_name: self.input_name.clone(),
      tensor,
      aux,
    }
  }
}
