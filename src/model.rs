// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use crate::backend::OutputTensor;

/// 检测模型：预处理、后处理两个阶段，中间由后端推理连接。
///
/// 预处理产生的 `State` 显式地传给后处理，模型实例上不保存任何逐帧状态。
pub trait Model {
  type Input;
  type Tensor;
  type State;
  type Output;
  type Error;

  fn preprocess(&self, input: &Self::Input) -> Result<(Self::Tensor, Self::State), Self::Error>;
  fn postprocess(
    &self,
    state: &Self::State,
    outputs: &[OutputTensor],
  ) -> Result<Self::Output, Self::Error>;
  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 整数像素矩形，左上角 + 宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BBox {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> i32 {
    self.x.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.y.saturating_add(self.height)
  }

  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      return 0;
    }
    self.width as i64 * self.height as i64
  }

  pub fn intersection(&self, other: &BBox) -> i64 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());
    if x2 <= x1 || y2 <= y1 {
      return 0;
    }
    (x2 as i64 - x1 as i64) * (y2 as i64 - y1 as i64)
  }

  pub fn iou(&self, other: &BBox) -> f32 {
    let inter = self.intersection(other);
    let union = self.area() + other.area() - inter;
    if union > 0 {
      inter as f32 / union as f32
    } else {
      0.0
    }
  }
}

/// 最终检测结果，坐标位于原图像素空间，可能越界
#[derive(Debug, Clone)]
pub struct DetectItem {
  pub class_id: usize,
  pub label: String,
  pub score: f32,
  pub bbox: BBox,
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

pub mod decode;
pub mod letterbox;
pub mod mapping;
pub mod nms;
mod yolov5;
pub use self::yolov5::{
  ChannelOrder, ScalePolicy, Yolov5, Yolov5Builder, Yolov5Config, Yolov5Error, Yolov5Tensor,
};
