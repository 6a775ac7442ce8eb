// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/decode.rs - 多尺度锚框解码
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
use tracing::{debug, error, warn};

use crate::{backend::OutputTensor, model::BBox};

/// 每个网格单元的锚框数量
pub const NUM_ANCHORS: usize = 3;
/// 每条记录中类别分数之前的字段数：x, y, w, h, objectness
pub const BOX_FIELDS: usize = 5;

/// 一个检测头（一个输出尺度）的固定参数
#[derive(Debug, Clone, Copy)]
pub struct DetectionHead {
  pub stride: f32,
  pub grid_h: usize,
  pub grid_w: usize,
  /// 每个锚框的 (宽, 高)，单位为输入像素
  pub anchors: [(f32, f32); NUM_ANCHORS],
}

impl DetectionHead {
  pub fn cells(&self) -> usize {
    self.grid_h * self.grid_w
  }

  /// 输出张量应有的元素个数
  pub fn expected_len(&self, num_classes: usize) -> usize {
    NUM_ANCHORS * self.cells() * (BOX_FIELDS + num_classes)
  }
}

/// YOLOv5 在 640x640 输入下的三个检测头，顺序与后端输出顺序一致
pub const YOLOV5_HEADS: [DetectionHead; 3] = [
  DetectionHead {
    stride: 8.0,
    grid_h: 80,
    grid_w: 80,
    anchors: [(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)],
  },
  DetectionHead {
    stride: 16.0,
    grid_h: 40,
    grid_w: 40,
    anchors: [(30.0, 61.0), (62.0, 45.0), (59.0, 119.0)],
  },
  DetectionHead {
    stride: 32.0,
    grid_h: 20,
    grid_w: 20,
    anchors: [(116.0, 90.0), (156.0, 198.0), (373.0, 326.0)],
  },
];

/// 某个尺度的输出张量不合法时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ScalePolicy {
  /// 整次解码失败
  #[default]
  FailFast,
  /// 记录日志，停止处理后续尺度，保留已解码的候选框
  BestEffort,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
  #[error("输出张量数量错误: 期望 {expected}, 实际 {actual}")]
  OutputCount { expected: usize, actual: usize },
  #[error("第 {head} 个输出张量大小错误: 期望 {expected}, 实际 {actual}")]
  OutputSize {
    head: usize,
    expected: usize,
    actual: usize,
  },
}

/// 解码出的候选框，坐标位于 letterbox 像素空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  /// objectness × 最高类别分数
  pub confidence: f32,
  pub class_id: usize,
}

pub struct Decoder<'a> {
  heads: &'a [DetectionHead],
  num_classes: usize,
  conf_threshold: f32,
  policy: ScalePolicy,
}

impl<'a> Decoder<'a> {
  pub fn new(heads: &'a [DetectionHead], num_classes: usize, conf_threshold: f32) -> Self {
    Self {
      heads,
      num_classes,
      conf_threshold,
      policy: ScalePolicy::default(),
    }
  }

  pub fn policy(mut self, policy: ScalePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// 解码全部尺度。输出张量只读，候选框之间没有跨尺度的顺序保证。
  pub fn decode(&self, outputs: &[OutputTensor]) -> Result<Vec<Candidate>, DecodeError> {
    if outputs.len() != self.heads.len() {
      error!(
        "输出张量数量错误: 期望 {}, 实际 {}",
        self.heads.len(),
        outputs.len()
      );
      return Err(DecodeError::OutputCount {
        expected: self.heads.len(),
        actual: outputs.len(),
      });
    }

    let mut candidates = Vec::new();
    for (index, (head, output)) in self.heads.iter().zip(outputs).enumerate() {
      let expected = head.expected_len(self.num_classes);
      if output.len() != expected {
        error!(
          "第 {} 个输出张量大小错误: 期望 {}, 实际 {}",
          index,
          expected,
          output.len()
        );
        let err = DecodeError::OutputSize {
          head: index,
          expected,
          actual: output.len(),
        };
        match self.policy {
          ScalePolicy::FailFast => return Err(err),
          ScalePolicy::BestEffort => {
            warn!("跳过剩余尺度, 保留已解码的 {} 个候选框", candidates.len());
            break;
          }
        }
      }

      let before = candidates.len();
      self.decode_head(head, output.as_slice(), &mut candidates);
      debug!(
        "检测头 {}: 步长 {}, 候选框 {} 个",
        index,
        head.stride,
        candidates.len() - before
      );
    }

    Ok(candidates)
  }

  fn decode_head(&self, head: &DetectionHead, data: &[f32], candidates: &mut Vec<Candidate>) {
    let record = BOX_FIELDS + self.num_classes;
    let cells = head.cells();

    for (index, values) in data.chunks_exact(record).enumerate() {
      let objectness = values[4];
      if objectness < self.conf_threshold {
        continue;
      }

      let anchor = index / cells;
      let cell = index % cells;
      let grid_y = (cell / head.grid_w) as f32;
      let grid_x = (cell % head.grid_w) as f32;
      let (anchor_w, anchor_h) = head.anchors[anchor];

      let center_x = (values[0] * 2.0 - 0.5 + grid_x) * head.stride;
      let center_y = (values[1] * 2.0 - 0.5 + grid_y) * head.stride;
      let width = values[2] * values[2] * 4.0 * anchor_w;
      let height = values[3] * values[3] * 4.0 * anchor_h;

      // 先截断为整数，再用整数除法求左上角
      let (center_x, center_y) = (center_x as i32, center_y as i32);
      let (width, height) = (width as i32, height as i32);
      let bbox = BBox::new(
        center_x.saturating_sub(width / 2),
        center_y.saturating_sub(height / 2),
        width,
        height,
      );

      let (class_id, class_score) = best_class(&values[BOX_FIELDS..]);

      candidates.push(Candidate {
        bbox,
        confidence: class_score * objectness,
        class_id,
      });
    }
  }
}

/// 线性扫描最高类别分数，相同分数保留第一个；分数全不大于 0 时返回 (0, 0.0)
fn best_class(scores: &[f32]) -> (usize, f32) {
  let mut best = (0usize, 0f32);
  for (class_id, &score) in scores.iter().enumerate() {
    if score > best.1 {
      best = (class_id, score);
    }
  }
  best
}
