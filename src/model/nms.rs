// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::decode::Candidate;

/// 与类别无关的贪心 NMS，返回保留下来的候选框下标（按置信度降序）。
///
/// 置信度低于 `conf_threshold` 的候选框先被丢弃；
/// 与已保留框的 IoU 严格大于 `iou_threshold` 的候选框被抑制。
pub fn nms(candidates: &[Candidate], conf_threshold: f32, iou_threshold: f32) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&i| candidates[i].confidence >= conf_threshold)
    .collect();
  order.sort_by(|&a, &b| {
    candidates[b]
      .confidence
      .total_cmp(&candidates[a].confidence)
  });

  let mut keep: Vec<usize> = Vec::with_capacity(order.len());
  for index in order {
    let bbox = &candidates[index].bbox;
    let suppressed = keep
      .iter()
      .any(|&kept| candidates[kept].bbox.iou(bbox) > iou_threshold);
    if !suppressed {
      keep.push(index);
    }
  }

  debug!("NMS: {} 个候选框, 保留 {} 个", candidates.len(), keep.len());
  keep
}
