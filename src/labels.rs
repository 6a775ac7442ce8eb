// 该文件是 Beifeng （北风） 项目的一部分。
// src/labels.rs - 类别标签表
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelsError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件为空: {0}")]
  Empty(String),
}

/// 有序的类别名称表，下标即类别编号
#[derive(Debug, Clone)]
pub struct Labels {
  names: Box<[String]>,
}

impl Labels {
  /// 内置的 COCO 80 类标签
  pub fn coco() -> Self {
    Self::from(COCO_CLASSES.iter().map(|s| s.to_string()).collect::<Vec<_>>())
  }

  /// 从 `.names` 文件加载，每行一个类别
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelsError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let labels = Self::parse(&content);
    if labels.is_empty() {
      return Err(LabelsError::Empty(path.display().to_string()));
    }
    debug!("标签数量: {}", labels.len());
    Ok(labels)
  }

  /// 解析标签文本，去掉行尾 `\r` 和末尾的空行
  pub fn parse(content: &str) -> Self {
    let mut names: Vec<String> = content
      .lines()
      .map(|line| line.trim_end_matches('\r').to_string())
      .collect();
    while names.last().is_some_and(|name| name.trim().is_empty()) {
      names.pop();
    }
    Self::from(names)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

impl From<Vec<String>> for Labels {
  fn from(names: Vec<String>) -> Self {
    Self {
      names: names.into_boxed_slice(),
    }
  }
}

impl Default for Labels {
  fn default() -> Self {
    Self::coco()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coco_table_has_eighty_classes() {
    let labels = Labels::coco();
    assert_eq!(labels.len(), 80);
    assert_eq!(labels.get(0), Some("person"));
    assert_eq!(labels.get(79), Some("toothbrush"));
    assert_eq!(labels.get(80), None);
  }

  #[test]
  fn parse_drops_carriage_returns_and_trailing_blank_lines() {
    let labels = Labels::parse("person\r\nbicycle\r\ncar\n\n\n");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(1), Some("bicycle"));
    assert_eq!(labels.iter().collect::<Vec<_>>(), ["person", "bicycle", "car"]);
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let err = Labels::from_file("/nonexistent/beifeng/coco.names").unwrap_err();
    assert!(matches!(err, LabelsError::IoError(_)));
  }

  #[test]
  fn empty_file_is_rejected() {
    let path = std::env::temp_dir().join(format!("beifeng-empty-{}.names", std::process::id()));
    std::fs::write(&path, "\n\n").unwrap();
    let err = Labels::from_file(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, LabelsError::Empty(_)));
  }
}
