// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 检测结果的文本记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  /// `label, score, x, y, w, h`，每行一个目标
  Text,
  Json,
}

impl RecordFormat {
  pub fn render(&self, result: &DetectResult) -> Result<String, serde_json::Error> {
    match self {
      RecordFormat::Text => Ok(
        result
          .items
          .iter()
          .map(|item| {
            format!(
              "{}, {:.4}, {}, {}, {}, {}",
              item.label, item.score, item.bbox.x, item.bbox.y, item.bbox.width, item.bbox.height
            )
          })
          .collect::<Vec<_>>()
          .join("\n"),
      ),
      RecordFormat::Json => {
        let items = result
          .items
          .iter()
          .map(|item| {
            serde_json::json!({
              "class_id": item.class_id,
              "label": item.label,
              "score": item.score,
              "bbox": [item.bbox.x, item.bbox.y, item.bbox.width, item.bbox.height],
            })
          })
          .collect::<Vec<_>>();
        serde_json::to_string_pretty(&items)
      }
    }
  }

  fn extension(&self) -> &'static str {
    match self {
      RecordFormat::Text => "txt",
      RecordFormat::Json => "json",
    }
  }
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(RecordFormat),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &RgbImage,
    result: &DetectResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, result).save(path)?;
      }
      DrawWrapper::Record(format) => {
        frame.save(path)?;
        std::fs::write(path.with_extension(format.extension()), format.render(result)?)?;
      }
    };

    Ok(())
  }
}

/// 按日期分目录保存每一帧：`<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| match v.as_ref() {
        "json" => RecordFormat::Json,
        _ => RecordFormat::Text,
      });
    let draw = match record {
      Some(format) => DrawWrapper::Record(format),
      None => DrawWrapper::Draw(Box::new(Draw::from_url_query(uri)?)),
    };

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbImage, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path()?;
      debug!("记录帧: {}", path.display());
      self.draw.save_result(&path, frame, result)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BBox, DetectItem};

  fn result() -> DetectResult {
    DetectResult {
      items: vec![DetectItem {
        class_id: 5,
        label: "bus".to_string(),
        score: 0.875,
        bbox: BBox::new(-3, 10, 400, 300),
      }]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn text_record_lists_one_line_per_item() {
    let text = RecordFormat::Text.render(&result()).unwrap();
    assert_eq!(text, "bus, 0.8750, -3, 10, 400, 300");
  }

  #[test]
  fn json_record_is_an_array_of_objects() {
    let json = RecordFormat::Json.render(&result()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["label"], "bus");
    assert_eq!(value[0]["class_id"], 5);
    assert_eq!(value[0]["bbox"][0], -3);
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let dir = std::env::temp_dir().join(format!("beifeng-record-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let url = url::Url::parse(&format!("folder://{}?record=json", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output
      .render_result(&RgbImage::new(4, 4), &DetectResult::default())
      .unwrap();
    assert!(!dir.exists());

    output.render_result(&RgbImage::new(4, 4), &result()).unwrap();
    assert!(dir.exists());
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
