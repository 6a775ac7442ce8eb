// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::model::{BBox, DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: i32 = 18;
const LABEL_CHAR_WIDTH: f32 = 9.0; // 无字体时每字符宽度（粗略估计）
const LABEL_PADDING: i32 = 4;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [21, 160, 229];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(String),
}

pub struct Draw {
  font_size: f32,
  font: Option<FontVec>,
  box_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      font: None,
      box_color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn from_font_file<P: AsRef<Path>>(path: P) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|_| DrawError::InvalidFont(path.display().to_string()))?;
    info!("加载字体: {}", path.display());

    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  /// 从 URI 查询参数 `font=<ttf>` 构造，没有该参数时不绘制文字
  pub fn from_url_query(url: &Url) -> Result<Self, DrawError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Self::from_font_file(path.as_ref()),
      None => Ok(Self::default()),
    }
  }

  /// 标签文本，形如 `person,0.93`
  pub fn label_text(item: &DetectItem) -> String {
    format!("{},{:.2}", item.label, item.score)
  }

  fn text_extent(&self, text: &str) -> (i32, i32) {
    match &self.font {
      Some(font) => {
        let (w, h) = text_size(PxScale::from(self.font_size), font, text);
        (w as i32, h as i32)
      }
      None => (
        (text.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32,
        LABEL_TEXT_HEIGHT,
      ),
    }
  }

  /// 标签背景位置：优先放在框上方，上方放不下时贴着框的上沿向内
  pub fn label_rect(&self, bbox: &BBox, text: &str) -> (i32, i32, i32, i32) {
    let (text_w, text_h) = self.text_extent(text);
    let half = BOX_THICKNESS / 2;
    let x = if bbox.x < half { 0 } else { bbox.x - half };
    let y = if bbox.y < text_h + LABEL_PADDING {
      bbox.y
    } else {
      bbox.y - text_h - LABEL_PADDING
    };
    let width = bbox.width.saturating_add(half).max(text_w + LABEL_PADDING);
    (x, y, width, text_h + LABEL_PADDING)
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem) {
    let bbox = &item.bbox;
    let color = Rgb(self.box_color);
    let bounds = image.dimensions();

    for t in 0..BOX_THICKNESS {
      let inner = BBox::new(
        bbox.x.saturating_add(t),
        bbox.y.saturating_add(t),
        bbox.width.saturating_sub(2 * t),
        bbox.height.saturating_sub(2 * t),
      );
      if let Some(rect) = visible_rect(&inner, bounds) {
        draw_hollow_rect_mut(image, rect, color);
      }
    }

    let text = Self::label_text(item);
    let (x, y, w, h) = self.label_rect(bbox, &text);
    let Some(rect) = visible_rect(&BBox::new(x, y, w, h), bounds) else {
      return;
    };
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        x + LABEL_PADDING / 2,
        y + LABEL_PADDING / 2,
        PxScale::from(self.font_size),
        font,
        &text,
      );
    }
  }

  /// 在图像上叠加检测框与标签，越界部分仅在绘制时被裁掉
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_item(image, item);
    }
  }

  pub fn draw_detection(&self, frame: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut image = frame.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

/// 把矩形裁到图像外扩一像素的范围内；边落在图像外时仍然不可见
fn visible_rect(bbox: &BBox, (width, height): (u32, u32)) -> Option<Rect> {
  let left = (bbox.x as i64).max(-1);
  let top = (bbox.y as i64).max(-1);
  let right = (bbox.x as i64 + bbox.width as i64).min(width as i64 + 1);
  let bottom = (bbox.y as i64 + bbox.height as i64).min(height as i64 + 1);
  if right <= left || bottom <= top {
    return None;
  }
  Some(Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom - top) as u32))
}
