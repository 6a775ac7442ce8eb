// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/letterbox.rs - 保持宽高比的缩放与填充
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

use std::borrow::Cow;

use image::{RgbImage, imageops::FilterType};
use tracing::debug;

use crate::frame::NhwcTensor;

/// 送入后端的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

/// 单张图像的 letterbox 参数，预处理产生，仅供同一张图像的坐标还原使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: i32,
  pub pad_y: i32,
  pub resized_width: u32,
  pub resized_height: u32,
}

impl Letterbox {
  /// 计算把 `width`x`height` 放进 `target_w`x`target_h` 的缩放与填充。
  ///
  /// 受限的一边恰好缩放到目标尺寸，另一边取 `round(dim * scale)`。
  /// 填充量为整数截断 `(target - resized) / 2`，剩余的奇数像素落在右/下侧。
  pub fn fit(width: u32, height: u32, target_w: u32, target_h: u32) -> Option<Self> {
    if width == 0 || height == 0 {
      return None;
    }

    let scale_w = target_w as f32 / width as f32;
    let scale_h = target_h as f32 / height as f32;
    let (scale, resized_width, resized_height) = if scale_w < scale_h {
      let resized = ((height as f32 * scale_w).round() as u32).clamp(1, target_h);
      (scale_w, target_w, resized)
    } else {
      let resized = ((width as f32 * scale_h).round() as u32).clamp(1, target_w);
      (scale_h, resized, target_h)
    };

    Some(Self {
      scale,
      pad_x: ((target_w - resized_width) / 2) as i32,
      pad_y: ((target_h - resized_height) / 2) as i32,
      resized_width,
      resized_height,
    })
  }
}

/// 线性插值缩放、归一化到 [0, 1]，居中贴到零填充的 `W`x`H` 画布上
pub fn letterbox<const W: u32, const H: u32>(
  image: &RgbImage,
  order: ChannelOrder,
) -> Option<(NhwcTensor<W, H>, Letterbox)> {
  let (width, height) = image.dimensions();
  let info = Letterbox::fit(width, height, W, H)?;
  debug!(
    "letterbox: {}x{} -> {}x{}, scale={:.4}, pad=({}, {})",
    width, height, info.resized_width, info.resized_height, info.scale, info.pad_x, info.pad_y
  );

  let resized = if (width, height) == (info.resized_width, info.resized_height) {
    Cow::Borrowed(image)
  } else {
    Cow::Owned(image::imageops::resize(
      image,
      info.resized_width,
      info.resized_height,
      FilterType::Triangle,
    ))
  };

  let mut tensor = NhwcTensor::<W, H>::default();
  for (x, y, pixel) in resized.enumerate_pixels() {
    let [r, g, b] = pixel.0.map(|v| v as f32 / 255.0);
    let value = match order {
      ChannelOrder::Rgb => [r, g, b],
      ChannelOrder::Bgr => [b, g, r],
    };
    tensor.put_pixel(
      x as usize + info.pad_x as usize,
      y as usize + info.pad_y as usize,
      value,
    );
  }

  Some((tensor, info))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn wide_image_fits_width() {
    let info = Letterbox::fit(1280, 720, 640, 640).unwrap();
    assert_eq!(info.scale, 0.5);
    assert_eq!((info.resized_width, info.resized_height), (640, 360));
    assert_eq!((info.pad_x, info.pad_y), (0, 140));
  }

  #[test]
  fn tall_image_fits_height() {
    let info = Letterbox::fit(480, 640, 640, 640).unwrap();
    assert_eq!(info.scale, 1.0);
    assert_eq!((info.resized_width, info.resized_height), (480, 640));
    assert_eq!((info.pad_x, info.pad_y), (80, 0));
  }

  #[test]
  fn odd_gap_truncates_padding() {
    // 640 / 1000 * 333 = 213.12 -> 213, gap 427 -> pad 213, extra pixel at the bottom
    let info = Letterbox::fit(1000, 333, 640, 640).unwrap();
    assert_eq!(info.resized_height, 213);
    assert_eq!(info.pad_y, 213);
    assert_eq!(info.pad_y * 2 + info.resized_height as i32, 639);
  }

  #[test]
  fn limiting_dimension_is_exact_and_other_is_rounded() {
    for (w, h) in [(640, 480), (1920, 1080), (300, 700), (17, 5), (640, 640), (2000, 2001)] {
      let info = Letterbox::fit(w, h, 640, 640).unwrap();
      let scale = (640.0 / w as f32).min(640.0 / h as f32);
      assert_eq!(info.scale, scale);
      assert!(info.resized_width == 640 || info.resized_height == 640);
      assert!(info.resized_width <= 640 && info.resized_height <= 640);
      if info.resized_width == 640 {
        assert_eq!(info.resized_height, (h as f32 * scale).round() as u32);
      } else {
        assert_eq!(info.resized_width, (w as f32 * scale).round() as u32);
      }
    }
  }

  #[test]
  fn empty_image_has_no_letterbox() {
    assert!(Letterbox::fit(0, 10, 640, 640).is_none());
  }

  #[test]
  fn content_is_centered_on_zero_canvas() {
    let image = RgbImage::from_pixel(8, 4, Rgb([255, 0, 51]));
    let (tensor, info) = letterbox::<8, 8>(&image, ChannelOrder::Rgb).unwrap();
    assert_eq!((info.pad_x, info.pad_y), (0, 2));
    assert_eq!(tensor.pixel(0, 0), [0.0, 0.0, 0.0]);
    assert_eq!(tensor.pixel(7, 7), [0.0, 0.0, 0.0]);
    assert_eq!(tensor.pixel(3, 2), [1.0, 0.0, 0.2]);
    assert_eq!(tensor.pixel(3, 5), [1.0, 0.0, 0.2]);
    assert_eq!(tensor.pixel(3, 6), [0.0, 0.0, 0.0]);
  }

  #[test]
  fn bgr_order_swaps_channels() {
    let image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
    let (tensor, _) = letterbox::<4, 4>(&image, ChannelOrder::Bgr).unwrap();
    assert_eq!(tensor.pixel(1, 1), [0.0, 0.0, 1.0]);
  }
}
