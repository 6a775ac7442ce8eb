// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/mapping.rs - letterbox 坐标还原到原图
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

use crate::model::{BBox, letterbox::Letterbox};

/// 把 letterbox 像素空间的矩形映射回原图像素空间。
///
/// 不对原图边界做裁剪，结果可能越界或为负。
pub fn unletterbox(bbox: &BBox, letterbox: &Letterbox) -> BBox {
  let scale = letterbox.scale;
  BBox::new(
    (bbox.x.saturating_sub(letterbox.pad_x) as f32 / scale).round() as i32,
    (bbox.y.saturating_sub(letterbox.pad_y) as f32 / scale).round() as i32,
    (bbox.width as f32 / scale).round() as i32,
    (bbox.height as f32 / scale).round() as i32,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn removes_padding_then_scale() {
    let letterbox = Letterbox::fit(1280, 720, 640, 640).unwrap();
    let bbox = BBox::new(100, 140 + 50, 64, 32);
    assert_eq!(unletterbox(&bbox, &letterbox), BBox::new(200, 100, 128, 64));
  }

  #[test]
  fn maps_within_one_pixel_of_exact_inverse() {
    for (w, h) in [(640, 480), (1920, 1080), (333, 1000), (1000, 333), (17, 23)] {
      let letterbox = Letterbox::fit(w, h, 640, 640).unwrap();
      for (lx, ly, lw, lh) in [(0, 0, 10, 10), (101, 257, 33, 47), (320, 320, 1, 1), (639, 639, 5, 3)] {
        let mapped = unletterbox(&BBox::new(lx, ly, lw, lh), &letterbox);
        let exact_x = (lx - letterbox.pad_x) as f32 / letterbox.scale;
        let exact_y = (ly - letterbox.pad_y) as f32 / letterbox.scale;
        let exact_w = lw as f32 / letterbox.scale;
        let exact_h = lh as f32 / letterbox.scale;
        assert!((mapped.x as f32 - exact_x).abs() <= 1.0, "{:?}: {:?}", (w, h), mapped);
        assert!((mapped.y as f32 - exact_y).abs() <= 1.0, "{:?}: {:?}", (w, h), mapped);
        assert!((mapped.width as f32 - exact_w).abs() <= 1.0, "{:?}: {:?}", (w, h), mapped);
        assert!((mapped.height as f32 - exact_h).abs() <= 1.0, "{:?}: {:?}", (w, h), mapped);
      }
    }
  }

  #[test]
  fn original_pixel_survives_letterbox_and_back() {
    // 1920x1080 -> scale 1/3, pad_y 140；原图 (300, 600) 落在 (100, 340)
    let letterbox = Letterbox::fit(1920, 1080, 640, 640).unwrap();
    assert_eq!(letterbox.pad_y, 140);
    let mapped = unletterbox(&BBox::new(100, 340, 40, 20), &letterbox);
    assert!((mapped.x - 300).abs() <= 1);
    assert!((mapped.y - 600).abs() <= 1);
    assert!((mapped.width - 120).abs() <= 1);
    assert!((mapped.height - 60).abs() <= 1);
  }

  #[test]
  fn out_of_bounds_boxes_are_not_clamped() {
    let letterbox = Letterbox::fit(640, 480, 640, 640).unwrap();
    let bbox = BBox::new(-20, 10, 700, 50);
    let mapped = unletterbox(&bbox, &letterbox);
    assert_eq!(mapped, BBox::new(-20, 10 - 80, 700, 50));
  }
}
