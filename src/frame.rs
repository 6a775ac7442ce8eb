// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - NHWC 浮点张量定义
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

const RGB_CHANNELS: usize = 3;

/// 固定尺寸的 NHWC 浮点张量（batch = 1），像素值归一化到 [0, 1]
#[derive(Debug, Clone)]
pub struct NhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> NhwcTensor<W, H> {
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 读取 (x, y) 处的像素
  pub fn pixel(&self, x: usize, y: usize) -> [f32; RGB_CHANNELS] {
    let idx = (y * W as usize + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 写入 (x, y) 处的像素
  pub fn put_pixel(&mut self, x: usize, y: usize, value: [f32; RGB_CHANNELS]) {
    let idx = (y * W as usize + x) * RGB_CHANNELS;
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&value);
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }
}

impl<const W: u32, const H: u32> Default for NhwcTensor<W, H> {
  fn default() -> Self {
    let data = vec![0f32; Self::LEN].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> From<Vec<f32>> for NhwcTensor<W, H> {
  fn from(data: Vec<f32>) -> Self {
    if data.len() != Self::LEN {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        Self::LEN,
        data.len()
      );
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> AsMut<[f32]> for NhwcTensor<W, H> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
