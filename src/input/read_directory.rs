// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/read_directory.rs - 图像目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的图像，无法解码的文件被跳过
pub struct ImageDirectoryInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageDirectoryInputError::SchemaMismatch);
    }

    let mut files = std::fs::read_dir(url.path())?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path.extension().is_some_and(|ext| {
          let ext = ext.to_string_lossy().to_lowercase();
          IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
      })
      .collect::<Vec<_>>();
    files.sort();
    info!("图像目录 {}: {} 个文件", url.path(), files.len());

    Ok(ImageDirectoryInput {
      files: files.into(),
    })
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          debug!("读取图像: {}", path.display());
          return Some(image.to_rgb8());
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_images_in_name_order_and_skips_broken_files() {
    let dir = std::env::temp_dir().join(format!("beifeng-dir-input-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    RgbImage::new(3, 2).save(dir.join("b.png")).unwrap();
    RgbImage::new(5, 4).save(dir.join("a.png")).unwrap();
    std::fs::write(dir.join("c.jpg"), b"not a jpeg").unwrap();
    std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

    let url = Url::from_directory_path(&dir).unwrap();
    let url = Url::parse(&url.as_str().replacen("file", "folder", 1)).unwrap();
    let input = ImageDirectoryInput::from_url(&url).unwrap();
    let sizes: Vec<_> = input.map(|image| image.dimensions()).collect();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(sizes, [(5, 4), (3, 2)]);
  }
}
