// 该文件是 Beifeng （北风） 项目的一部分。
// src/backend/dump.rs - 回放离线推理结果的后端
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicUsize, Ordering},
};

use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  backend::{Backend, BackendError, OutputTensor, PerfProfile},
};

const RESULT_DIR_PREFIX: &str = "Result_";
const RAW_EXTENSION: &str = "raw";

/// 回放由外部推理工具落盘的输出张量。
///
/// 目录结构：`<root>/Result_<n>/*.raw`，每个文件是小端 f32 数组，
/// 按文件名排序即为输出顺序。每次 `execute` 消费下一个 `Result_<n>`。
pub struct DumpBackend {
  name: String,
  root: PathBuf,
  input_dir: Option<PathBuf>,
  next: AtomicUsize,
}

impl FromUrlWithScheme for DumpBackend {
  const SCHEME: &'static str = "qnn-dump";
}

impl FromUrl for DumpBackend {
  type Error = BackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BackendError::SchemeMismatch(url.scheme().to_string()));
    }

    let backend = Self::open(url.path())?;
    let input_dir = url
      .query_pairs()
      .find(|(k, _)| k == "input")
      .map(|(_, v)| PathBuf::from(v.as_ref()));

    Ok(backend.with_input_dir(input_dir))
  }
}

impl DumpBackend {
  pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, BackendError> {
    let root = root.as_ref().to_path_buf();
    if !root.is_dir() {
      error!("推理结果目录不存在: {}", root.display());
      return Err(BackendError::ModelNotFound(root));
    }
    info!("回放推理结果目录: {}", root.display());

    Ok(Self {
      name: format!("{}://{}", Self::SCHEME, root.display()),
      root,
      input_dir: None,
      next: AtomicUsize::new(0),
    })
  }

  /// 将每次的输入张量另存为 `input_<n>.raw`
  pub fn with_input_dir(mut self, input_dir: Option<PathBuf>) -> Self {
    self.input_dir = input_dir;
    self
  }

  fn save_input(&self, index: usize, input: &[f32]) -> Result<(), BackendError> {
    if let Some(dir) = &self.input_dir {
      std::fs::create_dir_all(dir)?;
      let path = dir.join(format!("input_{}.{}", index, RAW_EXTENSION));
      let bytes: Vec<u8> = input.iter().flat_map(|v| v.to_le_bytes()).collect();
      std::fs::write(&path, bytes)?;
      debug!("输入张量已保存: {}", path.display());
    }
    Ok(())
  }
}

fn read_raw_tensor(path: &Path) -> Result<OutputTensor, BackendError> {
  let bytes = std::fs::read(path)?;
  if bytes.len() % size_of::<f32>() != 0 {
    error!("张量文件长度不是 4 的倍数: {}", path.display());
    return Err(BackendError::MalformedTensor {
      path: path.to_path_buf(),
      len: bytes.len(),
    });
  }

  let data = bytes
    .chunks_exact(size_of::<f32>())
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect::<Vec<_>>();
  Ok(OutputTensor::from(data))
}

impl Backend for DumpBackend {
  fn name(&self) -> &str {
    &self.name
  }

  fn execute(&self, input: &[f32], profile: &PerfProfile) -> Result<Vec<OutputTensor>, BackendError> {
    let index = self.next.fetch_add(1, Ordering::Relaxed);
    debug!("回放第 {} 次推理结果, 性能档位: {}", index, profile);
    self.save_input(index, input)?;

    let dir = self.root.join(format!("{}{}", RESULT_DIR_PREFIX, index));
    if !dir.is_dir() {
      return Err(BackendError::Exhausted(dir));
    }

    let mut files = std::fs::read_dir(&dir)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.extension().is_some_and(|ext| ext == RAW_EXTENSION))
      .collect::<Vec<_>>();
    files.sort();

    let outputs = files
      .iter()
      .map(|path| read_raw_tensor(path))
      .collect::<Result<Vec<_>, _>>()?;
    debug!("读取到 {} 个输出张量", outputs.len());

    Ok(outputs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("beifeng-dump-{}-{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  fn write_raw(path: &Path, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(path, bytes).unwrap();
  }

  #[test]
  fn missing_root_is_model_not_found() {
    assert!(matches!(
      DumpBackend::open("/nonexistent/beifeng/dump"),
      Err(BackendError::ModelNotFound(_))
    ));
  }

  #[test]
  fn replays_results_in_order_then_exhausts() {
    let root = scratch_dir("replay");
    let result = root.join("Result_0");
    std::fs::create_dir_all(&result).unwrap();
    write_raw(&result.join("b.raw"), &[3.0, 4.0]);
    write_raw(&result.join("a.raw"), &[1.0]);
    std::fs::write(result.join("notes.txt"), "ignored").unwrap();

    let backend = DumpBackend::open(&root).unwrap();
    let outputs = backend.execute(&[0.0; 4], &PerfProfile::default()).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].as_slice(), &[1.0]);
    assert_eq!(outputs[1].as_slice(), &[3.0, 4.0]);

    assert!(matches!(
      backend.execute(&[0.0; 4], &PerfProfile::default()),
      Err(BackendError::Exhausted(_))
    ));
    std::fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn truncated_tensor_is_malformed() {
    let root = scratch_dir("malformed");
    let result = root.join("Result_0");
    std::fs::create_dir_all(&result).unwrap();
    std::fs::write(result.join("out.raw"), [0u8; 7]).unwrap();

    let backend = DumpBackend::open(&root).unwrap();
    assert!(matches!(
      backend.execute(&[], &PerfProfile::default()),
      Err(BackendError::MalformedTensor { len: 7, .. })
    ));
    std::fs::remove_dir_all(&root).unwrap();
  }

  #[test]
  fn input_tensor_is_saved_when_requested() {
    let root = scratch_dir("input");
    std::fs::create_dir_all(root.join("Result_0")).unwrap();
    let inputs = root.join("inputs");

    let backend = DumpBackend::open(&root)
      .unwrap()
      .with_input_dir(Some(inputs.clone()));
    backend.execute(&[0.5, 1.0], &PerfProfile::default()).unwrap();

    let saved = std::fs::read(inputs.join("input_0.raw")).unwrap();
    assert_eq!(saved.len(), 8);
    assert_eq!(f32::from_le_bytes([saved[0], saved[1], saved[2], saved[3]]), 0.5);
    std::fs::remove_dir_all(&root).unwrap();
  }
}
