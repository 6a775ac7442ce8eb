// 该文件是 Beifeng （北风） 项目的一部分。
// src/backend.rs - 推理后端定义
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

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod dump;
pub use self::dump::DumpBackend;

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("模型路径不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("没有更多的推理结果: {0}")]
  Exhausted(PathBuf),
  #[error("张量文件长度无效: {path}, 字节数 {len}")]
  MalformedTensor { path: PathBuf, len: usize },
  #[error("推理失败: {0}")]
  Failed(String),
}

/// 性能档位提示，原样交给后端解释（例如 `burst`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfProfile(String);

impl PerfProfile {
  pub fn new(profile: impl Into<String>) -> Self {
    Self(profile.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for PerfProfile {
  fn default() -> Self {
    Self::new("burst")
  }
}

impl std::fmt::Display for PerfProfile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::str::FromStr for PerfProfile {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self::new(s))
  }
}

/// 后端返回的一个原始输出张量，调用方只读
#[derive(Debug, Clone)]
pub struct OutputTensor {
  data: Box<[f32]>,
}

impl OutputTensor {
  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl From<Vec<f32>> for OutputTensor {
  fn from(data: Vec<f32>) -> Self {
    Self {
      data: data.into_boxed_slice(),
    }
  }
}

/// 不透明的推理后端：一个固定形状的输入张量进，若干原始输出张量出。
///
/// 调用是阻塞的，没有超时和取消。
pub trait Backend {
  fn name(&self) -> &str;
  fn execute(&self, input: &[f32], profile: &PerfProfile) -> Result<Vec<OutputTensor>, BackendError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
  fn name(&self) -> &str {
    (**self).name()
  }

  fn execute(&self, input: &[f32], profile: &PerfProfile) -> Result<Vec<OutputTensor>, BackendError> {
    (**self).execute(input, profile)
  }
}

pub enum BackendWrapper {
  Dump(DumpBackend),
}

impl FromUrl for BackendWrapper {
  type Error = BackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      DumpBackend::SCHEME => Ok(BackendWrapper::Dump(DumpBackend::from_url(url)?)),
      other => Err(BackendError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Backend for BackendWrapper {
  fn name(&self) -> &str {
    match self {
      BackendWrapper::Dump(backend) => backend.name(),
    }
  }

  fn execute(&self, input: &[f32], profile: &PerfProfile) -> Result<Vec<OutputTensor>, BackendError> {
    match self {
      BackendWrapper::Dump(backend) => backend.execute(input, profile),
    }
  }
}
