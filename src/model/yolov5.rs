// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 检测器
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl,
  backend::{Backend, BackendError, BackendWrapper, OutputTensor, PerfProfile},
  frame::NhwcTensor,
  labels::{Labels, LabelsError},
  model::{
    DetectItem, DetectResult, Model,
    decode::{DecodeError, Decoder, DetectionHead, YOLOV5_HEADS},
    letterbox::{Letterbox, letterbox},
    mapping::unletterbox,
    nms::nms,
  },
};

pub use crate::model::{decode::ScalePolicy, letterbox::ChannelOrder};

const YOLOV5_INPUT_W: u32 = 640;
const YOLOV5_INPUT_H: u32 = 640;
const YOLOV5_DEFAULT_NAME: &str = "yolov5";

pub type Yolov5Tensor = NhwcTensor<YOLOV5_INPUT_W, YOLOV5_INPUT_H>;

#[derive(Error, Debug)]
pub enum Yolov5Error {
  #[error("配置错误: {0}")]
  ConfigurationError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(BackendError),
  #[error("输入形状错误: {0}")]
  InputShapeError(String),
  #[error("推理错误: {0}")]
  InferenceError(BackendError),
  #[error("类别编号越界: {class_id}, 标签数量 {labels}")]
  IndexError { class_id: usize, labels: usize },
}

impl From<DecodeError> for Yolov5Error {
  fn from(err: DecodeError) -> Self {
    Yolov5Error::InputShapeError(err.to_string())
  }
}

impl From<LabelsError> for Yolov5Error {
  fn from(err: LabelsError) -> Self {
    Yolov5Error::ConfigurationError(err.to_string())
  }
}

/// 检测器的可调参数
#[derive(Debug, Clone)]
pub struct Yolov5Config {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub channel_order: ChannelOrder,
  pub scale_policy: ScalePolicy,
  pub perf_profile: PerfProfile,
  pub debug: bool,
}

impl Default for Yolov5Config {
  fn default() -> Self {
    Self {
      conf_threshold: 0.65,
      iou_threshold: 0.50,
      channel_order: ChannelOrder::default(),
      scale_policy: ScalePolicy::default(),
      perf_profile: PerfProfile::default(),
      debug: false,
    }
  }
}

pub struct Yolov5<B> {
  name: String,
  backend: B,
  labels: Labels,
  config: Yolov5Config,
}

pub struct Yolov5Builder<B> {
  name: String,
  backend: B,
  labels: Labels,
  config: Yolov5Config,
}

impl FromUrl for Yolov5Builder<BackendWrapper> {
  type Error = Yolov5Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    info!("加载模型: {}", url);
    let backend = BackendWrapper::from_url(url).map_err(|e| match e {
      BackendError::SchemeMismatch(scheme) => {
        Yolov5Error::ConfigurationError(format!("不支持的模型方案: {}", scheme))
      }
      e => Yolov5Error::ModelLoadError(e),
    })?;
    Ok(Yolov5Builder::new(backend))
  }
}

impl<B: Backend> Yolov5Builder<B> {
  pub fn new(backend: B) -> Self {
    Self {
      name: YOLOV5_DEFAULT_NAME.to_string(),
      backend,
      labels: Labels::default(),
      config: Yolov5Config::default(),
    }
  }

  /// 调用方指定的模型标识，用于日志区分多个实例
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  pub fn config(mut self, config: Yolov5Config) -> Self {
    self.config = config;
    self
  }

  pub fn build(self) -> Result<Yolov5<B>, Yolov5Error> {
    if self.labels.is_empty() {
      error!("[{}] 标签表为空", self.name);
      return Err(Yolov5Error::ConfigurationError("标签表为空".to_string()));
    }

    let config = &self.config;
    if !(0.0..=1.0).contains(&config.conf_threshold) {
      warn!("[{}] 置信度阈值超出 [0, 1]: {}", self.name, config.conf_threshold);
    }
    if !(0.0..=1.0).contains(&config.iou_threshold) {
      warn!("[{}] IoU 阈值超出 [0, 1]: {}", self.name, config.iou_threshold);
    }

    info!(
      "[{}] 后端: {}, 类别数: {}, 置信度阈值: {}, IoU 阈值: {}",
      self.name,
      self.backend.name(),
      self.labels.len(),
      config.conf_threshold,
      config.iou_threshold
    );
    for (index, head) in YOLOV5_HEADS.iter().enumerate() {
      debug!(
        "[{}] 输出 {}: 期望元素个数 {}",
        self.name,
        index,
        head.expected_len(self.labels.len())
      );
    }

    Ok(Yolov5 {
      name: self.name,
      backend: self.backend,
      labels: self.labels,
      config: self.config,
    })
  }
}

impl<B> Yolov5<B> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn config(&self) -> &Yolov5Config {
    &self.config
  }

  pub fn heads(&self) -> &'static [DetectionHead] {
    &YOLOV5_HEADS
  }
}

impl<B: Backend> Yolov5<B> {
  /// 批量入口，仅接受恰好一张图像
  pub fn infer_batch(&self, images: &[RgbImage]) -> Result<DetectResult, Yolov5Error> {
    match images {
      [image] => self.infer(image),
      _ => {
        error!("[{}] 输入图像数量必须为 1, 实际为 {}", self.name, images.len());
        Err(Yolov5Error::InputShapeError(format!(
          "输入图像数量必须为 1, 实际为 {}",
          images.len()
        )))
      }
    }
  }
}

impl<B: Backend> Model for Yolov5<B> {
  type Input = RgbImage;
  type Tensor = Yolov5Tensor;
  type State = Letterbox;
  type Output = DetectResult;
  type Error = Yolov5Error;

  fn preprocess(&self, input: &Self::Input) -> Result<(Self::Tensor, Self::State), Self::Error> {
    if self.config.debug {
      info!("[{}] 原始输入: {}x{}", self.name, input.width(), input.height());
    }

    letterbox::<YOLOV5_INPUT_W, YOLOV5_INPUT_H>(input, self.config.channel_order).ok_or_else(|| {
      error!("[{}] 输入图像为空", self.name);
      Yolov5Error::InputShapeError(format!(
        "输入图像尺寸无效: {}x{}",
        input.width(),
        input.height()
      ))
    })
  }

  fn postprocess(
    &self,
    state: &Self::State,
    outputs: &[OutputTensor],
  ) -> Result<Self::Output, Self::Error> {
    debug!("[{}] 后处理模型输出", self.name);
    let candidates = Decoder::new(&YOLOV5_HEADS, self.labels.len(), self.config.conf_threshold)
      .policy(self.config.scale_policy)
      .decode(outputs)?;

    let keep = nms(
      &candidates,
      self.config.conf_threshold,
      self.config.iou_threshold,
    );

    let items = keep
      .into_iter()
      .map(|index| {
        let candidate = &candidates[index];
        let label = self.labels.get(candidate.class_id).ok_or_else(|| {
          error!("[{}] 类别编号越界: {}", self.name, candidate.class_id);
          Yolov5Error::IndexError {
            class_id: candidate.class_id,
            labels: self.labels.len(),
          }
        })?;
        let bbox = unletterbox(&candidate.bbox, state);

        if self.config.debug {
          info!(
            "[{}] 目标[{}]: {}x{}@{},{} {:.4} {}",
            self.name, index, bbox.width, bbox.height, bbox.x, bbox.y, candidate.confidence, label
          );
        }

        Ok(DetectItem {
          class_id: candidate.class_id,
          label: label.to_string(),
          score: candidate.confidence,
          bbox,
        })
      })
      .collect::<Result<Vec<_>, Yolov5Error>>()?;

    debug!("[{}] 检测到 {} 个物体", self.name, items.len());
    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (tensor, state) = self.preprocess(input)?;

    debug!("[{}] 执行模型推理", self.name);
    let outputs = self
      .backend
      .execute(tensor.as_nhwc(), &self.config.perf_profile)
      .map_err(|e| {
        error!("[{}] 推理失败: {}", self.name, e);
        Yolov5Error::InferenceError(e)
      })?;

    self.postprocess(&state, &outputs)
  }
}
