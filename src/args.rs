// 该文件是 Beifeng （北风） 项目的一部分。
// src/args.rs - 公共命令行参数
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

use clap::Args;
use url::Url;

use crate::{
  FromUrl,
  backend::{BackendWrapper, PerfProfile},
  labels::Labels,
  model::{ChannelOrder, ScalePolicy, Yolov5, Yolov5Builder, Yolov5Config, Yolov5Error},
};

/// 检测器参数
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 模型地址，例如 qnn-dump:///path/to/output
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 标签文件（每行一个类别），缺省为内置 COCO 80 类
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 模型实例名称
  #[arg(long, default_value = "yolov5", value_name = "NAME")]
  pub name: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.65", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 后端性能档位
  #[arg(long, default_value = "burst", value_name = "PROFILE")]
  pub perf_profile: PerfProfile,

  /// 送入后端的通道顺序
  #[arg(long, value_enum, default_value_t = ChannelOrder::Rgb)]
  pub channel_order: ChannelOrder,

  /// 输出张量大小不匹配时的处理方式
  #[arg(long, value_enum, default_value_t = ScalePolicy::FailFast)]
  pub scale_policy: ScalePolicy,

  /// 打印每一帧的输入尺寸与检测结果
  #[arg(long)]
  pub debug: bool,
}

impl DetectorArgs {
  pub fn to_config(&self) -> Yolov5Config {
    Yolov5Config {
      conf_threshold: self.confidence,
      iou_threshold: self.iou_threshold,
      channel_order: self.channel_order,
      scale_policy: self.scale_policy,
      perf_profile: self.perf_profile.clone(),
      debug: self.debug,
    }
  }

  pub fn build(&self) -> Result<Yolov5<BackendWrapper>, Yolov5Error> {
    let labels = match &self.labels {
      Some(path) => Labels::from_file(path)?,
      None => Labels::coco(),
    };

    Yolov5Builder::from_url(&self.model)?
      .name(self.name.clone())
      .labels(labels)
      .config(self.to_config())
      .build()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct TestCli {
    #[command(flatten)]
    detector: DetectorArgs,
  }

  #[test]
  fn defaults_are_applied_without_flags() {
    let cli = TestCli::parse_from(["test", "--model", "qnn-dump:///tmp/out"]);
    let config = cli.detector.to_config();
    assert_eq!(config.conf_threshold, 0.65);
    assert_eq!(config.iou_threshold, 0.5);
    assert_eq!(config.perf_profile.as_str(), "burst");
    assert_eq!(config.channel_order, ChannelOrder::Rgb);
    assert_eq!(config.scale_policy, ScalePolicy::FailFast);
    assert!(!config.debug);
  }

  #[test]
  fn value_enums_parse_kebab_case() {
    let cli = TestCli::parse_from([
      "test",
      "--model",
      "qnn-dump:///tmp/out",
      "--channel-order",
      "bgr",
      "--scale-policy",
      "best-effort",
      "--perf-profile",
      "balanced",
    ]);
    let config = cli.detector.to_config();
    assert_eq!(config.channel_order, ChannelOrder::Bgr);
    assert_eq!(config.scale_policy, ScalePolicy::BestEffort);
    assert_eq!(config.perf_profile.as_str(), "balanced");
  }

  #[test]
  fn unknown_model_scheme_is_configuration_error() {
    let cli = TestCli::parse_from(["test", "--model", "rknn:///tmp/model.rknn"]);
    assert!(matches!(
      cli.detector.build(),
      Err(Yolov5Error::ConfigurationError(_))
    ));
  }

  #[test]
  fn missing_dump_directory_is_model_load_error() {
    let cli = TestCli::parse_from(["test", "--model", "qnn-dump:///nonexistent/beifeng"]);
    assert!(matches!(cli.detector.build(), Err(Yolov5Error::ModelLoadError(_))));
  }
}
