// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 推理任务
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
  error::Error,
  sync::atomic::{AtomicBool, Ordering},
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 推理并渲染一帧，返回 (推理耗时, 推理 + 渲染耗时)
fn infer_and_render<M, O>(model: &M, output: &O, frame: &M::Input) -> anyhow::Result<(Duration, Duration)>
where
  M: Model,
  M::Error: Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: Error + Send + Sync + 'static,
{
  let now = Instant::now();
  let result = model.infer(frame)?;
  let inferred = now.elapsed();
  output.render_result(frame, &result)?;
  Ok((inferred, now.elapsed()))
}

pub struct OneShotTask;

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = M::Input>,
  M: Model,
  M::Error: Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let (inferred, rendered) = infer_and_render(&model, &output, &frame)?;
    info!("推理完成，耗时: {:.2?}，渲染完成，耗时: {:.2?}", inferred, rendered);
    Ok(())
  }
}

const WARMUP_RUNS: usize = 2;

/// 对同一帧重复推理，统计平均耗时（去掉前两次预热）
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<I, M, O> Task<I, M, O> for RepeatShotTask
where
  I: Iterator<Item = M::Input>,
  M: Model,
  M::Error: Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，重复 {} 次...", self.repeat_times);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;

    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let (inferred, rendered) = infer_and_render(&model, &output, &frame)?;
      debug!("({}) 推理耗时: {:.2?} / {:.2?}", i, inferred, rendered);
      times.push(inferred);
    }

    match times.get(WARMUP_RUNS..) {
      Some(measured) if !measured.is_empty() => warn!(
        "平均推理时间: {:.2?}（{} 次，不含预热）",
        measured.iter().sum::<Duration>() / measured.len() as u32,
        measured.len()
      ),
      _ => warn!("重复次数不超过 {} 次预热，不统计平均耗时", WARMUP_RUNS),
    }

    Ok(())
  }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// 进程内只注册一次 Ctrl-C 处理函数，之后的任务复用同一个标志
fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
  let installed = ctrlc::set_handler(|| {
    info!("收到中断信号，准备退出...");
    INTERRUPTED.store(true, Ordering::SeqCst);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  });

  match installed {
    Ok(()) => Ok(()),
    Err(ctrlc::Error::MultipleHandlers) => {
      debug!("中断处理函数已注册");
      Ok(())
    }
    Err(e) => Err(e),
  }
}

/// 逐帧处理直到输入耗尽、达到帧数上限或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = M::Input>,
  M: Model,
  M::Error: Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    install_interrupt_handler()?;
    INTERRUPTED.store(false, Ordering::SeqCst);

    let mut frame_index = 0usize;
    for frame in input {
      frame_index += 1;
      let (inferred, rendered) = infer_and_render(&model, &output, &frame)?;
      info!("第 {} 帧完成，耗时: {:.2?} / {:.2?}", frame_index, inferred, rendered);

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if INTERRUPTED.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧，退出", frame_index);
    Ok(())
  }
}
