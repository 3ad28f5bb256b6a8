//! 增量调度器
//!
//! 单个协作式循环驱动两类周期任务：
//!
//! - 变更 tick（默认 2s）：把变更通道里积压的全部批次合并成一批，
//!   交给编排器做变更合并（追加新片段、放弃已移除内容）；
//! - 可见性 tick（默认 600ms）：执行一次可见性增量批次，把滚入
//!   视口（含缓冲区）的未翻译片段与属性送去翻译。
//!
//! 两类任务都受同一组门控：引擎处于已翻译状态、调度器已启用、
//! 文档可见。门控不通过时 tick 空转，周期不变。循环通过 watch
//! 通道关停，引擎销毁后宿主应立即发出关停信号。

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::{constants, TranslationConfig};
use crate::dom::changes::{drain_changes, ChangeBatch};
use crate::dom::visibility::Viewport;
use crate::engine::{self, PageState, SharedEngine};

/// 调度周期配置
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 变更合并周期
    pub mutation_interval: Duration,
    /// 可见性检查周期
    pub visibility_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mutation_interval: Duration::from_millis(constants::MUTATION_INTERVAL_MS),
            visibility_interval: Duration::from_millis(constants::VISIBILITY_INTERVAL_MS),
        }
    }
}

impl From<&TranslationConfig> for SchedulerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            mutation_interval: Duration::from_millis(config.mutation_interval_ms),
            visibility_interval: Duration::from_millis(config.visibility_interval_ms),
        }
    }
}

/// 增量调度器
///
/// 持有共享引擎句柄与视口；只在 tick 处理期间短暂借用引擎，
/// 宿主随时可以在循环运行时调用还原或销毁。
pub struct Scheduler<V: Viewport> {
    engine: SharedEngine,
    viewport: V,
    config: SchedulerConfig,
}

impl<V: Viewport> Scheduler<V> {
    pub fn new(engine: SharedEngine, viewport: V, config: SchedulerConfig) -> Self {
        Self {
            engine,
            viewport,
            config,
        }
    }

    /// 运行调度循环直到收到关停信号
    ///
    /// `changes` 是宿主变更源的接收端；`shutdown` 置为 `true`
    /// （或发送端被丢弃）时循环退出。
    pub async fn run(
        &self,
        mut changes: mpsc::UnboundedReceiver<ChangeBatch>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut mutation_tick = interval(self.config.mutation_interval);
        let mut visibility_tick = interval(self.config.visibility_interval);
        // 错过的 tick 直接跳过，不追赶
        mutation_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        visibility_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的第一次 tick 立即完成，先消耗掉
        mutation_tick.tick().await;
        visibility_tick.tick().await;

        tracing::debug!(
            "调度循环启动: 变更 {:?} / 可见性 {:?}",
            self.config.mutation_interval,
            self.config.visibility_interval
        );

        loop {
            tokio::select! {
                _ = mutation_tick.tick() => {
                    self.on_mutation_tick(&mut changes);
                }
                _ = visibility_tick.tick() => {
                    self.on_visibility_tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("调度循环退出");
    }

    /// 变更 tick：合并积压变更后交给编排器
    fn on_mutation_tick(&self, changes: &mut mpsc::UnboundedReceiver<ChangeBatch>) {
        if !self.gate() {
            return;
        }
        let batch = drain_changes(changes);
        if batch.is_empty() {
            return;
        }
        self.engine.borrow_mut().consolidate_changes(&batch);
    }

    /// 可见性 tick：执行一次可见性增量批次
    async fn on_visibility_tick(&self) {
        if !self.gate() {
            return;
        }
        if let Err(err) = engine::run_visible_pass(&self.engine, &self.viewport).await {
            tracing::warn!("可见性批次执行失败: {}", err);
        }
    }

    /// 周期任务门控：已翻译 + 调度器启用 + 文档可见
    fn gate(&self) -> bool {
        if !self.viewport.is_document_visible() {
            return false;
        }
        let engine = self.engine.borrow();
        engine.scheduler_enabled() && engine.state() == PageState::Translated
    }
}
