//! 变更流适配层
//!
//! 宿主环境（MutationObserver 或任何文档变更源）把增删节点打包成
//! [`ChangeBatch`] 推入 mpsc 通道，调度器在固定间隔把积压的批次
//! 合并后交给编排器。

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc;

/// 一次变更快照：新增与移除的节点
#[derive(Debug, Default, Clone)]
pub struct ChangeBatch {
    pub added: Vec<Handle>,
    pub removed: Vec<Handle>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// 合并另一批变更
    pub fn merge(&mut self, other: ChangeBatch) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

/// 创建变更通道（宿主持有发送端，调度器持有接收端）
pub fn change_channel() -> (mpsc::UnboundedSender<ChangeBatch>, mpsc::UnboundedReceiver<ChangeBatch>)
{
    mpsc::unbounded_channel()
}

/// 将接收端中积压的全部批次合并为一批，不阻塞
pub fn drain_changes(rx: &mut mpsc::UnboundedReceiver<ChangeBatch>) -> ChangeBatch {
    let mut merged = ChangeBatch::default();
    while let Ok(batch) = rx.try_recv() {
        merged.merge(batch);
    }
    merged
}
