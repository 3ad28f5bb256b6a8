//! DOM 适配层
//!
//! - `tree`: 宿主文档树的遍历、分类与变更能力
//! - `visibility`: 视口与布局信息的注入接口
//! - `changes`: 文档变更流的通道类型

pub mod changes;
pub mod tree;
pub mod visibility;

pub use changes::{change_channel, drain_changes, ChangeBatch};
pub use tree::{node_key, node_kind, NodeKind};
pub use visibility::{is_node_visible, FixedViewport, Rect, Viewport};
