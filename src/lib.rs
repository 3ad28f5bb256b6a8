//! # pagetrans - 原地增量网页翻译引擎
//!
//! 在解析后的 HTML 文档树上执行原地翻译：遍历文档把可翻译文本切分
//! 为带大小上限的片段，经关键词保护编码后批量送往外部翻译服务，
//! 再把译文以可还原的方式替换回文档。页面在原文与译文两个状态之间
//! 可随时无损切换，增量调度器持续跟进文档变更与视口滚动。
//!
//! ## 模块组织
//!
//! - `codec` - 关键词保护编解码（词典术语的索引压缩与标记协议）
//! - `segment` - 文档切分（片段与可翻译属性收集）
//! - `engine` - 翻译编排器（状态机、epoch 取消、还原快照）
//! - `scheduler` - 增量调度器（变更合并与可见性批次）
//! - `provider` - 翻译服务接口与跨上下文 RPC 客户端
//! - `dom` - 文档树操作与宿主适配层（视口、变更流）
//! - `config` - 配置与常量
//! - `error` - 错误类型
//!
//! ## 基本用法
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use pagetrans::{
//!     html_to_dom, translate_page, IdentityProvider, TranslationConfig, TranslationEngine,
//! };
//!
//! # async fn run() -> pagetrans::TranslationResult<()> {
//! let dom = html_to_dom(b"<html><body><p>Hello world</p></body></html>", "utf-8");
//! let engine = TranslationEngine::new(
//!     dom.document,
//!     TranslationConfig::default(),
//!     Rc::new(IdentityProvider),
//! )
//! .shared();
//!
//! translate_page(&engine, Some("zh-CN")).await?;
//! engine.borrow_mut().restore_page();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod provider;
pub mod scheduler;
pub mod segment;

pub use codec::{decode, encode, CompressionMap, CHAR_MARK, MARK_END, MARK_START};
pub use config::{DictionaryEntry, DualDisplayStyle, TranslationConfig};
pub use dom::changes::{change_channel, ChangeBatch};
pub use dom::tree::html_to_dom;
pub use dom::visibility::{FixedViewport, Rect, Viewport};
pub use engine::{
    run_visible_pass, swap_provider, translate_page, EngineStats, PageState, SharedEngine,
    TranslationEngine,
};
pub use error::{TranslationError, TranslationResult};
pub use provider::{IdentityProvider, RpcProvider, TranslationProvider};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use segment::{segment, AttributeEntry, Piece, TagCategory};
