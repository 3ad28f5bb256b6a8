//! 翻译服务接口
//!
//! 引擎把外部翻译能力视为不透明的批量 RPC：三种请求形状分别对应
//! 片段批次（二维）、属性批次（一维）和单文本回退。实现方只需保证
//! 响应形状与请求一致；行数不足由编排器按"跳过该节点"处理。
//!
//! 整个引擎是单线程协作式的（文档树基于 `Rc`），因此这里的 future
//! 不要求 `Send`，统一使用 [`LocalBoxFuture`]。

pub mod rpc;

use futures::future::LocalBoxFuture;

use crate::error::TranslationResult;

pub use rpc::{RpcProvider, RpcReply, RpcRequest, RpcTransport};

/// 翻译服务能力接口
pub trait TranslationProvider {
    /// 服务标识（日志与换源判定用）
    fn id(&self) -> &str;

    /// 片段批次：二维文本数组，响应形状与请求一致
    fn translate_batch<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>>;

    /// 属性批次：一维文本数组
    fn translate_list<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>>;

    /// 单文本：协议违规回退与页面标题翻译
    fn translate_text<'a>(
        &'a self,
        target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>>;
}

/// 恒等翻译服务：原样返回输入
///
/// 用于测试与协议诊断（编码/解码往返应当还原原文加词典替换）。
#[derive(Debug, Default)]
pub struct IdentityProvider;

impl TranslationProvider for IdentityProvider {
    fn id(&self) -> &str {
        "identity"
    }

    fn translate_batch<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move { Ok(sources) })
    }

    fn translate_list<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        Box::pin(async move { Ok(sources) })
    }

    fn translate_text<'a>(
        &'a self,
        _target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move { Ok(source) })
    }
}
