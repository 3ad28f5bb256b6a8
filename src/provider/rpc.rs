//! 跨上下文 RPC 客户端
//!
//! 浏览器扩展里内容脚本与后台页之间是回调式消息传递；这里改造成
//! 显式的请求/响应客户端：每个请求携带自增关联 ID，通过注入的
//! mpsc 传输通道发给宿主，宿主用随请求附带的 oneshot 通道回包，
//! 超时由客户端侧统一裁决。传输载荷可 JSON 序列化，便于宿主桥接。

use std::cell::Cell;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{TranslationError, TranslationResult};

use super::TranslationProvider;

/// 请求载荷：三种形状对应接口的三个方法
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RpcPayload {
    SourceArray2d(Vec<Vec<String>>),
    SourceArray(Vec<String>),
    Source(String),
}

/// 响应载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RpcReply {
    Array2d(Vec<Vec<String>>),
    Array(Vec<String>),
    Text(String),
    /// 宿主侧错误
    Error(String),
}

/// RPC 请求信封
#[derive(Debug)]
pub struct RpcRequest {
    /// 关联 ID（每个客户端内自增）
    pub id: u64,
    pub service_id: String,
    pub target_lang: String,
    pub payload: RpcPayload,
    /// 回包通道；宿主丢弃它即视为通道关闭
    pub reply: oneshot::Sender<RpcReply>,
}

/// 发往宿主的传输通道
pub type RpcTransport = mpsc::UnboundedSender<RpcRequest>;

/// 基于消息通道的翻译服务客户端
pub struct RpcProvider {
    service_id: String,
    transport: RpcTransport,
    timeout: Duration,
    next_id: Cell<u64>,
}

impl RpcProvider {
    pub fn new(service_id: &str, transport: RpcTransport, timeout: Duration) -> Self {
        Self {
            service_id: service_id.to_string(),
            transport,
            timeout,
            next_id: Cell::new(0),
        }
    }

    async fn request(&self, target_lang: &str, payload: RpcPayload) -> TranslationResult<RpcReply> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = RpcRequest {
            id,
            service_id: self.service_id.clone(),
            target_lang: target_lang.to_string(),
            payload,
            reply: reply_tx,
        };

        self.transport.send(request).map_err(|_| {
            TranslationError::ChannelClosed(format!("服务 {} 的传输通道已关闭", self.service_id))
        })?;

        let reply = tokio::time::timeout(self.timeout, reply_rx)
            .await
            .map_err(|_| {
                TranslationError::RpcTimeout(format!(
                    "请求 #{} 超过 {:?} 未收到响应",
                    id, self.timeout
                ))
            })?
            .map_err(|_| {
                TranslationError::ChannelClosed(format!("请求 #{} 的回包通道被丢弃", id))
            })?;

        tracing::debug!("RPC 请求 #{} 已完成", id);

        match reply {
            RpcReply::Error(message) => Err(TranslationError::ProviderError(message)),
            other => Ok(other),
        }
    }
}

impl TranslationProvider for RpcProvider {
    fn id(&self) -> &str {
        &self.service_id
    }

    fn translate_batch<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move {
            match self
                .request(target_lang, RpcPayload::SourceArray2d(sources))
                .await?
            {
                RpcReply::Array2d(rows) => Ok(rows),
                other => Err(TranslationError::ProviderError(format!(
                    "响应形状不匹配: 期望二维数组, 收到 {:?}",
                    reply_kind(&other)
                ))),
            }
        })
    }

    fn translate_list<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        Box::pin(async move {
            match self
                .request(target_lang, RpcPayload::SourceArray(sources))
                .await?
            {
                RpcReply::Array(rows) => Ok(rows),
                other => Err(TranslationError::ProviderError(format!(
                    "响应形状不匹配: 期望一维数组, 收到 {:?}",
                    reply_kind(&other)
                ))),
            }
        })
    }

    fn translate_text<'a>(
        &'a self,
        target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move {
            match self.request(target_lang, RpcPayload::Source(source)).await? {
                RpcReply::Text(text) => Ok(text),
                other => Err(TranslationError::ProviderError(format!(
                    "响应形状不匹配: 期望单文本, 收到 {:?}",
                    reply_kind(&other)
                ))),
            }
        })
    }
}

fn reply_kind(reply: &RpcReply) -> &'static str {
    match reply {
        RpcReply::Array2d(_) => "array2d",
        RpcReply::Array(_) => "array",
        RpcReply::Text(_) => "text",
        RpcReply::Error(_) => "error",
    }
}
