//! 翻译编排器
//!
//! [`TranslationEngine`] 拥有一个文档上下文内的全部翻译状态：页面
//! 状态机（原文 ⇄ 已翻译）、epoch 计数器、片段与属性列表、还原快照
//! 和关键词压缩映射。没有任何模块级可变状态，宿主按文档各建一个
//! 实例，用完调用 [`TranslationEngine::dispose`]。
//!
//! 并发模型：单线程协作式。引擎核心全部是同步方法（`&mut self`），
//! 只在批量 RPC 的边界挂起——异步驱动函数（[`translate_page`]、
//! [`run_visible_pass`]、[`swap_provider`]）操作 [`SharedEngine`]
//! （`Rc<RefCell<_>>`），每次挂起前释放借用，因此宿主可以在请求
//! 在途时调用 `restore_page`，过期结果靠 epoch 比对整体丢弃。
//!
//! 取消模型：每次派发都携带派发时的 epoch；结果返回后与当前值比对，
//! 不相等就静默丢弃。这是唯一的取消机制，无法中断在途的 RPC 本身。

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use markup5ever_rcdom::Handle;

use crate::codec::{self, CompressionMap};
use crate::config::{constants, DictionaryEntry, TranslationConfig};
use crate::dom::changes::ChangeBatch;
use crate::dom::tree::{
    append_child, children, find_first_element, get_parent_node, new_element, new_text_node,
    node_key, node_kind, replace_node, set_node_attr, set_text_content, text_content, NodeKind,
};
use crate::dom::visibility::{is_node_visible, Viewport};
use crate::error::{TranslationError, TranslationResult};
use crate::provider::TranslationProvider;
use crate::segment::{segment, AttributeEntry, Piece};

/// 共享引擎句柄：单线程协作式共享
pub type SharedEngine = Rc<RefCell<TranslationEngine>>;

/// 页面语言状态：文档当前是否被替换的唯一事实来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    #[default]
    Original,
    Translated,
}

/// 还原快照条目：一次文本节点替换的逆操作所需的全部信息
///
/// 原始文本节点本身被完整保留（其内容从未被改写），还原即换回。
#[derive(Debug)]
struct RestoreEntry {
    parent: Handle,
    wrapper: Handle,
    original: Handle,
}

/// 一次片段批量请求的派发快照
#[derive(Debug, Clone)]
pub struct PieceBatch {
    pub epoch: u64,
    pub target_lang: String,
    pub piece_indices: Vec<usize>,
    pub sources: Vec<Vec<String>>,
}

/// 一次属性批量请求的派发快照
#[derive(Debug, Clone)]
pub struct AttributeBatch {
    pub epoch: u64,
    pub target_lang: String,
    pub attr_indices: Vec<usize>,
    pub sources: Vec<String>,
}

/// 协议违规后待执行的无保护回退重译
#[derive(Debug)]
pub struct FallbackRequest {
    pub node: Handle,
    pub original: String,
}

/// 引擎统计信息
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub full_passes: u64,
    pub visible_batches: u64,
    pub nodes_substituted: usize,
    pub attributes_translated: usize,
    pub protocol_fallbacks: usize,
    pub stale_discards: usize,
    pub pieces_appended: usize,
}

pub struct TranslationEngine {
    document: Handle,
    config: TranslationConfig,
    provider: Rc<dyn TranslationProvider>,
    state: PageState,
    epoch: u64,
    pieces: Vec<Piece>,
    attributes: Vec<AttributeEntry>,
    restore: Vec<RestoreEntry>,
    title: Option<(Handle, String)>,
    map: CompressionMap,
    scheduler_enabled: bool,
    disposed: bool,
    stats: EngineStats,
}

impl TranslationEngine {
    pub fn new(
        document: Handle,
        config: TranslationConfig,
        provider: Rc<dyn TranslationProvider>,
    ) -> Self {
        Self {
            document,
            config,
            provider,
            state: PageState::default(),
            epoch: 0,
            pieces: Vec::new(),
            attributes: Vec::new(),
            restore: Vec::new(),
            title: None,
            map: CompressionMap::new(),
            scheduler_enabled: false,
            disposed: false,
            stats: EngineStats::default(),
        }
    }

    /// 包装为共享句柄
    pub fn shared(self) -> SharedEngine {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn scheduler_enabled(&self) -> bool {
        self.scheduler_enabled
    }

    pub fn provider(&self) -> Rc<dyn TranslationProvider> {
        self.provider.clone()
    }

    pub fn set_provider(&mut self, provider: Rc<dyn TranslationProvider>) {
        tracing::info!("翻译服务切换: {} -> {}", self.provider.id(), provider.id());
        self.provider = provider;
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn attributes(&self) -> &[AttributeEntry] {
        &self.attributes
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// 准备一次全量翻译：还原旧译文、推进 epoch、重建片段并编码
    ///
    /// 片段与属性在派发前即被乐观标记，epoch 检查与标记共同构成
    /// 重入保护：同一片段不会在请求在途时被二次提交。
    pub fn begin_full_pass(
        &mut self,
        target_lang: Option<&str>,
    ) -> TranslationResult<(PieceBatch, AttributeBatch)> {
        if self.disposed {
            return Err(TranslationError::InternalError(
                "引擎已销毁，拒绝新的翻译流程".to_string(),
            ));
        }
        if let Some(lang) = target_lang {
            self.config.target_language = lang.to_string();
        }
        if self.state == PageState::Translated {
            self.restore_in_place();
        }

        self.epoch += 1;
        self.map.reset();

        let (pieces, attributes) = segment(&self.document, self.config.piece_size_limit);
        self.pieces = pieces;
        self.attributes = attributes;
        for piece in &mut self.pieces {
            piece.is_translated = true;
        }
        for attr in &mut self.attributes {
            attr.is_translated = true;
        }

        let piece_indices: Vec<usize> = (0..self.pieces.len()).collect();
        let sources = encode_piece_sources(
            &self.pieces,
            &piece_indices,
            &self.config.dictionary,
            &mut self.map,
        );
        let attr_indices: Vec<usize> = (0..self.attributes.len()).collect();
        let attr_sources: Vec<String> =
            self.attributes.iter().map(|a| a.original.clone()).collect();

        tracing::info!(
            "全量翻译准备完成: {} 个片段, {} 个属性, 压缩映射 {} 项, epoch {}",
            self.pieces.len(),
            self.attributes.len(),
            self.map.len(),
            self.epoch
        );

        Ok((
            PieceBatch {
                epoch: self.epoch,
                target_lang: self.config.target_language.clone(),
                piece_indices,
                sources,
            },
            AttributeBatch {
                epoch: self.epoch,
                target_lang: self.config.target_language.clone(),
                attr_indices,
                sources: attr_sources,
            },
        ))
    }

    /// 准备一次可见性增量批次；没有待翻译的可见内容时返回 `None`
    pub fn begin_visible_pass(
        &mut self,
        viewport: &dyn Viewport,
    ) -> Option<(PieceBatch, AttributeBatch)> {
        if self.disposed || !self.scheduler_enabled || self.state != PageState::Translated {
            return None;
        }

        let buffer = self.config.viewport_buffer_px;
        let piece_indices: Vec<usize> = self
            .pieces
            .iter()
            .enumerate()
            .filter(|(_, piece)| {
                !piece.is_translated
                    && (is_node_visible(viewport, &piece.top, buffer)
                        || is_node_visible(viewport, &piece.bottom, buffer))
            })
            .map(|(i, _)| i)
            .collect();
        let attr_indices: Vec<usize> = self
            .attributes
            .iter()
            .enumerate()
            .filter(|(_, attr)| {
                !attr.is_translated && is_node_visible(viewport, &attr.node, buffer)
            })
            .map(|(i, _)| i)
            .collect();

        if piece_indices.is_empty() && attr_indices.is_empty() {
            return None;
        }

        // 乐观标记：请求失败或返回不足也不会回滚，相关内容不再重试。
        // 这是沿袭下来的既定行为，不要静默"修复"。
        for &i in &piece_indices {
            self.pieces[i].is_translated = true;
        }
        for &i in &attr_indices {
            self.attributes[i].is_translated = true;
        }

        let sources = encode_piece_sources(
            &self.pieces,
            &piece_indices,
            &self.config.dictionary,
            &mut self.map,
        );
        let attr_sources: Vec<String> = attr_indices
            .iter()
            .map(|&i| self.attributes[i].original.clone())
            .collect();

        self.stats.visible_batches += 1;
        tracing::debug!(
            "可见性批次: {} 个片段, {} 个属性",
            piece_indices.len(),
            attr_indices.len()
        );

        Some((
            PieceBatch {
                epoch: self.epoch,
                target_lang: self.config.target_language.clone(),
                piece_indices,
                sources,
            },
            AttributeBatch {
                epoch: self.epoch,
                target_lang: self.config.target_language.clone(),
                attr_indices,
                sources: attr_sources,
            },
        ))
    }

    /// 应用片段批次结果（epoch 过期则整体丢弃）
    ///
    /// 返回需要无保护回退重译的节点；行数不足的节点保持原文不动。
    /// `full_pass` 为真时在应用后把页面状态切换到已翻译并启用调度器。
    pub fn apply_piece_rows(
        &mut self,
        batch_epoch: u64,
        piece_indices: &[usize],
        rows: Vec<Vec<String>>,
        full_pass: bool,
    ) -> Vec<FallbackRequest> {
        if batch_epoch != self.epoch {
            self.stats.stale_discards += 1;
            tracing::debug!("丢弃过期片段结果 (epoch {} != {})", batch_epoch, self.epoch);
            return Vec::new();
        }

        if rows.len() < piece_indices.len() {
            let err = TranslationError::ShortResponse {
                requested: piece_indices.len(),
                returned: rows.len(),
            };
            // 按设计不重试：缺失的片段保持原文，标记不回滚
            tracing::warn!("{}", err);
        }

        let mut fallbacks = Vec::new();
        for (slot, row) in rows.into_iter().enumerate() {
            let Some(&piece_index) = piece_indices.get(slot) else {
                break;
            };
            let Some(piece) = self.pieces.get(piece_index) else {
                continue;
            };
            let nodes: Vec<Handle> = piece.nodes.clone();

            for (j, node) in nodes.iter().enumerate() {
                let Some(translated) = row.get(j) else {
                    tracing::debug!("片段 {} 第 {} 个节点无结果，跳过", piece_index, j);
                    continue;
                };
                match codec::decode(translated, &self.config.dictionary, &self.map) {
                    Ok(text) => self.substitute_node(node, &text),
                    Err(TranslationError::ProtocolViolation { index }) => {
                        tracing::warn!("解码协议违规(索引 {})，节点降级为无保护重译", index);
                        self.stats.protocol_fallbacks += 1;
                        fallbacks.push(FallbackRequest {
                            node: node.clone(),
                            original: text_content(node).unwrap_or_default(),
                        });
                    }
                    Err(err) => {
                        tracing::warn!("解码失败，节点保持原文: {}", err);
                    }
                }
            }
        }

        if full_pass {
            self.state = PageState::Translated;
            self.scheduler_enabled = true;
            self.stats.full_passes += 1;
            tracing::info!("页面进入已翻译状态 (epoch {})", self.epoch);
        }

        fallbacks
    }

    /// 应用一次无保护回退重译的结果
    pub fn apply_fallback(&mut self, batch_epoch: u64, node: &Handle, translated: &str) {
        if batch_epoch != self.epoch {
            self.stats.stale_discards += 1;
            return;
        }
        self.substitute_node(node, translated);
    }

    /// 应用属性批次结果（epoch 过期则整体丢弃）
    pub fn apply_attr_rows(
        &mut self,
        batch_epoch: u64,
        attr_indices: &[usize],
        rows: Vec<String>,
    ) {
        if batch_epoch != self.epoch {
            self.stats.stale_discards += 1;
            tracing::debug!("丢弃过期属性结果 (epoch {} != {})", batch_epoch, self.epoch);
            return;
        }

        for (slot, translated) in rows.into_iter().enumerate() {
            let Some(&attr_index) = attr_indices.get(slot) else {
                break;
            };
            let Some(entry) = self.attributes.get(attr_index) else {
                continue;
            };
            set_node_attr(&entry.node, &entry.attr_name, Some(&translated));
            self.stats.attributes_translated += 1;
        }
    }

    /// 页面标题请求：标题文本节点与其原文
    pub fn title_request(&self) -> Option<(Handle, String)> {
        let title = find_first_element(&self.document, "title")?;
        let text_node = children(&title)
            .into_iter()
            .find(|c| node_kind(c) == NodeKind::Text)?;
        let original = text_content(&text_node)?;
        if original.trim().is_empty() {
            return None;
        }
        Some((text_node, original))
    }

    /// 应用标题翻译结果
    pub fn apply_title(
        &mut self,
        batch_epoch: u64,
        node: &Handle,
        original: String,
        translated: &str,
    ) {
        if batch_epoch != self.epoch {
            self.stats.stale_discards += 1;
            return;
        }
        set_text_content(node, translated);
        self.title = Some((node.clone(), original));
    }

    /// 还原页面到原文状态
    ///
    /// 推进 epoch（使所有在途请求的回调失效）、关闭调度器、
    /// 逐项换回还原快照、回写属性与标题，并清空全部流程内状态。
    pub fn restore_page(&mut self) {
        self.epoch += 1;
        tracing::info!("还原页面 (epoch {})", self.epoch);
        self.restore_in_place();
    }

    /// 销毁引擎：宿主随后应关闭调度器并丢弃句柄
    pub fn dispose(&mut self) {
        self.epoch += 1;
        self.scheduler_enabled = false;
        self.disposed = true;
        tracing::info!("引擎已销毁");
    }

    /// 变更合并：为未覆盖的新增子树追加片段，放弃已移除的内容
    pub fn consolidate_changes(&mut self, batch: &ChangeBatch) {
        if self.disposed || self.state != PageState::Translated {
            return;
        }

        let mut removed_keys = HashSet::new();
        for node in &batch.removed {
            collect_text_node_keys(node, &mut removed_keys);
        }
        if !removed_keys.is_empty() {
            // 已移除节点不再参与任何后续批次
            self.pieces
                .retain(|p| p.is_translated || !p.references(&removed_keys));
        }

        let mut covered = HashSet::new();
        for piece in &self.pieces {
            for node in &piece.nodes {
                covered.insert(node_key(node));
            }
        }

        let mut appended_pieces = 0;
        let mut appended_attrs = 0;
        for added in &batch.added {
            let mut subtree_keys = HashSet::new();
            collect_text_node_keys(added, &mut subtree_keys);
            if subtree_keys.is_empty() {
                continue;
            }
            if !subtree_keys.is_disjoint(&covered) || !subtree_keys.is_disjoint(&removed_keys) {
                continue;
            }

            let (new_pieces, new_attrs) = segment(added, self.config.piece_size_limit);
            for piece in &new_pieces {
                for node in &piece.nodes {
                    covered.insert(node_key(node));
                }
            }
            appended_pieces += new_pieces.len();
            appended_attrs += new_attrs.len();
            self.pieces.extend(new_pieces);
            self.attributes.extend(new_attrs);
        }

        if appended_pieces > 0 || appended_attrs > 0 {
            self.stats.pieces_appended += appended_pieces;
            tracing::debug!(
                "变更合并: 追加 {} 个片段, {} 个属性",
                appended_pieces,
                appended_attrs
            );
        }
    }

    /// 用替换包裹元素原位替换文本节点，并登记还原快照
    fn substitute_node(&mut self, node: &Handle, text: &str) {
        let Some(parent) = get_parent_node(node) else {
            // 节点已脱离文档（竞争的 DOM 变更），放弃替换
            return;
        };

        let wrapper = match self.config.dual_display.inline_style() {
            Some(style) => new_element(
                "font",
                &[("class", constants::WRAPPER_CLASS), ("style", style)],
            ),
            None => new_element("font", &[("class", constants::WRAPPER_CLASS)]),
        };
        append_child(&wrapper, &new_text_node(text));

        if replace_node(&parent, node, &wrapper) {
            self.restore.push(RestoreEntry {
                parent,
                wrapper,
                original: node.clone(),
            });
            self.stats.nodes_substituted += 1;
        }
    }

    /// 还原 DOM 并清空一次翻译流程的全部状态
    fn restore_in_place(&mut self) {
        // 逆序换回，嵌套替换时先还原后做的
        for entry in self.restore.drain(..).rev() {
            replace_node(&entry.parent, &entry.wrapper, &entry.original);
        }
        for attr in &self.attributes {
            if attr.is_translated {
                set_node_attr(&attr.node, &attr.attr_name, Some(&attr.original));
            }
        }
        if let Some((node, original)) = self.title.take() {
            set_text_content(&node, &original);
        }

        self.pieces.clear();
        self.attributes.clear();
        self.map.reset();
        self.scheduler_enabled = false;
        self.state = PageState::Original;
    }
}

/// 对选中片段的节点文本逐一编码
fn encode_piece_sources(
    pieces: &[Piece],
    indices: &[usize],
    dictionary: &[DictionaryEntry],
    map: &mut CompressionMap,
) -> Vec<Vec<String>> {
    indices
        .iter()
        .map(|&i| {
            pieces[i]
                .node_texts()
                .iter()
                .map(|text| codec::encode(text, dictionary, map))
                .collect()
        })
        .collect()
}

/// 收集子树内所有非空文本节点的身份键
fn collect_text_node_keys(node: &Handle, keys: &mut HashSet<usize>) {
    if node_kind(node) == NodeKind::Text {
        if let Some(text) = text_content(node) {
            if !text.trim().is_empty() {
                keys.insert(node_key(node));
            }
        }
    }
    for child in node.children.borrow().iter() {
        collect_text_node_keys(child, keys);
    }
}

// ============================================================================
// 异步驱动：只在 RPC 边界挂起，挂起前释放引擎借用
// ============================================================================

/// 全量翻译页面
///
/// 已处于已翻译状态时先执行还原逻辑再重建。整页批量请求失败会向
/// 调用方传播（页面保持原文）；属性与标题批次的失败只记日志。
pub async fn translate_page(
    engine: &SharedEngine,
    target_lang: Option<&str>,
) -> TranslationResult<()> {
    let (piece_batch, attr_batch) = engine.borrow_mut().begin_full_pass(target_lang)?;
    let provider = engine.borrow().provider();

    let rows = provider
        .translate_batch(&piece_batch.target_lang, piece_batch.sources.clone())
        .await;

    let fallbacks = {
        let mut e = engine.borrow_mut();
        if e.epoch() != piece_batch.epoch {
            tracing::debug!("整页结果已过期，丢弃");
            e.stats.stale_discards += 1;
            return Ok(());
        }
        match rows {
            Ok(rows) => e.apply_piece_rows(piece_batch.epoch, &piece_batch.piece_indices, rows, true),
            Err(err) => {
                tracing::warn!("整页批量翻译失败: {}", err);
                return Err(err);
            }
        }
    };
    resolve_fallbacks(engine, &piece_batch.target_lang, fallbacks, piece_batch.epoch).await;

    // 属性批次独立派发、独立应用
    if !attr_batch.attr_indices.is_empty() {
        match provider
            .translate_list(&attr_batch.target_lang, attr_batch.sources.clone())
            .await
        {
            Ok(rows) => {
                engine
                    .borrow_mut()
                    .apply_attr_rows(attr_batch.epoch, &attr_batch.attr_indices, rows)
            }
            Err(err) => tracing::warn!("属性批次翻译失败: {}", err),
        }
    }

    // 页面标题走单文本接口
    let title = engine.borrow().title_request();
    if let Some((node, original)) = title {
        match provider
            .translate_text(&piece_batch.target_lang, original.clone())
            .await
        {
            Ok(translated) => {
                engine
                    .borrow_mut()
                    .apply_title(piece_batch.epoch, &node, original, &translated)
            }
            Err(err) => tracing::warn!("标题翻译失败: {}", err),
        }
    }

    Ok(())
}

/// 切换翻译服务；已翻译状态下触发一次全量重译
pub async fn swap_provider(
    engine: &SharedEngine,
    provider: Rc<dyn TranslationProvider>,
) -> TranslationResult<()> {
    let was_translated = {
        let mut e = engine.borrow_mut();
        let translated = e.state() == PageState::Translated;
        e.set_provider(provider);
        translated
    };
    if was_translated {
        translate_page(engine, None).await
    } else {
        Ok(())
    }
}

/// 执行一次可见性增量批次（调度器的 600ms tick 调用）
///
/// 请求失败或行数不足的片段不会安排重试：乐观标记已经生效，它们
/// 被永久排除在后续批次之外。这是沿袭的既定行为。
pub async fn run_visible_pass(
    engine: &SharedEngine,
    viewport: &dyn Viewport,
) -> TranslationResult<()> {
    let Some((piece_batch, attr_batch)) = engine.borrow_mut().begin_visible_pass(viewport) else {
        return Ok(());
    };
    let provider = engine.borrow().provider();

    if !piece_batch.piece_indices.is_empty() {
        match provider
            .translate_batch(&piece_batch.target_lang, piece_batch.sources.clone())
            .await
        {
            Ok(rows) => {
                let fallbacks = engine.borrow_mut().apply_piece_rows(
                    piece_batch.epoch,
                    &piece_batch.piece_indices,
                    rows,
                    false,
                );
                resolve_fallbacks(engine, &piece_batch.target_lang, fallbacks, piece_batch.epoch)
                    .await;
            }
            Err(err) => tracing::warn!("可见性批次翻译失败，相关片段不再重试: {}", err),
        }
    }

    if !attr_batch.attr_indices.is_empty() {
        match provider
            .translate_list(&attr_batch.target_lang, attr_batch.sources.clone())
            .await
        {
            Ok(rows) => {
                engine
                    .borrow_mut()
                    .apply_attr_rows(attr_batch.epoch, &attr_batch.attr_indices, rows)
            }
            Err(err) => tracing::warn!("可见性属性批次翻译失败: {}", err),
        }
    }

    Ok(())
}

/// 逐个执行无保护回退重译
async fn resolve_fallbacks(
    engine: &SharedEngine,
    target_lang: &str,
    fallbacks: Vec<FallbackRequest>,
    epoch: u64,
) {
    if fallbacks.is_empty() {
        return;
    }
    let provider = engine.borrow().provider();
    for fallback in fallbacks {
        if engine.borrow().epoch() != epoch {
            return;
        }
        match provider
            .translate_text(target_lang, fallback.original.clone())
            .await
        {
            Ok(translated) => {
                engine
                    .borrow_mut()
                    .apply_fallback(epoch, &fallback.node, &translated)
            }
            Err(err) => tracing::warn!("无保护回退重译失败，节点保持原文: {}", err),
        }
    }
}
