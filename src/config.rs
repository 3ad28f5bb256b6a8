//! 翻译配置管理
//!
//! 引擎的所有只读输入都集中在 [`TranslationConfig`]：用户词典、目标语言、
//! 双语显示样式、站点/语言的黑白名单，以及调度器的各项时间参数。
//! 配置来自宿主（浏览器扩展的存储层），这里只负责解析和查询，不负责持久化。

use serde::{Deserialize, Serialize};

use crate::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    /// 单个翻译片段的最大字符数，超过后强制切分
    pub const PIECE_SIZE_LIMIT: usize = 1000;

    /// 变更合并轮询间隔（毫秒）
    pub const MUTATION_INTERVAL_MS: u64 = 2000;

    /// 可见性批次轮询间隔（毫秒）
    pub const VISIBILITY_INTERVAL_MS: u64 = 600;

    /// 视口相交判定的缓冲区（像素）
    pub const VIEWPORT_BUFFER_PX: f64 = 300.0;

    /// RPC 请求默认超时（毫秒）
    pub const RPC_TIMEOUT_MS: u64 = 10_000;

    /// 参与翻译的属性名
    pub const TRANSLATABLE_ATTRS: &[&str] = &["placeholder", "alt", "title"];

    /// `value` 属性仅在这些 input 类型上参与翻译
    pub const VALUE_INPUT_TYPES: &[&str] = &["button", "submit", "reset"];

    /// 译文替换包裹元素携带的 class
    pub const WRAPPER_CLASS: &str = "pagetrans-target";
}

/// 词典条目：关键词 -> 替换文本
///
/// 替换文本为空字符串时表示"保护但不替换"，解码时回填原文。
/// 条目顺序有意义（来自用户配置），编码时引擎会按键长降序重排。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub keyword: String,
    #[serde(default)]
    pub replacement: String,
}

/// 双语显示样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualDisplayStyle {
    /// 直接替换原文，无额外视觉标记
    #[default]
    Replace,
    /// 译文下划线
    Underline,
    /// 译文高亮背景
    Highlight,
    /// 译文模糊，悬停显示
    Blur,
}

impl DualDisplayStyle {
    /// 包裹元素的内联样式；`Replace` 不产生样式
    pub fn inline_style(&self) -> Option<&'static str> {
        match self {
            DualDisplayStyle::Replace => None,
            DualDisplayStyle::Underline => Some("border-bottom: 1px dashed #72ece9;"),
            DualDisplayStyle::Highlight => Some("background: rgba(255, 235, 59, 0.35);"),
            DualDisplayStyle::Blur => Some("filter: blur(3px); transition: filter 0.2s;"),
        }
    }
}

/// 翻译配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// 目标语言代码（如 "zh-CN", "en", "ja"）
    pub target_language: String,
    /// 用户词典，受保护的术语
    pub dictionary: Vec<DictionaryEntry>,
    /// 双语显示样式
    pub dual_display: DualDisplayStyle,
    /// 永不翻译的站点（域名匹配）
    pub never_translate_sites: Vec<String>,
    /// 总是翻译的站点
    pub always_translate_sites: Vec<String>,
    /// 永不翻译的语言
    pub never_translate_langs: Vec<String>,
    /// 总是翻译的语言
    pub always_translate_langs: Vec<String>,
    /// 片段强制切分阈值（字符数）
    pub piece_size_limit: usize,
    /// 变更合并间隔（毫秒）
    pub mutation_interval_ms: u64,
    /// 可见性批次间隔（毫秒）
    pub visibility_interval_ms: u64,
    /// 视口缓冲区（像素）
    pub viewport_buffer_px: f64,
    /// RPC 超时（毫秒）
    pub rpc_timeout_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: "zh-CN".to_string(),
            dictionary: Vec::new(),
            dual_display: DualDisplayStyle::default(),
            never_translate_sites: Vec::new(),
            always_translate_sites: Vec::new(),
            never_translate_langs: Vec::new(),
            always_translate_langs: Vec::new(),
            piece_size_limit: constants::PIECE_SIZE_LIMIT,
            mutation_interval_ms: constants::MUTATION_INTERVAL_MS,
            visibility_interval_ms: constants::VISIBILITY_INTERVAL_MS,
            viewport_buffer_px: constants::VIEWPORT_BUFFER_PX,
            rpc_timeout_ms: constants::RPC_TIMEOUT_MS,
        }
    }
}

impl TranslationConfig {
    /// 使用目标语言创建默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_language: target_lang.to_string(),
            ..Default::default()
        }
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> TranslationResult<Self> {
        let config: TranslationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从配置文件加载
    pub fn load_from_file(path: &std::path::Path) -> TranslationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取配置文件失败 {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 校验配置合法性
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_language.is_empty() {
            return Err(TranslationError::ConfigError(
                "目标语言不能为空".to_string(),
            ));
        }
        if self.piece_size_limit == 0 {
            return Err(TranslationError::ConfigError(
                "片段切分阈值必须大于 0".to_string(),
            ));
        }
        for entry in &self.dictionary {
            if entry.keyword.trim().is_empty() {
                return Err(TranslationError::ConfigError(
                    "词典关键词不能为空".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 判断站点是否应该翻译
    ///
    /// 黑名单优先于白名单；都未命中时返回 `None`，由宿主根据
    /// 页面语言等其他信号决定。
    pub fn should_translate_site(&self, host: &str) -> Option<bool> {
        if self.never_translate_sites.iter().any(|s| host_matches(host, s)) {
            return Some(false);
        }
        if self.always_translate_sites.iter().any(|s| host_matches(host, s)) {
            return Some(true);
        }
        None
    }

    /// 判断检测到的页面语言是否应该翻译
    pub fn should_translate_lang(&self, lang: &str) -> Option<bool> {
        let lang = lang.to_ascii_lowercase();
        // 目标语言本身永远不需要翻译
        if lang_matches(&lang, &self.target_language) {
            return Some(false);
        }
        if self
            .never_translate_langs
            .iter()
            .any(|l| lang_matches(&lang, l))
        {
            return Some(false);
        }
        if self
            .always_translate_langs
            .iter()
            .any(|l| lang_matches(&lang, l))
        {
            return Some(true);
        }
        None
    }
}

/// 域名匹配：完全相等或作为父域后缀
fn host_matches(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    host == pattern || host.ends_with(&format!(".{}", pattern))
}

/// 语言代码匹配：不区分大小写，"zh" 匹配 "zh-CN"
fn lang_matches(lang: &str, pattern: &str) -> bool {
    let lang = lang.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    lang == pattern
        || lang.starts_with(&format!("{}-", pattern))
        || pattern.starts_with(&format!("{}-", lang))
}
