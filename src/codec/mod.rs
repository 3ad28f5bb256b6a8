//! 关键词编解码
//!
//! 用户词典中的术语在送往外部翻译服务之前会被编码为保护标记，
//! 防止被服务改写；译文返回后再解码回配置的替换文本。
//!
//! 协议要点：
//! - 词边界完整的匹配替换为 `«#index#»`，index 指向压缩映射中的原文；
//! - 嵌在更大 token 内部的匹配（无空格分隔的语言）逐字符包裹
//!   透明的 WORD JOINER，避免被服务与相邻文本合并；
//! - 解码对标记做模糊解析：外部服务可能在标记内部插入空白，
//!   标记协议是尽力而为的约定，不是硬契约；
//! - 解码遇到无法解析的索引即为协议违规，调用方应放弃受保护
//!   解码，对原文发起一次无保护重译。

pub mod boundary;

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::DictionaryEntry;
use crate::error::{TranslationError, TranslationResult};

pub use boundary::{is_boundary, is_boundary_char};

/// 保护标记起始串
pub const MARK_START: &str = "«#";
/// 保护标记结束串
pub const MARK_END: &str = "#»";
/// 逐字符透明标记（WORD JOINER，零宽不可断）
pub const CHAR_MARK: char = '\u{2060}';

/// 模糊标记正则：容忍服务在标记内插入的空白
fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"«\s*#\s*(\d+)\s*#\s*»").unwrap())
}

/// 压缩映射：index -> 原始匹配文本（保留原文大小写）
///
/// 生命周期为一次翻译流程；每次 `translate_page` 开始时重置。
#[derive(Debug, Default)]
pub struct CompressionMap {
    entries: HashMap<u32, String>,
    next_index: u32,
}

impl CompressionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配一个新索引指向匹配原文
    pub fn allocate(&mut self, original: String) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        self.entries.insert(index, original);
        index
    }

    /// 解析索引
    pub fn resolve(&self, index: u32) -> Option<&str> {
        self.entries.get(&index).map(|s| s.as_str())
    }

    /// 清空映射，开始新的翻译流程
    pub fn reset(&mut self) {
        self.entries.clear();
        self.next_index = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 编码：把文本中的词典术语替换为保护标记
///
/// 词典按键长降序逐一匹配；每个键都在整个不断变化的字符串上重扫，
/// 已插入的标记区间会被跳过，后续键不会命中标记内部的数字。
pub fn encode(text: &str, dictionary: &[DictionaryEntry], map: &mut CompressionMap) -> String {
    if dictionary.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let mut entries: Vec<&DictionaryEntry> = dictionary.iter().collect();
    entries.sort_by(|a, b| {
        b.keyword
            .chars()
            .count()
            .cmp(&a.keyword.chars().count())
            .then_with(|| a.keyword.cmp(&b.keyword))
    });

    let mut chars: Vec<char> = text.chars().collect();
    for entry in entries {
        chars = encode_keyword(&chars, &entry.keyword, map);
    }
    chars.into_iter().collect()
}

/// 对单个关键词在整个字符序列上做一轮编码
fn encode_keyword(chars: &[char], keyword: &str, map: &mut CompressionMap) -> Vec<char> {
    let key: Vec<char> = keyword.chars().map(fold_char).collect();
    if key.is_empty() {
        return chars.to_vec();
    }

    let spans = marker_spans(chars);
    let mut out: Vec<char> = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let match_end = i + key.len();
        let inside_marker = spans.iter().any(|&(s, e)| i < e && match_end > s);

        if !inside_marker && matches_at(chars, i, &key) {
            let before = if i == 0 { None } else { Some(chars[i - 1]) };
            let after = chars.get(match_end).copied();
            let matched: String = chars[i..match_end].iter().collect();

            if is_boundary(before) && is_boundary(after) {
                let index = map.allocate(matched);
                out.extend(format!("{}{}{}", MARK_START, index, MARK_END).chars());
            } else {
                // 嵌在大 token 内部：逐字符透明包裹，不进压缩映射
                for &c in &chars[i..match_end] {
                    out.push(CHAR_MARK);
                    out.push(c);
                    out.push(CHAR_MARK);
                }
            }
            i = match_end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

/// 解码：把译文中的保护标记替换回词典配置的文本
///
/// 无法解析的索引返回 [`TranslationError::ProtocolViolation`]，
/// 由调用方降级为无保护重译；这里不做任何恢复。
pub fn decode(
    translated: &str,
    dictionary: &[DictionaryEntry],
    map: &CompressionMap,
) -> TranslationResult<String> {
    // 透明逐字符标记直接剥掉
    let cleaned: String = translated.chars().filter(|&c| c != CHAR_MARK).collect();

    let re = marker_regex();
    let mut out = String::with_capacity(cleaned.len());
    let mut cursor = 0;
    let mut after_substitution = false;

    for caps in re.captures_iter(&cleaned) {
        let whole = caps.get(0).unwrap();
        let index: u32 = caps[1]
            .parse()
            .map_err(|_| TranslationError::ProtocolViolation { index: u32::MAX })?;

        let original = map
            .resolve(index)
            .ok_or(TranslationError::ProtocolViolation { index })?;

        push_segment(&mut out, &cleaned[cursor..whole.start()], after_substitution);
        push_substitution(&mut out, original, dictionary);

        cursor = whole.end();
        after_substitution = true;
    }

    push_segment(&mut out, &cleaned[cursor..], after_substitution);
    Ok(out)
}

/// 追加标记之间的普通文本段，并做替换后的间距归一化
fn push_segment(out: &mut String, segment: &str, after_substitution: bool) {
    if !after_substitution {
        out.push_str(segment);
        return;
    }

    // 替换文本之后：折叠服务插入的空白，仅在下一个字符不是标点时留一个空格
    let trimmed = segment.trim_start_matches(|c: char| c == ' ');
    if let Some(first) = trimmed.chars().next() {
        if !is_boundary_char(first) {
            out.push(' ');
        }
    }
    out.push_str(trimmed);
}

/// 追加一次替换文本，并做替换前的间距归一化
fn push_substitution(out: &mut String, original: &str, dictionary: &[DictionaryEntry]) {
    // 替换前：折叠尾部空格，标点后不补空格
    while out.ends_with(' ') {
        out.pop();
    }
    if let Some(last) = out.chars().last() {
        if !is_boundary_char(last) {
            out.push(' ');
        }
    }

    let replacement = dictionary
        .iter()
        .find(|entry| chars_eq_ignore_case(&entry.keyword, original))
        .map(|entry| entry.replacement.as_str())
        .filter(|r| !r.is_empty())
        .unwrap_or(original);

    out.push_str(replacement);
}

/// 当前字符序列中已插入标记的区间（字符坐标，左闭右开）
fn marker_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '«' && chars.get(i + 1) == Some(&'#') {
            if let Some(offset) = chars[i..].iter().position(|&c| c == '»') {
                spans.push((i, i + offset + 1));
                i += offset + 1;
                continue;
            }
        }
        i += 1;
    }
    spans
}

/// 大小写不敏感的字符级比较（逐字符折叠，不处理多字符映射）
fn chars_eq_ignore_case(a: &str, b: &str) -> bool {
    let mut ia = a.chars().map(fold_char);
    let mut ib = b.chars().map(fold_char);
    loop {
        match (ia.next(), ib.next()) {
            (None, None) => return true,
            (Some(ca), Some(cb)) if ca == cb => continue,
            _ => return false,
        }
    }
}

/// 检查从位置 i 开始是否命中关键词（大小写不敏感）
fn matches_at(chars: &[char], i: usize, folded_key: &[char]) -> bool {
    if i + folded_key.len() > chars.len() {
        return false;
    }
    chars[i..i + folded_key.len()]
        .iter()
        .zip(folded_key)
        .all(|(&c, &k)| fold_char(c) == k)
}

/// 单字符大小写折叠
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}
