//! 文档分段器
//!
//! 深度优先遍历内容树，把文本节点切成有序的翻译片段（Piece），
//! 并独立收集可翻译属性。分段规则：
//!
//! - 行内文本元素不打断片段，块级元素在前后都关闭片段；
//! - `pre`/`code` 类元素关闭当前片段且内容不参与翻译；
//! - `script`/`style`/`title` 类子树整体跳过；
//! - 标注 `translate="no"`、class 含 `notranslate` 或可编辑的子树
//!   强制关闭并跳过；
//! - `<option>` 的文本归属于外层 `<select>`/`<datalist>`；
//! - 累计文本超过阈值的片段在该点强制切分（必要时切分文本节点），
//!   所有片段文本按序拼接与原文一致。

use std::collections::HashSet;

use markup5ever_rcdom::Handle;

use crate::config::constants;
use crate::dom::tree::{
    children, get_node_attr, get_node_name, get_parent_node, node_key, node_kind,
    split_text_node, text_content, NodeKind,
};

/// 标签分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    /// 行内文本元素，保持当前片段打开
    InlineText,
    /// 行内忽略元素（代码类），关闭片段且内容不翻译
    InlineIgnore,
    /// 整体跳过的子树
    NoTranslate,
    /// 块级（默认），前后关闭片段
    Block,
}

const INLINE_TEXT_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "bdi", "bdo", "big", "cite", "del", "dfn", "em", "font", "i",
    "ins", "label", "mark", "q", "ruby", "rt", "s", "small", "span", "strike", "strong", "sub",
    "sup", "time", "tt", "u", "var", "wbr",
];

const INLINE_IGNORE_TAGS: &[&str] = &["code", "kbd", "pre", "samp", "xmp"];

const NO_TRANSLATE_TAGS: &[&str] = &[
    "script", "style", "title", "noscript", "template", "svg", "math", "textarea", "iframe",
    "object", "embed", "canvas", "audio", "video",
];

/// 按标签名分类
pub fn classify_tag(tag_name: &str) -> TagCategory {
    let tag = tag_name.to_ascii_lowercase();
    if INLINE_TEXT_TAGS.contains(&tag.as_str()) {
        TagCategory::InlineText
    } else if INLINE_IGNORE_TAGS.contains(&tag.as_str()) {
        TagCategory::InlineIgnore
    } else if NO_TRANSLATE_TAGS.contains(&tag.as_str()) {
        TagCategory::NoTranslate
    } else {
        TagCategory::Block
    }
}

/// 翻译片段：一段被块级结构界定的文本节点序列
#[derive(Debug, Clone)]
pub struct Piece {
    /// 片段归属的父元素
    pub parent: Handle,
    /// 片段起始处的上下文元素（视口判定用）
    pub top: Handle,
    /// 片段结束处的上下文元素
    pub bottom: Handle,
    /// 有序的文本节点
    pub nodes: Vec<Handle>,
    /// 是否已提交翻译
    pub is_translated: bool,
}

impl Piece {
    /// 片段全文（按节点顺序拼接）
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(text_content)
            .collect::<Vec<_>>()
            .concat()
    }

    /// 每个节点的文本
    pub fn node_texts(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|n| text_content(n).unwrap_or_default())
            .collect()
    }

    /// 是否引用给定身份键的节点
    pub fn references(&self, keys: &HashSet<usize>) -> bool {
        self.nodes.iter().any(|n| keys.contains(&node_key(n)))
    }
}

/// 可翻译属性条目
#[derive(Debug, Clone)]
pub struct AttributeEntry {
    pub node: Handle,
    pub attr_name: String,
    pub original: String,
    pub is_translated: bool,
}

/// 对子树分段，返回有序片段与属性条目
pub fn segment(root: &Handle, piece_size_limit: usize) -> (Vec<Piece>, Vec<AttributeEntry>) {
    let mut segmenter = Segmenter::new(piece_size_limit);
    segmenter.walk(root, root);
    segmenter.close();

    let mut attributes = Vec::new();
    collect_attributes(root, &mut attributes);

    (segmenter.pieces, attributes)
}

/// 节点是否携带"不要翻译"标记或处于可编辑状态
pub fn is_no_translate_element(node: &Handle) -> bool {
    if let Some(translate) = get_node_attr(node, "translate") {
        if translate.eq_ignore_ascii_case("no") {
            return true;
        }
    }
    if let Some(class) = get_node_attr(node, "class") {
        if class.split_ascii_whitespace().any(|c| c == "notranslate") {
            return true;
        }
    }
    if let Some(editable) = get_node_attr(node, "contenteditable") {
        if !editable.eq_ignore_ascii_case("false") {
            return true;
        }
    }
    false
}

struct OpenPiece {
    parent: Handle,
    top: Handle,
    bottom: Handle,
    nodes: Vec<Handle>,
    char_count: usize,
}

struct Segmenter {
    limit: usize,
    pieces: Vec<Piece>,
    open: Option<OpenPiece>,
}

impl Segmenter {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            pieces: Vec::new(),
            open: None,
        }
    }

    fn walk(&mut self, node: &Handle, context: &Handle) {
        match node_kind(node) {
            NodeKind::Text => self.append_text(node.clone(), context),
            NodeKind::Element => {
                if is_no_translate_element(node) {
                    self.close();
                    return;
                }
                let tag = get_node_name(node).unwrap_or_default().to_string();
                match classify_tag(&tag) {
                    TagCategory::NoTranslate => {}
                    TagCategory::InlineText => {
                        // 先快照子列表：强制切分会往兄弟列表里插入尾节点
                        for child in children(node) {
                            self.walk(&child, node);
                        }
                    }
                    TagCategory::InlineIgnore => {
                        // 关闭片段，内容排除；后续文本另起新片段
                        self.close();
                    }
                    TagCategory::Block => {
                        self.close();
                        for child in children(node) {
                            self.walk(&child, node);
                        }
                        self.close();
                    }
                }
            }
            NodeKind::Container | NodeKind::Other => {
                for child in children(node) {
                    self.walk(&child, context);
                }
            }
        }
    }

    /// 把文本节点收进当前片段，超限时在该点强制切分
    fn append_text(&mut self, node: Handle, context: &Handle) {
        let Some(content) = text_content(&node) else {
            return;
        };
        if content.trim().is_empty() {
            return;
        }

        let parent = piece_parent(context);
        let mut node = node;
        loop {
            let filled = self.open.as_ref().map_or(0, |p| p.char_count);
            let chars = text_content(&node).map_or(0, |t| t.chars().count());

            if filled + chars <= self.limit {
                self.push_node(node, context, &parent, chars);
                return;
            }

            let split_at = self.limit - filled;
            if split_at == 0 {
                // 当前片段已满，续段的顶端锚定在切分点所在元素
                self.close();
                continue;
            }

            match split_text_node(&node, split_at) {
                Some(tail) => {
                    self.push_node(node, context, &parent, split_at);
                    self.close();
                    node = tail;
                }
                None => {
                    // 切分点落在节点边界之外，整个收下
                    self.push_node(node, context, &parent, chars);
                    return;
                }
            }
        }
    }

    fn push_node(&mut self, node: Handle, context: &Handle, parent: &Handle, chars: usize) {
        let open = self.open.get_or_insert_with(|| OpenPiece {
            parent: parent.clone(),
            top: context.clone(),
            bottom: context.clone(),
            nodes: Vec::new(),
            char_count: 0,
        });
        open.nodes.push(node);
        open.bottom = context.clone();
        open.char_count += chars;
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            if !open.nodes.is_empty() {
                self.pieces.push(Piece {
                    parent: open.parent,
                    top: open.top,
                    bottom: open.bottom,
                    nodes: open.nodes,
                    is_translated: false,
                });
            }
        }
    }
}

/// `<option>` 文本归属于外层的选择控件
fn piece_parent(context: &Handle) -> Handle {
    let tag = get_node_name(context).unwrap_or_default();
    if tag != "option" && tag != "optgroup" {
        return context.clone();
    }

    let mut current = context.clone();
    while let Some(parent) = get_parent_node(&current) {
        if matches!(get_node_name(&parent), Some("select") | Some("datalist")) {
            return parent;
        }
        if matches!(get_node_name(&parent), Some("option") | Some("optgroup")) {
            current = parent;
            continue;
        }
        break;
    }
    context.clone()
}

/// 属性收集：独立的第二次遍历
fn collect_attributes(node: &Handle, out: &mut Vec<AttributeEntry>) {
    if node_kind(node) == NodeKind::Element {
        if is_no_translate_element(node) {
            return;
        }
        let tag = get_node_name(node).unwrap_or_default().to_string();
        if classify_tag(&tag) == TagCategory::NoTranslate {
            return;
        }

        for attr_name in constants::TRANSLATABLE_ATTRS {
            if let Some(value) = get_node_attr(node, attr_name) {
                if !value.trim().is_empty() {
                    out.push(AttributeEntry {
                        node: node.clone(),
                        attr_name: attr_name.to_string(),
                        original: value,
                        is_translated: false,
                    });
                }
            }
        }

        // value 仅对按钮类 input 有意义
        if tag == "input" {
            let input_type = get_node_attr(node, "type").unwrap_or_default();
            if constants::VALUE_INPUT_TYPES.contains(&input_type.to_ascii_lowercase().as_str()) {
                if let Some(value) = get_node_attr(node, "value") {
                    if !value.trim().is_empty() {
                        out.push(AttributeEntry {
                            node: node.clone(),
                            attr_name: "value".to_string(),
                            original: value,
                            is_translated: false,
                        });
                    }
                }
            }
        }
    }

    for child in node.children.borrow().iter() {
        collect_attributes(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::tree::html_to_dom;
    use markup5ever_rcdom::{NodeData, RcDom};

    fn parse(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8")
    }

    fn all_text_nodes(node: &Handle, out: &mut Vec<Handle>) {
        if let NodeData::Text { ref contents } = node.data {
            if !contents.borrow().trim().is_empty() {
                out.push(node.clone());
            }
        }
        for child in node.children.borrow().iter() {
            all_text_nodes(child, out);
        }
    }

    #[test]
    fn test_inline_elements_share_one_piece() {
        let dom = parse("<p>Hello <b>brave</b> new <i>world</i></p>");
        let (pieces, _) = segment(&dom.document, 1000);

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].nodes.len(), 4);
        assert_eq!(pieces[0].text(), "Hello brave new world");
    }

    #[test]
    fn test_block_elements_split_pieces() {
        let dom = parse("<div><p>first</p><p>second</p></div>");
        let (pieces, _) = segment(&dom.document, 1000);

        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].text(), "first");
        assert_eq!(pieces[1].text(), "second");
    }

    #[test]
    fn test_coverage_every_text_node_exactly_once() {
        // 性质：所有非空文本节点恰好出现在一个片段中，且按文档顺序
        let dom = parse(
            "<div><h1>Title</h1><p>Some <a href=\"#\">link</a> text</p>\
             <ul><li>one</li><li>two</li></ul></div>",
        );
        let (pieces, _) = segment(&dom.document, 1000);

        let mut expected = Vec::new();
        all_text_nodes(&dom.document, &mut expected);

        let collected: Vec<usize> = pieces
            .iter()
            .flat_map(|p| p.nodes.iter().map(node_key))
            .collect();
        let unique: HashSet<usize> = collected.iter().copied().collect();

        assert_eq!(collected.len(), unique.len(), "节点不得重复");
        assert_eq!(
            unique,
            expected.iter().map(node_key).collect::<HashSet<_>>(),
            "覆盖必须完整"
        );

        // 文档顺序
        let expected_order: Vec<usize> = expected.iter().map(node_key).collect();
        assert_eq!(collected, expected_order);
    }

    #[test]
    fn test_code_contents_excluded() {
        let dom = parse("<p>run <code>cargo build</code> first</p>");
        let (pieces, _) = segment(&dom.document, 1000);

        let all: String = pieces.iter().map(|p| p.text()).collect();
        assert!(all.contains("run"));
        assert!(all.contains("first"));
        assert!(!all.contains("cargo build"));
        // code 前后是两个片段
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn test_script_and_style_skipped() {
        let dom = parse(
            "<div><script>var x = 1;</script><style>p{color:red}</style><p>visible</p></div>",
        );
        let (pieces, _) = segment(&dom.document, 1000);

        let all: String = pieces.iter().map(|p| p.text()).collect();
        assert_eq!(all.trim(), "visible");
    }

    #[test]
    fn test_notranslate_subtree_skipped() {
        let dom = parse(
            r#"<div><p translate="no">keep this</p><p class="notranslate">and this</p>
               <p contenteditable>editor text</p><p>translate me</p></div>"#,
        );
        let (pieces, _) = segment(&dom.document, 1000);

        let all: String = pieces.iter().map(|p| p.text()).collect();
        assert!(!all.contains("keep this"));
        assert!(!all.contains("and this"));
        assert!(!all.contains("editor text"));
        assert!(all.contains("translate me"));
    }

    #[test]
    fn test_option_text_attributed_to_select() {
        let dom = parse("<select><option>Red</option><option>Blue</option></select>");
        let (pieces, _) = segment(&dom.document, 1000);

        assert!(!pieces.is_empty());
        for piece in &pieces {
            assert_eq!(get_node_name(&piece.parent), Some("select"));
        }
    }

    #[test]
    fn test_oversized_run_force_split() {
        // 性质：超过 1000 字符的文本被切成 ≥2 个片段，拼接后等于原文
        let long_text = "word ".repeat(300); // 1500 字符
        let html = format!("<p>{}</p>", long_text.trim_end());
        let dom = parse(&html);
        let (pieces, _) = segment(&dom.document, 1000);

        assert!(pieces.len() >= 2, "应切成多个片段, 实际 {}", pieces.len());

        let concatenated: String = pieces.iter().map(|p| p.text()).collect();
        assert_eq!(concatenated, long_text.trim_end());

        for piece in &pieces {
            assert!(piece.text().chars().count() <= 1000);
        }
    }

    #[test]
    fn test_attribute_collection() {
        let dom = parse(
            r#"<div><input placeholder="Your name" type="text">
               <input type="submit" value="Send">
               <img alt="A cat" title="Fluffy">
               <p translate="no"><img alt="hidden"></p></div>"#,
        );
        let (_, attributes) = segment(&dom.document, 1000);

        let found: Vec<(String, String)> = attributes
            .iter()
            .map(|a| (a.attr_name.clone(), a.original.clone()))
            .collect();

        assert!(found.contains(&("placeholder".into(), "Your name".into())));
        assert!(found.contains(&("value".into(), "Send".into())));
        assert!(found.contains(&("alt".into(), "A cat".into())));
        assert!(found.contains(&("title".into(), "Fluffy".into())));
        assert!(!found.iter().any(|(_, v)| v == "hidden"));
        // 文本输入框的 value 不收集
        assert!(!found.iter().any(|(n, v)| n == "value" && v == "Your name"));
    }

    #[test]
    fn test_whitespace_only_nodes_ignored() {
        let dom = parse("<div>\n  <p>text</p>\n  </div>");
        let (pieces, _) = segment(&dom.document, 1000);

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].text(), "text");
    }
}
