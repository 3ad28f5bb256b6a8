//! 宿主文档树适配层
//!
//! 对 `markup5ever_rcdom` 的 `Handle` 提供引擎需要的最小能力集：
//! 遍历、分类、文本读写、节点替换与切分。分段器和编排器只通过这里
//! 访问 DOM，便于用合成树做测试，不依赖真实渲染引擎。

use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 节点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// 文本节点
    Text,
    /// 元素节点
    Element,
    /// 文档根 / 片段 / shadow root
    Container,
    /// 注释、doctype、processing instruction 等
    Other,
}

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap()
}

/// 节点身份键，用于覆盖判定（基于 Rc 指针）
pub fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

/// 判定节点类别
pub fn node_kind(node: &Handle) -> NodeKind {
    match node.data {
        NodeData::Text { .. } => NodeKind::Text,
        NodeData::Element { .. } => NodeKind::Element,
        NodeData::Document => NodeKind::Container,
        _ => NodeKind::Other,
    }
}

/// 子节点快照
pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().iter().cloned().collect()
}

/// 获取元素标签名（小写）
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点（若仍挂在树上）
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 读取文本节点内容
pub fn text_content(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 覆写文本节点内容
pub fn set_text_content(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        let mut tendril = contents.borrow_mut();
        tendril.clear();
        tendril.push_slice(text);
    }
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置节点属性；`None` 表示移除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();

    if let Some(existing) = attrs.iter_mut().find(|a| &*a.name.local == attr_name) {
        match attr_value {
            Some(value) => {
                existing.value.clear();
                existing.value.push_slice(value);
            }
            None => {
                attrs.retain(|a| &*a.name.local != attr_name);
            }
        }
        return;
    }

    if let Some(value) = attr_value {
        let mut tendril = StrTendril::new();
        tendril.push_slice(value);
        attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from(attr_name)),
            value: tendril,
        });
    }
}

/// 创建文本节点
pub fn new_text_node(text: &str) -> Handle {
    let mut tendril = StrTendril::new();
    tendril.push_slice(text);
    Node::new(NodeData::Text {
        contents: RefCell::new(tendril),
    })
}

/// 创建元素节点
pub fn new_element(tag_name: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| {
            let mut tendril = StrTendril::new();
            tendril.push_slice(value);
            Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: tendril,
            }
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(), LocalName::from(tag_name)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 在父节点中用 `new` 原位替换 `old`
///
/// `old` 不在 `parent` 的子列表中时不做任何事并返回 `false`。
pub fn replace_node(parent: &Handle, old: &Handle, new: &Handle) -> bool {
    let mut siblings = parent.children.borrow_mut();
    let Some(position) = siblings.iter().position(|c| Rc::ptr_eq(c, old)) else {
        return false;
    };

    new.parent.set(Some(Rc::downgrade(parent)));
    old.parent.set(None);
    siblings[position] = new.clone();
    true
}

/// 在指定字符偏移处切分文本节点
///
/// 前半部分留在原节点中，后半部分作为新的兄弟文本节点插入原节点之后。
/// 偏移超出文本长度或节点不是文本节点时返回 `None`。
pub fn split_text_node(node: &Handle, at_chars: usize) -> Option<Handle> {
    let NodeData::Text { contents } = &node.data else {
        return None;
    };

    let text = contents.borrow().to_string();
    let byte_offset = text.char_indices().nth(at_chars).map(|(i, _)| i)?;
    if byte_offset == 0 {
        return None;
    }

    let (head, tail) = text.split_at(byte_offset);
    {
        let mut tendril = contents.borrow_mut();
        tendril.clear();
        tendril.push_slice(head);
    }

    let tail_node = new_text_node(tail);
    let parent = get_parent_node(node)?;
    let mut siblings = parent.children.borrow_mut();
    let position = siblings.iter().position(|c| Rc::ptr_eq(c, node))?;
    tail_node.parent.set(Some(Rc::downgrade(&parent)));
    siblings.insert(position + 1, tail_node.clone());

    Some(tail_node)
}

/// 深度优先查找第一个指定标签的元素
pub fn find_first_element(node: &Handle, tag_name: &str) -> Option<Handle> {
    if get_node_name(node) == Some(tag_name) {
        return Some(node.clone());
    }
    for child in node.children.borrow().iter() {
        if let Some(found) = find_first_element(child, tag_name) {
            return Some(found);
        }
    }
    None
}

/// 收集子树中所有文本节点内容，按文档顺序拼接（调试与测试用）
pub fn collect_text(node: &Handle) -> String {
    let mut out = String::new();
    collect_text_into(node, &mut out);
    out
}

fn collect_text_into(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text_into(child, out);
            }
        }
    }
}
