//! 文档切分集成测试
//!
//! 覆盖性保证：每个可翻译文本节点恰好归属一个片段、片段按文档序
//! 排列、超限文本在 DOM 层被切分且拼接后与原文一致。

use std::collections::HashSet;

use pagetrans::dom::tree::{collect_text, find_first_element, html_to_dom, node_key};
use pagetrans::segment::segment;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{body_of, mixed_page};

/// 结构较深的页面：行内元素延续片段，块级元素界定片段
#[test]
fn test_pieces_cover_translatable_text_exactly_once() {
    let html = r#"<html><body>
<div>
  <p>Alpha <em>beta</em> gamma.</p>
  <p>Delta.</p>
</div>
<ul><li>One</li><li>Two <b>bold</b></li></ul>
<blockquote>Quoted line.</blockquote>
</body></html>"#;
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let (pieces, _) = segment(&dom.document, 1000);

    // 每个文本节点恰好出现一次
    let mut seen = HashSet::new();
    for piece in &pieces {
        for node in &piece.nodes {
            assert!(seen.insert(node_key(node)), "node appears in two pieces");
        }
    }

    // 片段全文按文档序拼接
    let joined: Vec<String> = pieces.iter().map(|p| p.text()).collect();
    assert_eq!(
        joined,
        vec![
            "Alpha beta gamma.".to_string(),
            "Delta.".to_string(),
            "One".to_string(),
            "Two bold".to_string(),
            "Quoted line.".to_string(),
        ]
    );
}

/// 不可翻译区域完全不产生片段
#[test]
fn test_untranslatable_content_produces_no_pieces() {
    let dom = html_to_dom(mixed_page().as_bytes(), "utf-8");
    let (pieces, _) = segment(&dom.document, 1000);

    let all_text: String = pieces.iter().map(|p| p.text()).collect();
    assert!(all_text.contains("Readable text before."));
    assert!(all_text.contains("Readable text after."));
    assert!(!all_text.contains("let x = 1;"), "pre content excluded");
    assert!(!all_text.contains("skip me"), "script content excluded");
    assert!(!all_text.contains("Brand Name"), "translate=no excluded");
    assert!(!all_text.contains("Mixed"), "page title excluded");
}

/// 超限长文本：DOM 文本节点被切分，片段上限成立且无内容丢失
#[test]
fn test_oversized_text_is_split_without_loss() {
    let long_text: String = "word ".repeat(120); // 600 字符
    let html = format!("<html><body><p>{}</p></body></html>", long_text);
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let body = body_of(&dom.document);
    let original = collect_text(&body);

    let limit = 250;
    let (pieces, _) = segment(&dom.document, limit);

    assert!(pieces.len() >= 2, "long text must split into several pieces");
    for piece in &pieces {
        assert!(piece.text().chars().count() <= limit);
    }

    // 切分后的 DOM 拼接与切分前一致
    let joined: String = pieces.iter().map(|p| p.text()).collect();
    assert_eq!(joined, original);
}

/// option 文本归属到所属 select 的片段父级
#[test]
fn test_option_text_attributed_to_select() {
    let html = r#"<html><body>
<select><option>Pick one</option><option>Pick two</option></select>
</body></html>"#;
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let (pieces, _) = segment(&dom.document, 1000);

    assert!(!pieces.is_empty());
    let select = find_first_element(&dom.document, "select").unwrap();
    for piece in &pieces {
        assert_eq!(node_key(&piece.parent), node_key(&select));
    }
}

/// 可翻译属性收集：placeholder/alt/title 与按钮类 input 的 value
#[test]
fn test_attribute_collection() {
    let html = r#"<html><body>
<input type="text" placeholder="Type here" value="ignored">
<input type="submit" value="Send form">
<img src="a.png" alt="Decorative" title="Tooltip">
</body></html>"#;
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let (_, attributes) = segment(&dom.document, 1000);

    let collected: HashSet<(String, String)> = attributes
        .iter()
        .map(|a| (a.attr_name.clone(), a.original.clone()))
        .collect();

    assert!(collected.contains(&("placeholder".to_string(), "Type here".to_string())));
    assert!(collected.contains(&("value".to_string(), "Send form".to_string())));
    assert!(collected.contains(&("alt".to_string(), "Decorative".to_string())));
    assert!(collected.contains(&("title".to_string(), "Tooltip".to_string())));
    // 文本输入框的 value 是用户数据，不收集
    assert!(!collected.contains(&("value".to_string(), "ignored".to_string())));
}
