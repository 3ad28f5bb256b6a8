// 集成测试公共模块
//
// 提供 HTML 夹具、合成翻译服务和断言辅助

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use markup5ever_rcdom::Handle;
use tokio::sync::Notify;

use pagetrans::dom::tree::{
    collect_text, find_first_element, get_node_attr, html_to_dom, node_kind, NodeKind,
};
use pagetrans::{
    SharedEngine, TranslationConfig, TranslationEngine, TranslationProvider, TranslationResult,
};

// ============================================================================
// HTML 夹具
// ============================================================================

/// 带标题、标题栏、段落、属性的基础英文页面
pub fn simple_page() -> &'static str {
    r#"<html>
<head><title>Demo Page</title></head>
<body>
<h1>Hello world</h1>
<p>First paragraph text.</p>
<p>Second paragraph with <b>bold</b> tail.</p>
<input type="text" placeholder="Search here">
<img src="x.png" alt="A picture">
</body>
</html>"#
}

/// 混合了不可翻译内容的页面
pub fn mixed_page() -> &'static str {
    r#"<html>
<head><title>Mixed</title></head>
<body>
<p>Readable text before.</p>
<pre>let x = 1;</pre>
<script>console.log("skip me");</script>
<p translate="no">Brand Name</p>
<p>Readable text after.</p>
</body>
</html>"#
}

// ============================================================================
// 引擎构建
// ============================================================================

/// 从 HTML 构建共享引擎，返回引擎与文档根
pub fn engine_with(
    html: &str,
    config: TranslationConfig,
    provider: Rc<dyn TranslationProvider>,
) -> (SharedEngine, Handle) {
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let document = dom.document.clone();
    let engine = TranslationEngine::new(dom.document, config, provider).shared();
    (engine, document)
}

/// 文档 body 元素
pub fn body_of(document: &Handle) -> Handle {
    find_first_element(document, "body").expect("document should have a body")
}

/// body 的可读文本（不含 head）
pub fn page_text(document: &Handle) -> String {
    collect_text(&body_of(document))
}

/// 统计替换包裹元素数量
pub fn wrapper_count(document: &Handle) -> usize {
    fn walk(node: &Handle, count: &mut usize) {
        if node_kind(node) == NodeKind::Element
            && get_node_attr(node, "class").as_deref() == Some("pagetrans-target")
        {
            *count += 1;
        }
        for child in node.children.borrow().iter() {
            walk(child, count);
        }
    }
    let mut count = 0;
    walk(document, &mut count);
    count
}

// ============================================================================
// 合成翻译服务
// ============================================================================

/// 前缀翻译服务：给每段文本加上可辨识前缀，标记原样保留
pub struct PrefixProvider {
    pub prefix: &'static str,
}

impl PrefixProvider {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    fn mark(&self, text: String) -> String {
        format!("{}{}", self.prefix, text)
    }
}

impl TranslationProvider for PrefixProvider {
    fn id(&self) -> &str {
        "prefix"
    }

    fn translate_batch<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move {
            Ok(sources
                .into_iter()
                .map(|row| row.into_iter().map(|s| self.mark(s)).collect())
                .collect())
        })
    }

    fn translate_list<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        Box::pin(async move { Ok(sources.into_iter().map(|s| self.mark(s)).collect()) })
    }

    fn translate_text<'a>(
        &'a self,
        _target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move { Ok(self.mark(source)) })
    }
}

/// 闸门翻译服务：收到放行信号前一直挂起（测试在途取消用）
pub struct GateProvider {
    pub gate: Rc<Notify>,
    inner: PrefixProvider,
}

impl GateProvider {
    pub fn new(gate: Rc<Notify>) -> Self {
        Self {
            gate,
            inner: PrefixProvider::new("译:"),
        }
    }
}

impl TranslationProvider for GateProvider {
    fn id(&self) -> &str {
        "gated"
    }

    fn translate_batch<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move {
            self.gate.notified().await;
            self.inner.translate_batch(target_lang, sources).await
        })
    }

    fn translate_list<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        Box::pin(async move {
            self.gate.notified().await;
            self.inner.translate_list(target_lang, sources).await
        })
    }

    fn translate_text<'a>(
        &'a self,
        target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move {
            self.gate.notified().await;
            self.inner.translate_text(target_lang, source).await
        })
    }
}

/// 截短翻译服务：批次只返回第一行（测试结果不足的处理）
pub struct ShortProvider;

impl TranslationProvider for ShortProvider {
    fn id(&self) -> &str {
        "short"
    }

    fn translate_batch<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move {
            let mut rows: Vec<Vec<String>> = sources
                .into_iter()
                .map(|row| row.into_iter().map(|s| format!("短:{}", s)).collect())
                .collect();
            rows.truncate(1);
            Ok(rows)
        })
    }

    fn translate_list<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        Box::pin(async move {
            let mut rows: Vec<String> =
                sources.into_iter().map(|s| format!("短:{}", s)).collect();
            rows.truncate(1);
            Ok(rows)
        })
    }

    fn translate_text<'a>(
        &'a self,
        _target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move { Ok(format!("短:{}", source)) })
    }
}

/// 违规翻译服务：批次结果携带未知标记索引，单文本接口正常回退
pub struct ViolationProvider;

impl TranslationProvider for ViolationProvider {
    fn id(&self) -> &str {
        "violation"
    }

    fn translate_batch<'a>(
        &'a self,
        _target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        Box::pin(async move {
            Ok(sources
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|_| "坏 «#99#» 结果".to_string())
                        .collect()
                })
                .collect())
        })
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
        Box::pin(async move { Ok(format!("回退:{}", source)) })
    }
}

/// 记录翻译服务：统计各接口被调用的次数，内部委托前缀服务
pub struct RecordingProvider {
    pub batch_calls: Rc<RefCell<usize>>,
    pub list_calls: Rc<RefCell<usize>>,
    pub text_calls: Rc<RefCell<usize>>,
    inner: PrefixProvider,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            batch_calls: Rc::new(RefCell::new(0)),
            list_calls: Rc::new(RefCell::new(0)),
            text_calls: Rc::new(RefCell::new(0)),
            inner: PrefixProvider::new("译:"),
        }
    }
}

impl TranslationProvider for RecordingProvider {
    fn id(&self) -> &str {
        "recording"
    }

    fn translate_batch<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<Vec<String>>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<Vec<String>>>> {
        *self.batch_calls.borrow_mut() += 1;
        self.inner.translate_batch(target_lang, sources)
    }

    fn translate_list<'a>(
        &'a self,
        target_lang: &'a str,
        sources: Vec<String>,
    ) -> LocalBoxFuture<'a, TranslationResult<Vec<String>>> {
        *self.list_calls.borrow_mut() += 1;
        self.inner.translate_list(target_lang, sources)
    }

    fn translate_text<'a>(
        &'a self,
        target_lang: &'a str,
        source: String,
    ) -> LocalBoxFuture<'a, TranslationResult<String>> {
        *self.text_calls.borrow_mut() += 1;
        self.inner.translate_text(target_lang, source)
    }
}
