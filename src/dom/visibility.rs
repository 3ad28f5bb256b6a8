//! 可见性适配层
//!
//! 引擎不直接依赖渲染引擎的布局信息，而是通过 [`Viewport`] 注入。
//! 测试中使用 [`FixedViewport`] 提供合成的几何数据。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use super::tree::node_key;

/// 节点在文档坐标系中的纵向范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    /// 与给定纵向区间是否相交
    pub fn intersects(&self, range_top: f64, range_bottom: f64) -> bool {
        self.top < range_bottom && self.bottom > range_top
    }
}

/// 视口能力接口
///
/// `bounding_box` 返回 `None` 表示节点未布局（脱离文档流或已移除），
/// 这类节点不参与可见性批次。
pub trait Viewport {
    fn bounding_box(&self, node: &Handle) -> Option<Rect>;
    fn viewport_height(&self) -> f64;
    fn scroll_top(&self) -> f64;
    fn is_document_visible(&self) -> bool;
}

/// 判断节点是否落在视口（含缓冲区）内
pub fn is_node_visible(viewport: &dyn Viewport, node: &Handle, buffer: f64) -> bool {
    let Some(rect) = viewport.bounding_box(node) else {
        return false;
    };
    let top = viewport.scroll_top() - buffer;
    let bottom = viewport.scroll_top() + viewport.viewport_height() + buffer;
    rect.intersects(top, bottom)
}

/// 合成视口实现（测试用）
///
/// 几何数据按节点身份键登记；未登记的节点视为不可见。
#[derive(Debug, Default)]
pub struct FixedViewport {
    pub height: f64,
    pub scroll: f64,
    pub document_visible: bool,
    boxes: HashMap<usize, Rect>,
}

impl FixedViewport {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            scroll: 0.0,
            document_visible: true,
            boxes: HashMap::new(),
        }
    }

    /// 登记节点的布局矩形
    pub fn place(&mut self, node: &Handle, top: f64, bottom: f64) {
        self.boxes.insert(node_key(node), Rect::new(top, bottom));
    }

    /// 将整棵子树登记到同一个矩形（粗粒度摆放）
    pub fn place_subtree(&mut self, node: &Handle, top: f64, bottom: f64) {
        self.place(node, top, bottom);
        for child in node.children.borrow().iter() {
            self.place_subtree(child, top, bottom);
        }
    }
}

// 共享句柄委托：单线程协作式场景下视口常与宿主共享
impl<V: Viewport> Viewport for std::rc::Rc<std::cell::RefCell<V>> {
    fn bounding_box(&self, node: &Handle) -> Option<Rect> {
        self.borrow().bounding_box(node)
    }

    fn viewport_height(&self) -> f64 {
        self.borrow().viewport_height()
    }

    fn scroll_top(&self) -> f64 {
        self.borrow().scroll_top()
    }

    fn is_document_visible(&self) -> bool {
        self.borrow().is_document_visible()
    }
}

impl Viewport for FixedViewport {
    fn bounding_box(&self, node: &Handle) -> Option<Rect> {
        self.boxes.get(&node_key(node)).copied()
    }

    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn scroll_top(&self) -> f64 {
        self.scroll
    }

    fn is_document_visible(&self) -> bool {
        self.document_visible
    }
}
