//! 注入页面的脚本
//!
//! 所有脚本都是表达式，返回值可以直接 JSON 序列化。
//! 带参数的脚本通过 `serde_json` 拼接参数，避免手写转义。

use std::time::Duration;

use serde_json::json;

use crate::services::layout::{Dimensions, SLIDE_SELECTOR};

/// 长文档切分时给边界元素打的属性
pub const INDEX_ATTRIBUTE: &str = "data-slideforge-index";

/// 候选子元素：从 body 开始，穿透只有一个可见子元素的包裹层
const CANDIDATES_FN: &str = r#"
const __slideforgeCandidates = () => {
  const skip = new Set(['SCRIPT', 'STYLE', 'LINK', 'META', 'TEMPLATE', 'NOSCRIPT']);
  const visible = (el) => {
    if (skip.has(el.tagName)) return false;
    const style = getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    return el.getBoundingClientRect().height > 0;
  };
  let parent = document.body;
  if (!parent) return [];
  let children = Array.from(parent.children).filter(visible);
  while (children.length === 1 && children[0].children.length > 0) {
    parent = children[0];
    children = Array.from(parent.children).filter(visible);
  }
  return children;
};
"#;

/// 匹配的幻灯片数量
pub fn count_slides() -> String {
    format!(
        "document.querySelectorAll({}).length",
        json!(SLIDE_SELECTOR)
    )
}

/// 隐藏其他幻灯片，把第 `index` 张固定在视口左上角
pub fn isolate_slide(index: usize, size: Dimensions) -> String {
    format!(
        r#"(() => {{
  const slides = document.querySelectorAll({selector});
  const index = {index};
  if (index >= slides.length) return false;
  for (const root of [document.documentElement, document.body]) {{
    root.style.margin = '0';
    root.style.padding = '0';
    root.style.overflow = 'hidden';
  }}
  slides.forEach((slide, i) => {{
    if (i !== index) {{
      slide.style.setProperty('display', 'none', 'important');
      return;
    }}
    slide.style.setProperty('display', 'block', 'important');
    slide.style.position = 'fixed';
    slide.style.top = '0';
    slide.style.left = '0';
    slide.style.width = '{width}px';
    slide.style.height = '{height}px';
    slide.style.overflow = 'hidden';
    slide.style.zIndex = '2147483647';
  }});
  window.scrollTo(0, 0);
  return true;
}})()"#,
        selector = json!(SLIDE_SELECTOR),
        index = index,
        width = size.width,
        height = size.height,
    )
}

/// 等待资源数量在静默窗口内保持不变
pub fn wait_network_idle(max: Duration, quiet: Duration) -> String {
    let (max_ms, quiet_ms) = (max.as_millis(), quiet.as_millis());
    format!(
        r#"(async () => {{
  const deadline = Date.now() + {max_ms};
  let last = -1;
  let stableSince = Date.now();
  while (Date.now() < deadline) {{
    const count = performance.getEntriesByType('resource').length;
    if (count !== last || document.readyState !== 'complete') {{
      last = count;
      stableSince = Date.now();
    }} else if (Date.now() - stableSince >= {quiet_ms}) {{
      return true;
    }}
    await new Promise((r) => setTimeout(r, 50));
  }}
  return false;
}})()"#
    )
}

/// 等待字体加载
pub fn wait_fonts(max: Duration) -> String {
    let max_ms = max.as_millis();
    format!(
        r#"(async () => {{
  if (!document.fonts) return true;
  await Promise.race([
    document.fonts.ready,
    new Promise((r) => setTimeout(r, {max_ms})),
  ]);
  return document.fonts.status === 'loaded';
}})()"#
    )
}

/// 等待可选的 `[data-ready]` 标记
pub fn wait_ready_marker(max: Duration) -> String {
    let max_ms = max.as_millis();
    format!(
        r#"(async () => {{
  const deadline = Date.now() + {max_ms};
  while (Date.now() < deadline) {{
    if (document.querySelector('[data-ready]')) return true;
    await new Promise((r) => setTimeout(r, 50));
  }}
  return !!document.querySelector('[data-ready]');
}})()"#
    )
}

/// 测量页面内容与候选子元素
///
/// 返回 `{ contentWidth, contentHeight, pageSize, children: [...] }`，
/// `pageSize` 是样式表中最后一个 `@page` 规则的 `size` 值。
pub fn measure_page() -> String {
    format!(
        r#"(() => {{
{CANDIDATES_FN}
  const doc = document.documentElement;
  const body = document.body || doc;
  let pageSize = null;
  for (const sheet of Array.from(document.styleSheets)) {{
    let rules;
    try {{ rules = sheet.cssRules; }} catch (e) {{ continue; }}
    for (const rule of Array.from(rules || [])) {{
      if (rule.type === CSSRule.PAGE_RULE && rule.style && rule.style.size) {{
        pageSize = rule.style.size;
      }}
    }}
  }}
  const children = __slideforgeCandidates().map((el, index) => {{
    const rect = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    const pageBreak = style.breakBefore === 'page' || style.breakAfter === 'page'
      || style.pageBreakBefore === 'always' || style.pageBreakAfter === 'always';
    return {{
      index,
      width: rect.width,
      height: rect.height,
      top: rect.top + window.scrollY,
      pageBreak,
    }};
  }});
  return {{
    contentWidth: Math.max(doc.scrollWidth, body.scrollWidth),
    contentHeight: Math.max(doc.scrollHeight, body.scrollHeight),
    pageSize,
    children,
  }};
}})()"#
    )
}

/// 给第 `index` 个候选子元素打上 [`INDEX_ATTRIBUTE`]
pub fn tag_candidate(index: usize) -> String {
    format!(
        r#"(() => {{
{CANDIDATES_FN}
  const el = __slideforgeCandidates()[{index}];
  if (!el) return false;
  el.setAttribute({attr}, '{index}');
  return true;
}})()"#,
        attr = json!(INDEX_ATTRIBUTE),
    )
}

/// 打过标记的元素的选择器
pub fn tagged_selector(index: usize) -> String {
    format!("[{}=\"{}\"]", INDEX_ATTRIBUTE, index)
}

/// 滚动到纵向偏移
pub fn scroll_to(offset: u32) -> String {
    format!("(() => {{ window.scrollTo(0, {offset}); return window.scrollY; }})()")
}
