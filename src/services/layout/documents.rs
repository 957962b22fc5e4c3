//! 文档扫描
//!
//! 查找内容目录中的 HTML 文档，并读取单个文档中的幻灯片标记与样式表

use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use super::SLIDE_SELECTOR;
use crate::error::{AppError, AppResult, LayoutError};
use crate::services::archive_extractor::is_html;
use crate::utils::natural_cmp;

/// 单个样式表文件的读取上限
const MAX_STYLESHEET_BYTES: u64 = 2 * 1024 * 1024;

/// 单个文档的静态扫描结果
#[derive(Debug, Clone, Default)]
pub struct DocumentScan {
    /// 匹配 [`SLIDE_SELECTOR`] 的元素数量
    pub slide_markers: usize,
    /// 内联 `<style>` 与本地 `<link rel="stylesheet">` 的全部内容
    pub css: String,
}

/// 递归查找 HTML 文档，返回相对路径，按自然顺序排序
///
/// 跳过隐藏目录和 `node_modules`。
pub fn find_html_documents(root: &Path) -> AppResult<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e)) {
        let entry = entry.map_err(|e| AppError::Other(format!("遍历目录失败: {}", e)))?;
        if entry.file_type().is_file() && is_html(entry.path()) {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                documents.push(relative.to_path_buf());
            }
        }
    }

    documents.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(documents)
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "node_modules"
}

/// 在文档列表中找入口 `index.html`（目录层级最浅的一个）
pub fn find_index(documents: &[PathBuf]) -> Option<&PathBuf> {
    documents
        .iter()
        .filter(|d| {
            d.file_name()
                .map(|n| n.to_string_lossy().eq_ignore_ascii_case("index.html"))
                .unwrap_or(false)
        })
        .min_by_key(|d| d.components().count())
}

/// 读取并扫描一个文档
pub fn scan_document(root: &Path, relative: &Path) -> AppResult<DocumentScan> {
    let path = root.join(relative);
    let bytes = std::fs::read(&path).map_err(|e| AppError::io(&path, e))?;
    let html = String::from_utf8_lossy(&bytes);
    let base_dir = path.parent().unwrap_or(root);
    scan_html(&html, root, base_dir)
}

/// 扫描 HTML 文本；`base_dir` 用于解析样式表的相对路径
pub fn scan_html(html: &str, root: &Path, base_dir: &Path) -> AppResult<DocumentScan> {
    let document = Html::parse_document(html);

    let slide_selector = selector(SLIDE_SELECTOR)?;
    let style_selector = selector("style")?;
    let link_selector = selector("link[rel][href]")?;

    let slide_markers = document.select(&slide_selector).count();

    let mut css = String::new();
    for style in document.select(&style_selector) {
        css.extend(style.text());
        css.push('\n');
    }

    for link in document.select(&link_selector) {
        let rel = link.value().attr("rel").unwrap_or_default();
        if !rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")) {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if let Some(content) = read_local_stylesheet(root, base_dir, href) {
            css.push_str(&content);
            css.push('\n');
        }
    }

    debug!("文档扫描: {} 个幻灯片标记, 样式 {} 字节", slide_markers, css.len());
    Ok(DocumentScan { slide_markers, css })
}

fn selector(source: &str) -> AppResult<Selector> {
    Selector::parse(source).map_err(|e| {
        LayoutError::LayoutMismatch {
            detail: format!("无效的选择器 {}: {:?}", source, e),
        }
        .into()
    })
}

/// 读取内容目录内的样式表；远程地址或目录外的路径一律忽略
///
/// `href` 按 URL 规则解析（百分号解码、去掉查询和片段），`/` 开头的路径相对内容根目录。
fn read_local_stylesheet(root: &Path, base_dir: &Path, href: &str) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let resolved = match href.strip_prefix('/') {
        Some(rest) if !rest.starts_with('/') => Url::from_directory_path(&root).ok()?.join(rest),
        _ => Url::from_directory_path(base_dir.canonicalize().ok()?)
            .ok()?
            .join(href),
    }
    .ok()?;
    if resolved.scheme() != "file" {
        return None;
    }

    let path = resolved.to_file_path().ok()?.canonicalize().ok()?;
    if !path.starts_with(&root) {
        warn!("忽略内容目录之外的样式表: {}", href);
        return None;
    }

    let size = std::fs::metadata(&path).ok()?.len();
    if size > MAX_STYLESHEET_BYTES {
        warn!("样式表过大，跳过: {} ({} 字节)", href, size);
        return None;
    }

    std::fs::read(&path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_documents_natural_order_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["slide-10.html", "slide-2.html", "slide-1.html", "notes.txt"] {
            std::fs::write(dir.path().join(name), "<html></html>").unwrap();
        }
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join(".cache/ghost.html"), "<html></html>").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/readme.html"), "x").unwrap();

        let documents = find_html_documents(dir.path()).unwrap();
        assert_eq!(
            documents,
            vec![
                PathBuf::from("slide-1.html"),
                PathBuf::from("slide-2.html"),
                PathBuf::from("slide-10.html"),
            ]
        );
    }

    #[test]
    fn test_scan_counts_markers_and_collects_css() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deck.css"), ".slide { width: 1280px; height: 720px }")
            .unwrap();
        let html = r#"
            <html><head>
              <link rel="stylesheet" href="deck.css?v=2">
              <link rel="stylesheet" href="https://cdn.example.com/x.css">
              <style>@page { size: 1280px 720px }</style>
            </head><body>
              <section class="slide intro">1</section>
              <section class="slide">2</section>
              <div data-slide>3</div>
              <section class="slides-nav">nav</section>
            </body></html>
        "#;

        let scan = scan_html(html, dir.path(), dir.path()).unwrap();
        assert_eq!(scan.slide_markers, 3);
        assert!(scan.css.contains("@page"));
        assert!(scan.css.contains(".slide { width: 1280px"));
        assert!(!scan.css.contains("cdn.example.com"));
    }

    #[test]
    fn test_percent_encoded_href_resolves_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("deck/styles")).unwrap();
        std::fs::write(
            dir.path().join("deck/styles/my deck.css"),
            ".slide { width: 1280px; height: 720px }",
        )
        .unwrap();
        std::fs::write(dir.path().join("theme.css"), "@page { size: 800px 600px }").unwrap();
        std::fs::write(dir.path().join("secret.css"), ".leak {}").unwrap();

        let html = r#"
            <link rel="stylesheet" href="styles/my%20deck.css#top">
            <link rel="stylesheet" href="/theme.css">
            <link rel="stylesheet" href="//cdn.example.com/x.css">
            <link rel="stylesheet" href="data:text/css,.x{}">
        "#;
        let base = dir.path().join("deck");
        let scan = scan_html(html, &base, &base).unwrap();
        assert!(scan.css.contains("width: 1280px"));
        assert!(!scan.css.contains("@page"));

        let scan = scan_html(html, dir.path(), &base).unwrap();
        assert!(scan.css.contains("@page { size: 800px 600px }"));

        let escape = r#"<link rel="stylesheet" href="../secret.css">"#;
        let scan = scan_html(escape, &base, &base).unwrap();
        assert!(!scan.css.contains(".leak"));
    }

    #[test]
    fn test_index_prefers_shallowest() {
        let documents = vec![
            PathBuf::from("a/index.html"),
            PathBuf::from("Index.HTML"),
            PathBuf::from("slide-1.html"),
        ];
        assert_eq!(find_index(&documents), Some(&PathBuf::from("Index.HTML")));
    }
}
