//! 基于实测数据的切分策略
//!
//! 每个策略都是纯函数：输入 [`PageMetrics`]，输出一个切分方案或 `None`。
//! [`STRATEGIES`] 按优先级排列，第一个返回 `Some` 的策略胜出。

use serde::{Deserialize, Serialize};

use super::{Dimensions, MAX_CONTENT_HEIGHT, MIN_HEIGHT};

/// 判定"尺寸相同"的像素容差
pub const SIZE_TOLERANCE: f64 = 2.0;
/// 堆叠区块被视为幻灯片的最小高度
pub const MIN_SECTION_HEIGHT: f64 = 200.0;
/// 比例推断时每张幻灯片允许的余数
pub const REMAINDER_TOLERANCE_PER_SLIDE: f64 = 4.0;

/// 常见幻灯片比例（宽, 高）
pub const ASPECT_RATIOS: [(&str, f64, f64); 3] =
    [("16:9", 16.0, 9.0), ("4:3", 4.0, 3.0), ("16:10", 16.0, 10.0)];

/// 页面中测得的内容盒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBox {
    /// 在候选子元素列表中的序号，用于回到页面中打标记
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    /// 是否声明了 `break-before` / `break-after: page`
    #[serde(default)]
    pub page_break: bool,
}

/// 页面测量结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub content_width: f64,
    pub content_height: f64,
    /// 样式表中声明的 `@page` 尺寸
    #[serde(default)]
    pub declared_page: Option<Dimensions>,
    /// 顶层可见子元素（单一包裹层会被穿透）
    #[serde(default)]
    pub children: Vec<ElementBox>,
}

/// 幻灯片边界
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundaries {
    /// 逐个截取这些子元素
    Elements(Vec<usize>),
    /// 滚动到这些纵向偏移后按视口截取
    Offsets(Vec<u32>),
}

/// 命中的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    PageRule,
    UniformSections,
    AspectRatio(&'static str),
    SingleSlide,
}

/// 切分方案
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub strategy: StrategyKind,
    pub slide: Dimensions,
    pub boundaries: Boundaries,
}

impl Segmentation {
    pub fn slide_count(&self) -> usize {
        match &self.boundaries {
            Boundaries::Elements(items) => items.len(),
            Boundaries::Offsets(items) => items.len(),
        }
    }
}

pub type Strategy = fn(&PageMetrics) -> Option<Segmentation>;

/// 按优先级排列的策略列表
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("page-rule", page_rule),
    ("uniform-sections", uniform_sections),
    ("aspect-ratio", aspect_ratio),
    ("single-slide", single_slide),
];

/// 依次尝试所有策略
pub fn segment(metrics: &PageMetrics) -> Segmentation {
    STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(metrics))
        .unwrap_or_else(|| whole_page(metrics))
}

/// 策略 1：信任 `@page` 声明的尺寸
///
/// 优先选取尺寸一致且带分页标记的子元素；没有分页标记时选取尺寸一致的子元素；
/// 两者都没有时按声明高度切分整个页面。
pub fn page_rule(metrics: &PageMetrics) -> Option<Segmentation> {
    let declared = metrics.declared_page?.clamp();
    let same_size = |b: &&ElementBox| {
        near(b.width, declared.width as f64) && near(b.height, declared.height as f64)
    };

    let marked: Vec<usize> = metrics
        .children
        .iter()
        .filter(same_size)
        .filter(|b| b.page_break)
        .map(|b| b.index)
        .collect();

    let chosen = if marked.is_empty() {
        metrics
            .children
            .iter()
            .filter(same_size)
            .map(|b| b.index)
            .collect()
    } else {
        marked
    };

    let boundaries = if chosen.is_empty() {
        Boundaries::Offsets(offsets(content_height(metrics), declared.height))
    } else {
        Boundaries::Elements(chosen)
    };

    Some(Segmentation {
        strategy: StrategyKind::PageRule,
        slide: declared,
        boundaries,
    })
}

/// 策略 2：顶层子元素高度一致且足够高，每个子元素一张幻灯片
pub fn uniform_sections(metrics: &PageMetrics) -> Option<Segmentation> {
    let children = &metrics.children;
    if children.len() < 2 {
        return None;
    }

    let height = children[0].height.min(MAX_CONTENT_HEIGHT);
    if height < MIN_SECTION_HEIGHT {
        return None;
    }
    if !children.iter().all(|b| near(b.height.min(MAX_CONTENT_HEIGHT), height)) {
        return None;
    }

    let width = children.iter().map(|b| b.width).fold(0.0, f64::max);
    Some(Segmentation {
        strategy: StrategyKind::UniformSections,
        slide: Dimensions::clamped(width, height),
        boundaries: Boundaries::Elements(children.iter().map(|b| b.index).collect()),
    })
}

/// 策略 3：用常见比例从内容宽度推出单张高度，选余数最小的比例
///
/// 余数容差随张数线性增长；只能放下一张时不接受。
pub fn aspect_ratio(metrics: &PageMetrics) -> Option<Segmentation> {
    let slide_width = Dimensions::clamped(metrics.content_width, MIN_HEIGHT as f64).width;
    let total = content_height(metrics);

    let mut best: Option<(f64, &'static str, u32, usize)> = None;
    for (name, ratio_w, ratio_h) in ASPECT_RATIOS {
        let slide_height = (slide_width as f64 * ratio_h / ratio_w).round();
        if slide_height < MIN_HEIGHT as f64 {
            continue;
        }

        let count = (total / slide_height).round() as usize;
        if count < 2 {
            continue;
        }

        let remainder = (total - count as f64 * slide_height).abs();
        if remainder > REMAINDER_TOLERANCE_PER_SLIDE * count as f64 {
            continue;
        }

        if best.map_or(true, |(r, ..)| remainder < r) {
            best = Some((remainder, name, slide_height as u32, count));
        }
    }

    let (_, name, slide_height, count) = best?;
    let slide = Dimensions::clamped(slide_width as f64, slide_height as f64);
    Some(Segmentation {
        strategy: StrategyKind::AspectRatio(name),
        slide,
        boundaries: Boundaries::Offsets((0..count as u32).map(|i| i * slide_height).collect()),
    })
}

/// 策略 4：整个内容区域作为一张幻灯片
pub fn single_slide(metrics: &PageMetrics) -> Option<Segmentation> {
    Some(whole_page(metrics))
}

fn whole_page(metrics: &PageMetrics) -> Segmentation {
    Segmentation {
        strategy: StrategyKind::SingleSlide,
        slide: Dimensions::clamped(metrics.content_width, metrics.content_height),
        boundaries: Boundaries::Offsets(vec![0]),
    }
}

fn content_height(metrics: &PageMetrics) -> f64 {
    if metrics.content_height.is_finite() {
        metrics.content_height.clamp(0.0, MAX_CONTENT_HEIGHT)
    } else {
        0.0
    }
}

fn offsets(total: f64, slide_height: u32) -> Vec<u32> {
    let count = ((total / slide_height as f64).ceil() as u32).max(1);
    (0..count).map(|i| i * slide_height).collect()
}

fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= SIZE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(index: usize, width: f64, height: f64, top: f64) -> ElementBox {
        ElementBox {
            index,
            width,
            height,
            top,
            page_break: false,
        }
    }

    fn metrics(width: f64, height: f64, children: Vec<ElementBox>) -> PageMetrics {
        PageMetrics {
            content_width: width,
            content_height: height,
            declared_page: None,
            children,
        }
    }

    #[test]
    fn test_aspect_ratio_detects_two_hd_slides() {
        let m = metrics(
            1920.0,
            2160.0,
            vec![child(0, 1920.0, 300.0, 0.0), child(1, 1920.0, 1860.0, 300.0)],
        );

        let result = segment(&m);
        assert_eq!(result.strategy, StrategyKind::AspectRatio("16:9"));
        assert_eq!(result.slide, Dimensions::new(1920, 1080));
        assert_eq!(result.boundaries, Boundaries::Offsets(vec![0, 1080]));
    }

    #[test]
    fn test_aspect_ratio_rejects_single_slide_fit() {
        let m = metrics(1920.0, 1100.0, vec![]);
        assert_eq!(aspect_ratio(&m), None);
        assert_eq!(segment(&m).strategy, StrategyKind::SingleSlide);
    }

    #[test]
    fn test_aspect_ratio_picks_four_by_three() {
        let m = metrics(1024.0, 768.0 * 4.0 + 3.0, vec![]);
        let result = aspect_ratio(&m).unwrap();
        assert_eq!(result.strategy, StrategyKind::AspectRatio("4:3"));
        assert_eq!(result.slide, Dimensions::new(1024, 768));
        assert_eq!(result.slide_count(), 4);
    }

    #[test]
    fn test_uniform_sections_win_over_ratio() {
        let children = (0..4)
            .map(|i| child(i, 1280.0, 720.0 + (i as f64 % 2.0), i as f64 * 720.0))
            .collect();
        let m = metrics(1280.0, 2880.0, children);

        let result = segment(&m);
        assert_eq!(result.strategy, StrategyKind::UniformSections);
        assert_eq!(result.slide, Dimensions::new(1280, 720));
        assert_eq!(result.boundaries, Boundaries::Elements(vec![0, 1, 2, 3]));
    }

    #[test]
    fn test_uniform_sections_need_min_height() {
        let children = (0..5).map(|i| child(i, 800.0, 120.0, i as f64 * 120.0)).collect();
        assert_eq!(uniform_sections(&metrics(800.0, 600.0, children)), None);
    }

    #[test]
    fn test_page_rule_prefers_marked_boundaries() {
        let mut m = metrics(
            1280.0,
            2200.0,
            vec![
                child(0, 1280.0, 720.0, 0.0),
                child(1, 1280.0, 40.0, 720.0),
                child(2, 1280.0, 720.0, 760.0),
                child(3, 1280.0, 720.0, 1480.0),
            ],
        );
        m.declared_page = Some(Dimensions::new(1280, 720));
        m.children[0].page_break = true;
        m.children[2].page_break = true;

        let result = segment(&m);
        assert_eq!(result.strategy, StrategyKind::PageRule);
        assert_eq!(result.boundaries, Boundaries::Elements(vec![0, 2]));
    }

    #[test]
    fn test_page_rule_falls_back_to_same_size_children_then_offsets() {
        let mut m = metrics(
            1280.0,
            1500.0,
            vec![child(0, 1280.0, 720.0, 0.0), child(1, 1280.0, 60.0, 720.0)],
        );
        m.declared_page = Some(Dimensions::new(1280, 720));
        assert_eq!(
            page_rule(&m).unwrap().boundaries,
            Boundaries::Elements(vec![0])
        );

        m.children.clear();
        assert_eq!(
            page_rule(&m).unwrap().boundaries,
            Boundaries::Offsets(vec![0, 720, 1440])
        );
    }

    #[test]
    fn test_pathological_height_is_bounded() {
        let m = metrics(1920.0, 10_000_000.0, vec![]);
        let result = segment(&m);
        assert!(result.slide_count() <= (MAX_CONTENT_HEIGHT / 1080.0).ceil() as usize);
        assert!(result.slide.height <= 8192);
    }
}
