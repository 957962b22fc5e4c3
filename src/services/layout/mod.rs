//! 幻灯片布局检测 - 业务能力层
//!
//! ## 两类输入
//!
//! - 静态分析（`documents` + `stylesheet`）：只读文件系统，决定模式 A / B、
//!   文档顺序以及声明的尺寸
//! - 实测分析（`strategies`）：基于浏览器中测得的 [`PageMetrics`]，
//!   按优先级依次尝试各个策略，第一个命中的策略决定切分方式
//!
//! 所有尺寸都会被限制在 [`MIN_WIDTH`]..=[`MAX_DIMENSION`] 与
//! [`MIN_HEIGHT`]..=[`MAX_DIMENSION`] 之间。

pub mod detector;
pub mod documents;
pub mod strategies;
pub mod stylesheet;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use detector::LayoutDetector;
pub use strategies::{segment, Boundaries, ElementBox, PageMetrics, Segmentation, StrategyKind};

/// 标记幻灯片的 CSS 选择器，静态分析与页面脚本共用
pub const SLIDE_SELECTOR: &str = "section.slide, [data-slide]";

pub const MIN_WIDTH: u32 = 320;
pub const MIN_HEIGHT: u32 = 200;
pub const MAX_DIMENSION: u32 = 8192;
/// 进入堆叠 / 比例策略之前内容总高度的上限
pub const MAX_CONTENT_HEIGHT: f64 = 100_000.0;

/// 布局模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutMode {
    /// 单个文档内含多个标记的幻灯片
    A,
    /// 每个文档一张幻灯片，或一个需要切分的长文档
    B,
}

/// 像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const DEFAULT_SLIDE: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 四舍五入并限制到支持的范围
    pub fn clamped(width: f64, height: f64) -> Self {
        Self {
            width: clamp_axis(width, MIN_WIDTH),
            height: clamp_axis(height, MIN_HEIGHT),
        }
    }

    pub fn clamp(self) -> Self {
        Self::clamped(self.width as f64, self.height as f64)
    }
}

fn clamp_axis(value: f64, min: u32) -> u32 {
    if !value.is_finite() {
        return min;
    }
    (value.round().max(0.0) as u64).clamp(min as u64, MAX_DIMENSION as u64) as u32
}

/// 幻灯片尺寸的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeSource {
    /// `@page { size: ... }`
    PageRule,
    /// `.slide { width: ...; height: ... }`
    SlideRule,
    /// 未声明，使用默认尺寸
    Default,
}

/// 布局检测结果，生成后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct SlideLayout {
    pub mode: LayoutMode,
    /// 需要渲染的文档（相对内容根目录），模式 A 只有入口文档一个
    pub documents: Vec<PathBuf>,
    pub slide: Dimensions,
    pub slide_count: usize,
    pub size_source: SizeSource,
    /// 样式表中声明的页面尺寸
    pub declared_page: Option<Dimensions>,
}

impl SlideLayout {
    /// 模式 A 的入口文档 / 模式 B 的第一个文档
    pub fn entry_file(&self) -> &Path {
        &self.documents[0]
    }

    /// 模式 B 且只有一个文档：需要在页面内切分
    pub fn is_single_long_document(&self) -> bool {
        self.mode == LayoutMode::B && self.documents.len() == 1
    }
}
