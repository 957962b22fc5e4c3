//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，不持有浏览器资源，也不关心任务状态：
//! - `archive_extractor` - 把上传内容安全地落到任务目录
//! - `layout` - 判断幻灯片的组织方式、数量与尺寸
//! - `postprocess` - 截图重新编码
//! - `output_packager` - 把图片打包成一个 zip

pub mod archive_extractor;
pub mod layout;
pub mod output_packager;
pub mod postprocess;

pub use archive_extractor::{ArchiveExtractor, ExtractedArchive};
pub use layout::{LayoutDetector, LayoutMode, SlideLayout};
pub use output_packager::OutputPackager;
