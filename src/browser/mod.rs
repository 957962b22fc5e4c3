//! 浏览器资源
//!
//! - `surface` - 截图流程使用的渲染面抽象
//! - `pool` - 基于 chromiumoxide 的共享浏览器实现

pub mod pool;
pub mod surface;

pub use pool::BrowserPool;
pub use surface::{ClipRect, RenderSurface, SurfaceProvider};
