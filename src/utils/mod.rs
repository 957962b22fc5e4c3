pub mod fs_guard;
pub mod logging;
pub mod natural_sort;

pub use fs_guard::{ensure_dir, remove_within};
pub use natural_sort::natural_cmp;
