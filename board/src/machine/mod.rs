// board/src/machine/mod.rs
//
// ボード種別（記述子）と、その登録表。

pub mod registry;
pub mod variant;

pub use registry::{BoardEntry, BoardRegistry, DEFAULT_BOARD};
pub use variant::{BoardVariant, BootPolicy, SecondaryUart, NANHU, NANHU_FDT};
