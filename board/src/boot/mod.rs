// board/src/boot/mod.rs
//
// ブートの段取り:
// - image / fdt_blob : 入力（ファームウェア・カーネル・デバイスツリー）
// - locator / plan   : DRAM 上の配置を決めて書き込む
// - reset_vec        : ROM に踏み台を合成する

pub mod fdt_blob;
pub mod image;
pub mod locator;
pub mod plan;
pub mod reset_vec;

pub use fdt_blob::DeviceTreeBlob;
pub use image::{BootImage, ImageFormat, Segment};
pub use locator::BootImageLocator;
pub use plan::{BootPlan, DeviceTreePlacement, FirmwarePlacement, KernelPlacement};
pub use reset_vec::{ResetVector, ResetVectorBuilder};
