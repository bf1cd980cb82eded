// board/src/mem/mod.rs
//
// 役割:
// - メモリ関連のサブモジュールをまとめる中継点。
// - region.rs / address_map.rs / addr.rs / rom.rs / dram.rs を公開する。

pub mod addr;
pub mod address_map;
pub mod dram;
pub mod region;
pub mod rom;

pub use address_map::AddressMap;
pub use dram::Dram;
pub use region::{DeviceRole, Region, SubRegion};
pub use rom::BootRom;
