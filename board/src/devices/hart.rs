// board/src/devices/hart.rs
//
// hart 配列の構成。hart 配列はメモリマップされない。
// - count / reset_vector は ResetVectorBuilder が後で使うので handle に残す。

use super::DeviceId;
use crate::types::{PhysAddr, Xlen};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HartConfig {
    pub count: u32,
    pub cpu_type: &'static str,
    pub hart_id_base: u32,
    /// 全 hart が同じ reset vector から始まる
    pub reset_vector: PhysAddr,
    pub xlen: Xlen,
}

impl HartConfig {
    pub fn with_count(self, count: u32) -> Self {
        HartConfig { count, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HartArrayHandle {
    pub device: DeviceId,
    pub config: HartConfig,
}

impl HartArrayHandle {
    pub fn count(&self) -> u32 {
        self.config.count
    }

    pub fn reset_vector(&self) -> PhysAddr {
        self.config.reset_vector
    }
}
