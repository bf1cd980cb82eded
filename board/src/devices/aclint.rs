// board/src/devices/aclint.rs
//
// タイマ / ソフトウェア割り込み複合体（ACLINT）の生成パラメータ。
// - SWI は CLINT 先頭、MTIMER はその直後（SWI の固定サイズ分ずらす）。
// - 周波数・mtime / mtimecmp オフセットは既定値固定。

use super::DeviceId;
use crate::types::PhysAddr;

pub const ACLINT_SWI_SIZE: u64 = 0x4000;
pub const ACLINT_DEFAULT_MTIMER_SIZE: u64 = 0x8000;
pub const ACLINT_DEFAULT_MTIMECMP: u64 = 0x0;
pub const ACLINT_DEFAULT_MTIME: u64 = 0x7ff8;
pub const ACLINT_DEFAULT_TIMEBASE_FREQ: u64 = 10_000_000;

/// CLINT 内の部分領域名
pub const SWI_SUB_REGION: &str = "aclint-swi";
pub const MTIMER_SUB_REGION: &str = "aclint-mtimer";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwiParams {
    pub base: PhysAddr,
    pub hart_id_base: u32,
    pub num_harts: u32,
    /// supervisor 向け SSWI か（Nanhu は machine の MSWI のみ）
    pub supervisor: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MtimerParams {
    pub base: PhysAddr,
    pub size: u64,
    pub hart_id_base: u32,
    pub num_harts: u32,
    pub timecmp_offset: u64,
    pub time_offset: u64,
    pub timebase_freq: u64,
    pub provide_rdtime: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerHandle {
    pub swi: DeviceId,
    pub mtimer: DeviceId,
    pub num_harts: u32,
}
