// board/src/mem/addr.rs
//
// 役割:
// - ゲスト物理メモリを「フレーム（4KiB）単位」で扱うための基本型。
// - DRAM モデル（dram.rs）の疎なページ表のキーになる。
// やらないこと:
// - 領域テーブルの知識（address_map.rs 側）

use core::fmt;

use crate::types::PhysAddr;

/// フレームサイズ（4KiB 固定）
pub const PAGE_SIZE: u64 = 4096;

/// ゲスト物理フレーム（4KiB ごとの番号）
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysFrame {
    pub number: u64, // frame index = phys_addr / PAGE_SIZE
}

impl PhysFrame {
    /// このアドレスが含まれるフレームを返す。
    pub const fn containing(addr: PhysAddr) -> Self {
        PhysFrame {
            number: addr / PAGE_SIZE,
        }
    }

    /// フレーム先頭の物理アドレスを返す。
    pub const fn start_address(self) -> PhysAddr {
        self.number * PAGE_SIZE
    }
}

/// addr のフレーム内オフセット
pub const fn frame_offset(addr: PhysAddr) -> usize {
    (addr % PAGE_SIZE) as usize
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame({:#x})", self.start_address())
    }
}
