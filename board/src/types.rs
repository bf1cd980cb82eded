/*!
 * types
 *
 * 役割:
 *   - ボード全体で共有する素朴な型・定数を集約する。
 *
 * やること:
 *   - 物理アドレス型、KiB/MiB/GiB、アラインメント計算、区間の重なり判定。
 *
 * やらないこと:
 *   - 領域テーブルやデバイス固有の定数（mem / machine 側の責務）。
 *
 * 設計方針:
 *   - 依存を増やさず、共通処理をここに寄せる。
 */

use core::fmt;

pub type PhysAddr = u64;

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

/// align は 2 のべき乗であること。
pub const fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

/// 上方向に揃える。u64 を超える場合は None。
pub const fn checked_align_up(value: u64, align: u64) -> Option<u64> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// 半開区間 [a, a+a_size) と [b, b+b_size) が重なるか。
/// - サイズ 0 の区間はどこにも重ならない。
pub fn ranges_overlap(a: PhysAddr, a_size: u64, b: PhysAddr, b_size: u64) -> bool {
    if a_size == 0 || b_size == 0 {
        return false;
    }
    let a_end = a.saturating_add(a_size);
    let b_end = b.saturating_add(b_size);
    a < b_end && b < a_end
}

/// [inner, inner+inner_size) が [outer, outer+outer_size) に収まるか。
pub fn range_contains(outer: PhysAddr, outer_size: u64, inner: PhysAddr, inner_size: u64) -> bool {
    match (outer.checked_add(outer_size), inner.checked_add(inner_size)) {
        (Some(outer_end), Some(inner_end)) => inner >= outer && inner_end <= outer_end,
        _ => false,
    }
}

/// hart の命令幅。reset vector の load 命令とカーネル配置に効く。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Xlen {
    Rv32,
    Rv64,
}

impl Xlen {
    pub fn word_bytes(self) -> u64 {
        match self {
            Xlen::Rv32 => 4,
            Xlen::Rv64 => 8,
        }
    }
}

impl fmt::Display for Xlen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Xlen::Rv32 => write!(f, "rv32"),
            Xlen::Rv64 => write!(f, "rv64"),
        }
    }
}
