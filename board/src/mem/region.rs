// board/src/mem/region.rs
//
// 役割:
// - 物理アドレス空間上の「名前付き領域」を表す型を定義する。
// - DeviceRole は固定の列挙（ROM / UART0 / UART1 / CLINT / PLIC / DRAM）。
//
// やらないこと:
// - 重なり検査（address_map.rs の責務）

use core::fmt;

use crate::error::AddressingError;
use crate::types::PhysAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceRole {
    Rom,
    Uart0,
    Uart1,
    Clint,
    Plic,
    Dram,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 6] = [
        DeviceRole::Rom,
        DeviceRole::Uart0,
        DeviceRole::Uart1,
        DeviceRole::Clint,
        DeviceRole::Plic,
        DeviceRole::Dram,
    ];
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Rom => write!(f, "ROM"),
            DeviceRole::Uart0 => write!(f, "UART0"),
            DeviceRole::Uart1 => write!(f, "UART1"),
            DeviceRole::Clint => write!(f, "CLINT"),
            DeviceRole::Plic => write!(f, "PLIC"),
            DeviceRole::Dram => write!(f, "DRAM"),
        }
    }
}

/// 1 つのデバイス（またはメモリ種別）に予約された連続区間。
///
/// - size == 0 は「RAM 設定で組み立て時に決まる」を意味する（DRAM のみ）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub role: DeviceRole,
    pub name: &'static str,
    pub base: PhysAddr,
    size: u64,
}

impl Region {
    pub const fn new(role: DeviceRole, name: &'static str, base: PhysAddr, size: u64) -> Self {
        Region { role, name, base, size }
    }

    /// サイズ未確定（0）の領域では SizeUndetermined。
    pub fn size(&self) -> Result<u64, AddressingError> {
        if self.size == 0 {
            return Err(AddressingError::SizeUndetermined(self.role));
        }
        Ok(self.size)
    }

    /// 宣言値そのまま（0 もあり得る）
    pub fn declared_size(&self) -> u64 {
        self.size
    }

    pub fn is_sized(&self) -> bool {
        self.size != 0
    }

    /// 終端（排他的）
    pub fn end(&self) -> Result<PhysAddr, AddressingError> {
        let size = self.size()?;
        self.base
            .checked_add(size)
            .ok_or(AddressingError::AddressOverflow(self.role))
    }

    pub fn contains(&self, addr: PhysAddr) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    pub(crate) fn with_size(self, size: u64) -> Self {
        Region { size, ..self }
    }
}

/// 親領域の内側に固定オフセットで置かれる部分領域（CLINT 内の SWI / MTIMER など）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubRegion {
    pub parent: DeviceRole,
    pub name: &'static str,
    pub base: PhysAddr,
    pub size: u64,
}

impl SubRegion {
    pub const fn new(parent: DeviceRole, name: &'static str, base: PhysAddr, size: u64) -> Self {
        SubRegion { parent, name, base, size }
    }
}
