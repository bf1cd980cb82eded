// board/src/machine/variant.rs
//
// 役割:
// - ボード種別ごとの違いを「データ」で表す記述子（BoardVariant）。
// - 制御フローは 1 本だけ。ボードが増えても記述子を足すだけで済むようにする。
//
// やること:
// - 領域テーブル、hart 上限、PLIC 配置、UART 設定、ブート方針を持つ。
// - address_map(): 記述子から AddressMap を作り、寸法の整合を検査する。
//
// やらないこと:
// - デバイス生成（compose.rs の責務）
//
// 現在のボード:
//   bosc-nanhu      : デバイスツリーはファームウェア（OpenSBI）に埋め込み済み。UART1 はスタブ。
//   bosc-nanhu-fdt  : 外部デバイスツリー必須。ROM / UART0 / PLIC の配置が異なり、UART1 は無い。

use crate::devices::aclint::{
    ACLINT_DEFAULT_MTIMER_SIZE, ACLINT_SWI_SIZE, MTIMER_SUB_REGION, SWI_SUB_REGION,
};
use crate::devices::serial::Endianness;
use crate::devices::{HartConfig, PlicGeometry, UartConfig};
use crate::error::{AddressingError, ConfigError, Result};
use crate::mem::{AddressMap, DeviceRole, Region, SubRegion};
use crate::types::{PhysAddr, Xlen, GIB, KIB, MIB};

/// ファームウェア / カーネル / デバイスツリーの配置方針
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootPolicy {
    /// デバイスツリー無しを致命的とするか
    pub require_device_tree: bool,
    /// None なら DRAM 先頭
    pub firmware_base: Option<PhysAddr>,
    /// 命令アラインメント
    pub firmware_alignment: u64,
    pub fdt_alignment: u64,
    /// デバイスツリーの後ろに空けておく量（ファームウェアが追記する分）
    pub fdt_margin: u64,
    /// DRAM がこれより下から始まる場合、デバイスツリーはこのアドレスより下に置く
    pub fdt_ceiling: PhysAddr,
}

impl BootPolicy {
    /// ファームウェア直後に続くカーネルの配置単位
    pub fn kernel_alignment(&self, xlen: Xlen) -> u64 {
        match xlen {
            Xlen::Rv32 => 4 * MIB,
            Xlen::Rv64 => 2 * MIB,
        }
    }
}

/// UART1 の扱い
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecondaryUart {
    /// アドレスだけ予約し、読み書きは副作用なしで受ける
    Stub,
    Absent,
}

#[derive(Clone, Copy, Debug)]
pub struct BoardVariant {
    pub name: &'static str,
    pub description: &'static str,
    pub regions: &'static [Region],
    pub max_harts: u32,
    /// count は既定値（1）
    pub harts: HartConfig,
    pub default_ram_size: u64,
    pub ram_id: &'static str,
    pub plic: PlicGeometry,
    pub uart: UartConfig,
    pub uart0_irq: u32,
    pub uart1: SecondaryUart,
    pub policy: BootPolicy,
}

const NANHU_REGIONS: [Region; 6] = [
    Region::new(DeviceRole::Rom, "riscv.bosc.nanhu.rom", 0x0, 0x4_0000),
    Region::new(DeviceRole::Uart0, "riscv.bosc.nanhu.uart0", 0x5_0000, 0x1_0000),
    Region::new(DeviceRole::Uart1, "riscv.bosc.nanhu.uart1", 0x6_0000, 0x1_0000),
    Region::new(DeviceRole::Clint, "riscv.bosc.nanhu.clint", 0x3800_0000, 0x1_0000),
    Region::new(DeviceRole::Plic, "riscv.bosc.nanhu.plic", 0x3c00_0000, 0x400_0000),
    Region::new(DeviceRole::Dram, "riscv.bosc.nanhu.ram", 0x8000_0000, 0),
];

const NANHU_FDT_REGIONS: [Region; 5] = [
    Region::new(DeviceRole::Rom, "riscv.bosc.nanhu-fdt.rom", 0x1000, 0xf000),
    Region::new(DeviceRole::Clint, "riscv.bosc.nanhu-fdt.clint", 0x0200_0000, 0x1_0000),
    Region::new(DeviceRole::Plic, "riscv.bosc.nanhu-fdt.plic", 0x0c00_0000, 0x40_0000),
    Region::new(DeviceRole::Uart0, "riscv.bosc.nanhu-fdt.uart0", 0x1000_0000, 0x100),
    Region::new(DeviceRole::Dram, "riscv.bosc.nanhu-fdt.ram", 0x8000_0000, 0),
];

const NANHU_PLIC: PlicGeometry = PlicGeometry {
    hart_config: "MS",
    num_sources: 128,
    num_priorities: 7,
    priority_base: 0x00,
    pending_base: 0x1000,
    enable_base: 0x2000,
    enable_stride: 0x80,
    context_base: 0x20_0000,
    context_stride: 0x1000,
};

const NANHU_UART: UartConfig = UartConfig {
    reg_shift: 2,
    baudbase: 399_193,
    endianness: Endianness::Little,
};

const NANHU_POLICY: BootPolicy = BootPolicy {
    require_device_tree: false,
    firmware_base: None,
    firmware_alignment: 4,
    fdt_alignment: 2 * MIB,
    fdt_margin: 64 * KIB,
    fdt_ceiling: 3 * GIB,
};

pub const NANHU: BoardVariant = BoardVariant {
    name: "bosc-nanhu",
    description: "RISC-V Board compatible with BOSC Xiangshan Nanhu SoC",
    regions: &NANHU_REGIONS,
    max_harts: 2,
    harts: HartConfig {
        count: 1,
        cpu_type: "bosc-nanhu",
        hart_id_base: 0,
        reset_vector: 0x0,
        xlen: Xlen::Rv64,
    },
    default_ram_size: 8 * GIB,
    ram_id: "riscv.bosc.nanhu.ram",
    plic: NANHU_PLIC,
    uart: NANHU_UART,
    uart0_irq: 68,
    uart1: SecondaryUart::Stub,
    policy: NANHU_POLICY,
};

pub const NANHU_FDT: BoardVariant = BoardVariant {
    name: "bosc-nanhu-fdt",
    description: "Nanhu-class board booting with an external device tree",
    regions: &NANHU_FDT_REGIONS,
    max_harts: 2,
    harts: HartConfig {
        count: 1,
        cpu_type: "bosc-nanhu",
        hart_id_base: 0,
        reset_vector: 0x1000,
        xlen: Xlen::Rv64,
    },
    default_ram_size: GIB,
    ram_id: "riscv.bosc.nanhu-fdt.ram",
    plic: PlicGeometry {
        num_sources: 64,
        ..NANHU_PLIC
    },
    uart: NANHU_UART,
    uart0_irq: 10,
    uart1: SecondaryUart::Absent,
    policy: BootPolicy {
        require_device_tree: true,
        ..NANHU_POLICY
    },
};

impl BoardVariant {
    /// 記述子から AddressMap を作る（DRAM サイズは未確定のまま）。
    ///
    /// 検査:
    /// - 領域の重なり / CLINT 内の SWI・MTIMER 部分領域（AddressMap::new）
    /// - PLIC 領域が max_harts ぶんのコンテキストを収められるか
    /// - UART0 の割り込み番号が PLIC の入力範囲内か
    /// - reset vector が ROM 内にあるか
    pub fn address_map(&self) -> Result<AddressMap> {
        let clint = self
            .regions
            .iter()
            .find(|r| r.role == DeviceRole::Clint)
            .ok_or(AddressingError::UnknownRole(DeviceRole::Clint))?;

        let subs = [
            SubRegion::new(DeviceRole::Clint, SWI_SUB_REGION, clint.base, ACLINT_SWI_SIZE),
            SubRegion::new(
                DeviceRole::Clint,
                MTIMER_SUB_REGION,
                clint.base + ACLINT_SWI_SIZE,
                ACLINT_DEFAULT_MTIMER_SIZE,
            ),
        ];
        let map = AddressMap::new(self.name, self.regions, &subs)?;

        let plic = map.resolve(DeviceRole::Plic)?;
        let required = self.plic.required_size(self.max_harts)?;
        if plic.size()? < required {
            return Err(AddressingError::Undersized {
                role: DeviceRole::Plic,
                required,
                actual: plic.declared_size(),
            }
            .into());
        }
        self.plic.check_windows(self.max_harts)?;

        if self.uart0_irq == 0 || self.uart0_irq >= self.plic.num_sources {
            return Err(ConfigError::InvalidSetting {
                key: "uart0 irq",
                value: self.uart0_irq.to_string(),
            }
            .into());
        }

        if self.uart1 == SecondaryUart::Stub {
            map.resolve(DeviceRole::Uart1)?;
        }

        let rom = map.resolve(DeviceRole::Rom)?;
        if !rom.contains(self.harts.reset_vector) {
            return Err(ConfigError::InvalidSetting {
                key: "reset vector",
                value: format!("{:#x}", self.harts.reset_vector),
            }
            .into());
        }

        Ok(map)
    }

    pub fn hart_config(&self, count: u32) -> HartConfig {
        self.harts.with_count(count)
    }
}
