// board/src/devices/plic.rs
//
// 役割:
// - 割り込みコントローラ（SiFive PLIC 互換）の生成パラメータと handle。
//
// 注意:
// - PlicGeometry の 5 つのオフセットはボードのファームウェアが前提にしている値。
//   自由パラメータではなく、ボードの公開契約の一部として variant に固定で持つ。
// - 内部の調停は扱わない（外部部品）。

use super::{DeviceId, IrqLine};
use crate::error::{CapacityError, ConfigError};
use crate::types::PhysAddr;

bitflags::bitflags! {
    /// hart ごとに PLIC コンテキストを持つ特権モード
    ///
    /// - M: machine
    /// - S: supervisor
    /// - U: user
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HartModes: u8 {
        const M = 1 << 0;
        const S = 1 << 1;
        const U = 1 << 2;
    }
}

impl HartModes {
    /// "MS" のようなモード文字列を解釈する。M は必須、重複は不可。
    pub fn parse(config: &'static str) -> Result<Self, ConfigError> {
        let mut modes = HartModes::empty();
        for c in config.chars() {
            let m = match c {
                'M' => HartModes::M,
                'S' => HartModes::S,
                'U' => HartModes::U,
                _ => return Err(ConfigError::InvalidHartConfig(config)),
            };
            if modes.contains(m) {
                return Err(ConfigError::InvalidHartConfig(config));
            }
            modes |= m;
        }
        if !modes.contains(HartModes::M) {
            return Err(ConfigError::InvalidHartConfig(config));
        }
        Ok(modes)
    }

    /// hart 1 つあたりのコンテキスト数
    pub fn contexts_per_hart(self) -> u64 {
        self.bits().count_ones() as u64
    }
}

/// ボード固定の PLIC 配置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlicGeometry {
    pub hart_config: &'static str,
    pub num_sources: u32,
    pub num_priorities: u32,
    pub priority_base: u64,
    pub pending_base: u64,
    pub enable_base: u64,
    pub enable_stride: u64,
    pub context_base: u64,
    pub context_stride: u64,
}

impl PlicGeometry {
    pub fn contexts(&self, num_harts: u32) -> Result<u64, ConfigError> {
        Ok(HartModes::parse(self.hart_config)?.contexts_per_hart() * num_harts as u64)
    }

    /// num_harts 個の hart を収めるのに必要な MMIO サイズ
    pub fn required_size(&self, num_harts: u32) -> Result<u64, ConfigError> {
        Ok(self.context_base + self.contexts(num_harts)? * self.context_stride)
    }

    /// 各サブ窓が互いに食い込んでいないか
    pub fn check_windows(&self, num_harts: u32) -> Result<(), ConfigError> {
        let bad = |why: &'static str| ConfigError::InvalidSetting {
            key: "plic geometry",
            value: why.to_string(),
        };
        let contexts = self.contexts(num_harts)?;
        let source_words = (self.num_sources as u64).div_ceil(32);

        if self.priority_base + self.num_sources as u64 * 4 > self.pending_base {
            return Err(bad("priority window runs into pending window"));
        }
        if self.pending_base + source_words * 4 > self.enable_base {
            return Err(bad("pending window runs into enable window"));
        }
        if self.enable_stride < source_words * 4 {
            return Err(bad("enable stride is smaller than one enable bitmap"));
        }
        if self.enable_base + contexts * self.enable_stride > self.context_base {
            return Err(bad("enable window runs into context window"));
        }
        Ok(())
    }
}

/// create(base, hart_config, num_harts, num_sources, num_priorities, 5 offsets, size)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlicParams {
    pub base: PhysAddr,
    pub geometry: PlicGeometry,
    pub modes: HartModes,
    pub num_harts: u32,
    pub hart_id_base: u32,
    pub region_size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerHandle {
    pub device: DeviceId,
    pub num_sources: u32,
}

impl ControllerHandle {
    /// 入力線番号の範囲検査。0 番は「割り込み無し」なので使えない。
    pub fn check_index(&self, index: u32) -> Result<(), CapacityError> {
        if index == 0 || index >= self.num_sources {
            return Err(CapacityError::IrqLineOutOfRange {
                index,
                sources: self.num_sources,
            });
        }
        Ok(())
    }

    pub fn line(&self, index: u32) -> Result<IrqLine, CapacityError> {
        self.check_index(index)?;
        Ok(IrqLine {
            controller: self.device,
            index,
        })
    }
}
