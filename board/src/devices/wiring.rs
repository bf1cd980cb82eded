// board/src/devices/wiring.rs
//
// InterruptWiring: (device, line) -> 割り込みコントローラ入力番号
//
// [不変条件]
// - 割り込みを出すデバイスは、持っている物理線 1 本につきちょうど 1 エントリ。
// - 2 つのデバイスが同じ入力番号を共有しない。
// - 組み立て後は読み取り専用（ロック無しで並行参照してよい）。

use std::collections::{BTreeMap, BTreeSet};

use super::{DeviceId, IrqLine};
use crate::error::ConfigError;

#[derive(Clone, Debug, Default)]
pub struct InterruptWiring {
    entries: BTreeMap<(DeviceId, u32), IrqLine>,
    taken: BTreeSet<(DeviceId, u32)>,
}

impl InterruptWiring {
    pub fn new() -> Self {
        InterruptWiring::default()
    }

    /// device の line 番の出力を input に接続する。
    pub fn connect(&mut self, device: DeviceId, line: u32, input: IrqLine) -> Result<(), ConfigError> {
        if self.entries.contains_key(&(device, line)) {
            return Err(ConfigError::DuplicateWiring { device: device.0, line });
        }
        if !self.taken.insert((input.controller, input.index)) {
            return Err(ConfigError::IrqConflict { index: input.index });
        }
        self.entries.insert((device, line), input);
        Ok(())
    }

    pub fn lookup(&self, device: DeviceId, line: u32) -> Option<IrqLine> {
        self.entries.get(&(device, line)).copied()
    }

    /// 入力番号からそれを駆動しているデバイスを逆引きする
    pub fn driver_of(&self, input: IrqLine) -> Option<(DeviceId, u32)> {
        self.entries
            .iter()
            .find(|(_, v)| **v == input)
            .map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((DeviceId, u32), IrqLine)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
