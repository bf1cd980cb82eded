// board/src/boot/plan.rs
//
// BootPlan: ファームウェア / カーネル / デバイスツリーの配置結果。
//
// [不変条件]
// - 各項目は「未決定 -> 決定（有り or 無し）」へちょうど 1 回だけ遷移する。
// - 決定順は firmware -> kernel -> device tree に固定。
//   （カーネル位置はファームウェア終端に依存し、デバイスツリーは両者を避けて最後に決める）
// - 3 つとも決まったら finalized。以後は読み取りのみ。

use crate::error::ConfigError;
use crate::types::PhysAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwarePlacement {
    pub load_addr: PhysAddr,
    pub size: u64,
    /// 命令アラインメントに切り上げた終端
    pub end_addr: PhysAddr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelPlacement {
    pub load_addr: PhysAddr,
    pub entry_addr: PhysAddr,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceTreePlacement {
    pub load_addr: PhysAddr,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Progress {
    Empty,
    FirmwareDecided,
    KernelDecided,
    Finalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootPlan {
    progress: Progress,
    firmware: Option<FirmwarePlacement>,
    kernel: Option<KernelPlacement>,
    device_tree: Option<DeviceTreePlacement>,
}

impl Default for BootPlan {
    fn default() -> Self {
        BootPlan::new()
    }
}

impl BootPlan {
    pub const fn new() -> Self {
        BootPlan {
            progress: Progress::Empty,
            firmware: None,
            kernel: None,
            device_tree: None,
        }
    }

    pub fn decide_firmware(&mut self, fw: Option<FirmwarePlacement>) -> Result<(), ConfigError> {
        self.advance(Progress::Empty, Progress::FirmwareDecided, "firmware")?;
        self.firmware = fw;
        Ok(())
    }

    pub fn decide_kernel(&mut self, kernel: Option<KernelPlacement>) -> Result<(), ConfigError> {
        self.advance(Progress::FirmwareDecided, Progress::KernelDecided, "kernel")?;
        self.kernel = kernel;
        Ok(())
    }

    pub fn decide_device_tree(&mut self, dt: Option<DeviceTreePlacement>) -> Result<(), ConfigError> {
        self.advance(Progress::KernelDecided, Progress::Finalized, "device tree")?;
        self.device_tree = dt;
        Ok(())
    }

    fn advance(&mut self, expect: Progress, next: Progress, what: &'static str) -> Result<(), ConfigError> {
        if self.progress != expect {
            return Err(ConfigError::InvalidTransition {
                from: self.progress_name(),
                to: what,
            });
        }
        self.progress = next;
        Ok(())
    }

    fn progress_name(&self) -> &'static str {
        match self.progress {
            Progress::Empty => "empty plan",
            Progress::FirmwareDecided => "firmware decided",
            Progress::KernelDecided => "kernel decided",
            Progress::Finalized => "finalized plan",
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.progress == Progress::Finalized
    }

    pub fn firmware(&self) -> Option<&FirmwarePlacement> {
        self.firmware.as_ref()
    }

    pub fn kernel(&self) -> Option<&KernelPlacement> {
        self.kernel.as_ref()
    }

    pub fn device_tree(&self) -> Option<&DeviceTreePlacement> {
        self.device_tree.as_ref()
    }

    /// デバイスツリーの最終アドレス（無ければ 0）
    pub fn dtb_addr(&self) -> PhysAddr {
        self.device_tree.map_or(0, |d| d.load_addr)
    }

    /// カーネルエントリ（無ければ 0: ファームウェアが実行時に決める）
    pub fn kernel_entry(&self) -> PhysAddr {
        self.kernel.map_or(0, |k| k.entry_addr)
    }
}
