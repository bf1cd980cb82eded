// board/src/devices/mod.rs
//
// 役割:
// - SoC を構成する外部部品（hart 配列 / PLIC / ACLINT / UART / 未実装スタブ）を
//   「生成パラメータ + 割り込み線」という細い能力インタフェースで扱う。
//
// やること:
// - DeviceSpec: 生成要求。未実装デバイスも Stub という明示的な variant にする。
// - DeviceBackend: 生成・入力線取得・キャラクタバックエンド接続の 3 操作だけ。
//
// やらないこと:
// - 各部品の内部動作（命令実行、調停、UART プロトコル）

pub mod aclint;
pub mod hart;
pub mod inventory;
pub mod plic;
pub mod serial;
pub mod wiring;

use core::fmt;

use crate::types::PhysAddr;

pub use aclint::{MtimerParams, SwiParams, TimerHandle};
pub use hart::{HartArrayHandle, HartConfig};
pub use inventory::{DeviceRecord, Inventory};
pub use plic::{ControllerHandle, HartModes, PlicGeometry, PlicParams};
pub use serial::{CharBackend, CharBackendPool, SerialHandle, SerialParams, UartConfig};
pub use wiring::InterruptWiring;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

/// 割り込みコントローラの入力線 1 本
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqLine {
    pub controller: DeviceId,
    pub index: u32,
}

/// アドレスだけデコードされ、読み書きは副作用なしで受け付ける領域
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StubParams {
    pub name: &'static str,
    pub base: PhysAddr,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSpec {
    HartArray(HartConfig),
    InterruptController(PlicParams),
    SoftwareInterrupt(SwiParams),
    MachineTimer(MtimerParams),
    Serial(SerialParams),
    Stub(StubParams),
}

impl DeviceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceSpec::HartArray(_) => "hart-array",
            DeviceSpec::InterruptController(_) => "plic",
            DeviceSpec::SoftwareInterrupt(_) => "aclint-swi",
            DeviceSpec::MachineTimer(_) => "aclint-mtimer",
            DeviceSpec::Serial(p) => p.name,
            DeviceSpec::Stub(p) => p.name,
        }
    }

    /// MMIO 窓（hart 配列は None）
    pub fn mmio(&self) -> Option<(PhysAddr, u64)> {
        match self {
            DeviceSpec::HartArray(_) => None,
            DeviceSpec::InterruptController(p) => Some((p.base, p.region_size)),
            DeviceSpec::SoftwareInterrupt(p) => {
                Some((p.base, aclint::ACLINT_SWI_SIZE))
            }
            DeviceSpec::MachineTimer(p) => Some((p.base, p.size)),
            DeviceSpec::Serial(p) => Some((p.base, p.size)),
            DeviceSpec::Stub(p) => Some((p.base, p.size)),
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, DeviceSpec::Stub(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceError {
    pub reason: String,
}

impl DeviceError {
    pub fn new(reason: impl Into<String>) -> Self {
        DeviceError { reason: reason.into() }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// 外部部品を生成する側（実行ホスト）の能力インタフェース
pub trait DeviceBackend {
    fn create(&mut self, spec: &DeviceSpec) -> Result<DeviceId, DeviceError>;

    /// コントローラ controller の index 番入力線
    fn input_line(&self, controller: DeviceId, index: u32) -> Result<IrqLine, DeviceError>;

    fn bind_char_backend(
        &mut self,
        device: DeviceId,
        backend: Box<dyn CharBackend>,
    ) -> Result<(), DeviceError>;
}

/// 借用したままでも組み立てに渡せるようにする（失敗後に中身を確認できる）
impl<T: DeviceBackend + ?Sized> DeviceBackend for &mut T {
    fn create(&mut self, spec: &DeviceSpec) -> Result<DeviceId, DeviceError> {
        (**self).create(spec)
    }

    fn input_line(&self, controller: DeviceId, index: u32) -> Result<IrqLine, DeviceError> {
        (**self).input_line(controller, index)
    }

    fn bind_char_backend(
        &mut self,
        device: DeviceId,
        backend: Box<dyn CharBackend>,
    ) -> Result<(), DeviceError> {
        (**self).bind_char_backend(device, backend)
    }
}
