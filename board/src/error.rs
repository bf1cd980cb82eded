// board/src/error.rs
//
// 役割:
// - 組み立て（composition）中に起こりうる失敗を 4 分類で表現する。
//   Configuration / Addressing / ImageLoad / Capacity
//
// 設計方針:
// - どの失敗も致命的。リトライはしない。
// - Display は「どの段階の」「どの資源か」が 1 行で分かる文にする。
// - 下位エラーは From で BoardError に寄せ、呼び出し側は ? だけで済ませる。

use core::fmt;
use std::io;

use crate::mem::region::DeviceRole;
use crate::types::PhysAddr;

pub type Result<T> = core::result::Result<T, BoardError>;

/// 組み立ての段階。失敗報告で「どこで落ちたか」を示す。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    SelectMap,
    ComposeDevices,
    PlaceImages,
    WriteResetVector,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SelectMap => write!(f, "select-map"),
            Stage::ComposeDevices => write!(f, "compose-devices"),
            Stage::PlaceImages => write!(f, "place-images"),
            Stage::WriteResetVector => write!(f, "write-reset-vector"),
            Stage::Finalize => write!(f, "finalize"),
        }
    }
}

/// 失敗したブートイメージの種別
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Firmware,
    Kernel,
    DeviceTree,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Firmware => write!(f, "firmware"),
            ImageKind::Kernel => write!(f, "kernel"),
            ImageKind::DeviceTree => write!(f, "device tree"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    UnknownBoard(String),
    DuplicateBoard(&'static str),
    NoHarts,
    RamSizeZero,
    RamSizeUnaligned(u64),
    InvalidHartConfig(&'static str),
    MissingDeviceTree(&'static str),
    /// 同じ部品を 2 回組み立てようとした
    AlreadyAttached(&'static str),
    /// 前提となる部品がまだ無い
    OutOfOrder { component: &'static str, requires: &'static str },
    MissingComponent(&'static str),
    DeviceCreation { device: &'static str, reason: String },
    DuplicateWiring { device: u32, line: u32 },
    IrqConflict { index: u32 },
    InvalidTransition { from: &'static str, to: &'static str },
    InvalidSetting { key: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingError {
    UnknownRole(DeviceRole),
    SizeUndetermined(DeviceRole),
    Overlap { first: DeviceRole, second: DeviceRole },
    SubRegionOutside { parent: DeviceRole, name: &'static str },
    SubRegionOverlap { parent: DeviceRole, first: &'static str, second: &'static str },
    UnknownSubRegion { parent: DeviceRole, name: &'static str },
    Undersized { role: DeviceRole, required: u64, actual: u64 },
    AddressOverflow(DeviceRole),
    /// ゲストメモリのどこにも属さないアクセス
    Unmapped { addr: PhysAddr, len: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageLoadError {
    Unreadable { path: String, kind: io::ErrorKind },
    Empty,
    Malformed(&'static str),
    DoesNotFit { addr: PhysAddr, size: u64, limit: PhysAddr },
    Overlaps { addr: PhysAddr, size: u64, other: ImageKind },
    OutsideDram { addr: PhysAddr },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapacityError {
    TooManyHarts { requested: u32, max: u32 },
    RomTooSmall { required: u64, available: u64 },
    RomSealed,
    IrqLineOutOfRange { index: u32, sources: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardError {
    Configuration(ConfigError),
    Addressing(AddressingError),
    ImageLoad { image: ImageKind, error: ImageLoadError },
    Capacity(CapacityError),
}

impl BoardError {
    pub fn image(image: ImageKind, error: ImageLoadError) -> Self {
        BoardError::ImageLoad { image, error }
    }

    /// 失敗したのがデバイスツリーの読み込みか（DeviceTreeLoadError 相当）
    pub fn is_device_tree_load_error(&self) -> bool {
        matches!(self, BoardError::ImageLoad { image: ImageKind::DeviceTree, .. })
    }
}

impl From<ConfigError> for BoardError {
    fn from(e: ConfigError) -> Self {
        BoardError::Configuration(e)
    }
}

impl From<AddressingError> for BoardError {
    fn from(e: AddressingError) -> Self {
        BoardError::Addressing(e)
    }
}

impl From<CapacityError> for BoardError {
    fn from(e: CapacityError) -> Self {
        BoardError::Capacity(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownBoard(name) => write!(f, "unknown board '{}'", name),
            ConfigError::DuplicateBoard(name) => write!(f, "board '{}' registered twice", name),
            ConfigError::NoHarts => write!(f, "hart count must be at least 1"),
            ConfigError::RamSizeZero => write!(f, "RAM size must not be zero"),
            ConfigError::RamSizeUnaligned(size) => {
                write!(f, "RAM size {:#x} is not page aligned", size)
            }
            ConfigError::InvalidHartConfig(s) => write!(f, "invalid hart mode string '{}'", s),
            ConfigError::MissingDeviceTree(board) => {
                write!(f, "board '{}' requires a device tree blob", board)
            }
            ConfigError::AlreadyAttached(c) => write!(f, "{} is already attached", c),
            ConfigError::OutOfOrder { component, requires } => {
                write!(f, "{} must be attached after {}", component, requires)
            }
            ConfigError::MissingComponent(c) => write!(f, "{} was never attached", c),
            ConfigError::DeviceCreation { device, reason } => {
                write!(f, "failed to create {}: {}", device, reason)
            }
            ConfigError::DuplicateWiring { device, line } => {
                write!(f, "device #{} line {} is wired twice", device, line)
            }
            ConfigError::IrqConflict { index } => {
                write!(f, "interrupt input {} is already taken", index)
            }
            ConfigError::InvalidTransition { from, to } => {
                write!(f, "cannot move from {} to {}", from, to)
            }
            ConfigError::InvalidSetting { key, value } => {
                write!(f, "invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl fmt::Display for AddressingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressingError::UnknownRole(role) => write!(f, "no region for {}", role),
            AddressingError::SizeUndetermined(role) => {
                write!(f, "size of {} is not fixed yet", role)
            }
            AddressingError::Overlap { first, second } => {
                write!(f, "regions {} and {} overlap", first, second)
            }
            AddressingError::SubRegionOutside { parent, name } => {
                write!(f, "sub-region {} lies outside {}", name, parent)
            }
            AddressingError::SubRegionOverlap { parent, first, second } => {
                write!(f, "sub-regions {} and {} of {} overlap", first, second, parent)
            }
            AddressingError::UnknownSubRegion { parent, name } => {
                write!(f, "{} has no sub-region {}", parent, name)
            }
            AddressingError::Undersized { role, required, actual } => write!(
                f,
                "{} is {:#x} bytes but needs {:#x}",
                role, actual, required
            ),
            AddressingError::AddressOverflow(role) => {
                write!(f, "{} extends past the end of the address space", role)
            }
            AddressingError::Unmapped { addr, len } => {
                write!(f, "access {:#x}+{:#x} hits no memory region", addr, len)
            }
        }
    }
}

impl fmt::Display for ImageLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLoadError::Unreadable { path, kind } => {
                write!(f, "cannot read '{}': {:?}", path, kind)
            }
            ImageLoadError::Empty => write!(f, "image is empty"),
            ImageLoadError::Malformed(why) => write!(f, "malformed image: {}", why),
            ImageLoadError::DoesNotFit { addr, size, limit } => write!(
                f,
                "{:#x} bytes at {:#x} do not fit below {:#x}",
                size, addr, limit
            ),
            ImageLoadError::Overlaps { addr, size, other } => write!(
                f,
                "{:#x} bytes at {:#x} overlap the {} image",
                size, addr, other
            ),
            ImageLoadError::OutsideDram { addr } => write!(f, "{:#x} is outside DRAM", addr),
        }
    }
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::TooManyHarts { requested, max } => write!(
                f,
                "{} harts requested but the board supports at most {}",
                requested, max
            ),
            CapacityError::RomTooSmall { required, available } => write!(
                f,
                "reset vector needs {:#x} bytes but ROM has {:#x}",
                required, available
            ),
            CapacityError::RomSealed => write!(f, "ROM is sealed"),
            CapacityError::IrqLineOutOfRange { index, sources } => write!(
                f,
                "interrupt input {} is outside 1..{}",
                index, sources
            ),
        }
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::Configuration(e) => write!(f, "configuration error: {}", e),
            BoardError::Addressing(e) => write!(f, "addressing error: {}", e),
            BoardError::ImageLoad { image, error } => {
                write!(f, "{} load error: {}", image, error)
            }
            BoardError::Capacity(e) => write!(f, "capacity error: {}", e),
        }
    }
}

impl std::error::Error for BoardError {}
