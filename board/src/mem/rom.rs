// board/src/mem/rom.rs
//
// 役割:
// - ブート ROM のバイト列。reset vector（と必要ならファームウェア情報）の置き場。
//
// 書き込み可能期間:
// - 組み立て中だけ書ける。reset vector を書いたら seal() し、以後は読み取り専用。
// - seal は一方向（unseal は無い）。書き込みの度に sealed を確認する。ロックは使わない。

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AddressingError, CapacityError};
use crate::mem::region::Region;
use crate::types::PhysAddr;

pub struct BootRom {
    base: PhysAddr,
    bytes: Vec<u8>,
    sealed: AtomicBool,
}

impl BootRom {
    pub fn new(region: &Region) -> Result<Self, AddressingError> {
        let size = region.size()?;
        region.end()?;
        Ok(BootRom {
            base: region.base,
            bytes: vec![0u8; size as usize],
            sealed: AtomicBool::new(false),
        })
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// ROM 先頭からの offset に書き込む。
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), CapacityError> {
        if self.is_sealed() {
            return Err(CapacityError::RomSealed);
        }

        let required = offset.saturating_add(data.len() as u64);
        if required > self.size() {
            return Err(CapacityError::RomTooSmall {
                required,
                available: self.size(),
            });
        }

        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// ゲスト物理アドレスで読む（hart のフェッチ相当）
    pub fn read(&self, addr: PhysAddr, len: usize) -> Result<&[u8], AddressingError> {
        let unmapped = AddressingError::Unmapped { addr, len: len as u64 };
        let off = addr.checked_sub(self.base).ok_or(unmapped)? as usize;
        self.bytes.get(off..off.checked_add(len).ok_or(unmapped)?).ok_or(unmapped)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
