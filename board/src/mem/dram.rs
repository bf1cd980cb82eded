// board/src/mem/dram.rs
//
// 役割:
// - ゲスト DRAM のバイト列モデル。ブートイメージの書き込み先。
//
// 設計方針:
// - 8GiB 級の DRAM を丸ごと確保しない。書き込まれたフレームだけを BTreeMap に持つ。
// - 一度も書かれていないフレームの読み出しは 0 を返す（電源投入直後のゼロ RAM 相当）。
// - アクセスは必ず [base, base+size) に収まること。はみ出しは Unmapped。

use std::collections::BTreeMap;

use crate::error::AddressingError;
use crate::mem::addr::{frame_offset, PhysFrame, PAGE_SIZE};
use crate::mem::region::Region;
use crate::types::PhysAddr;

pub struct Dram {
    base: PhysAddr,
    size: u64,
    frames: BTreeMap<PhysFrame, Box<[u8]>>,
}

impl Dram {
    /// サイズ確定済みの DRAM 領域から作る。
    pub fn new(region: &Region) -> Result<Self, AddressingError> {
        let size = region.size()?;
        region.end()?;
        Ok(Dram {
            base: region.base,
            size,
            frames: BTreeMap::new(),
        })
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> PhysAddr {
        self.base + self.size
    }

    pub fn contains(&self, addr: PhysAddr, len: u64) -> bool {
        addr >= self.base
            && addr
                .checked_add(len)
                .map_or(false, |end| end <= self.end())
    }

    /// 実体を持つフレーム数（テスト・ログ用）
    pub fn resident_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn write(&mut self, addr: PhysAddr, bytes: &[u8]) -> Result<(), AddressingError> {
        self.check(addr, bytes.len() as u64)?;

        let mut cursor = addr;
        let mut rest = bytes;
        while !rest.is_empty() {
            let frame = PhysFrame::containing(cursor);
            let off = frame_offset(cursor);
            let n = rest.len().min(PAGE_SIZE as usize - off);

            let page = self
                .frames
                .entry(frame)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
            page[off..off + n].copy_from_slice(&rest[..n]);

            cursor += n as u64;
            rest = &rest[n..];
        }
        Ok(())
    }

    /// [addr, addr+len) を 0 にする（ELF の BSS 部分）。
    /// 実体の無いフレームは既に 0 なので触らない。
    pub fn zero(&mut self, addr: PhysAddr, len: u64) -> Result<(), AddressingError> {
        self.check(addr, len)?;

        let mut cursor = addr;
        let end = addr + len;
        while cursor < end {
            let frame = PhysFrame::containing(cursor);
            let off = frame_offset(cursor);
            let n = ((end - cursor) as usize).min(PAGE_SIZE as usize - off);
            if let Some(page) = self.frames.get_mut(&frame) {
                page[off..off + n].fill(0);
            }
            cursor += n as u64;
        }
        Ok(())
    }

    pub fn read_into(&self, addr: PhysAddr, buf: &mut [u8]) -> Result<(), AddressingError> {
        self.check(addr, buf.len() as u64)?;

        let mut cursor = addr;
        let mut done = 0usize;
        while done < buf.len() {
            let frame = PhysFrame::containing(cursor);
            let off = frame_offset(cursor);
            let n = (buf.len() - done).min(PAGE_SIZE as usize - off);
            match self.frames.get(&frame) {
                Some(page) => buf[done..done + n].copy_from_slice(&page[off..off + n]),
                None => buf[done..done + n].fill(0),
            }
            cursor += n as u64;
            done += n;
        }
        Ok(())
    }

    pub fn read(&self, addr: PhysAddr, len: usize) -> Result<Vec<u8>, AddressingError> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    fn check(&self, addr: PhysAddr, len: u64) -> Result<(), AddressingError> {
        if self.contains(addr, len) {
            Ok(())
        } else {
            Err(AddressingError::Unmapped { addr, len })
        }
    }
}
