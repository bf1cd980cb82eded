// board/src/boot/image.rs
//
// 役割:
// - ファームウェア / カーネルのブートイメージを読み込み、「どこに何バイト置くか」を
//   配置先に依存しない形（イメージ先頭からの相対オフセット）で表す。
//
// 対応形式:
// - Raw: ファイルをそのまま置く。エントリは呼び出し側が与えるオフセット（既定 0）。
// - ELF64 (little-endian, RISC-V): 解析は elf_rs。PT_LOAD を「最も低い物理アドレス」基準で相対化する。
//   エントリオフセット = (e_entry を含む区画で物理アドレスに直した値) - 最低物理アドレス。
//
// やらないこと:
// - 再配置テーブルの処理。位置非依存のイメージである前提。

use std::fs;
use std::path::Path;

use elf_rs::{Elf, ElfFile, ProgramType};

use crate::error::ImageLoadError;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF64_HEADER_SIZE: usize = 64;
const ELF64_PHDR_SIZE: usize = 56;
const ELFDATA2LSB: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_RISCV: u16 = 243;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Raw,
    Elf,
}

/// イメージ先頭からの相対位置で表した 1 区画
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// ファイル内オフセット
    pub file_offset: usize,
    pub file_size: usize,
    /// 配置先先頭からのオフセット
    pub mem_offset: u64,
    /// file_size を超える部分は 0 埋め（BSS）
    pub mem_size: u64,
}

#[derive(Clone, Debug)]
pub struct BootImage {
    label: String,
    bytes: Vec<u8>,
    format: ImageFormat,
    segments: Vec<Segment>,
    entry_offset: u64,
    span: u64,
}

impl BootImage {
    /// 形式を自動判別する（ELF マジックがあれば ELF）。
    pub fn from_bytes(label: &str, bytes: Vec<u8>) -> Result<Self, ImageLoadError> {
        if bytes.starts_with(&ELF_MAGIC) {
            Self::elf(label, bytes)
        } else {
            Self::raw(label, bytes)
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ImageLoadError::Unreadable {
            path: path.display().to_string(),
            kind: e.kind(),
        })?;
        Self::from_bytes(&path.display().to_string(), bytes)
    }

    pub fn raw(label: &str, bytes: Vec<u8>) -> Result<Self, ImageLoadError> {
        if bytes.is_empty() {
            return Err(ImageLoadError::Empty);
        }
        let len = bytes.len();
        Ok(BootImage {
            label: label.to_string(),
            segments: vec![Segment {
                file_offset: 0,
                file_size: len,
                mem_offset: 0,
                mem_size: len as u64,
            }],
            bytes,
            format: ImageFormat::Raw,
            entry_offset: 0,
            span: len as u64,
        })
    }

    /// Raw イメージのエントリ位置を指定する（ELF は自前のエントリを持つので不可）。
    pub fn with_entry_offset(self, entry_offset: u64) -> Result<Self, ImageLoadError> {
        if self.format != ImageFormat::Raw {
            return Err(ImageLoadError::Malformed("ELF images carry their own entry point"));
        }
        if entry_offset >= self.span || entry_offset % 2 != 0 {
            return Err(ImageLoadError::Malformed("entry offset outside the image"));
        }
        Ok(BootImage { entry_offset, ..self })
    }

    fn elf(label: &str, bytes: Vec<u8>) -> Result<Self, ImageLoadError> {
        if bytes.len() < ELF64_HEADER_SIZE {
            return Err(ImageLoadError::Malformed("truncated ELF header"));
        }
        if bytes[5] != ELFDATA2LSB {
            return Err(ImageLoadError::Malformed("not a little-endian ELF"));
        }
        if read_u16(&bytes, 16) != ET_EXEC {
            return Err(ImageLoadError::Malformed("not an executable ELF"));
        }
        if read_u16(&bytes, 18) != EM_RISCV {
            return Err(ImageLoadError::Malformed("not a RISC-V ELF"));
        }
        check_program_headers(&bytes)?;

        let elf = Elf::from_bytes(&bytes).map_err(|e| {
            log::debug!("{}: ELF parse failed: {:?}", label, e);
            ImageLoadError::Malformed("unparsable ELF")
        })?;
        let elf64 = match elf {
            Elf::Elf64(e) => e,
            Elf::Elf32(_) => return Err(ImageLoadError::Malformed("not a 64-bit ELF")),
        };
        let entry = elf64.elf_header().entry_point();

        let mut loads: Vec<LoadSegment> = Vec::new();
        for phdr in elf64.program_header_iter() {
            if phdr.ph_type() != ProgramType::LOAD || phdr.memsz() == 0 {
                continue;
            }
            let seg = LoadSegment {
                paddr: phdr.paddr(),
                vaddr: phdr.vaddr(),
                file_offset: phdr.offset() as usize,
                file_size: phdr.filesz() as usize,
                mem_size: phdr.memsz(),
            };

            if seg.mem_size < seg.file_size as u64 {
                return Err(ImageLoadError::Malformed("segment memsz smaller than filesz"));
            }
            let file_end = seg
                .file_offset
                .checked_add(seg.file_size)
                .ok_or(ImageLoadError::Malformed("segment overflows"))?;
            if file_end > bytes.len() {
                return Err(ImageLoadError::Malformed("segment past end of file"));
            }
            if seg.paddr.checked_add(seg.mem_size).is_none()
                || seg.vaddr.checked_add(seg.mem_size).is_none()
            {
                return Err(ImageLoadError::Malformed("segment address overflows"));
            }
            loads.push(seg);
        }

        let lowest = loads
            .iter()
            .map(|l| l.paddr)
            .min()
            .ok_or(ImageLoadError::Malformed("no loadable segments"))?;
        let highest = loads.iter().map(|l| l.paddr + l.mem_size).max().unwrap_or(lowest);

        // e_entry は仮想アドレス。含む区画の p_paddr へ引き直す（恒等写像なら値は変わらない）
        let entry_paddr = loads
            .iter()
            .find(|l| entry >= l.vaddr && entry - l.vaddr < l.mem_size)
            .map(|l| l.paddr + (entry - l.vaddr))
            .ok_or(ImageLoadError::Malformed("entry point outside loadable segments"))?;
        log::debug!(
            "{}: {} loadable segments, paddr {:#x}..{:#x}, entry {:#x} (paddr {:#x})",
            label,
            loads.len(),
            lowest,
            highest,
            entry,
            entry_paddr
        );

        let segments = loads
            .into_iter()
            .map(|l| Segment {
                file_offset: l.file_offset,
                file_size: l.file_size,
                mem_offset: l.paddr - lowest,
                mem_size: l.mem_size,
            })
            .collect();

        Ok(BootImage {
            label: label.to_string(),
            bytes,
            format: ImageFormat::Elf,
            segments,
            entry_offset: entry_paddr - lowest,
            span: highest - lowest,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// 配置に必要なバイト数（BSS を含む）
    pub fn size(&self) -> u64 {
        self.span
    }

    pub fn entry_offset(&self) -> u64 {
        self.entry_offset
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_bytes(&self, segment: &Segment) -> &[u8] {
        &self.bytes[segment.file_offset..segment.file_offset + segment.file_size]
    }
}

/// PT_LOAD 1 つぶん
struct LoadSegment {
    paddr: u64,
    vaddr: u64,
    file_offset: usize,
    file_size: usize,
    mem_size: u64,
}

/// プログラムヘッダ表がファイル内に収まっているか（elf_rs に渡す前に確認する）
fn check_program_headers(bytes: &[u8]) -> Result<(), ImageLoadError> {
    let phoff = read_u64(bytes, 32) as usize;
    let phentsize = read_u16(bytes, 54) as usize;
    let phnum = read_u16(bytes, 56) as usize;
    if phentsize != ELF64_PHDR_SIZE {
        return Err(ImageLoadError::Malformed("unexpected program header size"));
    }
    let table_end = phnum
        .checked_mul(ELF64_PHDR_SIZE)
        .and_then(|n| n.checked_add(phoff))
        .ok_or(ImageLoadError::Malformed("program header table overflows"))?;
    if table_end > bytes.len() {
        return Err(ImageLoadError::Malformed("program header table past end of file"));
    }
    Ok(())
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(b)
}
