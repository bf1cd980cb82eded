// board/tests/common/mod.rs
//
// テスト用の小さな入力（FDT blob / RISC-V ELF64 / 生イメージ）を組み立てる。

#![allow(dead_code)]

use board::devices::{CharBackendPool, Inventory};
use board::machine::BoardRegistry;
use board::platform::{CompositionFailure, MachineOptions, Platform, PlatformOrchestrator};

pub const DRAM_BASE: u64 = 0x8000_0000;

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// ルートノードだけの FDT（total バイトまで 0 で埋める。total >= 72）
pub fn fdt_blob(total: u32) -> Vec<u8> {
    let mut b = Vec::new();
    be32(&mut b, 0xd00d_feed); // magic
    be32(&mut b, total); // totalsize
    be32(&mut b, 56); // off_dt_struct
    be32(&mut b, 72); // off_dt_strings
    be32(&mut b, 40); // off_mem_rsvmap
    be32(&mut b, 17); // version
    be32(&mut b, 16); // last_comp_version
    be32(&mut b, 0); // boot_cpuid_phys
    be32(&mut b, 0); // size_dt_strings
    be32(&mut b, 16); // size_dt_struct
    b.extend_from_slice(&[0u8; 16]); // 予約領域の終端
    be32(&mut b, 0x1); // FDT_BEGIN_NODE
    be32(&mut b, 0); // name "" (padding 込み)
    be32(&mut b, 0x2); // FDT_END_NODE
    be32(&mut b, 0x9); // FDT_END
    b.resize(total as usize, 0);
    b
}

pub fn minimal_fdt() -> Vec<u8> {
    fdt_blob(72)
}

/// 区別しやすいバイト列
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

pub struct ElfSegment {
    pub paddr: u64,
    pub data: Vec<u8>,
    pub mem_size: u64,
}

/// PT_LOAD だけを持つ RISC-V ELF64 実行ファイル（p_vaddr == p_paddr）
pub fn riscv_elf(entry: u64, segments: &[ElfSegment]) -> Vec<u8> {
    riscv_elf_mapped(entry, segments, 0)
}

/// p_vaddr = p_paddr + virt_offset の ELF（higher-half カーネルなど）
pub fn riscv_elf_mapped(entry: u64, segments: &[ElfSegment], virt_offset: u64) -> Vec<u8> {
    const EHDR: usize = 64;
    const PHDR: usize = 56;
    let data_start = EHDR + PHDR * segments.len();

    let mut out = vec![0u8; data_start];
    out[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    out[4] = 2; // ELFCLASS64
    out[5] = 1; // little-endian
    out[6] = 1; // EV_CURRENT
    out[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out[18..20].copy_from_slice(&243u16.to_le_bytes()); // EM_RISCV
    out[20..24].copy_from_slice(&1u32.to_le_bytes());
    out[24..32].copy_from_slice(&entry.to_le_bytes());
    out[32..40].copy_from_slice(&(EHDR as u64).to_le_bytes()); // e_phoff
    out[52..54].copy_from_slice(&(EHDR as u16).to_le_bytes());
    out[54..56].copy_from_slice(&(PHDR as u16).to_le_bytes());
    out[56..58].copy_from_slice(&(segments.len() as u16).to_le_bytes());

    let mut offset = data_start;
    for (i, seg) in segments.iter().enumerate() {
        let ph = EHDR + i * PHDR;
        out[ph..ph + 4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        out[ph + 4..ph + 8].copy_from_slice(&5u32.to_le_bytes()); // R+X
        out[ph + 8..ph + 16].copy_from_slice(&(offset as u64).to_le_bytes());
        out[ph + 16..ph + 24].copy_from_slice(&seg.paddr.wrapping_add(virt_offset).to_le_bytes());
        out[ph + 24..ph + 32].copy_from_slice(&seg.paddr.to_le_bytes());
        out[ph + 32..ph + 40].copy_from_slice(&(seg.data.len() as u64).to_le_bytes());
        out[ph + 40..ph + 48].copy_from_slice(&seg.mem_size.to_le_bytes());
        out[ph + 48..ph + 56].copy_from_slice(&0x1000u64.to_le_bytes());
        offset += seg.data.len();
    }
    for seg in segments {
        out.extend_from_slice(&seg.data);
    }
    out
}

pub fn run_board<'a>(
    board: &str,
    options: MachineOptions,
    inventory: &'a mut Inventory,
) -> Result<Platform<&'a mut Inventory>, CompositionFailure> {
    let registry = BoardRegistry::builtin().unwrap();
    PlatformOrchestrator::new(&registry, options, inventory, CharBackendPool::new()).run(board)
}
