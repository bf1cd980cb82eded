// board/src/boot/reset_vec.rs
//
// ResetVectorBuilder: ROM 先頭に置く小さな踏み台（trampoline）を合成する。
//
// 配置（ROM 先頭からのオフセット）:
//   0x00  auipc t0, 0          ; t0 = ROM base
//   0x04  addi  a2, t0, 0x28   ; a2 = &fw_dynamic_info
//   0x08  csrr  a0, mhartid    ; a0 = hart id
//   0x0c  ld/lw a1, 0x20(t0)   ; a1 = デバイスツリーのアドレス
//   0x10  ld/lw t0, 0x18(t0)   ; t0 = ジャンプ先
//   0x14  jr    t0
//   0x18  .dword entry
//   0x20  .dword dtb
//   0x28  fw_dynamic_info      ; ファームウェアが「自分の次に飛ぶ先」を知るための情報
//
// - 書き込みは組み立て中に 1 回だけ。書いたら ROM を seal する。
// - 入力が同じなら出力バイト列も同じ（決定的）。

use crate::boot::plan::BootPlan;
use crate::error::{AddressingError, CapacityError, ConfigError, Result};
use crate::mem::{BootRom, Region};
use crate::types::{PhysAddr, Xlen};

const AUIPC_T0: u32 = 0x0000_0297;
const ADDI_A2_T0_FW_DYN: u32 = 0x0282_8613; // addi a2, t0, 40
const CSRR_A0_MHARTID: u32 = 0xf140_2573;
const LD_A1_32_T0: u32 = 0x0202_b583;
const LD_T0_24_T0: u32 = 0x0182_b283;
const LW_A1_32_T0: u32 = 0x0202_a583;
const LW_T0_24_T0: u32 = 0x0182_a283;
const JR_T0: u32 = 0x0002_8067;

/// 踏み台部分（命令 6 語 + アドレス 2 dword）
pub const TRAMPOLINE_SIZE: u64 = 40;

/// fw_dynamic_info
const FW_DYNAMIC_INFO_MAGIC: u64 = 0x4942_534f; // "OSBI"
const FW_DYNAMIC_INFO_VERSION: u64 = 2;
const FW_DYNAMIC_INFO_NEXT_MODE_S: u64 = 1;
const FW_DYNAMIC_INFO_WORDS: u64 = 6;

/// 合成済みの reset vector（ROM にそのまま書くバイト列）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetVector {
    bytes: Vec<u8>,
    entry_addr: PhysAddr,
    dtb_addr: PhysAddr,
}

impl ResetVector {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn entry_addr(&self) -> PhysAddr {
        self.entry_addr
    }

    pub fn dtb_addr(&self) -> PhysAddr {
        self.dtb_addr
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResetVectorBuilder {
    xlen: Xlen,
    /// fw_dynamic_info.next_addr（カーネルエントリ。無ければ 0）
    next_addr: PhysAddr,
}

impl ResetVectorBuilder {
    pub fn new(xlen: Xlen) -> Self {
        ResetVectorBuilder { xlen, next_addr: 0 }
    }

    pub fn with_next_stage(self, next_addr: PhysAddr) -> Self {
        ResetVectorBuilder { next_addr, ..self }
    }

    /// ジャンプ先の決め方:
    /// - ファームウェアがあればその先頭（カーネルエントリは next_addr で渡る）
    /// - カーネルだけならカーネルエントリ
    /// - どちらも無ければ DRAM 先頭
    pub fn entry_for(plan: &BootPlan, dram_base: PhysAddr) -> PhysAddr {
        match (plan.firmware(), plan.kernel()) {
            (Some(fw), _) => fw.load_addr,
            (None, Some(k)) => k.entry_addr,
            (None, None) => dram_base,
        }
    }

    pub fn size(&self) -> u64 {
        TRAMPOLINE_SIZE + FW_DYNAMIC_INFO_WORDS * self.xlen.word_bytes()
    }

    pub fn build(&self, rom: &Region, entry_addr: PhysAddr, dtb_addr: PhysAddr) -> Result<ResetVector> {
        let available = rom.size()?;
        let required = self.size();
        if required > available {
            return Err(CapacityError::RomTooSmall { required, available }.into());
        }

        let (load_a1, load_t0) = match self.xlen {
            Xlen::Rv32 => (LW_A1_32_T0, LW_T0_24_T0),
            Xlen::Rv64 => (LD_A1_32_T0, LD_T0_24_T0),
        };
        // RV32 の lw は 32bit しか読めない。切り詰めずに拒否する
        if self.xlen == Xlen::Rv32 {
            for (key, addr) in [
                ("rv32 entry address", entry_addr),
                ("rv32 device tree address", dtb_addr),
                ("rv32 next stage address", self.next_addr),
            ] {
                if addr > u64::from(u32::MAX) {
                    return Err(ConfigError::InvalidSetting {
                        key,
                        value: format!("{:#x}", addr),
                    }
                    .into());
                }
            }
        }

        let words = [
            AUIPC_T0,
            ADDI_A2_T0_FW_DYN,
            CSRR_A0_MHARTID,
            load_a1,
            load_t0,
            JR_T0,
            entry_addr as u32,
            (entry_addr >> 32) as u32,
            dtb_addr as u32,
            (dtb_addr >> 32) as u32,
        ];

        let mut bytes = Vec::with_capacity(required as usize);
        for w in words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }

        let info = [
            FW_DYNAMIC_INFO_MAGIC,
            FW_DYNAMIC_INFO_VERSION,
            self.next_addr,
            FW_DYNAMIC_INFO_NEXT_MODE_S,
            0, // options
            0, // boot_hart
        ];
        for v in info {
            match self.xlen {
                Xlen::Rv32 => bytes.extend_from_slice(&(v as u32).to_le_bytes()),
                Xlen::Rv64 => bytes.extend_from_slice(&v.to_le_bytes()),
            }
        }
        debug_assert_eq!(bytes.len() as u64, required);

        Ok(ResetVector {
            bytes,
            entry_addr,
            dtb_addr,
        })
    }

    /// hart の reset vector アドレス（ROM 内）へ書き込み、ROM を seal する。
    /// 踏み台は auipc 相対なので、ROM 内のどこに置いても同じバイト列で動く。
    pub fn install(&self, rom: &mut BootRom, at: PhysAddr, vector: &ResetVector) -> Result<()> {
        let offset = at
            .checked_sub(rom.base())
            .ok_or(AddressingError::Unmapped { addr: at, len: vector.len() })?;
        rom.write(offset, vector.bytes())?;
        rom.seal();
        Ok(())
    }
}
