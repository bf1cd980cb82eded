// board/src/boot/locator.rs
//
// BootImageLocator: ファームウェア -> カーネル -> デバイスツリーの順に配置を決め、DRAM に書く。
//
// 手順（前の結果に依存するので順番固定）:
// 1. place_firmware   : DRAM 先頭（またはボード既定のファームウェア位置）。終端は命令境界に切り上げ。
//                       無ければ end_addr = dram_base。
// 2. place_kernel     : end_addr を xlen ごとの境界（RV64: 2MiB / RV32: 4MiB）に切り上げた位置。
//                       無ければ entry = 0（= ファームウェアが実行時に決める）。
// 3. place_device_tree: DRAM 上端付近（3GiB 未満に収まるよう上限あり）から size + margin 分下げて 2MiB 境界へ。
//                       壊れている / 収まらない / 他のイメージと重なる -> DeviceTree の ImageLoad エラー。
//
// デバイスツリーの有無はファームウェア・カーネルの有無と独立。
// ボード方針が「必須」なのに無い場合だけ ConfigError。

use crate::boot::fdt_blob::DeviceTreeBlob;
use crate::boot::image::BootImage;
use crate::boot::plan::{BootPlan, DeviceTreePlacement, FirmwarePlacement, KernelPlacement};
use crate::devices::HartConfig;
use crate::error::{BoardError, ConfigError, ImageKind, ImageLoadError, Result};
use crate::logging::trace;
use crate::machine::BootPolicy;
use crate::mem::Dram;
use crate::types::{align_down, checked_align_up, ranges_overlap, PhysAddr};

pub struct BootImageLocator<'a> {
    board: &'static str,
    policy: BootPolicy,
    dram: &'a mut Dram,
    plan: BootPlan,
}

impl<'a> BootImageLocator<'a> {
    pub fn new(board: &'static str, policy: BootPolicy, dram: &'a mut Dram) -> Self {
        BootImageLocator {
            board,
            policy,
            dram,
            plan: BootPlan::new(),
        }
    }

    pub fn dram_base(&self) -> PhysAddr {
        self.dram.base()
    }

    pub fn plan(&self) -> &BootPlan {
        &self.plan
    }

    /// 戻り値はファームウェアの終端（無ければ dram_base）
    pub fn place_firmware(&mut self, image: Option<&BootImage>) -> Result<PhysAddr> {
        let dram_base = self.dram.base();
        let Some(image) = image else {
            self.plan.decide_firmware(None)?;
            return Ok(dram_base);
        };

        let base = self.policy.firmware_base.unwrap_or(dram_base);
        let size = image.size();
        let fail = |error| BoardError::image(ImageKind::Firmware, error);

        if !self.dram.contains(base, 1) {
            return Err(fail(ImageLoadError::OutsideDram { addr: base }));
        }
        if !self.dram.contains(base, size) {
            return Err(fail(ImageLoadError::DoesNotFit {
                addr: base,
                size,
                limit: self.dram.end(),
            }));
        }
        let end_addr = checked_align_up(base + size, self.policy.firmware_alignment)
            .ok_or_else(|| fail(ImageLoadError::DoesNotFit { addr: base, size, limit: self.dram.end() }))?;

        load_segments(self.dram, image, base)?;
        self.plan.decide_firmware(Some(FirmwarePlacement {
            load_addr: base,
            size,
            end_addr,
        }))?;

        log::info!("firmware '{}': {:#x}..{:#x}", image.label(), base, base + size);
        trace::trace_image(ImageKind::Firmware, base, size);
        Ok(end_addr)
    }

    /// 戻り値は (load_addr, entry_addr)。カーネルが無ければ None（エントリは 0 扱い）。
    pub fn place_kernel(
        &mut self,
        harts: &HartConfig,
        end_addr: PhysAddr,
        image: Option<&BootImage>,
    ) -> Result<Option<(PhysAddr, PhysAddr)>> {
        let Some(image) = image else {
            self.plan.decide_kernel(None)?;
            return Ok(None);
        };

        let size = image.size();
        let align = self.policy.kernel_alignment(harts.xlen);
        let limit = self.dram.end();
        let fail = |error| BoardError::image(ImageKind::Kernel, error);

        let load_addr = checked_align_up(end_addr, align)
            .ok_or_else(|| fail(ImageLoadError::DoesNotFit { addr: end_addr, size, limit }))?;
        if !self.dram.contains(load_addr, 1) {
            return Err(fail(ImageLoadError::OutsideDram { addr: load_addr }));
        }
        if !self.dram.contains(load_addr, size) {
            return Err(fail(ImageLoadError::DoesNotFit { addr: load_addr, size, limit }));
        }
        let entry_addr = load_addr + image.entry_offset();

        load_segments(self.dram, image, load_addr)?;
        self.plan.decide_kernel(Some(KernelPlacement {
            load_addr,
            entry_addr,
            size,
        }))?;

        log::info!(
            "kernel '{}': {:#x}..{:#x} entry={:#x} ({} harts)",
            image.label(),
            load_addr,
            load_addr + size,
            entry_addr,
            harts.count
        );
        trace::trace_image(ImageKind::Kernel, load_addr, size);
        Ok(Some((load_addr, entry_addr)))
    }

    /// 戻り値はデバイスツリーの最終アドレス（無ければ None）
    pub fn place_device_tree(&mut self, blob: Option<&DeviceTreeBlob>) -> Result<Option<PhysAddr>> {
        let Some(blob) = blob else {
            if self.policy.require_device_tree {
                return Err(ConfigError::MissingDeviceTree(self.board).into());
            }
            self.plan.decide_device_tree(None)?;
            return Ok(None);
        };

        let dram_base = self.dram.base();
        let dram_end = self.dram.end();
        let size = blob.size();
        let fail = |error| BoardError::image(ImageKind::DeviceTree, error);

        // 32bit でも届く位置に置く
        let top = if dram_base < self.policy.fdt_ceiling {
            dram_end.min(self.policy.fdt_ceiling)
        } else {
            dram_end
        };
        // blob の後ろに fdt_margin 以上の隙間を残す
        let reserved = size
            .checked_add(self.policy.fdt_margin)
            .filter(|&r| r <= top - dram_base)
            .ok_or_else(|| fail(ImageLoadError::DoesNotFit { addr: dram_base, size, limit: top }))?;
        let addr = align_down(top - reserved, self.policy.fdt_alignment);
        if addr < dram_base {
            return Err(fail(ImageLoadError::DoesNotFit { addr: dram_base, size, limit: top }));
        }

        if let Some(k) = self.plan.kernel() {
            if ranges_overlap(addr, size, k.load_addr, k.size) {
                return Err(fail(ImageLoadError::Overlaps { addr, size, other: ImageKind::Kernel }));
            }
        }
        if let Some(fw) = self.plan.firmware() {
            if ranges_overlap(addr, size, fw.load_addr, fw.size) {
                return Err(fail(ImageLoadError::Overlaps { addr, size, other: ImageKind::Firmware }));
            }
        }

        self.dram.write(addr, blob.bytes())?;
        self.plan
            .decide_device_tree(Some(DeviceTreePlacement { load_addr: addr, size }))?;

        log::info!("device tree: {:#x}..{:#x}", addr, addr + size);
        trace::trace_image(ImageKind::DeviceTree, addr, size);
        Ok(Some(addr))
    }

    /// 3 段階すべて決まった計画を返す。
    pub fn finish(self) -> Result<BootPlan> {
        if !self.plan.is_finalized() {
            return Err(ConfigError::InvalidTransition {
                from: "partial boot plan",
                to: "finalized boot plan",
            }
            .into());
        }
        Ok(self.plan)
    }
}

/// セグメントを base からの相対位置に書き、BSS を 0 にする。
fn load_segments(dram: &mut Dram, image: &BootImage, base: PhysAddr) -> Result<()> {
    for seg in image.segments() {
        let at = base + seg.mem_offset;
        dram.write(at, image.segment_bytes(seg))?;
        let bss = seg.mem_size - seg.file_size as u64;
        if bss > 0 {
            dram.zero(at + seg.file_size as u64, bss)?;
        }
    }
    Ok(())
}
