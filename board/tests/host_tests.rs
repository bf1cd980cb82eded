// board/tests/host_tests.rs
//
// 部品単位のテスト（ホスト上で cargo test）。
//   - AddressMap の重なり検出（生成した領域リストで網羅）
//   - ファームウェア / カーネル配置の単調性
//   - デバイスツリー配置（DRAM 内、カーネルと非交差）
//   - reset vector の決定性と語の中身、ROM の seal
//   - 割り込み配線の一意性、ボード登録表
//   - ELF の再配置、カーネルのバイト列往復
//
// Run: cargo test -p board --test host_tests

mod common;

use board::boot::{BootImage, BootImageLocator, DeviceTreeBlob, ImageFormat, ResetVectorBuilder};
use board::compose::DeviceComposer;
use board::devices::serial::BufferBackend;
use board::devices::{CharBackendPool, DeviceId, Inventory, InterruptWiring, IrqLine};
use board::error::{AddressingError, BoardError, CapacityError, ConfigError, ImageKind, ImageLoadError};
use board::machine::{BoardRegistry, NANHU, NANHU_FDT};
use board::mem::{AddressMap, BootRom, DeviceRole, Dram, Region};
use board::types::{checked_align_up, ranges_overlap, Xlen, GIB, MIB};

use common::{fdt_blob, minimal_fdt, pattern, riscv_elf, riscv_elf_mapped, ElfSegment, DRAM_BASE};

// ─── Helper: 決定的な疑似乱数（xorshift） ──────────────────────────

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn nanhu_dram(ram_size: u64) -> Dram {
    let map = NANHU.address_map().unwrap().with_ram_size(ram_size).unwrap();
    Dram::new(&map.resolve(DeviceRole::Dram).unwrap()).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// 1. AddressMap
// ═══════════════════════════════════════════════════════════════════

#[test]
fn overlap_detection_matches_brute_force() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

    for _ in 0..2000 {
        let count = 2 + rng.below(5) as usize;
        let regions: Vec<Region> = DeviceRole::ALL[..count]
            .iter()
            .map(|&role| {
                // 小さな空間に詰めて衝突を起こりやすくする
                let base = rng.below(64) * 0x1000;
                let size = (1 + rng.below(8)) * 0x1000;
                Region::new(role, "r", base, size)
            })
            .collect();

        let mut expect_overlap = false;
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                if ranges_overlap(a.base, a.declared_size(), b.base, b.declared_size()) {
                    expect_overlap = true;
                }
            }
        }

        match AddressMap::new("generated", &regions, &[]) {
            Ok(_) => assert!(!expect_overlap, "missed overlap in {:?}", regions),
            Err(AddressingError::Overlap { .. }) => {
                assert!(expect_overlap, "false overlap in {:?}", regions)
            }
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }
}

#[test]
fn touching_regions_do_not_overlap() {
    let regions = [
        Region::new(DeviceRole::Rom, "rom", 0x0, 0x1000),
        Region::new(DeviceRole::Uart0, "uart0", 0x1000, 0x1000),
    ];
    assert!(AddressMap::new("t", &regions, &[]).is_ok());
}

#[test]
fn sub_regions_must_stay_inside_the_parent() {
    use board::mem::SubRegion;
    let clint = Region::new(DeviceRole::Clint, "clint", 0x200_0000, 0x1_0000);

    let inside = [SubRegion::new(DeviceRole::Clint, "swi", 0x200_0000, 0x4000)];
    let map = AddressMap::new("t", &[clint], &inside).unwrap();
    assert_eq!(map.sub_regions().map(|s| s.name).collect::<Vec<_>>(), ["swi"]);

    let outside = [SubRegion::new(DeviceRole::Clint, "mtimer", 0x200_c000, 0x8000)];
    assert_eq!(
        AddressMap::new("t", &[clint], &outside).unwrap_err(),
        AddressingError::SubRegionOutside { parent: DeviceRole::Clint, name: "mtimer" }
    );

    let siblings = [
        SubRegion::new(DeviceRole::Clint, "a", 0x200_0000, 0x4000),
        SubRegion::new(DeviceRole::Clint, "b", 0x200_2000, 0x4000),
    ];
    assert!(matches!(
        AddressMap::new("t", &[clint], &siblings),
        Err(AddressingError::SubRegionOverlap { .. })
    ));
}

#[test]
fn dram_size_undetermined_before_composition() {
    let map = NANHU.address_map().unwrap();
    assert_eq!(
        map.size_of(DeviceRole::Dram),
        Err(AddressingError::SizeUndetermined(DeviceRole::Dram))
    );
    assert_eq!(map.resolve(DeviceRole::Uart0).unwrap().base, 0x5_0000);
}

// ═══════════════════════════════════════════════════════════════════
// 2. BootImageLocator
// ═══════════════════════════════════════════════════════════════════

#[test]
fn kernel_follows_firmware_monotonically() {
    let harts = NANHU.hart_config(1);
    let sizes = [1u64, 3, 4, 0x1000, 0x1_0000, 0x1_0001, 0x1f_ffff, 0x20_0000, 0x20_0001, 0x30_0000];

    for &fw_size in &sizes {
        let mut dram = nanhu_dram(GIB);
        let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);

        let fw = BootImage::raw("fw", vec![0x6f; fw_size as usize]).unwrap();
        let end = locator.place_firmware(Some(&fw)).unwrap();
        assert!(end >= DRAM_BASE + fw_size);
        assert_eq!(end % 4, 0);
        assert!(end - (DRAM_BASE + fw_size) < 4);

        let kernel = BootImage::raw("Image", vec![0x13; 0x1000]).unwrap();
        let (load, entry) = locator.place_kernel(&harts, end, Some(&kernel)).unwrap().unwrap();
        assert!(load >= end, "fw {:#x}: kernel {:#x} below {:#x}", fw_size, load, end);
        assert_eq!(load % (2 * MIB), 0);
        assert_eq!(load, checked_align_up(end, 2 * MIB).unwrap());
        assert_eq!(entry, load);
    }
}

#[test]
fn rv32_kernels_use_4mib_alignment() {
    let harts = NANHU.hart_config(1);
    let rv32 = board::devices::HartConfig { xlen: Xlen::Rv32, ..harts };

    let mut dram = nanhu_dram(GIB);
    let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
    let fw = BootImage::raw("fw", vec![0x6f; 0x1000]).unwrap();
    let end = locator.place_firmware(Some(&fw)).unwrap();
    let kernel = BootImage::raw("Image", vec![0x13; 0x100]).unwrap();
    let (load, _) = locator.place_kernel(&rv32, end, Some(&kernel)).unwrap().unwrap();
    assert_eq!(load, DRAM_BASE + 4 * MIB);
}

#[test]
fn absent_kernel_has_entry_zero() {
    let mut dram = nanhu_dram(GIB);
    let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
    let end = locator.place_firmware(None).unwrap();
    assert_eq!(end, DRAM_BASE);
    assert_eq!(locator.place_kernel(&NANHU.hart_config(1), end, None).unwrap(), None);
    assert_eq!(locator.place_device_tree(None).unwrap(), None);
    let plan = locator.finish().unwrap();
    assert_eq!(plan.kernel_entry(), 0);
}

#[test]
fn placement_order_is_enforced() {
    let mut dram = nanhu_dram(GIB);
    let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
    // ファームウェアの前にカーネルは決められない
    assert!(matches!(
        locator.place_kernel(&NANHU.hart_config(1), DRAM_BASE, None),
        Err(BoardError::Configuration(ConfigError::InvalidTransition { .. }))
    ));
    locator.place_firmware(None).unwrap();
    assert!(locator.place_firmware(None).is_err());
    // 途中までの計画は完成扱いにならない
    assert!(locator.finish().is_err());
}

#[test]
fn device_tree_stays_inside_dram_and_clear_of_the_kernel() {
    let harts = NANHU.hart_config(1);
    let ram_sizes = [64 * MIB, 256 * MIB, GIB, 2 * GIB, 8 * GIB];
    let dtb_sizes = [72u32, 0x1000, 0x1_0000, 0x10_0001];

    for &ram in &ram_sizes {
        for &dtb_size in &dtb_sizes {
            let mut dram = nanhu_dram(ram);
            let dram_end = dram.end();
            let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);

            let end = locator.place_firmware(None).unwrap();
            let kernel = BootImage::raw("Image", vec![0x13; 0x80_0000]).unwrap();
            let (k_load, _) = locator.place_kernel(&harts, end, Some(&kernel)).unwrap().unwrap();

            let blob = DeviceTreeBlob::parse(fdt_blob(dtb_size)).unwrap();
            let addr = locator.place_device_tree(Some(&blob)).unwrap().unwrap();
            let size = blob.size();

            assert!(addr >= DRAM_BASE);
            assert!(addr + size <= dram_end);
            assert!(addr + size <= 3 * GIB);
            assert!(addr + size + NANHU.policy.fdt_margin <= dram_end.min(3 * GIB));
            assert_eq!(addr % (2 * MIB), 0);
            assert!(!ranges_overlap(addr, size, k_load, kernel.size()));
        }
    }
}

#[test]
fn device_tree_larger_than_dram_does_not_fit() {
    let mut dram = nanhu_dram(MIB);
    let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
    locator.place_firmware(None).unwrap();
    locator.place_kernel(&NANHU.hart_config(1), DRAM_BASE, None).unwrap();

    let blob = DeviceTreeBlob::parse(fdt_blob(0x20_0000)).unwrap();
    let err = locator.place_device_tree(Some(&blob)).unwrap_err();
    assert!(err.is_device_tree_load_error());
}

#[test]
fn device_tree_keeps_a_gap_below_the_ceiling() {
    // 2MiB ちょうどの blob でも上端にぴったり付けない
    let top = nanhu_dram(GIB).end();
    for size in [0x20_0000u32, 0x40_0000] {
        let blob = DeviceTreeBlob::parse(fdt_blob(size)).unwrap();
        let mut dram = nanhu_dram(GIB);
        let mut locator = BootImageLocator::new("bosc-nanhu-fdt", NANHU_FDT.policy, &mut dram);
        locator.place_firmware(None).unwrap();
        locator.place_kernel(&NANHU_FDT.hart_config(1), DRAM_BASE, None).unwrap();
        let addr = locator.place_device_tree(Some(&blob)).unwrap().unwrap();

        assert!(addr + blob.size() < top);
        assert!(top - (addr + blob.size()) >= NANHU_FDT.policy.fdt_margin);
        assert_eq!(addr % (2 * MIB), 0);
    }
    assert_eq!(top, 0xc000_0000);
}

#[test]
fn kernel_bytes_round_trip_through_dram() {
    let image = pattern(0x5123, 42);
    let kernel = BootImage::raw("Image", image.clone()).unwrap();

    let mut dram = nanhu_dram(GIB);
    {
        let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
        let end = locator.place_firmware(None).unwrap();
        let (load, _) = locator
            .place_kernel(&NANHU.hart_config(1), end, Some(&kernel))
            .unwrap()
            .unwrap();
        assert_eq!(load, DRAM_BASE);
    }
    assert_eq!(dram.read(DRAM_BASE, image.len()).unwrap(), image);
}

// ═══════════════════════════════════════════════════════════════════
// 3. ブートイメージ / デバイスツリーの入力検査
// ═══════════════════════════════════════════════════════════════════

#[test]
fn elf_segments_are_relocated_to_the_load_address() {
    let text = pattern(16, 9);
    let data = vec![0xaa; 8];
    let elf = riscv_elf(
        0x8020_0004,
        &[
            ElfSegment { paddr: 0x8020_0000, data: text.clone(), mem_size: 16 },
            ElfSegment { paddr: 0x8020_1000, data: data.clone(), mem_size: 0x100 },
        ],
    );
    let kernel = BootImage::from_bytes("vmlinux", elf).unwrap();
    assert_eq!(kernel.format(), ImageFormat::Elf);
    assert_eq!(kernel.size(), 0x1100);
    assert_eq!(kernel.entry_offset(), 4);

    let mut dram = nanhu_dram(GIB);
    // 先にゴミを書いておき、BSS が 0 に戻ることを確かめる
    dram.write(DRAM_BASE + 0x1008, &[0xff; 0x20]).unwrap();
    {
        let mut locator = BootImageLocator::new("bosc-nanhu", NANHU.policy, &mut dram);
        let end = locator.place_firmware(None).unwrap();
        let (load, entry) = locator
            .place_kernel(&NANHU.hart_config(1), end, Some(&kernel))
            .unwrap()
            .unwrap();
        assert_eq!(load, DRAM_BASE);
        assert_eq!(entry, DRAM_BASE + 4);
    }
    assert_eq!(dram.read(DRAM_BASE, 16).unwrap(), text);
    assert_eq!(dram.read(DRAM_BASE + 0x1000, 8).unwrap(), data);
    assert_eq!(dram.read(DRAM_BASE + 0x1008, 0xf8).unwrap(), vec![0u8; 0xf8]);
}

#[test]
fn elf_entry_outside_segments_is_malformed() {
    let elf = riscv_elf(
        0x9000_0000,
        &[ElfSegment { paddr: 0x8020_0000, data: vec![0; 16], mem_size: 16 }],
    );
    assert!(matches!(
        BootImage::from_bytes("vmlinux", elf),
        Err(ImageLoadError::Malformed(_))
    ));
}

#[test]
fn higher_half_elf_entry_is_translated_to_its_physical_segment() {
    const VIRT_OFFSET: u64 = 0xffff_ffff_0000_0000;
    let elf = riscv_elf_mapped(
        0x8020_1010u64.wrapping_add(VIRT_OFFSET),
        &[
            ElfSegment { paddr: 0x8020_0000, data: pattern(0x40, 1), mem_size: 0x40 },
            ElfSegment { paddr: 0x8020_1000, data: pattern(0x40, 2), mem_size: 0x40 },
        ],
        VIRT_OFFSET,
    );
    let kernel = BootImage::from_bytes("vmlinux", elf).unwrap();
    assert_eq!(kernel.entry_offset(), 0x1010);
    assert_eq!(kernel.size(), 0x1040);

    // 物理アドレスとしては範囲内でも、仮想アドレスとして含む区画が無ければ不正
    let stray = riscv_elf_mapped(
        0x8020_0000,
        &[ElfSegment { paddr: 0x8020_0000, data: vec![0; 16], mem_size: 16 }],
        VIRT_OFFSET,
    );
    assert!(matches!(
        BootImage::from_bytes("vmlinux", stray),
        Err(ImageLoadError::Malformed(_))
    ));
}

#[test]
fn raw_entry_offset_must_be_inside_the_image() {
    let img = BootImage::raw("Image", vec![0; 0x100]).unwrap();
    assert_eq!(img.clone().with_entry_offset(0x40).unwrap().entry_offset(), 0x40);
    assert!(img.with_entry_offset(0x100).is_err());
}

#[test]
fn device_tree_blob_is_checked_and_trimmed() {
    let mut padded = minimal_fdt();
    padded.extend_from_slice(&[0xee; 32]);
    let blob = DeviceTreeBlob::parse(padded).unwrap();
    assert_eq!(blob.size(), 72);
    assert_eq!(blob.bytes(), &minimal_fdt()[..]);

    let mut bad_magic = minimal_fdt();
    bad_magic[0] = 0;
    assert!(matches!(DeviceTreeBlob::parse(bad_magic), Err(ImageLoadError::Malformed(_))));

    assert_eq!(DeviceTreeBlob::parse(Vec::new()).unwrap_err(), ImageLoadError::Empty);
    assert!(DeviceTreeBlob::parse(minimal_fdt()[..20].to_vec()).is_err());

    // 構造ブロックが totalsize をはみ出す
    let mut bad_struct = minimal_fdt();
    bad_struct[36..40].copy_from_slice(&0x100u32.to_be_bytes());
    assert!(matches!(DeviceTreeBlob::parse(bad_struct), Err(ImageLoadError::Malformed(_))));
}

#[test]
fn device_tree_structure_tokens_are_walked() {
    // 構造ブロック: 56 BEGIN_NODE / 60 "" / 64 END_NODE / 68 END
    let set = |blob: &mut Vec<u8>, off: usize, token: u32| {
        blob[off..off + 4].copy_from_slice(&token.to_be_bytes());
    };

    let mut garbage = minimal_fdt();
    set(&mut garbage, 56, 0xdead_beef);
    set(&mut garbage, 68, 0xdead_beef);
    assert!(matches!(DeviceTreeBlob::parse(garbage), Err(ImageLoadError::Malformed(_))));

    // ルートが閉じないまま END
    let mut unclosed = minimal_fdt();
    set(&mut unclosed, 64, 0x4);
    assert!(matches!(DeviceTreeBlob::parse(unclosed), Err(ImageLoadError::Malformed(_))));

    // END が無い
    let mut no_end = minimal_fdt();
    set(&mut no_end, 68, 0x4);
    assert!(matches!(DeviceTreeBlob::parse(no_end), Err(ImageLoadError::Malformed(_))));

    // 先頭の NOP は許す: 56 NOP / 60 BEGIN_NODE / 64 "" / 68 END_NODE / 72 END
    let mut nop_first = minimal_fdt();
    set(&mut nop_first, 56, 0x4);
    set(&mut nop_first, 60, 0x1);
    set(&mut nop_first, 64, 0);
    set(&mut nop_first, 68, 0x2);
    nop_first.extend_from_slice(&0x9u32.to_be_bytes());
    set(&mut nop_first, 4, 76); // totalsize
    set(&mut nop_first, 12, 76); // off_dt_strings
    set(&mut nop_first, 36, 20); // size_dt_struct
    assert_eq!(DeviceTreeBlob::parse(nop_first).unwrap().size(), 76);
}

// ═══════════════════════════════════════════════════════════════════
// 4. ResetVectorBuilder
// ═══════════════════════════════════════════════════════════════════

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn nanhu_rom_region() -> Region {
    NANHU.address_map().unwrap().resolve(DeviceRole::Rom).unwrap()
}

#[test]
fn reset_vector_words_for_rv64() {
    let builder = ResetVectorBuilder::new(Xlen::Rv64).with_next_stage(0x8020_0000);
    let v = builder.build(&nanhu_rom_region(), 0x8000_0000, 0xbfe0_0000).unwrap();
    assert_eq!(v.len(), 88);

    let w = words(v.bytes());
    assert_eq!(
        &w[..10],
        &[
            0x0000_0297, // auipc t0, 0
            0x0282_8613, // addi a2, t0, 40
            0xf140_2573, // csrr a0, mhartid
            0x0202_b583, // ld a1, 32(t0)
            0x0182_b283, // ld t0, 24(t0)
            0x0002_8067, // jr t0
            0x8000_0000,
            0x0000_0000,
            0xbfe0_0000,
            0x0000_0000,
        ]
    );
    // fw_dynamic_info
    assert_eq!(&w[10..12], &[0x4942_534f, 0]); // magic "OSBI"
    assert_eq!(&w[12..14], &[2, 0]); // version
    assert_eq!(&w[14..16], &[0x8020_0000, 0]); // next_addr
    assert_eq!(&w[16..18], &[1, 0]); // next_mode = S
    assert_eq!(&w[18..22], &[0, 0, 0, 0]); // options, boot_hart
}

#[test]
fn reset_vector_words_for_rv32() {
    let v = ResetVectorBuilder::new(Xlen::Rv32)
        .build(&nanhu_rom_region(), 0x8000_0000, 0x8220_0000)
        .unwrap();
    assert_eq!(v.len(), 64);
    let w = words(v.bytes());
    assert_eq!(w[3], 0x0202_a583); // lw a1, 32(t0)
    assert_eq!(w[4], 0x0182_a283); // lw t0, 24(t0)
    assert_eq!(w[8], 0x8220_0000);
    assert_eq!(w[10], 0x4942_534f);
}

#[test]
fn rv32_reset_vector_rejects_addresses_above_4gib() {
    let rom = nanhu_rom_region();
    let builder = ResetVectorBuilder::new(Xlen::Rv32);
    assert!(builder.build(&rom, 0xffff_fffc, 0).is_ok());
    assert!(matches!(
        builder.build(&rom, 0x1_0000_0000, 0),
        Err(BoardError::Configuration(ConfigError::InvalidSetting { .. }))
    ));
    assert!(matches!(
        builder.build(&rom, DRAM_BASE, 0x2_bfe0_0000),
        Err(BoardError::Configuration(ConfigError::InvalidSetting { .. }))
    ));
    assert!(builder
        .with_next_stage(0x1_8020_0000)
        .build(&rom, DRAM_BASE, 0)
        .is_err());

    // RV64 はそのまま 64bit で書く
    let v = ResetVectorBuilder::new(Xlen::Rv64).build(&rom, 0x1_0000_0000, 0).unwrap();
    assert_eq!(&words(v.bytes())[6..8], &[0, 1]);
}

#[test]
fn reset_vector_is_deterministic() {
    let rom = nanhu_rom_region();
    let mut rng = XorShift(42);
    for _ in 0..200 {
        let entry = rng.next();
        let dtb = rng.next();
        let next = rng.next();
        let builder = ResetVectorBuilder::new(Xlen::Rv64).with_next_stage(next);
        let a = builder.build(&rom, entry, dtb).unwrap();
        let b = builder.build(&rom, entry, dtb).unwrap();
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(a, b);
    }
}

#[test]
fn reset_vector_needs_room_in_rom() {
    let tiny = Region::new(DeviceRole::Rom, "rom", 0x0, 0x40);
    let err = ResetVectorBuilder::new(Xlen::Rv64).build(&tiny, 0, 0).unwrap_err();
    assert_eq!(
        err,
        BoardError::Capacity(CapacityError::RomTooSmall { required: 88, available: 0x40 })
    );
}

#[test]
fn rom_is_sealed_after_install() {
    let region = nanhu_rom_region();
    let mut rom = BootRom::new(&region).unwrap();
    let builder = ResetVectorBuilder::new(Xlen::Rv64);
    let v = builder.build(&region, DRAM_BASE, 0).unwrap();

    builder.install(&mut rom, 0x0, &v).unwrap();
    assert!(rom.is_sealed());
    assert_eq!(rom.read(0x0, v.bytes().len()).unwrap(), v.bytes());

    assert_eq!(
        builder.install(&mut rom, 0x0, &v).unwrap_err(),
        BoardError::Capacity(CapacityError::RomSealed)
    );
    assert_eq!(rom.write(0x100, &[1]).unwrap_err(), CapacityError::RomSealed);
}

#[test]
fn jump_target_prefers_firmware_then_kernel_then_dram() {
    use board::boot::{BootPlan, FirmwarePlacement, KernelPlacement};

    let mut none = BootPlan::new();
    none.decide_firmware(None).unwrap();
    none.decide_kernel(None).unwrap();
    none.decide_device_tree(None).unwrap();
    assert_eq!(ResetVectorBuilder::entry_for(&none, DRAM_BASE), DRAM_BASE);

    let kernel = KernelPlacement { load_addr: DRAM_BASE, entry_addr: DRAM_BASE + 0x40, size: 0x1000 };
    let mut kernel_only = BootPlan::new();
    kernel_only.decide_firmware(None).unwrap();
    kernel_only.decide_kernel(Some(kernel)).unwrap();
    kernel_only.decide_device_tree(None).unwrap();
    assert_eq!(ResetVectorBuilder::entry_for(&kernel_only, DRAM_BASE), DRAM_BASE + 0x40);

    let fw = FirmwarePlacement { load_addr: DRAM_BASE, size: 0x100, end_addr: DRAM_BASE + 0x100 };
    let mut both = BootPlan::new();
    both.decide_firmware(Some(fw)).unwrap();
    both.decide_kernel(Some(KernelPlacement { load_addr: DRAM_BASE + 2 * MIB, ..kernel })).unwrap();
    both.decide_device_tree(None).unwrap();
    assert_eq!(ResetVectorBuilder::entry_for(&both, DRAM_BASE), DRAM_BASE);
}

// ═══════════════════════════════════════════════════════════════════
// 5. 割り込み配線 / DeviceComposer
// ═══════════════════════════════════════════════════════════════════

#[test]
fn wiring_rejects_shared_inputs_and_double_lines() {
    let plic = DeviceId(1);
    let line = |index| IrqLine { controller: plic, index };
    let mut wiring = InterruptWiring::new();

    wiring.connect(DeviceId(2), 0, line(68)).unwrap();
    assert_eq!(
        wiring.connect(DeviceId(3), 0, line(68)),
        Err(ConfigError::IrqConflict { index: 68 })
    );
    assert_eq!(
        wiring.connect(DeviceId(2), 0, line(69)),
        Err(ConfigError::DuplicateWiring { device: 2, line: 0 })
    );
    wiring.connect(DeviceId(3), 0, line(69)).unwrap();

    assert_eq!(wiring.len(), 2);
    assert_eq!(wiring.driver_of(line(69)), Some((DeviceId(3), 0)));
    // 入力番号はすべて異なる
    let mut inputs: Vec<u32> = wiring.iter().map(|(_, l)| l.index).collect();
    inputs.sort_unstable();
    inputs.dedup();
    assert_eq!(inputs.len(), wiring.len());
}

#[test]
fn composer_attaches_each_part_once() {
    let map = NANHU.address_map().unwrap().with_ram_size(GIB).unwrap();
    let pool = CharBackendPool::new();
    pool.push(Box::new(BufferBackend::new("console")));
    let mut composer = DeviceComposer::new(&NANHU, &map, &pool, Inventory::new());

    // hart より先に PLIC は作れない
    assert!(matches!(
        composer.attach_interrupt_controller(),
        Err(BoardError::Configuration(ConfigError::OutOfOrder { .. }))
    ));

    composer.attach_harts(NANHU.hart_config(1)).unwrap();
    assert_eq!(
        composer.attach_harts(NANHU.hart_config(1)).unwrap_err(),
        BoardError::Configuration(ConfigError::AlreadyAttached("hart array"))
    );

    let plic = composer.attach_interrupt_controller().unwrap();
    assert_eq!(plic.num_sources, 128);

    // 範囲外の入力番号
    assert_eq!(
        composer.attach_serial(&plic, 128).unwrap_err(),
        BoardError::Capacity(CapacityError::IrqLineOutOfRange { index: 128, sources: 128 })
    );
    assert!(composer.attach_serial(&plic, 0).is_err());
    // 失敗した接続ではホスト資源を消費しない
    assert_eq!(pool.remaining(), 1);

    let serial = composer.attach_serial(&plic, 68).unwrap();
    assert_eq!(pool.remaining(), 0);
    assert_eq!(serial.backend_label, "console");
    assert!(composer.attach_serial(&plic, 69).is_err());
    assert_eq!(serial.irq.index, 68);

    // タイマ・ROM・UART1 が揃うまで finish できない
    assert!(matches!(
        composer.finish(),
        Err(BoardError::Configuration(ConfigError::MissingComponent(_)))
    ));
}

#[test]
fn composer_rejects_bad_hart_counts_before_creating_devices() {
    let map = NANHU.address_map().unwrap().with_ram_size(GIB).unwrap();
    let pool = CharBackendPool::new();
    let mut inventory = Inventory::new();
    {
        let mut composer = DeviceComposer::new(&NANHU, &map, &pool, &mut inventory);
        assert_eq!(
            composer.attach_harts(NANHU.hart_config(3)).unwrap_err(),
            BoardError::Capacity(CapacityError::TooManyHarts { requested: 3, max: 2 })
        );
        assert_eq!(
            composer.attach_harts(NANHU.hart_config(0)).unwrap_err(),
            BoardError::Configuration(ConfigError::NoHarts)
        );
    }
    assert!(inventory.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// 6. BoardRegistry
// ═══════════════════════════════════════════════════════════════════

#[test]
fn registry_knows_both_boards() {
    let registry = BoardRegistry::builtin().unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), ["bosc-nanhu", "bosc-nanhu-fdt"]);

    let nanhu = registry.get("bosc-nanhu").unwrap();
    assert_eq!(nanhu.variant.max_harts, 2);
    assert_eq!(nanhu.harts.cpu_type, "bosc-nanhu");
    assert!(!nanhu.policy.require_device_tree);
    assert_eq!(nanhu.map.resolve(DeviceRole::Rom).unwrap().base, 0x0);

    let fdt = registry.get("bosc-nanhu-fdt").unwrap();
    assert!(fdt.policy.require_device_tree);
    assert!(!fdt.map.has(DeviceRole::Uart1));
    assert_eq!(fdt.map.resolve(DeviceRole::Uart0).unwrap().base, 0x1000_0000);

    assert!(matches!(
        registry.get("sifive_u"),
        Err(BoardError::Configuration(ConfigError::UnknownBoard(_)))
    ));
}

#[test]
fn registry_rejects_duplicate_names() {
    let mut registry = BoardRegistry::new();
    registry.register(NANHU_FDT).unwrap();
    assert_eq!(
        registry.register(NANHU_FDT).unwrap_err(),
        BoardError::Configuration(ConfigError::DuplicateBoard("bosc-nanhu-fdt"))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn image_errors_name_the_image() {
    let err = BoardError::image(ImageKind::Firmware, ImageLoadError::Empty);
    assert_eq!(err.to_string(), "firmware load error: image is empty");
    assert!(!err.is_device_tree_load_error());
}
