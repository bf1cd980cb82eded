// board/src/mem/address_map.rs
//
// 役割:
// - ボード 1 種類ぶんの物理アドレスマップ（Region の順序付き集合）を保持する。
//
// やること:
// - 構築時に「重なり」「部分領域のはみ出し」「アドレス溢れ」を検出する。
// - resolve(role) による純粋な参照。
// - DRAM サイズの確定（with_ram_size）は新しいマップを返す。元のマップは変えない。
//
// やらないこと:
// - 実行時の変更。組み立て後は読み取り専用で、ロック無しで複数 hart から参照してよい。
//
// [不変条件]
// 1. 同じマップ内の任意の 2 領域は重ならない（サイズ未確定の DRAM は確定後に検査）。
// 2. SubRegion は必ず親領域の内側にあり、兄弟同士は重ならない。
// 3. 同じ DeviceRole は 1 度しか現れない。

use crate::error::{AddressingError, ConfigError, Result};
use crate::mem::addr::PAGE_SIZE;
use crate::mem::region::{DeviceRole, Region, SubRegion};
use crate::types::{range_contains, ranges_overlap, PhysAddr};

#[derive(Clone, Debug)]
pub struct AddressMap {
    name: &'static str,
    regions: Vec<Region>,
    sub_regions: Vec<SubRegion>,
}

impl AddressMap {
    pub fn new(
        name: &'static str,
        regions: &[Region],
        sub_regions: &[SubRegion],
    ) -> core::result::Result<Self, AddressingError> {
        let map = AddressMap {
            name,
            regions: regions.to_vec(),
            sub_regions: sub_regions.to_vec(),
        };
        map.validate()?;
        Ok(map)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(&self, role: DeviceRole) -> core::result::Result<Region, AddressingError> {
        self.regions
            .iter()
            .find(|r| r.role == role)
            .copied()
            .ok_or(AddressingError::UnknownRole(role))
    }

    /// サイズ 0（未確定）なら SizeUndetermined。
    pub fn size_of(&self, role: DeviceRole) -> core::result::Result<u64, AddressingError> {
        self.resolve(role)?.size()
    }

    pub fn has(&self, role: DeviceRole) -> bool {
        self.regions.iter().any(|r| r.role == role)
    }

    pub fn sub_region(
        &self,
        parent: DeviceRole,
        name: &'static str,
    ) -> core::result::Result<SubRegion, AddressingError> {
        self.sub_regions
            .iter()
            .find(|s| s.parent == parent && s.name == name)
            .copied()
            .ok_or(AddressingError::UnknownSubRegion { parent, name })
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn sub_regions(&self) -> impl Iterator<Item = &SubRegion> {
        self.sub_regions.iter()
    }

    /// 全ての領域のサイズが確定しているか
    pub fn is_fixed(&self) -> bool {
        self.regions.iter().all(Region::is_sized)
    }

    /// アドレスデコード: addr を含む領域を返す。
    pub fn find(&self, addr: PhysAddr) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// DRAM サイズを確定させたマップを返す。
    ///
    /// - 0 や PAGE_SIZE 非整列のサイズは ConfigError。
    /// - 確定後のマップを再検査する（DRAM が他領域や空間末尾にぶつからないか）。
    pub fn with_ram_size(&self, ram_size: u64) -> Result<AddressMap> {
        if ram_size == 0 {
            return Err(ConfigError::RamSizeZero.into());
        }
        if ram_size % PAGE_SIZE != 0 {
            return Err(ConfigError::RamSizeUnaligned(ram_size).into());
        }

        let dram = self.resolve(DeviceRole::Dram)?;
        let mut fixed = self.clone();
        for r in fixed.regions.iter_mut() {
            if r.role == DeviceRole::Dram {
                *r = dram.with_size(ram_size);
            }
        }
        fixed.validate()?;
        Ok(fixed)
    }

    fn validate(&self) -> core::result::Result<(), AddressingError> {
        for (i, a) in self.regions.iter().enumerate() {
            if a.is_sized() {
                a.end()?;
            }
            for b in self.regions.iter().skip(i + 1) {
                if a.role == b.role {
                    return Err(AddressingError::Overlap { first: a.role, second: b.role });
                }
                if ranges_overlap(a.base, a.declared_size(), b.base, b.declared_size()) {
                    return Err(AddressingError::Overlap { first: a.role, second: b.role });
                }
            }
        }

        for (i, s) in self.sub_regions.iter().enumerate() {
            let parent = self.resolve(s.parent)?;
            if s.size == 0 || !range_contains(parent.base, parent.declared_size(), s.base, s.size) {
                return Err(AddressingError::SubRegionOutside { parent: s.parent, name: s.name });
            }
            for t in self.sub_regions.iter().skip(i + 1) {
                if t.parent == s.parent && ranges_overlap(s.base, s.size, t.base, t.size) {
                    return Err(AddressingError::SubRegionOverlap {
                        parent: s.parent,
                        first: s.name,
                        second: t.name,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROM: Region = Region::new(DeviceRole::Rom, "rom", 0x0, 0x4_0000);
    const UART: Region = Region::new(DeviceRole::Uart0, "uart0", 0x5_0000, 0x1_0000);
    const DRAM: Region = Region::new(DeviceRole::Dram, "dram", 0x8000_0000, 0);

    #[test]
    fn dram_size_is_undetermined_until_fixed() {
        let map = AddressMap::new("t", &[ROM, UART, DRAM], &[]).unwrap();
        assert_eq!(
            map.size_of(DeviceRole::Dram),
            Err(AddressingError::SizeUndetermined(DeviceRole::Dram))
        );
        assert!(!map.is_fixed());

        let fixed = map.with_ram_size(0x4000_0000).unwrap();
        assert_eq!(fixed.size_of(DeviceRole::Dram), Ok(0x4000_0000));
        assert!(fixed.is_fixed());
        // 元のマップは変わらない
        assert!(!map.is_fixed());
    }

    #[test]
    fn unknown_role() {
        let map = AddressMap::new("t", &[ROM], &[]).unwrap();
        assert_eq!(
            map.resolve(DeviceRole::Plic),
            Err(AddressingError::UnknownRole(DeviceRole::Plic))
        );
    }

    #[test]
    fn fixing_ram_rechecks_overlap() {
        let high = Region::new(DeviceRole::Plic, "plic", 0x9000_0000, 0x1000);
        let map = AddressMap::new("t", &[DRAM, high], &[]).unwrap();
        assert!(map.with_ram_size(0x0800_0000).is_ok());
        assert!(map.with_ram_size(0x2000_0000).is_err());
    }

    #[test]
    fn find_decodes_addresses() {
        let map = AddressMap::new("t", &[ROM, UART], &[]).unwrap();
        assert_eq!(map.find(0x5_0010).map(|r| r.role), Some(DeviceRole::Uart0));
        assert!(map.find(0x4_0000).is_none());
    }
}
