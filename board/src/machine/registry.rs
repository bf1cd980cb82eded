// board/src/machine/registry.rs
//
// 役割:
// - ボード名 -> (AddressMap, HartConfig, BootPolicy) の明示的な対応表。
//
// 設計方針:
// - プロセス初期化時に値として組み立て、ランチャが問い合わせる。
//   静的な登録順序に依存する仕組みは持たない。
// - 登録時に記述子の整合を検査するので、ここで通ったボードは
//   「デバイスが 1 つも作られる前」に設定ミスが見つかっている。

use std::collections::BTreeMap;

use super::variant::{BoardVariant, BootPolicy, NANHU, NANHU_FDT};
use crate::devices::HartConfig;
use crate::error::{ConfigError, Result};
use crate::mem::AddressMap;

pub const DEFAULT_BOARD: &str = "bosc-nanhu";

pub struct BoardEntry {
    pub variant: BoardVariant,
    pub map: AddressMap,
    pub harts: HartConfig,
    pub policy: BootPolicy,
}

#[derive(Default)]
pub struct BoardRegistry {
    entries: BTreeMap<&'static str, BoardEntry>,
}

impl BoardRegistry {
    pub fn new() -> Self {
        BoardRegistry::default()
    }

    /// 組み込みボードを登録済みの registry
    pub fn builtin() -> Result<Self> {
        let mut registry = BoardRegistry::new();
        registry.register(NANHU)?;
        registry.register(NANHU_FDT)?;
        Ok(registry)
    }

    pub fn register(&mut self, variant: BoardVariant) -> Result<()> {
        if self.entries.contains_key(variant.name) {
            return Err(ConfigError::DuplicateBoard(variant.name).into());
        }

        let map = variant.address_map()?;
        let entry = BoardEntry {
            harts: variant.harts,
            policy: variant.policy,
            map,
            variant,
        };
        self.entries.insert(variant.name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&BoardEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownBoard(name.to_string()).into())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
