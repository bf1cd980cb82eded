// board/src/config.rs
//
// 起動時設定（環境変数）。
//
//   BOARD_NAME      ボード名（既定 bosc-nanhu）
//   BOARD_SMP       hart 数（既定 1）
//   BOARD_RAM       RAM サイズ。10 進 / 0x16 進、K / M / G 接尾辞可（既定はボード既定値）
//   BOARD_FIRMWARE  ファームウェアイメージのパス
//   BOARD_KERNEL    カーネルイメージのパス
//   BOARD_DTB       デバイスツリー blob のパス
//   BOARD_LOG       ログレベル（error / warn / info / debug / trace / off）
//
// コマンドライン解析はしない。

use std::env;
use std::path::PathBuf;

use log::LevelFilter;

use crate::boot::{BootImage, DeviceTreeBlob};
use crate::error::{BoardError, ConfigError, ImageKind};
use crate::logging;
use crate::machine::DEFAULT_BOARD;
use crate::platform::MachineOptions;
use crate::types::{GIB, KIB, MIB};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    pub board: String,
    pub smp: u32,
    pub ram_size: Option<u64>,
    pub firmware: Option<PathBuf>,
    pub kernel: Option<PathBuf>,
    pub device_tree: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LaunchConfig {
            board: DEFAULT_BOARD.to_string(),
            smp: 1,
            ram_size: None,
            firmware: None,
            kernel: None,
            device_tree: None,
            log_level: LevelFilter::Info,
        }
    }
}

impl LaunchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の key -> value 関数から読む（テストは HashMap を渡す）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = LaunchConfig::default();

        if let Some(name) = get("BOARD_NAME") {
            config.board = name.trim().to_string();
        }
        if let Some(smp) = get("BOARD_SMP") {
            config.smp = smp.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                key: "BOARD_SMP",
                value: smp.clone(),
            })?;
        }
        if let Some(ram) = get("BOARD_RAM") {
            config.ram_size = Some(parse_size("BOARD_RAM", &ram)?);
        }
        config.firmware = get("BOARD_FIRMWARE").map(PathBuf::from);
        config.kernel = get("BOARD_KERNEL").map(PathBuf::from);
        config.device_tree = get("BOARD_DTB").map(PathBuf::from);
        if let Some(level) = get("BOARD_LOG") {
            config.log_level = logging::parse_level(&level).ok_or(ConfigError::InvalidSetting {
                key: "BOARD_LOG",
                value: level.clone(),
            })?;
        }

        Ok(config)
    }

    /// イメージを読み込んで MachineOptions にする。
    pub fn machine_options(&self) -> Result<MachineOptions, BoardError> {
        let mut options = MachineOptions::new(self.smp);
        options.ram_size = self.ram_size;

        if let Some(path) = &self.firmware {
            options.firmware =
                Some(BootImage::from_file(path).map_err(|e| BoardError::image(ImageKind::Firmware, e))?);
        }
        if let Some(path) = &self.kernel {
            options.kernel =
                Some(BootImage::from_file(path).map_err(|e| BoardError::image(ImageKind::Kernel, e))?);
        }
        if let Some(path) = &self.device_tree {
            options.device_tree = Some(
                DeviceTreeBlob::from_file(path).map_err(|e| BoardError::image(ImageKind::DeviceTree, e))?,
            );
        }
        Ok(options)
    }
}

/// "8G" / "512M" / "0x40000000" / "1073741824" などを読む。
pub fn parse_size(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        key,
        value: value.to_string(),
    };

    let s = value.trim();
    let (digits, unit) = match s.chars().last() {
        Some('k') | Some('K') => (&s[..s.len() - 1], KIB),
        Some('m') | Some('M') => (&s[..s.len() - 1], MIB),
        Some('g') | Some('G') => (&s[..s.len() - 1], GIB),
        _ => (s, 1),
    };

    let number = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else {
        digits.parse::<u64>().map_err(|_| invalid())?
    };
    number.checked_mul(unit).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn sizes_accept_suffixes_and_hex() {
        assert_eq!(parse_size("BOARD_RAM", "8G"), Ok(8 * GIB));
        assert_eq!(parse_size("BOARD_RAM", "512m"), Ok(512 * MIB));
        assert_eq!(parse_size("BOARD_RAM", "0x40000000"), Ok(GIB));
        assert_eq!(parse_size("BOARD_RAM", "4096"), Ok(4096));
        assert!(parse_size("BOARD_RAM", "lots").is_err());
        assert!(parse_size("BOARD_RAM", "").is_err());
        assert!(parse_size("BOARD_RAM", "99999999999G").is_err());
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = LaunchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LaunchConfig::default());
        assert_eq!(config.board, "bosc-nanhu");
    }

    #[test]
    fn environment_overrides() {
        let config = LaunchConfig::from_lookup(lookup(&[
            ("BOARD_NAME", "bosc-nanhu-fdt"),
            ("BOARD_SMP", "2"),
            ("BOARD_RAM", "1G"),
            ("BOARD_KERNEL", "/tmp/Image"),
            ("BOARD_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.board, "bosc-nanhu-fdt");
        assert_eq!(config.smp, 2);
        assert_eq!(config.ram_size, Some(GIB));
        assert_eq!(config.kernel, Some(PathBuf::from("/tmp/Image")));
        assert_eq!(config.firmware, None);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn bad_smp_is_rejected() {
        let err = LaunchConfig::from_lookup(lookup(&[("BOARD_SMP", "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { key: "BOARD_SMP", .. }));
    }

    #[test]
    fn missing_image_file_is_an_image_load_error() {
        let config = LaunchConfig {
            kernel: Some(PathBuf::from("/nonexistent/board-kernel.bin")),
            ..LaunchConfig::default()
        };
        let err = config.machine_options().unwrap_err();
        assert!(matches!(err, BoardError::ImageLoad { image: ImageKind::Kernel, .. }));
    }
}
