// board/src/lib.rs
//
// board: 固定構成の RISC-V ボード（Nanhu 系 SoC）を組み立てるライブラリ。
//
// - mem      : 物理アドレスマップ、ブート ROM、DRAM
// - devices  : 外部部品の生成パラメータと能力インタフェース
// - machine  : ボード記述子と登録表
// - compose  : 部品の生成と割り込み配線
// - boot     : ブートイメージの配置と reset vector
// - platform : 全体の状態機械とランチャ
//
// 命令実行・割り込み調停・UART プロトコルは扱わない。

pub mod boot;
pub mod compose;
pub mod config;
pub mod devices;
pub mod error;
pub mod logging;
pub mod machine;
pub mod mem;
pub mod platform;
pub mod types;

pub use error::{BoardError, Result};
pub use platform::{launch, CompositionFailure, MachineOptions, OrchestratorState, Platform, PlatformOrchestrator};
