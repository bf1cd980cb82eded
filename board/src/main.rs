// board/src/main.rs
//
// ランチャ: 環境変数で指定されたボードを組み立て、結果を報告して終わる。
// - 失敗は診断を 1 行出して終了コード 1
// - 組み立て後の実行（命令実行）はこのプロセスの外

use std::process;

use board::config::LaunchConfig;
use board::devices::{CharBackendPool, Inventory};
use board::error::Stage;
use board::logging;
use board::machine::BoardRegistry;
use board::platform::{self, CompositionFailure};

fn main() {
    logging::init();

    let config = match LaunchConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("configuration error: {}", e);
            process::exit(1);
        }
    };
    log::set_max_level(config.log_level);

    let registry = match BoardRegistry::builtin() {
        Ok(r) => r,
        Err(e) => {
            logging::error(&e.to_string());
            process::exit(1);
        }
    };

    let options = match config.machine_options() {
        Ok(o) => o,
        Err(error) => {
            let failure = CompositionFailure {
                stage: Stage::PlaceImages,
                error,
            };
            log::error!("{}", failure);
            process::exit(1);
        }
    };

    let result = platform::launch(
        &registry,
        &config.board,
        options,
        Inventory::new(),
        CharBackendPool::with_stdio(),
    );

    if let Ok(p) = &result {
        logging::info_kv("devices", p.backend().len() as u64);
        logging::info_kv("interrupt lines", p.wiring().len() as u64);
        logging::info_kv("entry", p.reset_vector().entry_addr());
        logging::info_kv("dtb", p.reset_vector().dtb_addr());
    }
    process::exit(platform::exit_status(&result));
}
