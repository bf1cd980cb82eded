// board/src/logging/mod.rs
//
// ログ出力の入口。
// - log クレートの facade に Logger を 1 つだけ登録する（init / init_with_level）。
// - 出力先は console（stderr）。1 行 = "[LEVEL] target: message"。
// - 直接呼ぶ用の info / error / info_kv も残す（trace.rs はこれだけ使う）。

mod console;
pub mod trace;

use log::{LevelFilter, Log, Metadata, Record};

struct BoardLogger;

static LOGGER: BoardLogger = BoardLogger;

impl Log for BoardLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        console::write_record(record.level(), record.target(), record.args());
    }

    fn flush(&self) {
        console::flush();
    }
}

/// 既定レベル（Info）で初期化する。2 回目以降は何もしない。
pub fn init() {
    init_with_level(LevelFilter::Info);
}

pub fn init_with_level(level: LevelFilter) {
    // 既に誰かが logger を登録済みならそちらを使う（テストで複数回呼ばれる）
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// "error" / "warn" / "info" / "debug" / "trace" / "off"
pub fn parse_level(s: &str) -> Option<LevelFilter> {
    s.trim().parse::<LevelFilter>().ok()
}

pub fn info(msg: &str) {
    log::info!(target: "board", "{}", msg);
}

pub fn error(msg: &str) {
    log::error!(target: "board", "{}", msg);
}

pub fn info_kv(key: &str, value: u64) {
    if key.is_empty() {
        log::info!(target: "board", "{:#x}", value);
        return;
    }
    log::info!(target: "board", "{} = {:#x}", key, value);
}
