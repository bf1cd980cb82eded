// board/src/logging/console.rs
//
// stderr への最小限の行出力。
// - write_record(): "[LEVEL] target: message" を 1 行で書く
// - 行の途中で他スレッドの出力が混ざらないよう、1 行ぶん組み立ててから書く
//
// stdout は UART0 の StdioBackend が使うので、ログは stderr に分ける。

use core::fmt;
use std::io::{self, Write};

use log::Level;

fn prefix(level: Level) -> &'static str {
    match level {
        Level::Error => "[ERROR] ",
        Level::Warn => "[WARN] ",
        Level::Info => "[INFO] ",
        Level::Debug => "[DEBUG] ",
        Level::Trace => "[TRACE] ",
    }
}

pub(super) fn write_record(level: Level, target: &str, args: &fmt::Arguments<'_>) {
    let line = format!("{}{}: {}\n", prefix(level), target, args);
    // 書けなくても組み立ては止めない
    let _ = io::stderr().lock().write_all(line.as_bytes());
}

pub(super) fn flush() {
    let _ = io::stderr().lock().flush();
}
