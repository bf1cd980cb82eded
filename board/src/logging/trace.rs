// board/src/logging/trace.rs
//
// 組み立ての経過 trace を 1 箇所に集約する。
// - 状態遷移（Unconfigured -> ... -> Ready）を trace できる
// - ブートイメージの配置先を trace できる
//
// feature:
// - boot_trace_stages: 状態遷移 trace を有効化
// - boot_trace_images: 配置 trace を有効化（boot_trace_stages を内包）
//
// feature off のときは何も出さず、引数も捨てるだけ。

use crate::error::ImageKind;
use crate::types::PhysAddr;

/// 状態遷移 trace（from -> to）
#[inline(always)]
pub fn trace_stage(from: &'static str, to: &'static str) {
    #[cfg(feature = "boot_trace_stages")]
    {
        log::info!(target: "boot_trace", "stage {} -> {}", from, to);
    }
    #[cfg(not(feature = "boot_trace_stages"))]
    {
        let _ = from;
        let _ = to;
    }
}

/// 配置 trace（種別 / 先頭 / サイズ）
#[inline(always)]
pub fn trace_image(kind: ImageKind, addr: PhysAddr, size: u64) {
    #[cfg(feature = "boot_trace_images")]
    {
        match kind {
            ImageKind::Firmware => crate::logging::info("boot_trace image=firmware"),
            ImageKind::Kernel => crate::logging::info("boot_trace image=kernel"),
            ImageKind::DeviceTree => crate::logging::info("boot_trace image=device_tree"),
        }
        crate::logging::info_kv("addr", addr);
        crate::logging::info_kv("size", size);
    }
    #[cfg(not(feature = "boot_trace_images"))]
    {
        let _ = kind;
        let _ = addr;
        let _ = size;
    }
}
