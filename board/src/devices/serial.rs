// board/src/devices/serial.rs
//
// 役割:
// - 16550 互換 UART の生成パラメータと、ホスト側キャラクタバックエンド。
//
// やること:
// - CharBackend: バイト列の出入口（抽象）。
// - CharBackendPool: 「次に使えるバックエンド」を 1 回だけ払い出す。
//   ホスト資源は排他なので、払い出したものは pool から消える。
//
// やらないこと:
// - UART のバイト単位プロトコル（外部部品）
// - バックエンドのライフサイクル管理（払い出したら持ち主の責務）

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use spin::Mutex;

use super::{DeviceId, IrqLine};
use crate::types::PhysAddr;

/// レジスタのバイト順（Nanhu 系は little のみ）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
}

/// ボード固定の UART 設定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UartConfig {
    pub reg_shift: u32,
    pub baudbase: u32,
    pub endianness: Endianness,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialParams {
    pub name: &'static str,
    pub base: PhysAddr,
    pub size: u64,
    pub config: UartConfig,
    pub irq: IrqLine,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialHandle {
    pub device: DeviceId,
    pub irq: IrqLine,
    pub backend_label: String,
}

/// ホストのバイトストリーム（sink / source）
pub trait CharBackend: Send {
    fn label(&self) -> &str;
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;
    /// 読めるものが無ければ 0
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 何もつながっていないバックエンド（書き込みは捨てる）
pub struct NullBackend;

impl CharBackend for NullBackend {
    fn label(&self) -> &str {
        "null"
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        Ok(bytes.len())
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

/// プロセスの stdin / stdout
pub struct StdioBackend;

impl CharBackend for StdioBackend {
    fn label(&self) -> &str {
        "stdio"
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }
}

#[derive(Default)]
struct BufferInner {
    tx: Vec<u8>,
    rx: VecDeque<u8>,
}

/// メモリ上のバッファ。観測用 handle を clone して外から中身を見る。
#[derive(Clone)]
pub struct BufferBackend {
    label: String,
    inner: Arc<Mutex<BufferInner>>,
}

impl BufferBackend {
    pub fn new(label: &str) -> Self {
        BufferBackend {
            label: label.to_string(),
            inner: Arc::new(Mutex::new(BufferInner::default())),
        }
    }

    /// ゲスト側が書いたバイト列
    pub fn transmitted(&self) -> Vec<u8> {
        self.inner.lock().tx.clone()
    }

    /// ゲスト側に読ませるバイト列を積む
    pub fn feed(&self, bytes: &[u8]) {
        self.inner.lock().rx.extend(bytes.iter().copied());
    }
}

impl CharBackend for BufferBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.inner.lock().tx.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        let n = buf.len().min(inner.rx.len());
        for (slot, b) in buf.iter_mut().zip(inner.rx.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

/// ホストのキャラクタバックエンド置き場（serial_hd(0), serial_hd(1), ... の順）
pub struct CharBackendPool {
    slots: Mutex<VecDeque<Box<dyn CharBackend>>>,
}

impl CharBackendPool {
    pub fn new() -> Self {
        CharBackendPool {
            slots: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_stdio() -> Self {
        let pool = CharBackendPool::new();
        pool.push(Box::new(StdioBackend));
        pool
    }

    pub fn push(&self, backend: Box<dyn CharBackend>) {
        self.slots.lock().push_back(backend);
    }

    /// 次に使えるバックエンドを払い出す。以後 pool には残らない。
    pub fn take_next(&self) -> Option<Box<dyn CharBackend>> {
        self.slots.lock().pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Default for CharBackendPool {
    fn default() -> Self {
        CharBackendPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_each_backend_once() {
        let pool = CharBackendPool::new();
        pool.push(Box::new(BufferBackend::new("a")));
        pool.push(Box::new(NullBackend));

        assert_eq!(pool.take_next().map(|b| b.label().to_string()), Some("a".into()));
        assert_eq!(pool.take_next().map(|b| b.label().to_string()), Some("null".into()));
        assert!(pool.take_next().is_none());
    }

    #[test]
    fn buffer_backend_is_shared() {
        let probe = BufferBackend::new("uart0");
        let mut backend: Box<dyn CharBackend> = Box::new(probe.clone());
        backend.write(b"OpenSBI").unwrap();
        probe.feed(b"y");

        let mut buf = [0u8; 4];
        assert_eq!(backend.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'y');
        assert_eq!(probe.transmitted(), b"OpenSBI");
    }
}
