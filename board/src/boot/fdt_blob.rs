// board/src/boot/fdt_blob.rs
//
// デバイスツリー blob（FDT）の受け取り口。
// - 検査するのは構造上の整合（ヘッダ、各ブロックが totalsize に収まるか）だけ。
//   中身が正しいハードウェア記述かどうかは見ない。
// - ヘッダの解釈は fdt クレートに任せ、ブロック境界と構造ブロックのトークン列は自前で確認する。
//   （fdt のノード走査は壊れた入力で panic しうるので、渡す前にここで弾く）

use std::fs;
use std::path::Path;

use fdt::Fdt;

use crate::error::ImageLoadError;

const FDT_HEADER_SIZE: usize = 40;
const FDT_MIN_COMPAT_VERSION: u32 = 16;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

#[derive(Clone, Debug)]
pub struct DeviceTreeBlob {
    bytes: Vec<u8>,
}

impl DeviceTreeBlob {
    /// 末尾の余りは totalsize で切り詰める。
    pub fn parse(mut bytes: Vec<u8>) -> Result<Self, ImageLoadError> {
        if bytes.is_empty() {
            return Err(ImageLoadError::Empty);
        }
        if bytes.len() < FDT_HEADER_SIZE {
            return Err(ImageLoadError::Malformed("truncated device tree header"));
        }

        let total = {
            let fdt = Fdt::new(&bytes)
                .map_err(|_| ImageLoadError::Malformed("bad device tree header"))?;
            fdt.total_size()
        };

        let field = |off: usize| u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
        let off_struct = field(8) as usize;
        let off_strings = field(12) as usize;
        let off_rsvmap = field(16) as usize;
        let last_comp_version = field(24);
        let size_strings = field(32) as usize;
        let size_struct = field(36) as usize;

        if total < FDT_HEADER_SIZE {
            return Err(ImageLoadError::Malformed("device tree totalsize smaller than header"));
        }
        if last_comp_version > 17 || field(20) < FDT_MIN_COMPAT_VERSION {
            return Err(ImageLoadError::Malformed("unsupported device tree version"));
        }
        let within = |off: usize, len: usize| {
            off >= FDT_HEADER_SIZE && off.checked_add(len).map_or(false, |end| end <= total)
        };
        if !within(off_rsvmap, 16) {
            return Err(ImageLoadError::Malformed("memory reservation block out of bounds"));
        }
        if !within(off_struct, size_struct) || size_struct < 4 {
            return Err(ImageLoadError::Malformed("structure block out of bounds"));
        }
        if !within(off_strings, size_strings) {
            return Err(ImageLoadError::Malformed("strings block out of bounds"));
        }
        if off_struct % 4 != 0 {
            return Err(ImageLoadError::Malformed("misaligned structure block"));
        }
        walk_struct_block(&bytes[off_struct..off_struct + size_struct], size_strings)?;

        bytes.truncate(total);
        Ok(DeviceTreeBlob { bytes })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ImageLoadError::Unreadable {
            path: path.display().to_string(),
            kind: e.kind(),
        })?;
        Self::parse(bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn be32_at(block: &[u8], pos: usize) -> Result<u32, ImageLoadError> {
    block
        .get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ImageLoadError::Malformed("structure block truncated"))
}

const fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

/// 構造ブロックのトークン列を最後まで辿る。
///
/// 受け付ける形:
///   NOP* BEGIN_NODE(root) { PROP | NOP | BEGIN_NODE ... END_NODE }* END_NODE NOP* END
/// END はブロックの最後の 4 バイトでなければならない。
fn walk_struct_block(block: &[u8], size_strings: usize) -> Result<(), ImageLoadError> {
    let mut pos = 0usize;
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        let token = be32_at(block, pos)?;
        pos += 4;
        match token {
            FDT_BEGIN_NODE => {
                if depth == 0 && root_seen {
                    return Err(ImageLoadError::Malformed("more than one root node"));
                }
                root_seen = true;
                depth += 1;
                let name_len = block[pos.min(block.len())..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(ImageLoadError::Malformed("unterminated node name"))?;
                pos += pad4(name_len + 1);
            }
            FDT_END_NODE => {
                if depth == 0 {
                    return Err(ImageLoadError::Malformed("unbalanced END_NODE"));
                }
                depth -= 1;
            }
            FDT_PROP => {
                if depth == 0 {
                    return Err(ImageLoadError::Malformed("property outside any node"));
                }
                let len = be32_at(block, pos)? as usize;
                let name_off = be32_at(block, pos + 4)? as usize;
                if name_off >= size_strings {
                    return Err(ImageLoadError::Malformed("property name outside strings block"));
                }
                pos = pos
                    .checked_add(8 + pad4(len))
                    .filter(|&p| p <= block.len())
                    .ok_or(ImageLoadError::Malformed("property value truncated"))?;
            }
            FDT_NOP => {}
            FDT_END => {
                if !root_seen || depth != 0 {
                    return Err(ImageLoadError::Malformed("END before the root node closed"));
                }
                if pos != block.len() {
                    return Err(ImageLoadError::Malformed("data after END in structure block"));
                }
                return Ok(());
            }
            _ => return Err(ImageLoadError::Malformed("unknown structure block token")),
        }
        if pos > block.len() {
            return Err(ImageLoadError::Malformed("structure block truncated"));
        }
    }
}
