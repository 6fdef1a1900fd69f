//! 定长二进制布局的读写原语。
//!
//! 链上程序按固定偏移读取这些字段，偏移由前序字段 span 累加得出，
//! 没有任何对齐或填充。所有多字节整数均为小端，带符号整数为补码。

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub const PUBKEY_SPAN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("数据在偏移 {offset:#x} 处长度不足: 需要 {needed} 字节, 实际剩余 {actual}")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        actual: usize,
    },
    #[error("无效的 option 标志: {0}")]
    InvalidOption(u8),
    #[error("无效的 bool 值: {0}")]
    InvalidBool(u8),
    #[error("数值超出字段可表示范围")]
    Overflow,
}

pub type LayoutResult<T> = Result<T, LayoutError>;

fn slice_at(data: &[u8], offset: usize, span: usize) -> LayoutResult<&[u8]> {
    let end = offset.checked_add(span).ok_or(LayoutError::OutOfBounds {
        offset,
        needed: span,
        actual: data.len(),
    })?;
    if end > data.len() {
        return Err(LayoutError::OutOfBounds {
            offset,
            needed: span,
            actual: data.len().saturating_sub(offset.min(data.len())),
        });
    }
    Ok(&data[offset..end])
}

fn slice_at_mut(data: &mut [u8], offset: usize, span: usize) -> LayoutResult<&mut [u8]> {
    let len = data.len();
    let end = offset.checked_add(span).ok_or(LayoutError::OutOfBounds {
        offset,
        needed: span,
        actual: len,
    })?;
    if end > len {
        return Err(LayoutError::OutOfBounds {
            offset,
            needed: span,
            actual: len.saturating_sub(offset.min(len)),
        });
    }
    Ok(&mut data[offset..end])
}

pub fn read_u8(data: &[u8], offset: usize) -> LayoutResult<u8> {
    Ok(slice_at(data, offset, 1)?[0])
}

pub fn write_u8(value: u8, data: &mut [u8], offset: usize) -> LayoutResult<usize> {
    slice_at_mut(data, offset, 1)?[0] = value;
    Ok(1)
}

/// bool 序列化为单字节 0/1，其他取值视为布局损坏。
pub fn read_bool(data: &[u8], offset: usize) -> LayoutResult<bool> {
    match read_u8(data, offset)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LayoutError::InvalidBool(other)),
    }
}

pub fn write_bool(value: bool, data: &mut [u8], offset: usize) -> LayoutResult<usize> {
    write_u8(u8::from(value), data, offset)
}

macro_rules! int_field {
    ($read:ident, $write:ident, $ty:ty, $span:expr) => {
        pub fn $read(data: &[u8], offset: usize) -> LayoutResult<$ty> {
            let raw = slice_at(data, offset, $span)?;
            let mut bytes = [0u8; $span];
            bytes.copy_from_slice(raw);
            Ok(<$ty>::from_le_bytes(bytes))
        }

        pub fn $write(value: $ty, data: &mut [u8], offset: usize) -> LayoutResult<usize> {
            slice_at_mut(data, offset, $span)?.copy_from_slice(&value.to_le_bytes());
            Ok($span)
        }
    };
}

int_field!(read_u32, write_u32, u32, 4);
int_field!(read_u64, write_u64, u64, 8);
int_field!(read_i64, write_i64, i64, 8);
int_field!(read_u128, write_u128, u128, 16);
int_field!(read_i128, write_i128, i128, 16);

pub fn read_pubkey(data: &[u8], offset: usize) -> LayoutResult<Pubkey> {
    let raw = slice_at(data, offset, PUBKEY_SPAN)?;
    let mut bytes = [0u8; PUBKEY_SPAN];
    bytes.copy_from_slice(raw);
    Ok(Pubkey::new_from_array(bytes))
}

pub fn write_pubkey(value: &Pubkey, data: &mut [u8], offset: usize) -> LayoutResult<usize> {
    slice_at_mut(data, offset, PUBKEY_SPAN)?.copy_from_slice(value.as_ref());
    Ok(PUBKEY_SPAN)
}

pub fn read_blob<'a>(data: &'a [u8], offset: usize, span: usize) -> LayoutResult<&'a [u8]> {
    slice_at(data, offset, span)
}

/// 单字节 option: 标志 0 表示缺省且 span 为 1，标志 1 表示存在且
/// span 为内层 span + 1，其余标志视为布局损坏。
pub fn read_option_pubkey(data: &[u8], offset: usize) -> LayoutResult<Option<Pubkey>> {
    match read_u8(data, offset)? {
        0 => Ok(None),
        1 => Ok(Some(read_pubkey(data, offset + 1)?)),
        other => Err(LayoutError::InvalidOption(other)),
    }
}

pub fn write_option_pubkey(
    value: Option<&Pubkey>,
    data: &mut [u8],
    offset: usize,
) -> LayoutResult<usize> {
    match value {
        None => write_u8(0, data, offset),
        Some(key) => {
            write_u8(1, data, offset)?;
            Ok(1 + write_pubkey(key, data, offset + 1)?)
        }
    }
}

/// SPL 风格的 COption: 4 字节小端标志 + 定长负载。
pub fn read_coption_pubkey(data: &[u8], offset: usize) -> LayoutResult<Option<Pubkey>> {
    match read_u32(data, offset)? {
        0 => Ok(None),
        1 => Ok(Some(read_pubkey(data, offset + 4)?)),
        other => Err(LayoutError::InvalidOption((other & 0xff) as u8)),
    }
}

/// 将宽整数收窄为 u64 字段值，超界视为编码域错误。
pub fn u64_from_u128(value: u128) -> LayoutResult<u64> {
    u64::try_from(value).map_err(|_| LayoutError::Overflow)
}

/// 将带符号整数收窄为 u64 字段值，负数与超界均越出无符号域。
pub fn u64_from_i128(value: i128) -> LayoutResult<u64> {
    u64::try_from(value).map_err(|_| LayoutError::Overflow)
}
