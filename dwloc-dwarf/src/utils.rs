//! DWARF解析のユーティリティ関数

use crate::{DwarfReader, Result};
use gimli::Reader;

/// 文字列属性を取り出す
///
/// 属性が無ければ `None`。`.debug_str` などへの参照も解決する。
pub fn attr_string(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    entry: &gimli::DebuggingInformationEntry<DwarfReader>,
    attr: gimli::DwAt,
) -> Result<Option<String>> {
    let value = match entry.attr_value(attr)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let s = dwarf.attr_string(unit, value)?;
    Ok(Some(s.to_string_lossy()?.into_owned()))
}

/// フラグ属性が立っているか
pub fn attr_flag(
    entry: &gimli::DebuggingInformationEntry<DwarfReader>,
    attr: gimli::DwAt,
) -> Result<bool> {
    Ok(matches!(
        entry.attr_value(attr)?,
        Some(gimli::AttributeValue::Flag(true))
    ))
}
