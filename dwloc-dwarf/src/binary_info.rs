//! ロケーション評価用のバイナリ情報

use crate::{DwarfLoader, DwarfReader, Result};
use std::path::Path;

/// 1つの関数を評価するためのバイナリ情報
///
/// 関数が属するコンパイルユニットだけを展開して保持する。
pub struct BinaryInfo {
    loader: DwarfLoader,
    unit: gimli::Unit<DwarfReader>,
    function_offset: gimli::UnitOffset,
}

impl BinaryInfo {
    /// バイナリを読み込み、`die_offset` の関数を含むユニットを展開する
    pub fn load<P: AsRef<Path>>(path: P, die_offset: gimli::DebugInfoOffset) -> Result<Self> {
        let loader = DwarfLoader::load(path)?;
        let (unit, function_offset) = Self::unit_containing(loader.dwarf(), die_offset)?;
        Ok(Self {
            loader,
            unit,
            function_offset,
        })
    }

    fn unit_containing(
        dwarf: &gimli::Dwarf<DwarfReader>,
        die_offset: gimli::DebugInfoOffset,
    ) -> Result<(gimli::Unit<DwarfReader>, gimli::UnitOffset)> {
        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            if let Some(offset) = die_offset.to_unit_offset(&header) {
                return Ok((dwarf.unit(header)?, offset));
            }
        }
        Err(anyhow::anyhow!(
            "No compilation unit contains DIE at offset 0x{:x}",
            die_offset.0
        ))
    }

    /// DWARFコンテキスト
    pub fn dwarf(&self) -> &gimli::Dwarf<DwarfReader> {
        self.loader.dwarf()
    }

    /// 関数を含むコンパイルユニット
    pub fn unit(&self) -> &gimli::Unit<DwarfReader> {
        &self.unit
    }

    /// ユニット内での関数DIEのオフセット
    pub fn function_offset(&self) -> gimli::UnitOffset {
        self.function_offset
    }

    /// 読み込んだローダー
    pub fn loader(&self) -> &DwarfLoader {
        &self.loader
    }
}
