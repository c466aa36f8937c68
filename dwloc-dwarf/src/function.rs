//! 関数の位置特定
//!
//! シンボルテーブルから関数のアドレス範囲を求め、DWARFの
//! `DW_TAG_subprogram` を名前で探して両者を `FunctionInfo` にまとめる。

use crate::utils::{attr_flag, attr_string};
use crate::{DwarfLoader, DwarfReader, Result, Symbol, SymbolResolver, VariableDescriptor};

/// 解析対象の関数
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// 関数名（ユーザーが指定したもの）
    pub name: String,
    /// `.debug_info` 内の subprogram DIE のオフセット
    pub die_offset: gimli::DebugInfoOffset,
    /// DIEの `DW_AT_low_pc`（無ければ0）
    pub low_pc: u64,
    /// シンボルの開始アドレス
    pub symbol_address: u64,
    /// シンボルのサイズ（バイト）
    pub symbol_size: u64,
    /// 追跡対象の引数とローカル変数（DWARFの出現順）
    pub variables: Vec<VariableDescriptor>,
}

impl FunctionInfo {
    /// 逆アセンブル範囲の終端（この値は含まない）
    pub fn stop_address(&self) -> u64 {
        self.symbol_address.saturating_add(self.symbol_size)
    }
}

/// 関数検索の結果
#[derive(Debug)]
pub enum FunctionLookup {
    /// シンボルとDWARFの両方で見つかった
    Found(FunctionInfo),
    /// シンボルテーブルに無い（またはアドレスが0）
    NoSymbol,
    /// シンボルはあるが subprogram DIE が無い
    NoSubprogram(Symbol),
}

/// 見つかった subprogram DIE
struct Subprogram {
    offset: gimli::DebugInfoOffset,
    low_pc: u64,
}

/// 関数ロケーター
pub struct FunctionLocator<'a> {
    loader: &'a DwarfLoader,
}

impl<'a> FunctionLocator<'a> {
    /// 関数ロケーターを作成する
    pub fn new(loader: &'a DwarfLoader) -> Self {
        Self { loader }
    }

    /// 関数名からシンボルとDWARFの情報を探す
    pub fn locate(&self, name: &str) -> Result<FunctionLookup> {
        let symbol = match SymbolResolver::new(self.loader).find_function(name) {
            Some(symbol) if symbol.address != 0 => symbol.clone(),
            _ => return Ok(FunctionLookup::NoSymbol),
        };
        tracing::debug!(
            "symbol {} covers [0x{:x}, 0x{:x})",
            symbol.name,
            symbol.address,
            symbol.end_address()
        );

        let subprogram = match self.find_subprogram(name, &symbol.name)? {
            Some(subprogram) => subprogram,
            None => return Ok(FunctionLookup::NoSubprogram(symbol)),
        };
        tracing::info!(
            "found function {} at offset {:x} lowpc {:x}",
            name,
            subprogram.offset.0,
            subprogram.low_pc
        );

        Ok(FunctionLookup::Found(FunctionInfo {
            name: name.to_string(),
            die_offset: subprogram.offset,
            low_pc: subprogram.low_pc,
            symbol_address: symbol.address,
            symbol_size: symbol.size,
            variables: Vec::new(),
        }))
    }

    /// 全コンパイルユニットを前順に走査して subprogram DIE を探す
    ///
    /// 子に降りるのはコンパイルユニットと名前空間だけで、他のDIEの子は読み飛ばす。
    /// 最初に一致したものを返す。
    fn find_subprogram(&self, name: &str, linkage_name: &str) -> Result<Option<Subprogram>> {
        let dwarf = self.loader.dwarf();

        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;
            let mut tree = unit.entries_tree(None)?;
            let root = tree.root()?;

            if root.entry().tag() == gimli::DW_TAG_compile_unit {
                if let Some(cu_name) = attr_string(dwarf, &unit, root.entry(), gimli::DW_AT_name)? {
                    tracing::trace!("compilation unit: {}", cu_name);
                }
            }

            if let Some(subprogram) = self.search_children(&unit, root, name, linkage_name)? {
                return Ok(Some(subprogram));
            }
        }

        Ok(None)
    }

    fn search_children(
        &self,
        unit: &gimli::Unit<DwarfReader>,
        node: gimli::EntriesTreeNode<'_, '_, '_, DwarfReader>,
        name: &str,
        linkage_name: &str,
    ) -> Result<Option<Subprogram>> {
        let mut children = node.children();
        while let Some(child) = children.next()? {
            let tag = child.entry().tag();
            if tag == gimli::DW_TAG_namespace {
                if let Some(found) = self.search_children(unit, child, name, linkage_name)? {
                    return Ok(Some(found));
                }
            } else if tag == gimli::DW_TAG_subprogram {
                if let Some(found) = self.match_subprogram(unit, child.entry(), name, linkage_name)? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    fn match_subprogram(
        &self,
        unit: &gimli::Unit<DwarfReader>,
        entry: &gimli::DebuggingInformationEntry<DwarfReader>,
        name: &str,
        linkage_name: &str,
    ) -> Result<Option<Subprogram>> {
        let dwarf = self.loader.dwarf();

        // 宣言だけのDIEには命令が無い
        if attr_flag(entry, gimli::DW_AT_declaration)? {
            return Ok(None);
        }

        let low_pc = match entry.attr_value(gimli::DW_AT_low_pc)? {
            Some(value) => dwarf.attr_address(unit, value)?.unwrap_or(0),
            None => 0,
        };
        tracing::trace!(
            "examining subprogram DIE at offset 0x{:x} lowpc=0x{:x}",
            entry.offset().0,
            low_pc
        );

        let by_name = attr_string(dwarf, unit, entry, gimli::DW_AT_name)?
            .is_some_and(|n| n == name);
        let matched = by_name || self.matches_linkage_name(unit, entry, linkage_name)?;
        if !matched {
            return Ok(None);
        }

        let offset = entry
            .offset()
            .to_debug_info_offset(&unit.header)
            .ok_or_else(|| anyhow::anyhow!("subprogram {} is not in .debug_info", name))?;
        Ok(Some(Subprogram { offset, low_pc }))
    }

    fn matches_linkage_name(
        &self,
        unit: &gimli::Unit<DwarfReader>,
        entry: &gimli::DebuggingInformationEntry<DwarfReader>,
        linkage_name: &str,
    ) -> Result<bool> {
        let dwarf = self.loader.dwarf();
        for attr in [gimli::DW_AT_linkage_name, gimli::DW_AT_MIPS_linkage_name] {
            if let Some(n) = attr_string(dwarf, unit, entry, attr)? {
                return Ok(n == linkage_name);
            }
        }
        Ok(false)
    }
}
