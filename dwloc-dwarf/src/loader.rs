//! ELFとDWARFの読み込み機能

use crate::{Result, Symbol};
use object::{Object, ObjectSection, ObjectSymbol};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// DWARFセクションを読むためのリーダー型
///
/// セクションデータは `Rc<[u8]>` で所有するため、ローダーを破棄すれば解放される。
pub type DwarfReader = gimli::EndianRcSlice<gimli::RunTimeEndian>;

/// DWARFローダー
pub struct DwarfLoader {
    /// シンボルテーブル（ファイル内の出現順）
    symbols: Vec<Symbol>,
    /// DWARFコンテキスト
    dwarf: gimli::Dwarf<DwarfReader>,
    /// ターゲットアーキテクチャ
    architecture: object::Architecture,
    /// PIEかどうか
    is_pie: bool,
}

impl DwarfLoader {
    /// ELFファイルからシンボルテーブルとDWARF情報を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file_data = fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file {:?}: {}", path, e))?;

        let object_file = object::File::parse(&*file_data)
            .map_err(|e| anyhow::anyhow!("Failed to parse ELF file {:?}: {}", path, e))?;

        let endian = if object_file.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // シンボルテーブルはここで所有データに写し取る
        let symbols = object_file
            .symbols()
            .filter_map(|symbol| {
                let name = symbol.name().ok()?;
                if name.is_empty() {
                    return None;
                }
                Some(Symbol::new(name.to_string(), symbol.address(), symbol.size()))
            })
            .collect::<Vec<_>>();
        tracing::debug!("read {} symbols from {:?}", symbols.len(), path);

        // 圧縮されたデバッグセクション（Goのリンカが出力する）も展開して読む
        let load_section = |id: gimli::SectionId| -> Result<DwarfReader> {
            let data = object_file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[][..]));
            Ok(gimli::EndianRcSlice::new(Rc::from(&*data), endian))
        };

        let dwarf = gimli::Dwarf::load(load_section)
            .map_err(|e| anyhow::anyhow!("Failed to load DWARF sections: {}", e))?;

        Ok(Self {
            symbols,
            dwarf,
            architecture: object_file.architecture(),
            is_pie: matches!(object_file.kind(), object::ObjectKind::Dynamic),
        })
    }

    /// DWARFコンテキストへの参照を取得
    pub fn dwarf(&self) -> &gimli::Dwarf<DwarfReader> {
        &self.dwarf
    }

    /// シンボルテーブルを取得
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// ターゲットアーキテクチャを取得
    pub fn architecture(&self) -> object::Architecture {
        self.architecture
    }

    /// PIE（Position Independent Executable）かどうかを判定する
    ///
    /// PIEの場合でも objdump と DWARF はどちらもリンク時アドレスを使うので、
    /// 両者の突き合わせに補正は要らない。ログ出力用。
    pub fn is_pie(&self) -> bool {
        self.is_pie
    }
}
