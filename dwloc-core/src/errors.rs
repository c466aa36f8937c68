//! 解析のエラー

use std::path::PathBuf;

/// 関数の解析を中断させたエラー
#[derive(Debug, thiserror::Error)]
pub enum ExamineError {
    /// バイナリを読めない、またはELFとして解釈できない
    #[error("unable to open {path:?}: {source}")]
    Load {
        path: PathBuf,
        source: anyhow::Error,
    },

    /// シンボルテーブルに関数が無い
    #[error("could not locate {0} in ELF symbol table")]
    SymbolNotFound(String),

    /// シンボルはあるがDWARFに subprogram が無い
    #[error("target function {0:?} not found in DWARF")]
    FunctionNotInDebugInfo(String),

    /// DWARFの読み取りに失敗した
    #[error("error reading DWARF: {0}")]
    Dwarf(anyhow::Error),

    /// 逆アセンブル結果が空だった
    #[error("empty asm dump for {0}, aborting")]
    EmptyDisassembly(String),

    /// 結果の書き出しに失敗した
    #[error("failed to write report: {0}")]
    Output(#[from] std::io::Error),
}
