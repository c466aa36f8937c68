//! dwloc DWARF デバッグ情報解析
//!
//! このクレートは、ELFファイルとDWARFデバッグ情報の解析機能を提供します。
//! 関数のアドレス範囲とsubprogram DIEの特定、引数・ローカル変数の収集、
//! 任意のPCにおける変数ロケーションの評価を行います。

pub mod loader;
pub mod symbols;
pub mod function;
pub mod variables;
pub mod binary_info;
pub mod loc_eval;
pub mod registers;
pub mod utils;

pub use loader::{DwarfLoader, DwarfReader};
pub use symbols::{Symbol, SymbolResolver};
pub use function::{FunctionInfo, FunctionLocator, FunctionLookup};
pub use variables::{collect_variables, VariableCollector, VariableDescriptor, VariableKind};
pub use binary_info::BinaryInfo;
pub use object::Architecture;
pub use loc_eval::{FrameContext, Location, LocationEvaluator, Piece};

/// DWARF解析の結果型
pub type Result<T> = anyhow::Result<T>;
