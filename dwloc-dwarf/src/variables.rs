//! 引数・ローカル変数の収集

use crate::utils::{attr_flag, attr_string};
use crate::{BinaryInfo, FunctionInfo, Result};
use std::path::Path;

/// 変数の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// `DW_TAG_formal_parameter`
    Parameter,
    /// `DW_TAG_variable`
    Local,
}

impl VariableKind {
    fn from_tag(tag: gimli::DwTag) -> Option<Self> {
        match tag {
            gimli::DW_TAG_formal_parameter => Some(Self::Parameter),
            gimli::DW_TAG_variable => Some(Self::Local),
            _ => None,
        }
    }
}

/// 追跡対象の変数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    pub kind: VariableKind,
    /// 関数が属するユニット内での変数DIEのオフセット
    pub die_offset: gimli::UnitOffset,
}

/// DIEの子が追跡対象になるかを判定する
///
/// 名前の無いもの、ブランク識別子 `_`、`DW_AT_variable_parameter` の立った
/// 引数（Goの戻り値スロット）は除外する。
pub fn is_trackable(kind: VariableKind, name: Option<&str>, variable_parameter: bool) -> bool {
    let name = match name {
        Some(name) if !name.is_empty() && name != "_" => name,
        _ => return false,
    };
    if kind == VariableKind::Parameter && variable_parameter {
        tracing::trace!("skipping return parameter {}", name);
        return false;
    }
    true
}

/// 変数コレクター
pub struct VariableCollector<'a> {
    info: &'a BinaryInfo,
}

impl<'a> VariableCollector<'a> {
    /// 変数コレクターを作成する
    pub fn new(info: &'a BinaryInfo) -> Self {
        Self { info }
    }

    /// 関数DIEの直接の子から追跡対象の変数を集める
    pub fn collect(&self) -> Result<Vec<VariableDescriptor>> {
        let dwarf = self.info.dwarf();
        let unit = self.info.unit();

        let mut tree = unit.entries_tree(Some(self.info.function_offset()))?;
        let root = tree.root()?;

        let mut variables = Vec::new();
        let mut children = root.children();
        while let Some(child) = children.next()? {
            let entry = child.entry();
            let kind = match VariableKind::from_tag(entry.tag()) {
                Some(kind) => kind,
                None => continue,
            };

            let name = attr_string(dwarf, unit, entry, gimli::DW_AT_name)?;
            let variable_parameter = attr_flag(entry, gimli::DW_AT_variable_parameter)?;
            if !is_trackable(kind, name.as_deref(), variable_parameter) {
                continue;
            }

            if let Some(name) = name {
                variables.push(VariableDescriptor {
                    name,
                    kind,
                    die_offset: entry.offset(),
                });
            }
        }

        Ok(variables)
    }
}

/// バイナリを読み直して関数の変数を `function.variables` に設定する
///
/// 戻り値のハンドルは後段のロケーション評価で使う。
pub fn collect_variables<P: AsRef<Path>>(path: P, function: &mut FunctionInfo) -> Result<BinaryInfo> {
    let info = BinaryInfo::load(path, function.die_offset)?;
    function.variables = VariableCollector::new(&info).collect()?;

    let params = function
        .variables
        .iter()
        .filter(|v| v.kind == VariableKind::Parameter)
        .count();
    tracing::debug!(
        "found {} formal params and {} locals for {}",
        params,
        function.variables.len() - params,
        function.name
    );

    Ok(info)
}
