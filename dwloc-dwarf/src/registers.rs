//! x86-64 のDWARFレジスタ番号

use std::borrow::Cow;

/// DWARFレジスタ番号をレジスタ名に変換する
///
/// 対応表に無い番号は `reg<N>` になる。
pub fn register_name(reg: gimli::Register) -> Cow<'static, str> {
    match gimli::X86_64::register_name(reg) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("reg{}", reg.0)),
    }
}
