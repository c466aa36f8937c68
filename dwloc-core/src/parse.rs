//! 逆アセンブル出力のパース

use anyhow::Result;
use regex::Regex;

/// objdump の命令行を認識する
///
/// ```text
///   47dbe0:       cmp    0x10(%r14),%rsp
///   47dbe4:       jbe    47dc3c <main.main+0x5c>
/// ```
pub struct InstructionMatcher {
    pattern: Regex,
}

impl InstructionMatcher {
    /// 命令行マッチャーを作成する
    pub fn new() -> Result<Self> {
        // 先頭の空白、16進アドレス、コロン、空白、ニーモニック
        let pattern = Regex::new(r"^\s+([0-9a-f]+):\s+\S+")?;
        Ok(Self { pattern })
    }

    /// 命令行ならそのアドレスを返す
    ///
    /// ラベル行、ソース行の注釈、空行は `None`。
    pub fn address(&self, line: &str) -> Option<u64> {
        let captures = self.pattern.captures(line)?;
        u64::from_str_radix(&captures[1], 16).ok()
    }
}
