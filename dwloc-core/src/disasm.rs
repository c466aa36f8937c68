//! 逆アセンブル機能
//!
//! 外部の objdump を起動して、関数のアドレス範囲だけをソース行付きで逆アセンブルします。

use dwloc_dwarf::FunctionInfo;
use std::path::{Path, PathBuf};
use std::process::Command;

/// objdump ドライバ
pub struct Disassembler {
    program: PathBuf,
}

impl Disassembler {
    /// 逆アセンブラを作成する
    ///
    /// # Arguments
    /// * `program` - objdump 互換の実行ファイル
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `[symbol_address, symbol_address + symbol_size)` を逆アセンブルするコマンド
    pub fn command(&self, module: &Path, function: &FunctionInfo) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-show-raw-insn")
            .arg("--wide")
            .arg("-dl")
            .arg(format!("--start-address=0x{:x}", function.symbol_address))
            .arg(format!("--stop-address=0x{:x}", function.stop_address()))
            .arg(module);
        cmd
    }

    /// 関数を逆アセンブルして行ごとに返す
    ///
    /// 起動失敗や非ゼロ終了の場合は警告を出して空を返す。
    pub fn disassemble(&self, module: &Path, function: &FunctionInfo) -> Vec<String> {
        let output = match self.command(module, function).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("{:?} of {:?} failed: {}", self.program, module, e);
                return Vec::new();
            }
        };

        // stdout と stderr をまとめて扱う
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            tracing::warn!(
                "{:?} of {:?} failed: {}\n{}",
                self.program,
                module,
                output.status,
                text
            );
            return Vec::new();
        }

        text.lines().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_function() -> FunctionInfo {
        FunctionInfo {
            name: "main.ABC".to_string(),
            die_offset: gimli::DebugInfoOffset(0x1234),
            low_pc: 0x47dc40,
            symbol_address: 0x47dc40,
            symbol_size: 0x80,
            variables: Vec::new(),
        }
    }

    #[test]
    fn test_command_bounds() {
        let disasm = Disassembler::new("objdump");
        let cmd = disasm.command(Path::new("/tmp/out.exe"), &sample_function());

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--no-show-raw-insn",
                "--wide",
                "-dl",
                "--start-address=0x47dc40",
                "--stop-address=0x47dcc0",
                "/tmp/out.exe",
            ]
        );
    }

    #[test]
    fn test_missing_program_yields_empty() {
        let disasm = Disassembler::new("/nonexistent/dwloc-objdump");
        let lines = disasm.disassemble(Path::new("/tmp/out.exe"), &sample_function());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_failing_program_yields_empty() {
        let disasm = Disassembler::new("false");
        let lines = disasm.disassemble(Path::new("/tmp/out.exe"), &sample_function());
        assert!(lines.is_empty());
    }
}
