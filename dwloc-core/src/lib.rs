//! dwloc のコア機能
//!
//! 関数を特定し、逆アセンブルし、命令アドレスごとに引数とローカル変数の
//! 格納場所を評価して、変化した箇所に注釈を付けます。

pub mod annotate;
pub mod config;
pub mod disasm;
pub mod errors;
pub mod examiner;
pub mod parse;

pub use annotate::{Annotator, LocationSnapshot, LocationSource, Outcome};
pub use config::ExamineConfig;
pub use errors::ExamineError;
pub use examiner::Examiner;

use std::path::Path;

/// `module` の関数 `function` を既定の設定で解析し、結果を標準出力に書く
///
/// 全命令でロケーションを解決できた場合だけ true を返す。
pub fn examine_file<P: AsRef<Path>>(module: P, function: &str) -> bool {
    let examiner = match Examiner::new(ExamineConfig::default()) {
        Ok(examiner) => examiner,
        Err(e) => {
            tracing::warn!("{}", e);
            return false;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    matches!(
        examiner.examine(module.as_ref(), function, &mut out),
        Ok(Outcome::Complete)
    )
}
