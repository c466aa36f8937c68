//! 解析の設定

use dwloc_dwarf::FrameContext;
use std::path::PathBuf;

/// `Examiner` の設定
#[derive(Debug, Clone)]
pub struct ExamineConfig {
    /// 逆アセンブラの実行ファイル
    pub objdump: PathBuf,
    /// ロケーション評価に使う仮想フレーム
    pub frame: FrameContext,
}

impl Default for ExamineConfig {
    fn default() -> Self {
        Self {
            objdump: PathBuf::from("objdump"),
            frame: FrameContext::default(),
        }
    }
}
