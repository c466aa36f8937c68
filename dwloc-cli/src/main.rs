//! dwloc CLI - コマンドラインインターフェース
//!
//! ロードモジュールから関数を1つ選び、命令ごとの引数・ローカル変数の格納場所を表示する

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use dwloc_core::{ExamineConfig, Examiner, Outcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// 位置注釈の途中で評価エラーが起きた場合の終了コード
const EXIT_PARTIAL: u8 = 3;

/// dwloc - DWARF variable location viewer
#[derive(Parser)]
#[command(name = "dwloc")]
#[command(version)]
#[command(about = "Show where a function's parameters and locals live at each instruction", long_about = None)]
struct Cli {
    /// Verbose trace output level
    #[arg(short = 'v', long = "verbose", default_value_t = 0)]
    verbose: u8,

    /// Name of function to display
    #[arg(short = 'f', long = "function")]
    function: Option<String>,

    /// Load module to read
    #[arg(short = 'm', long = "module")]
    module: Option<PathBuf>,

    /// Dump build info
    #[arg(long = "dbi")]
    dbi: bool,

    /// objdump executable used for disassembly
    #[arg(long, default_value = "objdump")]
    objdump: PathBuf,
}

impl Cli {
    /// `-f` と `-m` を取り出す
    ///
    /// `--dbi` の表示を先に行うため、必須フラグの検査は解析後に手で行う。
    fn target(&self) -> std::result::Result<(&str, &Path), clap::Error> {
        match (&self.function, &self.module) {
            (Some(function), Some(module)) => Ok((function, module)),
            _ => Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "both -f <FUNCTION> and -m <MODULE> are required",
            )),
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("in main");

    if cli.dbi {
        dump_build_info();
    }

    let (function, module) = match cli.target() {
        Ok(target) => target,
        Err(e) => e.exit(),
    };

    let config = ExamineConfig {
        objdump: cli.objdump.clone(),
        ..ExamineConfig::default()
    };
    let examiner = Examiner::new(config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let code = match examiner.examine(module, function, &mut out) {
        Ok(Outcome::Complete) => ExitCode::SUCCESS,
        Ok(Outcome::Partial { pc, reason }) => {
            eprintln!("dwloc: location tracking stopped at 0x{:x}: {}", pc, reason);
            ExitCode::from(EXIT_PARTIAL)
        }
        // エラーは Examiner が警告として出力済み
        Err(_) => ExitCode::FAILURE,
    };

    tracing::debug!("leaving main");
    Ok(code)
}

/// `-v` のレベルからログフィルタを決める（`RUST_LOG` があればそちらを優先）
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// ビルド情報を表示する
fn dump_build_info() {
    println!("package {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!(
        "target {}-{} ({})",
        std::env::consts::ARCH,
        std::env::consts::OS,
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    println!("repository {}", env!("CARGO_PKG_REPOSITORY"));
}
