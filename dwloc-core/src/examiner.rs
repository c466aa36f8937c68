//! 関数ロケーション解析のメインロジック

use crate::annotate::{Annotator, Outcome};
use crate::disasm::Disassembler;
use crate::parse::InstructionMatcher;
use crate::{ExamineConfig, ExamineError};
use dwloc_dwarf::{
    collect_variables, Architecture, DwarfLoader, FunctionInfo, FunctionLocator, FunctionLookup,
    LocationEvaluator, SymbolResolver,
};
use std::io::Write;
use std::path::Path;

/// 関数の変数ロケーションを解析する
///
/// 呼び出しごとにバイナリを読み直すので、呼び出し間で状態は共有しない。
pub struct Examiner {
    config: ExamineConfig,
    matcher: InstructionMatcher,
    disassembler: Disassembler,
}

impl Examiner {
    /// 解析器を作成する
    pub fn new(config: ExamineConfig) -> anyhow::Result<Self> {
        let disassembler = Disassembler::new(config.objdump.clone());
        Ok(Self {
            config,
            matcher: InstructionMatcher::new()?,
            disassembler,
        })
    }

    /// `module` の関数 `function` を解析し、注釈付き逆アセンブルを `out` に書き出す
    pub fn examine<W: Write>(
        &self,
        module: &Path,
        function: &str,
        out: &mut W,
    ) -> Result<Outcome, ExamineError> {
        let result = self.examine_inner(module, function, out);
        if let Err(e) = &result {
            tracing::warn!("{}", e);
        }
        result
    }

    fn examine_inner<W: Write>(
        &self,
        module: &Path,
        function: &str,
        out: &mut W,
    ) -> Result<Outcome, ExamineError> {
        let mut info = self.locate(module, function)?;

        let lines = self.disassembler.disassemble(module, &info);
        if lines.is_empty() {
            return Err(ExamineError::EmptyDisassembly(function.to_string()));
        }
        tracing::debug!("{} lines of disassembly for {}", lines.len(), function);

        let binary = collect_variables(module, &mut info).map_err(ExamineError::Dwarf)?;
        if binary.loader().architecture() != Architecture::X86_64 {
            tracing::warn!(
                "{:?} is not x86-64, register names may be wrong",
                binary.loader().architecture()
            );
        }

        let evaluator = LocationEvaluator::new(&binary, self.config.frame);
        let annotator = Annotator::new(&self.matcher, &evaluator, &info.variables);
        let outcome = annotator.annotate(&lines, out)?;
        out.flush()?;

        Ok(outcome)
    }

    /// シンボルテーブルとDWARFから関数を探す
    fn locate(&self, module: &Path, function: &str) -> Result<FunctionInfo, ExamineError> {
        tracing::debug!("loading ELF for {:?}", module);
        let loader = DwarfLoader::load(module).map_err(|source| ExamineError::Load {
            path: module.to_path_buf(),
            source,
        })?;
        tracing::debug!("{:?} loaded (pie: {})", module, loader.is_pie());

        let lookup = FunctionLocator::new(&loader)
            .locate(function)
            .map_err(ExamineError::Dwarf)?;

        match lookup {
            FunctionLookup::Found(info) => Ok(info),
            FunctionLookup::NoSymbol => {
                self.log_candidates(&loader, function);
                Err(ExamineError::SymbolNotFound(function.to_string()))
            }
            FunctionLookup::NoSubprogram(_) => {
                Err(ExamineError::FunctionNotInDebugInfo(function.to_string()))
            }
        }
    }

    /// 名前の末尾部分が一致するシンボルを候補として出す
    fn log_candidates(&self, loader: &DwarfLoader, function: &str) {
        let short = function
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or(function);
        if short.is_empty() {
            return;
        }

        for symbol in SymbolResolver::new(loader).find_symbols(short).iter().take(10) {
            tracing::debug!("  candidate: {} @ 0x{:x}", symbol.demangled_name, symbol.address);
        }
    }
}
