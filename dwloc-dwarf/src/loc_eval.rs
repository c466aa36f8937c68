//! DWARF ロケーション式評価
//!
//! 変数の `DW_AT_location` を任意のPCで評価して、値がどのレジスタ・アドレスに
//! 置かれているかを求めます。実行中のプロセスは無いので、CFAとフレームベースは
//! 呼び出し側が与える固定値を使います。

use crate::registers::register_name;
use crate::{BinaryInfo, DwarfReader, Result, VariableDescriptor};
use gimli::{EvaluationResult, Value};
use std::fmt;

/// 評価に使う仮想フレーム
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// `DW_OP_call_frame_cfa` の値
    pub cfa: u64,
    /// `DW_OP_fbreg` の基準値
    pub frame_base: u64,
}

impl Default for FrameContext {
    fn default() -> Self {
        Self {
            cfa: 0x1000,
            frame_base: 0x1000,
        }
    }
}

/// ロケーションのピース
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// レジスタ
    Register { reg: gimli::Register, size: Option<u64> },
    /// メモリアドレス
    Memory { addr: u64, size: Option<u64> },
    /// 格納場所を持たない（`DW_OP_stack_value`、暗黙の値、最適化で消えた部分）
    Unavailable { size: Option<u64> },
}

impl Piece {
    /// サイズ（バイト）
    pub fn size(&self) -> Option<u64> {
        match self {
            Piece::Register { size, .. }
            | Piece::Memory { size, .. }
            | Piece::Unavailable { size } => *size,
        }
    }

    /// レジスタかメモリに置かれているか
    pub fn has_storage(&self) -> bool {
        !matches!(self, Piece::Unavailable { .. })
    }

    fn from_gimli(piece: &gimli::Piece<DwarfReader>) -> Self {
        let size = piece.size_in_bits.map(|bits| bits / 8);
        match piece.location {
            gimli::Location::Register { register } => Piece::Register { reg: register, size },
            gimli::Location::Address { address } => Piece::Memory { addr: address, size },
            _ => Piece::Unavailable { size },
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Piece::Register { reg, .. } => write!(f, "register {}", register_name(*reg)),
            Piece::Memory { addr, .. } => write!(f, "address 0x{:x}", addr),
            Piece::Unavailable { .. } => write!(f, "<not available>"),
        }
    }
}

/// ロケーション評価の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// このPCでは格納場所が無い（ロケーションリストの範囲外、最適化で消えた等）
    NotAvailable,
    /// `DW_OP_piece` を含まない単一のロケーション
    Single(Piece),
    /// 複数のピースから構成される
    Composite(Vec<Piece>),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Location::NotAvailable => write!(f, "<not available>"),
            Location::Single(piece) => write!(f, "{}", piece),
            Location::Composite(pieces) => {
                write!(f, "{{")?;
                for (i, piece) in pieces.iter().enumerate() {
                    write!(f, " [{}: S={} {}]", i, piece.size().unwrap_or(0), piece)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// ロケーション評価器
pub struct LocationEvaluator<'a> {
    info: &'a BinaryInfo,
    frame: FrameContext,
}

impl<'a> LocationEvaluator<'a> {
    /// 新しいロケーション評価器を作成する
    pub fn new(info: &'a BinaryInfo, frame: FrameContext) -> Self {
        Self { info, frame }
    }

    /// 変数のロケーションを `pc` で評価する
    ///
    /// ロケーションリストに `pc` を含むエントリが無い場合は
    /// `Location::NotAvailable` を返す。それ以外の失敗はエラーになる。
    pub fn location_at(&self, variable: &VariableDescriptor, pc: u64) -> Result<Location> {
        let unit = self.info.unit();
        let entry = unit.entry(variable.die_offset)?;

        let attr = match entry.attr_value(gimli::DW_AT_location)? {
            Some(attr) => attr,
            None => return Ok(Location::NotAvailable),
        };

        let expr = match attr {
            gimli::AttributeValue::Exprloc(expr) => expr,
            other => match self.find_list_entry(other, pc)? {
                Some(expr) => expr,
                None => return Ok(Location::NotAvailable),
            },
        };

        self.evaluate(expr)
    }

    /// ロケーションリストから `pc` を含むエントリの式を探す
    fn find_list_entry(
        &self,
        attr: gimli::AttributeValue<DwarfReader>,
        pc: u64,
    ) -> Result<Option<gimli::Expression<DwarfReader>>> {
        let dwarf = self.info.dwarf();
        let mut locations = dwarf
            .attr_locations(self.info.unit(), attr)?
            .ok_or_else(|| anyhow::anyhow!("Unsupported DW_AT_location form"))?;

        while let Some(entry) = locations.next()? {
            if entry.range.begin <= pc && pc < entry.range.end {
                return Ok(Some(entry.data));
            }
        }
        Ok(None)
    }

    /// ロケーション式を評価する
    fn evaluate(&self, expr: gimli::Expression<DwarfReader>) -> Result<Location> {
        let dwarf = self.info.dwarf();
        let unit = self.info.unit();
        let mut eval = expr.evaluation(unit.encoding());

        let mut state = eval.evaluate()?;
        loop {
            state = match state {
                EvaluationResult::Complete => break,
                EvaluationResult::RequiresFrameBase => {
                    eval.resume_with_frame_base(self.frame.frame_base)?
                }
                EvaluationResult::RequiresCallFrameCfa => {
                    eval.resume_with_call_frame_cfa(self.frame.cfa)?
                }
                EvaluationResult::RequiresRegister { register, .. } => {
                    // レジスタの内容は分からないので0とみなす
                    tracing::trace!("register {} read as 0", register_name(register));
                    eval.resume_with_register(Value::Generic(0))?
                }
                EvaluationResult::RequiresRelocatedAddress(address) => {
                    eval.resume_with_relocated_address(address)?
                }
                EvaluationResult::RequiresIndexedAddress { index, .. } => {
                    let address = dwarf.address(unit, index)?;
                    eval.resume_with_indexed_address(address)?
                }
                EvaluationResult::RequiresBaseType(offset) => {
                    let base_type = gimli::ValueType::from_entry(&unit.entry(offset)?)?
                        .unwrap_or(gimli::ValueType::Generic);
                    eval.resume_with_base_type(base_type)?
                }
                // 関数入口での値は呼び出し元の状態に依存する
                EvaluationResult::RequiresEntryValue(_) => return Ok(Location::NotAvailable),
                other => {
                    return Err(anyhow::anyhow!("Unsupported evaluation result: {:?}", other));
                }
            };
        }

        let result = eval.result();
        let single = result.len() == 1 && result[0].size_in_bits.is_none();
        let pieces: Vec<Piece> = result.iter().map(Piece::from_gimli).collect();
        Ok(Self::assemble(pieces, single))
    }

    /// ピース列を `Location` にまとめる
    ///
    /// 格納場所を持つピースが1つも無ければ `NotAvailable`。それ以外は
    /// 値だけのピースも位置を保ったまま複合ロケーションに残す。
    fn assemble(mut pieces: Vec<Piece>, single: bool) -> Location {
        if !pieces.iter().any(Piece::has_storage) {
            return Location::NotAvailable;
        }
        if single && pieces.len() == 1 {
            return Location::Single(pieces.remove(0));
        }
        Location::Composite(pieces)
    }
}
