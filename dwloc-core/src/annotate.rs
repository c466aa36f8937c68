//! 逆アセンブル結果への変数ロケーション注釈
//!
//! 命令アドレスごとに全変数のロケーションを評価し直し、
//! 直前と表示が変わった変数だけ注釈行を出します。

use crate::parse::InstructionMatcher;
use dwloc_dwarf::{Location, LocationEvaluator, VariableDescriptor};
use std::io::{self, Write};

/// 変数ロケーションの取得元
pub trait LocationSource {
    /// 変数のロケーションを `pc` で評価する
    ///
    /// `Err` は致命的な評価エラーで、以降の解決を打ち切る。
    fn location_at(&self, variable: &VariableDescriptor, pc: u64) -> anyhow::Result<Location>;
}

impl LocationSource for LocationEvaluator<'_> {
    fn location_at(&self, variable: &VariableDescriptor, pc: u64) -> anyhow::Result<Location> {
        LocationEvaluator::location_at(self, variable, pc)
    }
}

/// 注釈処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 全命令でロケーションを解決できた
    Complete,
    /// `pc` で致命的な評価エラーが起き、以降の解決を打ち切った
    Partial { pc: u64, reason: String },
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete)
    }
}

/// 変数ごとの直前のロケーション表示
#[derive(Debug)]
pub struct LocationSnapshot {
    slots: Vec<String>,
}

impl LocationSnapshot {
    /// `len` 個の空スロットで作成する
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![String::new(); len],
        }
    }

    /// スロットを更新し、変化があれば true を返す
    pub fn update(&mut self, index: usize, rendered: String) -> bool {
        if self.slots[index] == rendered {
            return false;
        }
        self.slots[index] = rendered;
        true
    }

    pub fn get(&self, index: usize) -> &str {
        &self.slots[index]
    }
}

/// 注釈器
pub struct Annotator<'a, S: LocationSource> {
    matcher: &'a InstructionMatcher,
    source: &'a S,
    variables: &'a [VariableDescriptor],
}

impl<'a, S: LocationSource> Annotator<'a, S> {
    /// 注釈器を作成する
    pub fn new(
        matcher: &'a InstructionMatcher,
        source: &'a S,
        variables: &'a [VariableDescriptor],
    ) -> Self {
        Self {
            matcher,
            source,
            variables,
        }
    }

    /// 全行を書き出し、命令行ごとに変化した変数ロケーションを注釈する
    ///
    /// 致命的な評価エラーの後も残りの行はそのまま書き出す。
    pub fn annotate<W: Write>(&self, lines: &[String], out: &mut W) -> io::Result<Outcome> {
        let mut snapshot = LocationSnapshot::new(self.variables.len());
        let mut outcome = Outcome::Complete;

        for line in lines {
            writeln!(out, "{}", line)?;
            if !outcome.is_complete() {
                continue;
            }
            let pc = match self.matcher.address(line) {
                Some(pc) => pc,
                None => continue,
            };

            for (k, variable) in self.variables.iter().enumerate() {
                let location = match self.source.location_at(variable, pc) {
                    Ok(location) => location,
                    Err(e) => {
                        tracing::warn!("bad location evaluation at pc 0x{:x}: {}", pc, e);
                        outcome = Outcome::Partial {
                            pc,
                            reason: e.to_string(),
                        };
                        break;
                    }
                };

                if snapshot.update(k, location.to_string()) {
                    writeln!(out, " ^ {:?} now in: {}", variable.name, snapshot.get(k))?;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwloc_dwarf::{Piece, VariableKind};

    /// 変数名とPCからロケーションを決めるテスト用の取得元
    struct FakeSource<F>(F);

    impl<F> LocationSource for FakeSource<F>
    where
        F: Fn(&str, u64) -> anyhow::Result<Location>,
    {
        fn location_at(&self, variable: &VariableDescriptor, pc: u64) -> anyhow::Result<Location> {
            (self.0)(&variable.name, pc)
        }
    }

    fn var(name: &str, kind: VariableKind, offset: usize) -> VariableDescriptor {
        VariableDescriptor {
            name: name.to_string(),
            kind,
            die_offset: gimli::UnitOffset(offset),
        }
    }

    fn reg(reg: gimli::Register) -> Location {
        Location::Single(Piece::Register { reg, size: None })
    }

    fn asm() -> Vec<String> {
        [
            "0000000000001139 <ABC>:",
            "ABC():",
            "/tmp/abc.c:5",
            "    1139:\tpush   %rbp",
            "    113a:\tmov    %rsp,%rbp",
            "    113d:\tmov    %edi,-0x14(%rbp)",
            "/tmp/abc.c:6",
            "    1140:\tmov    %esi,-0x18(%rbp)",
            "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn run<F>(variables: &[VariableDescriptor], f: F) -> (String, Outcome)
    where
        F: Fn(&str, u64) -> anyhow::Result<Location>,
    {
        let matcher = InstructionMatcher::new().unwrap();
        let source = FakeSource(f);
        let annotator = Annotator::new(&matcher, &source, variables);
        let mut out = Vec::new();
        let outcome = annotator.annotate(&asm(), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), outcome)
    }

    #[test]
    fn test_only_transitions_are_reported() {
        let variables = [var("x", VariableKind::Parameter, 0x10)];
        let (out, outcome) = run(&variables, |_, pc| {
            Ok(if pc < 0x113d {
                reg(gimli::X86_64::RDI)
            } else {
                Location::Single(Piece::Memory {
                    addr: 0xfec,
                    size: None,
                })
            })
        });

        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(
            out,
            "0000000000001139 <ABC>:\n\
             ABC():\n\
             /tmp/abc.c:5\n    \
             1139:\tpush   %rbp\n \
             ^ \"x\" now in: register rdi\n    \
             113a:\tmov    %rsp,%rbp\n    \
             113d:\tmov    %edi,-0x14(%rbp)\n \
             ^ \"x\" now in: address 0xfec\n\
             /tmp/abc.c:6\n    \
             1140:\tmov    %esi,-0x18(%rbp)\n\
             \n"
        );
    }

    #[test]
    fn test_stable_composite_reported_once() {
        let variables = [var("s", VariableKind::Local, 0x20)];
        let (out, outcome) = run(&variables, |_, _| {
            Ok(Location::Composite(vec![
                Piece::Register {
                    reg: gimli::X86_64::RAX,
                    size: Some(8),
                },
                Piece::Memory {
                    addr: 0x1008,
                    size: Some(8),
                },
            ]))
        });

        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(out.matches("now in:").count(), 1);
        let first_insn = out.find("1139:").unwrap();
        let note = out
            .find(" ^ \"s\" now in: { [0: S=8 register rax] [1: S=8 address 0x1008] }")
            .unwrap();
        let second_insn = out.find("113a:").unwrap();
        assert!(first_insn < note && note < second_insn);
    }

    #[test]
    fn test_not_available_is_not_an_error() {
        let variables = [
            var("x", VariableKind::Parameter, 0x10),
            var("y", VariableKind::Parameter, 0x18),
        ];
        let (out, outcome) = run(&variables, |name, pc| {
            Ok(match (name, pc) {
                ("y", pc) if pc >= 0x1140 => reg(gimli::X86_64::RSI),
                ("y", _) => Location::NotAvailable,
                _ => reg(gimli::X86_64::RDI),
            })
        });

        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(out.matches(" ^ \"x\" now in:").count(), 1);
        assert!(out.contains(" ^ \"y\" now in: <not available>"));
        assert!(out.contains(" ^ \"y\" now in: register rsi"));
        // 変数の順序は収集順
        let x = out.find(" ^ \"x\"").unwrap();
        let y = out.find(" ^ \"y\"").unwrap();
        assert!(x < y);
    }

    #[test]
    fn test_fatal_error_stops_resolution() {
        let variables = [var("x", VariableKind::Parameter, 0x10)];
        let (out, outcome) = run(&variables, |_, pc| {
            if pc == 0x113a {
                Err(anyhow::anyhow!("Unsupported evaluation result"))
            } else {
                Ok(reg(gimli::X86_64::RDI))
            }
        });

        assert_eq!(
            outcome,
            Outcome::Partial {
                pc: 0x113a,
                reason: "Unsupported evaluation result".to_string(),
            }
        );
        // 以降の行も出力されるが、注釈はエラー前の1つだけ
        assert_eq!(out.matches("now in:").count(), 1);
        assert!(out.contains("1140:\tmov    %esi,-0x18(%rbp)"));
    }

    #[test]
    fn test_no_variables_prints_listing() {
        let (out, outcome) = run(&[], |_, _| Ok(Location::NotAvailable));
        assert_eq!(outcome, Outcome::Complete);
        assert_eq!(out, asm().join("\n") + "\n");
    }

    #[test]
    fn test_snapshot_update() {
        let mut snapshot = LocationSnapshot::new(2);
        assert_eq!(snapshot.get(0), "");
        assert!(snapshot.update(0, "register rdi".to_string()));
        assert!(!snapshot.update(0, "register rdi".to_string()));
        assert!(snapshot.update(0, "address 0xfec".to_string()));
        assert_eq!(snapshot.get(0), "address 0xfec");
        assert_eq!(snapshot.get(1), "");
    }
}
