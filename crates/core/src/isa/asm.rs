//! Two-pass MIPS-like assembler.
//!
//! Parses `.data`/`.text` sections into a `Program`: a flat data image, an
//! instruction array indexed by `(pc - text_base) / 4`, a label table, and
//! the entry point. It performs:
//! 1. **First pass:** Section tracking and label address assignment.
//! 2. **Second pass:** Instruction encoding and data emission, with label
//!    resolution.
//!
//! All parse failures are *program-invalid* errors carrying the 1-based
//! source line, raised before any simulation state exists.

use std::collections::HashMap;

use crate::common::SimError;
use crate::isa::instruction::{Instruction, Opcode};
use crate::isa::parse_register;

/// Base address of the text section.
pub const TEXT_BASE: u32 = 0x0000;

/// Base address of the data section.
pub const DATA_BASE: u32 = 0x4000;

/// An assembled program: instruction array, initial data image, labels, entry.
#[derive(Clone, Debug, Default)]
pub struct Program {
    /// Entry-point PC (the `main` label when present, else `text_base`).
    pub entry: u32,
    /// Base address of the instruction array.
    pub text_base: u32,
    /// Instructions, indexed by `(pc - text_base) / 4`.
    pub insts: Vec<Instruction>,
    /// Initial data segments as `(base address, bytes)` runs.
    pub data: Vec<(u32, Vec<u8>)>,
    /// Label address table.
    pub labels: HashMap<String, u32>,
}

impl Program {
    /// Assembles MIPS-like source text into a program.
    pub fn assemble(src: &str) -> Result<Program, SimError> {
        Assembler::new().run(src)
    }

    /// Returns the instruction at `pc`, or `None` past the end of text.
    pub fn inst_at(&self, pc: u32) -> Option<&Instruction> {
        if pc < self.text_base || (pc - self.text_base) % 4 != 0 {
            return None;
        }
        self.insts.get(((pc - self.text_base) / 4) as usize)
    }

    /// First address past the last instruction.
    pub fn end_pc(&self) -> u32 {
        self.text_base + (self.insts.len() as u32) * 4
    }
}

/// Which section the assembler is currently emitting into.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

struct Assembler {
    labels: HashMap<String, u32>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    fn run(mut self, src: &str) -> Result<Program, SimError> {
        self.first_pass(src)?;
        self.second_pass(src)
    }

    /// Assigns an address to every label.
    fn first_pass(&mut self, src: &str) -> Result<(), SimError> {
        let mut section = Section::Text;
        let mut text_pc = TEXT_BASE;
        let mut data_addr = DATA_BASE;

        for (lineno, raw) in src.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let mut rest = line;
            while let Some((label, tail)) = split_label(rest) {
                let addr = match section {
                    Section::Text => text_pc,
                    Section::Data => data_addr,
                };
                if self.labels.insert(label.to_string(), addr).is_some() {
                    return Err(err(lineno, format!("duplicate label '{}'", label)));
                }
                rest = tail.trim();
            }
            if rest.is_empty() {
                continue;
            }

            if let Some(directive) = rest.strip_prefix('.') {
                match directive_word(directive) {
                    "text" => section = Section::Text,
                    "data" => section = Section::Data,
                    "globl" => {}
                    "word" => {
                        let n = count_operands(rest);
                        data_addr += 4 * n as u32;
                    }
                    "space" => {
                        let n = parse_int(operand_str(rest).trim())
                            .ok_or_else(|| err(lineno, "bad .space size".to_string()))?;
                        data_addr += n as u32;
                    }
                    "asciiz" => {
                        let s = parse_string_literal(operand_str(rest))
                            .ok_or_else(|| err(lineno, "bad .asciiz literal".to_string()))?;
                        data_addr += s.len() as u32 + 1;
                    }
                    other => {
                        return Err(err(lineno, format!("unknown directive '.{}'", other)));
                    }
                }
                continue;
            }

            if section != Section::Text {
                return Err(err(lineno, "instruction outside .text".to_string()));
            }
            text_pc += 4;
        }
        Ok(())
    }

    /// Emits instructions and data, resolving labels.
    fn second_pass(self, src: &str) -> Result<Program, SimError> {
        let mut section = Section::Text;
        let mut insts = Vec::new();
        let mut data: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut data_addr = DATA_BASE;

        for (lineno, raw) in src.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let mut rest = line;
            while let Some((_, tail)) = split_label(rest) {
                rest = tail.trim();
            }
            if rest.is_empty() {
                continue;
            }

            if let Some(directive) = rest.strip_prefix('.') {
                match directive_word(directive) {
                    "text" => section = Section::Text,
                    "data" => section = Section::Data,
                    "globl" => {}
                    "word" => {
                        let mut bytes = Vec::new();
                        for tok in operand_str(rest).split(',') {
                            let tok = tok.trim();
                            let v = parse_int(tok)
                                .or_else(|| self.labels.get(tok).map(|&a| a as i64))
                                .ok_or_else(|| {
                                    err(lineno, format!("bad .word value '{}'", tok))
                                })?;
                            bytes.extend_from_slice(&(v as u32).to_le_bytes());
                        }
                        let len = bytes.len() as u32;
                        data.push((data_addr, bytes));
                        data_addr += len;
                    }
                    "space" => {
                        let n = parse_int(operand_str(rest).trim()).unwrap_or(0);
                        data.push((data_addr, vec![0u8; n as usize]));
                        data_addr += n as u32;
                    }
                    "asciiz" => {
                        let s = parse_string_literal(operand_str(rest)).unwrap_or_default();
                        let mut bytes = s.into_bytes();
                        bytes.push(0);
                        let len = bytes.len() as u32;
                        data.push((data_addr, bytes));
                        data_addr += len;
                    }
                    _ => {}
                }
                continue;
            }

            let pc = TEXT_BASE + (insts.len() as u32) * 4;
            insts.push(self.parse_instruction(rest, pc, lineno)?);
        }

        let entry = self.labels.get("main").copied().unwrap_or(TEXT_BASE);
        Ok(Program {
            entry,
            text_base: TEXT_BASE,
            insts,
            data,
            labels: self.labels,
        })
    }

    fn parse_instruction(
        &self,
        line: &str,
        pc: u32,
        lineno: usize,
    ) -> Result<Instruction, SimError> {
        let (mnemonic, operands) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest),
            None => (line, ""),
        };
        let op = Opcode::from_mnemonic(&mnemonic.to_lowercase())
            .ok_or_else(|| err(lineno, format!("unknown opcode '{}'", mnemonic)))?;
        let ops: Vec<&str> = operands
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let reg = |tok: &str| {
            parse_register(tok).ok_or_else(|| err(lineno, format!("unknown register '{}'", tok)))
        };
        let want = |n: usize| {
            if ops.len() == n {
                Ok(())
            } else {
                Err(err(
                    lineno,
                    format!("'{}' expects {} operands, got {}", mnemonic, n, ops.len()),
                ))
            }
        };

        let mut inst = Instruction {
            pc,
            op,
            dest: None,
            src1: None,
            src2: None,
            imm: 0,
            target: None,
        };

        use Opcode::*;
        match op {
            Add | Sub | Mul | And | Or | Xor | Slt | Fadd | Fsub | Fmul | Fdiv => {
                want(3)?;
                inst.dest = Some(reg(ops[0])?);
                inst.src1 = Some(reg(ops[1])?);
                inst.src2 = Some(reg(ops[2])?);
            }
            Addi => {
                want(3)?;
                inst.dest = Some(reg(ops[0])?);
                inst.src1 = Some(reg(ops[1])?);
                inst.imm = self.resolve_imm(ops[2], lineno)?;
            }
            Sll | Srl => {
                want(3)?;
                inst.dest = Some(reg(ops[0])?);
                inst.src1 = Some(reg(ops[1])?);
                inst.imm = self.resolve_imm(ops[2], lineno)?;
            }
            Li => {
                want(2)?;
                inst.dest = Some(reg(ops[0])?);
                inst.imm = self.resolve_imm(ops[1], lineno)?;
            }
            La => {
                want(2)?;
                inst.dest = Some(reg(ops[0])?);
                inst.imm = self.resolve_label(ops[1], lineno)? as i32;
            }
            Lw => {
                want(2)?;
                inst.dest = Some(reg(ops[0])?);
                let (base, off) = self.parse_mem_operand(ops[1], lineno)?;
                inst.src1 = Some(base);
                inst.imm = off;
            }
            Sw => {
                want(2)?;
                inst.src2 = Some(reg(ops[0])?);
                let (base, off) = self.parse_mem_operand(ops[1], lineno)?;
                inst.src1 = Some(base);
                inst.imm = off;
            }
            Beq | Bne | Bgt | Bge | Ble | Blt => {
                want(3)?;
                inst.src1 = Some(reg(ops[0])?);
                inst.src2 = Some(reg(ops[1])?);
                inst.target = Some(self.resolve_label(ops[2], lineno)?);
            }
            J | Jal => {
                want(1)?;
                inst.target = Some(self.resolve_label(ops[0], lineno)?);
                if op == Jal {
                    inst.dest = Some(crate::isa::REG_RA);
                }
            }
            Jr => {
                want(1)?;
                inst.src1 = Some(reg(ops[0])?);
            }
            Nop | Syscall => {
                want(0)?;
                if op == Syscall {
                    // Reads the selector from $v0 at execute time.
                    inst.src1 = Some(crate::isa::REG_V0);
                }
            }
        }
        Ok(inst)
    }

    /// Immediate operand: numeric literal or label address.
    fn resolve_imm(&self, tok: &str, lineno: usize) -> Result<i32, SimError> {
        if let Some(v) = parse_int(tok) {
            return Ok(v as i32);
        }
        self.labels
            .get(tok)
            .map(|&a| a as i32)
            .ok_or_else(|| err(lineno, format!("unresolved label '{}'", tok)))
    }

    /// Branch/jump target: label or absolute numeric address.
    fn resolve_label(&self, tok: &str, lineno: usize) -> Result<u32, SimError> {
        if let Some(&a) = self.labels.get(tok) {
            return Ok(a);
        }
        parse_int(tok)
            .map(|v| v as u32)
            .ok_or_else(|| err(lineno, format!("unresolved label '{}'", tok)))
    }

    /// Memory operand: `off($base)`, `label($base)`, bare `label`, or bare
    /// immediate (base defaults to `$zero`).
    fn parse_mem_operand(&self, tok: &str, lineno: usize) -> Result<(u8, i32), SimError> {
        if let Some(open) = tok.find('(') {
            let close = tok
                .rfind(')')
                .ok_or_else(|| err(lineno, format!("unbalanced memory operand '{}'", tok)))?;
            let off_str = tok[..open].trim();
            let base = parse_register(tok[open + 1..close].trim())
                .ok_or_else(|| err(lineno, format!("unknown base register in '{}'", tok)))?;
            let off = if off_str.is_empty() {
                0
            } else {
                self.resolve_imm(off_str, lineno)?
            };
            Ok((base, off))
        } else {
            Ok((0, self.resolve_imm(tok, lineno)?))
        }
    }
}

fn err(lineno: usize, msg: String) -> SimError {
    SimError::Program {
        line: lineno + 1,
        msg,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Splits a leading `label:` off a line, if present.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let label = line[..colon].trim();
    if label.is_empty()
        || !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some((label, &line[colon + 1..]))
}

/// First word of a directive body (e.g. `word` from `word 1, 2`).
fn directive_word(directive: &str) -> &str {
    directive
        .split_whitespace()
        .next()
        .unwrap_or(directive)
}

/// Everything after the directive/mnemonic word.
fn operand_str(line: &str) -> &str {
    match line.split_once(char::is_whitespace) {
        Some((_, rest)) => rest,
        None => "",
    }
}

fn count_operands(line: &str) -> usize {
    operand_str(line).split(',').filter(|s| !s.trim().is_empty()).count()
}

fn parse_int(tok: &str) -> Option<i64> {
    let tok = tok.trim();
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = tok.strip_prefix("-0x") {
        return i64::from_str_radix(hex, 16).ok().map(|v| -v);
    }
    tok.parse().ok()
}

fn parse_string_literal(tok: &str) -> Option<String> {
    let tok = tok.trim();
    let inner = tok.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                other => out.push(other),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
