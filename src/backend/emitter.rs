//! Instruction sink
//!
//! Buffers instruction and label lines, hands out fresh label names and
//! renders the final text.

use std::collections::HashMap;
use std::fmt;

use crate::backend::opcode::Opcode;
use crate::utils::{Error, Result};

/// An instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Label(name) => f.write_str(name),
        }
    }
}

/// One output line
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Instr { op: Opcode, operands: Vec<Operand> },
    Label(String),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Instr { op, operands } => {
                write!(f, "{}", op)?;
                for operand in operands {
                    write!(f, " {}", operand)?;
                }
                Ok(())
            }
            Line::Label(name) => write!(f, "{}:", name),
        }
    }
}

#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<Line>,
    /// Label name to the index of its line
    labels: HashMap<String, usize>,
    label_counter: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A label name not handed out before: `prefix_N`
    pub fn new_label(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.label_counter);
        self.label_counter += 1;
        name
    }

    /// Place a label at the current position
    pub fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.lines.len());
        self.lines.push(Line::Label(name.to_string()));
        Ok(())
    }

    pub fn emit(&mut self, op: Opcode) {
        self.push(op, Vec::new());
    }

    pub fn emit_int(&mut self, op: Opcode, value: i64) {
        self.push(op, vec![Operand::Int(value)]);
    }

    pub fn emit_pair(&mut self, op: Opcode, first: i64, second: i64) {
        self.push(op, vec![Operand::Int(first), Operand::Int(second)]);
    }

    pub fn emit_label_ref(&mut self, op: Opcode, label: &str) {
        self.push(op, vec![Operand::Label(label.to_string())]);
    }

    fn push(&mut self, op: Opcode, operands: Vec<Operand>) {
        let line = Line::Instr { op, operands };
        log::trace!("emit {}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Render the program text; every referenced label must be defined
    pub fn finish(self) -> Result<String> {
        for line in &self.lines {
            if let Line::Instr { operands, .. } = line {
                for operand in operands {
                    if let Operand::Label(name) = operand {
                        if !self.labels.contains_key(name) {
                            return Err(Error::CodeGen(format!("reference to undefined label '{}'", name)));
                        }
                    }
                }
            }
        }
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_fresh() {
        let mut emitter = Emitter::new();
        let a = emitter.new_label("else");
        let b = emitter.new_label("else");
        assert_ne!(a, b);
        assert_eq!(a, "else_0");
    }

    #[test]
    fn test_duplicate_label_is_an_error() {
        let mut emitter = Emitter::new();
        emitter.define_label("main").unwrap();
        assert!(matches!(emitter.define_label("main"), Err(Error::DuplicateLabel(name)) if name == "main"));
    }

    #[test]
    fn test_render() {
        let mut emitter = Emitter::new();
        emitter.define_label("main").unwrap();
        emitter.emit_int(Opcode::LB, 5);
        emitter.emit_pair(Opcode::ST, 1, 0);
        emitter.emit_label_ref(Opcode::BR, "main");
        emitter.emit(Opcode::HALT);
        assert_eq!(emitter.finish().unwrap(), "main:\nLB 5\nST 1 0\nBR main\nHALT\n");
    }

    #[test]
    fn test_undefined_label_is_an_error() {
        let mut emitter = Emitter::new();
        emitter.emit_label_ref(Opcode::BF, "nowhere");
        assert!(emitter.finish().is_err());
    }
}
