//! Intel-syntax NASM emission. A pure function of the instruction list, the
//! extern list and the platform: identical inputs must print identical text.

use crate::ir::Instruction;
use crate::target::Platform;

struct Emitter {
    output: String,
    platform: Platform,
}

pub fn emit(instructions: &[Instruction], externals: &[String], platform: Platform) -> String {
    let mut emitter = Emitter {
        output: String::new(),
        platform,
    };

    emitter.emit_header(externals);
    for instruction in instructions {
        emitter.emit_instruction(instruction);
    }

    emitter.output
}

impl Emitter {
    /// macOS mangles every global symbol and call target with a `_` prefix;
    /// Windows symbols are unmangled.
    fn mangle(&self, name: &str) -> String {
        match self.platform {
            Platform::Windows => String::from(name),
            Platform::MacOs => format!("_{name}"),
        }
    }

    fn write_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn write_instruction_line(&mut self, line: &str) {
        self.output.push_str("    ");
        self.write_line(line);
    }

    fn label(&mut self, name: &str) {
        self.output.push_str(name);
        self.write_line(":");
    }

    fn emit_header(&mut self, externals: &[String]) {
        if !externals.is_empty() {
            let names: Vec<String> = externals.iter().map(|name| self.mangle(name)).collect();
            self.write_line(&format!("extern {}", names.join(", ")));
        }
        self.write_line("section .text");
    }

    fn emit_instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::FunctionDefinition {
                name,
                instructions,
                stack_alloc,
            } => {
                let mangled = self.mangle(name);
                self.write_line(&format!("global {mangled}"));
                self.label(&mangled);
                self.emit_prologue(*stack_alloc);
                for instruction in instructions {
                    self.emit_instruction(instruction);
                }
            }
            Instruction::Move {
                src,
                dst,
                sign_extend,
            } => {
                let opcode = if *sign_extend { "movsx" } else { "mov" };
                self.write_instruction_line(&format!("{opcode} {dst}, {src}"));
            }
            Instruction::Return => self.emit_epilogue(),
            Instruction::Negate(operand) => {
                self.write_instruction_line(&format!("neg {operand}"));
            }
            Instruction::BitwiseNot(operand) => {
                self.write_instruction_line(&format!("not {operand}"));
            }
            Instruction::Add { dst, src } => {
                self.write_instruction_line(&format!("add {dst}, {src}"));
            }
            Instruction::Sub { dst, src } => {
                self.write_instruction_line(&format!("sub {dst}, {src}"));
            }
            Instruction::Mul { dst, src } => {
                self.write_instruction_line(&format!("imul {dst}, {src}"));
            }
            Instruction::Divide(operand) => {
                self.write_instruction_line(&format!("idiv {operand}"));
            }
            Instruction::Cdq => self.write_instruction_line("cdq"),
            Instruction::Compare { left, right } => {
                self.write_instruction_line(&format!("cmp {left}, {right}"));
            }
            Instruction::Set { dst, condition } => {
                self.write_instruction_line(&format!("set{} {dst}", condition.suffix()));
            }
            Instruction::Jump { label, condition } => {
                self.write_instruction_line(&format!("j{} {label}", condition.suffix()));
            }
            Instruction::Label(name) => self.label(name),
            Instruction::Call(name) => {
                let mangled = self.mangle(name);
                self.write_instruction_line(&format!("call {mangled}"));
            }
            Instruction::Push(operand) => {
                self.write_instruction_line(&format!("push {operand}"));
            }
        }
    }

    fn emit_prologue(&mut self, stack_alloc: u64) {
        self.write_instruction_line("push rbp");
        self.write_instruction_line("mov rbp, rsp");
        self.write_instruction_line(&format!("sub rsp, {stack_alloc}"));
    }

    fn emit_epilogue(&mut self) {
        self.write_instruction_line("mov rsp, rbp");
        self.write_instruction_line("pop rbp");
        self.write_instruction_line("ret");
    }
}
