//! System V AMD64 calling convention as used on macOS: arguments in DI, SI,
//! DX, CX, R8, R9, no shadow space, integer results in AX. Symbol mangling
//! (the `_` prefix) happens at emission.

use crate::ast::Parameter;
use crate::ir::{Instruction, Operand, Register, Size};

use super::CodeGen;

const ARG_REGISTERS: [Register; 6] = [
    Register::Di,
    Register::Si,
    Register::Dx,
    Register::Cx,
    Register::R8,
    Register::R9,
];

pub fn gen_call(c: &mut CodeGen, name: &str, arguments: Vec<Operand>) -> Operand {
    let mut padding = 0;
    if arguments.len() % 2 == 0 {
        padding += 8;
    }

    c.push(Instruction::Sub {
        dst: Operand::Register(Register::Sp, Size::QWord),
        src: Operand::IntegerConstant(padding),
    });

    let register_count = arguments.len().min(ARG_REGISTERS.len());
    for (argument, register) in arguments.iter().zip(ARG_REGISTERS.iter()) {
        c.mov(*argument, Operand::Register(*register, Size::DWord));
    }
    for argument in arguments[register_count..].iter().rev() {
        c.push(Instruction::Push(*argument));
    }

    c.push(Instruction::Call(String::from(name)));

    let stack_arguments = (arguments.len() - register_count) as i64;
    c.push(Instruction::Add {
        dst: Operand::Register(Register::Sp, Size::QWord),
        src: Operand::IntegerConstant(8 * stack_arguments + padding),
    });

    Operand::Register(Register::Ax, Size::DWord)
}

pub fn gen_parameters(c: &mut CodeGen, parameters: &[Parameter]) {
    for (index, parameter) in parameters.iter().enumerate() {
        let operand = match ARG_REGISTERS.get(index) {
            Some(register) => {
                let slot = c.new_temp(Size::DWord);
                c.mov(Operand::Register(*register, Size::DWord), slot);
                slot
            }
            None => Operand::Temp {
                offset: -(16 + 8 * (index - ARG_REGISTERS.len()) as i64),
                size: Size::DWord,
            },
        };
        c.locals.insert(parameter.name.lexeme.clone(), operand);
    }
}
