//! Legalization: rewrites IR so every instruction respects x86 operand
//! constraints (one memory operand per instruction, no widening `mov`
//! without sign extension, register destination for `imul`). Each rewrite
//! routes one operand through a scratch register (AX, R10 or R11) that is
//! never live across the instruction it was introduced for.

use crate::ir::{Instruction, Operand, Register, Size};

/// A rewrite can itself produce an illegal shape (a widened move feeding a
/// `push`), so the pass runs to a fixed point. The cap only guards against a
/// rule that fails to converge.
const MAX_PASSES: u32 = 4;

pub fn validate(instructions: &mut Vec<Instruction>) {
    for _ in 0..MAX_PASSES {
        if !pass(instructions) {
            break;
        }
    }
}

fn widens(src: &Operand, dst: &Operand) -> bool {
    matches!((src.size(), dst.size()), (Some(src), Some(dst)) if dst > src)
}

fn pass(instructions: &mut Vec<Instruction>) -> bool {
    let mut changed = false;
    let mut out = Vec::with_capacity(instructions.len());

    for instruction in instructions.drain(..) {
        match instruction {
            Instruction::FunctionDefinition {
                name,
                mut instructions,
                stack_alloc,
            } => {
                changed |= pass(&mut instructions);
                out.push(Instruction::FunctionDefinition {
                    name,
                    instructions,
                    stack_alloc,
                });
            }
            Instruction::Move {
                src,
                dst,
                sign_extend,
            } if !sign_extend && widens(&src, &dst) => {
                let scratch = Operand::Register(Register::Ax, dst.size().unwrap_or(Size::QWord));
                out.push(Instruction::Move {
                    src,
                    dst: scratch,
                    sign_extend: true,
                });
                out.push(Instruction::Move {
                    src: scratch,
                    dst,
                    sign_extend: false,
                });
                changed = true;
            }
            Instruction::Move {
                src,
                dst,
                sign_extend,
            } if src.is_temp() && dst.is_temp() => {
                let scratch = Operand::Register(Register::R10, src.size().unwrap_or(Size::DWord));
                out.push(Instruction::Move {
                    src,
                    dst: scratch,
                    sign_extend,
                });
                out.push(Instruction::Move {
                    src: scratch,
                    dst,
                    sign_extend: false,
                });
                changed = true;
            }
            Instruction::Add { dst, src } if dst.is_temp() && src.is_temp() => {
                let scratch = Operand::Register(Register::R10, src.size().unwrap_or(Size::DWord));
                out.push(Instruction::Move {
                    src,
                    dst: scratch,
                    sign_extend: false,
                });
                out.push(Instruction::Add { dst, src: scratch });
                changed = true;
            }
            Instruction::Sub { dst, src } if dst.is_temp() && src.is_temp() => {
                let scratch = Operand::Register(Register::R10, src.size().unwrap_or(Size::DWord));
                out.push(Instruction::Move {
                    src,
                    dst: scratch,
                    sign_extend: false,
                });
                out.push(Instruction::Sub { dst, src: scratch });
                changed = true;
            }
            // imul cannot write to memory
            Instruction::Mul { dst, src } if dst.is_temp() => {
                let scratch = Operand::Register(Register::R11, dst.size().unwrap_or(Size::DWord));
                out.push(Instruction::Move {
                    src: dst,
                    dst: scratch,
                    sign_extend: false,
                });
                out.push(Instruction::Mul { dst: scratch, src });
                out.push(Instruction::Move {
                    src: scratch,
                    dst,
                    sign_extend: false,
                });
                changed = true;
            }
            Instruction::Compare { left, right } if left.is_constant() || left.is_temp() => {
                let size = left
                    .size()
                    .or(right.size())
                    .unwrap_or(Size::DWord);
                let scratch = Operand::Register(Register::Ax, size);
                out.push(Instruction::Move {
                    src: left,
                    dst: scratch,
                    sign_extend: false,
                });
                out.push(Instruction::Compare {
                    left: scratch,
                    right,
                });
                changed = true;
            }
            // push takes a 64-bit register or an immediate
            Instruction::Push(src) if !src.is_constant() && src.size() != Some(Size::QWord) => {
                let scratch = Operand::Register(Register::Ax, Size::QWord);
                out.push(Instruction::Move {
                    src,
                    dst: scratch,
                    sign_extend: false,
                });
                out.push(Instruction::Push(scratch));
                changed = true;
            }
            other => out.push(other),
        }
    }

    *instructions = out;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Condition;

    fn temp(offset: i64, size: Size) -> Operand {
        Operand::Temp { offset, size }
    }

    fn register(register: Register, size: Size) -> Operand {
        Operand::Register(register, size)
    }

    fn run(instructions: Vec<Instruction>) -> Vec<Instruction> {
        let mut instructions = instructions;
        validate(&mut instructions);
        instructions
    }

    fn is_legal(instruction: &Instruction) -> bool {
        match instruction {
            Instruction::Move {
                src,
                dst,
                sign_extend,
            } => !(src.is_temp() && dst.is_temp()) && (*sign_extend || !widens(src, dst)),
            Instruction::Add { dst, src } | Instruction::Sub { dst, src } => {
                !(dst.is_temp() && src.is_temp())
            }
            Instruction::Mul { dst, .. } => !dst.is_temp(),
            Instruction::Compare { left, .. } => !left.is_constant() && !left.is_temp(),
            Instruction::Push(src) => src.is_constant() || src.size() == Some(Size::QWord),
            _ => true,
        }
    }

    #[test]
    fn memory_to_memory_move_goes_through_r10() {
        let out = run(vec![Instruction::Move {
            src: temp(4, Size::DWord),
            dst: temp(8, Size::DWord),
            sign_extend: false,
        }]);
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[0],
            Instruction::Move {
                dst: Operand::Register(Register::R10, Size::DWord),
                ..
            }
        ));
        assert!(out.iter().all(is_legal));
    }

    #[test]
    fn widening_move_sign_extends_through_ax() {
        let out = run(vec![Instruction::Move {
            src: temp(4, Size::DWord),
            dst: register(Register::Ax, Size::QWord),
            sign_extend: false,
        }]);
        assert!(matches!(
            out[0],
            Instruction::Move {
                sign_extend: true,
                dst: Operand::Register(Register::Ax, Size::QWord),
                ..
            }
        ));
        assert!(out.iter().all(is_legal));
    }

    #[test]
    fn add_of_two_temps_uses_r10() {
        let out = run(vec![Instruction::Add {
            dst: temp(4, Size::DWord),
            src: temp(8, Size::DWord),
        }]);
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[1],
            Instruction::Add {
                src: Operand::Register(Register::R10, Size::DWord),
                ..
            }
        ));
    }

    #[test]
    fn mul_into_memory_uses_r11() {
        let out = run(vec![Instruction::Mul {
            dst: temp(4, Size::DWord),
            src: Operand::IntegerConstant(3),
        }]);
        assert_eq!(out.len(), 3);
        assert!(matches!(
            out[1],
            Instruction::Mul {
                dst: Operand::Register(Register::R11, Size::DWord),
                ..
            }
        ));
        // the product lands back in the original slot
        assert!(matches!(
            out[2],
            Instruction::Move {
                dst: Operand::Temp { offset: 4, .. },
                ..
            }
        ));
    }

    #[test]
    fn compare_left_operand_routes_through_ax() {
        let out = run(vec![Instruction::Compare {
            left: Operand::IntegerConstant(1),
            right: Operand::IntegerConstant(0),
        }]);
        assert!(matches!(
            out[1],
            Instruction::Compare {
                left: Operand::Register(Register::Ax, Size::DWord),
                ..
            }
        ));
        assert!(out.iter().all(is_legal));
    }

    #[test]
    fn push_of_a_dword_temp_widens_into_ax() {
        let out = run(vec![Instruction::Push(temp(4, Size::DWord))]);
        // rewritten to a widened move plus a 64-bit push, then the widened
        // move is legalized by the next pass
        assert!(out.iter().all(is_legal));
        assert!(matches!(
            out.last(),
            Some(Instruction::Push(Operand::Register(
                Register::Ax,
                Size::QWord
            )))
        ));
    }

    #[test]
    fn validation_is_idempotent() {
        let mut instructions = vec![
            Instruction::Move {
                src: temp(4, Size::DWord),
                dst: temp(8, Size::DWord),
                sign_extend: false,
            },
            Instruction::Compare {
                left: temp(4, Size::DWord),
                right: Operand::IntegerConstant(0),
            },
            Instruction::Push(temp(4, Size::DWord)),
        ];
        validate(&mut instructions);
        let before = format!("{instructions:?}");
        validate(&mut instructions);
        assert_eq!(before, format!("{instructions:?}"));
    }

    #[test]
    fn recurses_into_function_definitions() {
        let out = run(vec![Instruction::FunctionDefinition {
            name: String::from("f"),
            instructions: vec![Instruction::Move {
                src: temp(4, Size::DWord),
                dst: temp(8, Size::DWord),
                sign_extend: false,
            }],
            stack_alloc: 8,
        }]);
        let Instruction::FunctionDefinition { instructions, .. } = &out[0] else {
            panic!("expected function definition");
        };
        assert_eq!(instructions.len(), 2);
        assert!(instructions.iter().all(is_legal));
    }

    #[test]
    fn legal_instructions_pass_through_untouched() {
        let input = vec![
            Instruction::Move {
                src: Operand::IntegerConstant(1),
                dst: temp(4, Size::DWord),
                sign_extend: false,
            },
            Instruction::Jump {
                label: String::from(".LS1"),
                condition: Condition::None,
            },
            Instruction::Cdq,
        ];
        let out = run(input.clone());
        assert_eq!(format!("{out:?}"), format!("{input:?}"));
    }
}
