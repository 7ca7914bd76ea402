mod emit;
mod macos;
mod validate;
mod windows;

pub use emit::emit;
pub use validate::validate;

use std::collections::HashMap;

use crate::ast::*;
use crate::diag::ErrorHandler;
use crate::ir::{Condition, Instruction, Operand, Register, Size};
use crate::target::Platform;
use crate::token::TokenKind;
use crate::types::{BasicType, Type};

struct LoopLabels {
    start: String,
    exit: String,
}

/// Lowering context. Per-function state (frame cursor, operand map, label
/// counters, loop stack) is reset by `reset_function`; `externals` and the
/// platform span the whole compilation.
pub struct CodeGen<'a> {
    platform: Platform,
    handler: &'a mut ErrorHandler,
    externals: Vec<String>,
    code: Vec<Instruction>,
    stack_index: u64,
    locals: HashMap<String, Operand>,
    loops: Vec<LoopLabels>,
    if_index: u32,
    loop_index: u32,
    logic_index: u32,
}

impl<'a> CodeGen<'a> {
    fn new(platform: Platform, handler: &'a mut ErrorHandler) -> Self {
        Self {
            platform,
            handler,
            externals: Vec::new(),
            code: Vec::new(),
            stack_index: 0,
            locals: HashMap::new(),
            loops: Vec::new(),
            if_index: 0,
            loop_index: 0,
            logic_index: 0,
        }
    }

    fn reset_function(&mut self) {
        self.code.clear();
        self.stack_index = 0;
        self.locals.clear();
        self.loops.clear();
        self.if_index = 0;
        self.loop_index = 0;
        self.logic_index = 0;
    }

    /// Hand out `size` more frame bytes; the cumulative count is the
    /// `[rbp - k]` offset of the new slot and, at the end of the function,
    /// its `stack_alloc`.
    fn allocate_stack(&mut self, size: u64) -> u64 {
        self.stack_index += size;
        self.stack_index
    }

    fn new_temp(&mut self, size: Size) -> Operand {
        let offset = self.allocate_stack(size.bytes()) as i64;
        Operand::Temp { offset, size }
    }

    /// Byte-sized flag in a full 4-byte slot, as produced by `set<cc>`.
    fn new_flag_temp(&mut self) -> Operand {
        let offset = self.allocate_stack(4) as i64;
        Operand::Temp {
            offset,
            size: Size::Byte,
        }
    }

    fn push(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn mov(&mut self, src: Operand, dst: Operand) {
        self.push(Instruction::Move {
            src,
            dst,
            sign_extend: false,
        });
    }
}

/// Storage width of a language type; `None` for everything the back end
/// cannot lower.
fn type_size(ty: &Type) -> Option<Size> {
    match ty {
        Type::Fundamental(BasicType::I32 | BasicType::Null | BasicType::Character) => {
            Some(Size::DWord)
        }
        Type::Fundamental(BasicType::I64) => Some(Size::QWord),
        _ => None,
    }
}

fn expression_size(c: &mut CodeGen, expression: &Expression) -> Size {
    match type_size(expression.expression_type()) {
        Some(size) => size,
        None => {
            c.handler.report_error(
                format!(
                    "Type '{}' is not supported by the x86-64 back end",
                    expression.expression_type()
                ),
                expression.position(),
            );
            Size::DWord
        }
    }
}

fn comparison_condition(kind: TokenKind) -> Option<Condition> {
    let condition = match kind {
        TokenKind::EqualEqual => Condition::Eq,
        TokenKind::BangEqual => Condition::Ne,
        TokenKind::Greater => Condition::Gt,
        TokenKind::GreaterEqual => Condition::Ge,
        TokenKind::Less => Condition::Lt,
        TokenKind::LessEqual => Condition::Le,
        _ => return None,
    };
    Some(condition)
}

/// Lower an analyzed program to the linear IR. Returns the instruction list
/// and the `extern` names collected from decorated definitions.
pub fn generate(
    program: &ProgramFile,
    platform: Platform,
    handler: &mut ErrorHandler,
) -> (Vec<Instruction>, Vec<String>) {
    let mut c = CodeGen::new(platform, handler);
    let mut instructions = Vec::new();

    for definition in &program.definitions {
        match definition {
            Definition::Function(function) => {
                if let Some(instruction) = gen_function(&mut c, function) {
                    instructions.push(instruction);
                }
            }
            Definition::Variable(variable) => {
                c.handler.report_error(
                    "Global variables are not supported by the x86-64 back end",
                    variable.name.position.clone(),
                );
            }
            // classes are parsed and checked but never lowered
            Definition::Class(..) => {}
        }
    }

    // top-level statements become the body of the synthesized `main`
    c.reset_function();
    for statement in &program.statements {
        gen_statement(&mut c, statement);
    }
    c.mov(
        Operand::IntegerConstant(0),
        Operand::Register(Register::Ax, Size::DWord),
    );
    c.push(Instruction::Return);
    instructions.push(Instruction::FunctionDefinition {
        name: String::from("main"),
        instructions: std::mem::take(&mut c.code),
        stack_alloc: c.stack_index,
    });

    (instructions, c.externals)
}

fn gen_function(c: &mut CodeGen, function: &FunctionDefinition) -> Option<Instruction> {
    if function.decorator == Decorator::External {
        c.externals.push(function.name.lexeme.clone());
        return None;
    }

    c.reset_function();
    match c.platform {
        Platform::Windows => windows::gen_parameters(c, &function.parameters),
        Platform::MacOs => macos::gen_parameters(c, &function.parameters),
    }

    if let Some(body) = &function.body {
        gen_statement(c, body);
    }

    // default fall-through return
    c.mov(
        Operand::IntegerConstant(0),
        Operand::Register(Register::Ax, Size::DWord),
    );
    c.push(Instruction::Return);

    Some(Instruction::FunctionDefinition {
        name: function.name.lexeme.clone(),
        instructions: std::mem::take(&mut c.code),
        stack_alloc: c.stack_index,
    })
}

fn gen_statement(c: &mut CodeGen, statement: &Statement) {
    match statement {
        Statement::Null => {}
        Statement::Compound(compound) => {
            for statement in &compound.statements {
                gen_statement(c, statement);
            }
        }
        Statement::Expression(expression_statement) => {
            gen_expression(c, &expression_statement.expression);
        }
        Statement::Return(return_statement) => {
            let value = gen_expression(c, &return_statement.expression);
            let size = expression_size(c, &return_statement.expression);
            c.mov(value, Operand::Register(Register::Ax, size));
            c.push(Instruction::Return);
        }
        Statement::If(if_statement) => gen_statement_if(c, if_statement),
        Statement::While(while_statement) => gen_statement_while(c, while_statement),
        Statement::Loop(loop_statement) => gen_statement_loop(c, loop_statement),
        Statement::Break(..) => {
            if let Some(labels) = c.loops.last() {
                let label = labels.exit.clone();
                c.push(Instruction::Jump {
                    label,
                    condition: Condition::None,
                });
            }
        }
        Statement::Continue(..) => {
            if let Some(labels) = c.loops.last() {
                let label = labels.start.clone();
                c.push(Instruction::Jump {
                    label,
                    condition: Condition::None,
                });
            }
        }
        Statement::Definition(Definition::Variable(variable)) => {
            gen_local_variable(c, variable);
        }
        Statement::Definition(..) => {}
    }
}

fn gen_local_variable(c: &mut CodeGen, variable: &VariableDefinition) {
    let size = match type_size(&variable.declared_type) {
        Some(size) => size,
        None => {
            c.handler.report_error(
                format!(
                    "Type '{}' is not supported by the x86-64 back end",
                    variable.declared_type
                ),
                variable.name.position.clone(),
            );
            Size::DWord
        }
    };

    let slot = c.new_temp(size);
    c.locals.insert(variable.name.lexeme.clone(), slot);

    if let Some(initializer) = &variable.initializer {
        let value = gen_expression(c, initializer);
        c.mov(value, slot);
    }
}

/// Branch to `label` when the condition is false. Comparison conditions
/// branch directly on the negated condition; anything else is compared
/// against zero.
fn gen_branch_if_false(c: &mut CodeGen, condition: &Expression, label: &str) {
    if let Expression::Binary(binary) = condition {
        if let Some(cond) = comparison_condition(binary.operator.kind) {
            let left = gen_expression(c, &binary.left);
            let right = gen_expression(c, &binary.right);
            c.push(Instruction::Compare { left, right });
            c.push(Instruction::Jump {
                label: String::from(label),
                condition: cond.negate(),
            });
            return;
        }
    }

    let value = gen_expression(c, condition);
    c.push(Instruction::Compare {
        left: value,
        right: Operand::IntegerConstant(0),
    });
    c.push(Instruction::Jump {
        label: String::from(label),
        condition: Condition::Eq,
    });
}

fn gen_statement_if(c: &mut CodeGen, if_statement: &IfStatement) {
    c.if_index += 1;
    let index = c.if_index;

    let end_label = format!(".IE{index}");
    let false_label = if if_statement.else_body.is_some() {
        format!(".IF{index}")
    } else {
        end_label.clone()
    };

    gen_branch_if_false(c, &if_statement.condition, &false_label);
    gen_statement(c, &if_statement.then_body);

    if let Some(else_body) = &if_statement.else_body {
        c.push(Instruction::Jump {
            label: end_label.clone(),
            condition: Condition::None,
        });
        c.push(Instruction::Label(false_label));
        gen_statement(c, else_body);
    }

    c.push(Instruction::Label(end_label));
}

fn gen_statement_while(c: &mut CodeGen, while_statement: &WhileStatement) {
    c.loop_index += 1;
    let index = c.loop_index;
    let start = format!(".LS{index}");
    let exit = format!(".LE{index}");

    c.push(Instruction::Label(start.clone()));
    gen_branch_if_false(c, &while_statement.condition, &exit);

    c.loops.push(LoopLabels {
        start: start.clone(),
        exit: exit.clone(),
    });
    gen_statement(c, &while_statement.body);
    c.loops.pop();

    c.push(Instruction::Jump {
        label: start,
        condition: Condition::None,
    });
    c.push(Instruction::Label(exit));
}

fn gen_statement_loop(c: &mut CodeGen, loop_statement: &LoopStatement) {
    c.loop_index += 1;
    let index = c.loop_index;
    let start = format!(".LS{index}");
    let exit = format!(".LE{index}");

    c.push(Instruction::Label(start.clone()));

    c.loops.push(LoopLabels {
        start: start.clone(),
        exit: exit.clone(),
    });
    gen_statement(c, &loop_statement.body);
    c.loops.pop();

    c.push(Instruction::Jump {
        label: start,
        condition: Condition::None,
    });
    c.push(Instruction::Label(exit));
}

fn gen_expression(c: &mut CodeGen, expression: &Expression) -> Operand {
    match expression {
        Expression::IntegerLiteral(literal) => Operand::IntegerConstant(literal.value),
        Expression::CharacterLiteral(literal) => {
            Operand::IntegerConstant(literal.token.lexeme.bytes().next().unwrap_or(0) as i64)
        }
        Expression::Identifier(identifier) => {
            match c.locals.get(&identifier.token.lexeme) {
                Some(operand) => *operand,
                None => {
                    c.handler.report_error(
                        format!("No storage allocated for '{}'", identifier.token.lexeme),
                        identifier.token.position.clone(),
                    );
                    Operand::IntegerConstant(0)
                }
            }
        }
        Expression::Unary(unary) => gen_expression_unary(c, unary),
        Expression::Binary(binary) => gen_expression_binary(c, binary),
        Expression::Assignment(assignment) => gen_expression_assignment(c, assignment),
        Expression::Call(call) => gen_expression_call(c, call),
        Expression::FloatLiteral(literal) => {
            c.handler.report_error(
                "Floating point values are not supported by the x86-64 back end",
                literal.position.clone(),
            );
            Operand::IntegerConstant(0)
        }
        Expression::StringLiteral(literal) => {
            c.handler.report_error(
                "String literals are not supported by the x86-64 back end",
                literal.token.position.clone(),
            );
            Operand::IntegerConstant(0)
        }
        Expression::ArrayList(array) => {
            c.handler.report_error(
                "Array literals are not supported by the x86-64 back end",
                array.position.clone(),
            );
            Operand::IntegerConstant(0)
        }
        Expression::MemberAccess(member_access) => {
            c.handler.report_error(
                "Member access is not supported by the x86-64 back end",
                member_access.operator.position.clone(),
            );
            Operand::IntegerConstant(0)
        }
    }
}

fn gen_expression_unary(c: &mut CodeGen, unary: &UnaryOperation) -> Operand {
    let operand = gen_expression(c, &unary.operand);

    match unary.operator.kind {
        TokenKind::Minus => {
            let size = expression_size(c, &unary.operand);
            let temp = c.new_temp(size);
            c.mov(operand, temp);
            c.push(Instruction::Negate(temp));
            temp
        }
        TokenKind::Tilde => {
            let size = expression_size(c, &unary.operand);
            let temp = c.new_temp(size);
            c.mov(operand, temp);
            c.push(Instruction::BitwiseNot(temp));
            temp
        }
        // logical not: compare against zero and set on equality
        TokenKind::Bang => {
            let temp = c.new_flag_temp();
            c.push(Instruction::Compare {
                left: operand,
                right: Operand::IntegerConstant(0),
            });
            c.push(Instruction::Set {
                dst: temp,
                condition: Condition::Eq,
            });
            temp
        }
        _ => operand,
    }
}

fn gen_expression_binary(c: &mut CodeGen, binary: &BinaryOperation) -> Operand {
    match binary.operator.kind {
        TokenKind::Plus | TokenKind::Minus | TokenKind::Star => {
            let left = gen_expression(c, &binary.left);
            let right = gen_expression(c, &binary.right);
            let size = expression_size(c, &binary.left);
            let temp = c.new_temp(size);
            c.mov(left, temp);
            let instruction = match binary.operator.kind {
                TokenKind::Plus => Instruction::Add {
                    dst: temp,
                    src: right,
                },
                TokenKind::Minus => Instruction::Sub {
                    dst: temp,
                    src: right,
                },
                _ => Instruction::Mul {
                    dst: temp,
                    src: right,
                },
            };
            c.push(instruction);
            temp
        }
        TokenKind::Slash => {
            let left = gen_expression(c, &binary.left);
            let right = gen_expression(c, &binary.right);
            let size = expression_size(c, &binary.left);
            let divisor = c.new_temp(size);
            c.mov(right, divisor);
            c.mov(left, Operand::Register(Register::Ax, size));
            c.push(Instruction::Cdq);
            c.push(Instruction::Divide(divisor));
            Operand::Register(Register::Ax, size)
        }
        TokenKind::And => gen_logic(c, binary, true),
        TokenKind::Or => gen_logic(c, binary, false),
        kind => match comparison_condition(kind) {
            Some(condition) => {
                let left = gen_expression(c, &binary.left);
                let right = gen_expression(c, &binary.right);
                let temp = c.new_flag_temp();
                c.push(Instruction::Compare { left, right });
                c.push(Instruction::Set {
                    dst: temp,
                    condition,
                });
                temp
            }
            None => {
                c.handler.report_error(
                    format!(
                        "Operator '{}' is not supported by the x86-64 back end",
                        binary.operator.lexeme
                    ),
                    binary.operator.position.clone(),
                );
                Operand::IntegerConstant(0)
            }
        },
    }
}

/// Short-circuit `and`/`or` over three local labels: `.CF` collects the
/// false arm of `and`, `.CT` the true arm of `or`, `.CE` is the join.
fn gen_logic(c: &mut CodeGen, binary: &BinaryOperation, is_and: bool) -> Operand {
    c.logic_index += 1;
    let index = c.logic_index;
    let end_label = format!(".CE{index}");

    let result = c.new_temp(Size::DWord);

    let (short_label, jump_condition, short_value, long_value) = if is_and {
        (format!(".CF{index}"), Condition::Eq, 0, 1)
    } else {
        (format!(".CT{index}"), Condition::Ne, 1, 0)
    };

    for side in [&binary.left, &binary.right] {
        let value = gen_expression(c, side);
        c.push(Instruction::Compare {
            left: value,
            right: Operand::IntegerConstant(0),
        });
        c.push(Instruction::Jump {
            label: short_label.clone(),
            condition: jump_condition,
        });
    }

    c.mov(Operand::IntegerConstant(long_value), result);
    c.push(Instruction::Jump {
        label: end_label.clone(),
        condition: Condition::None,
    });
    c.push(Instruction::Label(short_label));
    c.mov(Operand::IntegerConstant(short_value), result);
    c.push(Instruction::Label(end_label));

    result
}

fn gen_expression_assignment(c: &mut CodeGen, assignment: &Assignment) -> Operand {
    let value = gen_expression(c, &assignment.right);
    let target = gen_expression(c, &assignment.left);
    c.mov(value, target);
    target
}

fn gen_expression_call(c: &mut CodeGen, call: &Call) -> Operand {
    let arguments: Vec<Operand> = call
        .arguments
        .iter()
        .map(|argument| gen_expression(c, &argument.value))
        .collect();

    match c.platform {
        Platform::Windows => windows::gen_call(c, &call.callee.lexeme, arguments),
        Platform::MacOs => macos::gen_call(c, &call.callee.lexeme, arguments),
    }
}
