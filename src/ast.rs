use crate::position::Position;
use crate::token::Token;
use crate::types::Type;

//
// Expressions
//

#[derive(Debug)]
pub struct IntegerLiteral {
    pub value: i64,
    pub position: Position,
    pub ty: Type,
}

#[derive(Debug)]
pub struct FloatLiteral {
    pub value: f64,
    pub position: Position,
    pub ty: Type,
}

/// String and character literals keep their token, which carries both the
/// contents and the span.
#[derive(Debug)]
pub struct Literal {
    pub token: Token,
    pub ty: Type,
}

#[derive(Debug)]
pub struct ArrayList {
    pub elements: Vec<(Expression, Position)>,
    pub position: Position,
    pub ty: Type,
}

#[derive(Debug)]
pub struct UnaryOperation {
    pub operator: Token,
    pub operand: Box<Expression>,
    pub ty: Type,
}

#[derive(Debug)]
pub struct BinaryOperation {
    pub left: Box<Expression>,
    pub operator: Token,
    pub right: Box<Expression>,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Identifier {
    pub token: Token,
    pub ty: Type,
}

/// One call argument: an optional `name:` prefix plus the value expression.
#[derive(Debug)]
pub struct Argument {
    pub name: Option<Token>,
    pub value: Expression,
}

#[derive(Debug)]
pub struct Call {
    pub callee: Token,
    pub arguments: Vec<Argument>,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Assignment {
    pub left: Box<Expression>,
    pub operator: Token,
    pub right: Box<Expression>,
    pub ty: Type,
}

/// `left . right` or `left -> right`; the operator token distinguishes value
/// access from pointer access.
#[derive(Debug)]
pub struct MemberAccess {
    pub left: Box<Expression>,
    pub operator: Token,
    pub right: Box<Expression>,
    pub ty: Type,
}

#[derive(Debug)]
pub enum Expression {
    IntegerLiteral(IntegerLiteral),
    FloatLiteral(FloatLiteral),
    StringLiteral(Literal),
    CharacterLiteral(Literal),
    ArrayList(ArrayList),
    Unary(UnaryOperation),
    Binary(BinaryOperation),
    Identifier(Identifier),
    Call(Call),
    Assignment(Assignment),
    MemberAccess(MemberAccess),
}

impl Expression {
    pub fn expression_type(&self) -> &Type {
        match self {
            Expression::IntegerLiteral(node) => &node.ty,
            Expression::FloatLiteral(node) => &node.ty,
            Expression::StringLiteral(node) => &node.ty,
            Expression::CharacterLiteral(node) => &node.ty,
            Expression::ArrayList(node) => &node.ty,
            Expression::Unary(node) => &node.ty,
            Expression::Binary(node) => &node.ty,
            Expression::Identifier(node) => &node.ty,
            Expression::Call(node) => &node.ty,
            Expression::Assignment(node) => &node.ty,
            Expression::MemberAccess(node) => &node.ty,
        }
    }

    pub fn set_expression_type(&mut self, ty: Type) {
        let slot = match self {
            Expression::IntegerLiteral(node) => &mut node.ty,
            Expression::FloatLiteral(node) => &mut node.ty,
            Expression::StringLiteral(node) => &mut node.ty,
            Expression::CharacterLiteral(node) => &mut node.ty,
            Expression::ArrayList(node) => &mut node.ty,
            Expression::Unary(node) => &mut node.ty,
            Expression::Binary(node) => &mut node.ty,
            Expression::Identifier(node) => &mut node.ty,
            Expression::Call(node) => &mut node.ty,
            Expression::Assignment(node) => &mut node.ty,
            Expression::MemberAccess(node) => &mut node.ty,
        };
        *slot = ty;
    }

    pub fn position(&self) -> Position {
        match self {
            Expression::IntegerLiteral(node) => node.position.clone(),
            Expression::FloatLiteral(node) => node.position.clone(),
            Expression::StringLiteral(node) => node.token.position.clone(),
            Expression::CharacterLiteral(node) => node.token.position.clone(),
            Expression::ArrayList(node) => node.position.clone(),
            Expression::Unary(node) => node.operator.position.clone(),
            Expression::Binary(node) => node.operator.position.clone(),
            Expression::Identifier(node) => node.token.position.clone(),
            Expression::Call(node) => node.callee.position.clone(),
            Expression::Assignment(node) => node.operator.position.clone(),
            Expression::MemberAccess(node) => node.operator.position.clone(),
        }
    }

    /// Syntactic l-value check: what the language accepts on the left of `=`
    /// and on either side of a member access.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expression::Identifier(..) | Expression::Call(..) | Expression::MemberAccess(..)
        )
    }
}

//
// Statements
//

#[derive(Debug)]
pub struct CompoundStatement {
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub position: Position,
}

#[derive(Debug)]
pub struct ReturnStatement {
    pub expression: Expression,
    pub token: Token,
}

#[derive(Debug)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_body: Box<Statement>,
    pub else_body: Option<Box<Statement>>,
}

#[derive(Debug)]
pub struct LoopStatement {
    pub body: Box<Statement>,
}

#[derive(Debug)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Box<Statement>,
}

/// Break/continue carry the id of the loop they leave, filled in by the
/// analyzer; 0 means "not yet resolved".
#[derive(Debug)]
pub struct BreakStatement {
    pub token: Token,
    pub loop_id: u32,
}

#[derive(Debug)]
pub struct ContinueStatement {
    pub token: Token,
    pub loop_id: u32,
}

#[derive(Debug)]
pub enum Statement {
    Null,
    Compound(CompoundStatement),
    Expression(ExpressionStatement),
    Return(ReturnStatement),
    If(IfStatement),
    Loop(LoopStatement),
    While(WhileStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Definition(Definition),
}

//
// Definitions
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decorator {
    None,
    External,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: Token,
    pub ty: Type,
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub name: Token,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    pub body: Option<Box<Statement>>,
    pub decorator: Decorator,
}

#[derive(Debug)]
pub struct VariableDefinition {
    pub name: Token,
    pub declared_type: Type,
    pub initializer: Option<Expression>,
    pub is_const: bool,
    pub is_global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug)]
pub struct ClassDefinition {
    pub name: Token,
    pub members: Vec<(Visibility, Definition)>,
}

#[derive(Debug)]
pub enum Definition {
    Function(FunctionDefinition),
    Variable(VariableDefinition),
    Class(ClassDefinition),
}

/// A parsed source file. Statements outside the definitions region act as
/// the body of an implicit `main`.
#[derive(Debug, Default)]
pub struct ProgramFile {
    pub definitions: Vec<Definition>,
    pub statements: Vec<Statement>,
}

//
// Tree dump, for the --verbose driver path
//

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::IntegerLiteral(node) => write!(f, "{}", node.value),
            Expression::FloatLiteral(node) => write!(f, "{}", node.value),
            Expression::StringLiteral(node) => write!(f, "\"{}\"", node.token.lexeme),
            Expression::CharacterLiteral(node) => write!(f, "'{}'", node.token.lexeme),
            Expression::ArrayList(node) => {
                write!(f, "[")?;
                for (i, (element, _)) in node.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    element.fmt(f)?;
                }
                write!(f, "]")
            }
            Expression::Unary(node) => write!(f, "{}({})", node.operator.lexeme, node.operand),
            Expression::Binary(node) => {
                write!(f, "({} {} {})", node.left, node.operator.lexeme, node.right)
            }
            Expression::Identifier(node) => write!(f, "name '{}'", node.token.lexeme),
            Expression::Call(node) => {
                write!(f, "call '{}' (", node.callee.lexeme)?;
                for (i, argument) in node.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(name) = &argument.name {
                        write!(f, "{}: ", name.lexeme)?;
                    }
                    argument.value.fmt(f)?;
                }
                write!(f, ")")
            }
            Expression::Assignment(node) => write!(f, "({} = {})", node.left, node.right),
            Expression::MemberAccess(node) => {
                write!(f, "({} {} {})", node.left, node.operator.lexeme, node.right)
            }
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Null => writeln!(f, "->"),
            Statement::Compound(node) => {
                writeln!(f, "{{")?;
                for statement in &node.statements {
                    statement.fmt(f)?;
                }
                writeln!(f, "}}")
            }
            Statement::Expression(node) => writeln!(f, "->  {}", node.expression),
            Statement::Return(node) => writeln!(f, "->  return {}", node.expression),
            Statement::If(node) => {
                write!(f, "->  if {} then {}", node.condition, node.then_body)?;
                match &node.else_body {
                    Some(body) => write!(f, "    else {body}"),
                    None => Ok(()),
                }
            }
            Statement::Loop(node) => write!(f, "->  loop {}", node.body),
            Statement::While(node) => write!(f, "->  while {} do {}", node.condition, node.body),
            Statement::Break(..) => writeln!(f, "->  break"),
            Statement::Continue(..) => writeln!(f, "->  continue"),
            Statement::Definition(definition) => definition.fmt(f),
        }
    }
}

impl std::fmt::Display for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Definition::Function(node) => {
                write!(f, "=>  fn '{}'(", node.name.lexeme)?;
                for (i, parameter) in node.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", parameter.name.lexeme, parameter.ty)?;
                }
                writeln!(f, "): {}", node.return_type)?;
                match &node.body {
                    Some(body) => body.fmt(f),
                    None => writeln!(f, "<no body>"),
                }
            }
            Definition::Variable(node) => {
                write!(
                    f,
                    "=>  {}{}variable '{}': {}",
                    if node.is_global { "global " } else { "local " },
                    if node.is_const { "const " } else { "" },
                    node.name.lexeme,
                    node.declared_type
                )?;
                match &node.initializer {
                    Some(initializer) => writeln!(f, " = {initializer}"),
                    None => writeln!(f),
                }
            }
            Definition::Class(node) => {
                writeln!(f, "=>  class '{}' {{", node.name.lexeme)?;
                for (visibility, member) in &node.members {
                    writeln!(f, "{visibility:?}:")?;
                    member.fmt(f)?;
                }
                writeln!(f, "}}")
            }
        }
    }
}

impl std::fmt::Display for ProgramFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for definition in &self.definitions {
            definition.fmt(f)?;
        }
        for statement in &self.statements {
            statement.fmt(f)?;
        }
        Ok(())
    }
}
