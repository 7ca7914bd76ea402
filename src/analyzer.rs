use std::collections::HashMap;

use crate::ast::*;
use crate::diag::ErrorHandler;
use crate::token::Token;
use crate::types::{BasicType, Type};

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub unique_name: String,
    pub ty: Type,
}

/// Scoping, α-renaming and type checking. Local names are rewritten to
/// `name.k` at their definition site so later passes can assume name→storage
/// is one-to-one; globals keep their source names. Checks return a success
/// flag: failure reports to the sink and short-circuits the enclosing
/// subtree, while top-level siblings keep accumulating errors.
pub struct Analyzer<'a> {
    handler: &'a mut ErrorHandler,
    global_table: HashMap<String, SymbolEntry>,
    local_stack: Vec<HashMap<String, SymbolEntry>>,
    user_defined_types: Vec<String>,
    unique_index: u32,
    loop_index: u32,
    loop_stack: Vec<u32>,
    current_return_type: Option<Type>,
}

impl<'a> Analyzer<'a> {
    pub fn new(handler: &'a mut ErrorHandler) -> Self {
        Self {
            handler,
            global_table: HashMap::new(),
            local_stack: Vec::new(),
            user_defined_types: Vec::new(),
            unique_index: 0,
            loop_index: 0,
            loop_stack: Vec::new(),
            current_return_type: None,
        }
    }

    pub fn analyze(&mut self, program: &mut ProgramFile) -> bool {
        // All definitions are saved before any body is analyzed, so
        // top-level statements can call forward-declared functions.
        for definition in &program.definitions {
            self.save_definition(definition);
        }

        for definition in &mut program.definitions {
            self.analyze_definition(definition);
        }

        // top-level statements are the body of the implicit `main`
        self.push_scope();
        for statement in &mut program.statements {
            self.analyze_statement(statement);
        }
        self.pop_scope();

        !self.handler.has_errors()
    }

    // -- utility --

    fn create_unique(&mut self, name: &str) -> String {
        self.unique_index += 1;
        format!("{name}.{}", self.unique_index)
    }

    fn push_scope(&mut self) {
        self.local_stack.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.local_stack.pop();
    }

    fn find_local(&self, name: &str) -> Option<&SymbolEntry> {
        self.local_stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    /// Resolve a name token, rewriting its lexeme to the unique name of the
    /// symbol it refers to. Returns the symbol's type.
    fn resolve(&mut self, token: &mut Token) -> Option<Type> {
        if let Some(entry) = self.find_local(&token.lexeme) {
            let ty = entry.ty.clone();
            token.lexeme = entry.unique_name.clone();
            return Some(ty);
        }
        if let Some(entry) = self.global_table.get(&token.lexeme) {
            return Some(entry.ty.clone());
        }
        self.handler.report_error(
            format!("Undefined name '{}'", token.lexeme),
            token.position.clone(),
        );
        None
    }

    /// Define a local in the top scope, renaming the token in place.
    fn define_local(&mut self, token: &mut Token, ty: Type) -> bool {
        let scope = self
            .local_stack
            .last_mut()
            .expect("a scope is pushed before locals are defined");
        if scope.contains_key(&token.lexeme) {
            self.handler.report_error(
                format!("'{}' is already defined", token.lexeme),
                token.position.clone(),
            );
            return false;
        }

        let unique_name = self.create_unique(&token.lexeme);
        let scope = self.local_stack.last_mut().unwrap();
        scope.insert(
            token.lexeme.clone(),
            SymbolEntry {
                unique_name: unique_name.clone(),
                ty,
            },
        );
        token.lexeme = unique_name;
        true
    }

    // -- definitions --

    fn save_definition(&mut self, definition: &Definition) -> bool {
        match definition {
            Definition::Function(function) => {
                if self.global_table.contains_key(&function.name.lexeme) {
                    self.handler.report_error(
                        format!("Function '{}' is already defined", function.name.lexeme),
                        function.name.position.clone(),
                    );
                    return false;
                }
                let ty = Type::function(
                    function.return_type.clone(),
                    function
                        .parameters
                        .iter()
                        .map(|parameter| parameter.ty.clone())
                        .collect(),
                );
                self.global_table.insert(
                    function.name.lexeme.clone(),
                    SymbolEntry {
                        unique_name: function.name.lexeme.clone(),
                        ty,
                    },
                );
                true
            }
            Definition::Variable(variable) => {
                if self.global_table.contains_key(&variable.name.lexeme) {
                    self.handler.report_error(
                        format!("'{}' is already defined", variable.name.lexeme),
                        variable.name.position.clone(),
                    );
                    return false;
                }
                self.global_table.insert(
                    variable.name.lexeme.clone(),
                    SymbolEntry {
                        unique_name: variable.name.lexeme.clone(),
                        ty: variable.declared_type.clone(),
                    },
                );
                true
            }
            Definition::Class(class) => {
                if self.user_defined_types.contains(&class.name.lexeme) {
                    self.handler.report_error(
                        format!("Class '{}' is already defined", class.name.lexeme),
                        class.name.position.clone(),
                    );
                    return false;
                }
                self.user_defined_types.push(class.name.lexeme.clone());
                true
            }
        }
    }

    fn analyze_definition(&mut self, definition: &mut Definition) -> bool {
        match definition {
            Definition::Function(function) => self.analyze_definition_function(function),
            Definition::Variable(variable) => self.analyze_definition_variable(variable),
            // member analysis is deferred until the class system lands
            Definition::Class(..) => true,
        }
    }

    fn analyze_definition_function(&mut self, function: &mut FunctionDefinition) -> bool {
        if function.decorator == Decorator::External {
            return true;
        }

        self.push_scope();

        let mut ok = true;
        for parameter in &mut function.parameters {
            if self.global_table.contains_key(&parameter.name.lexeme) {
                self.handler.report_warning(
                    format!(
                        "Parameter '{}' shadows a global name",
                        parameter.name.lexeme
                    ),
                    parameter.name.position.clone(),
                );
            }
            let scope = self.local_stack.last().unwrap();
            if scope.contains_key(&parameter.name.lexeme) {
                self.handler.report_error(
                    format!("Parameter '{}' is already defined", parameter.name.lexeme),
                    parameter.name.position.clone(),
                );
                ok = false;
                continue;
            }
            self.define_local(&mut parameter.name, parameter.ty.clone());
        }

        let previous = self.current_return_type.take();
        self.current_return_type = Some(function.return_type.clone());

        if let Some(body) = &mut function.body {
            ok = self.analyze_statement(body) && ok;
        }

        self.current_return_type = previous;
        self.pop_scope();
        ok
    }

    fn analyze_definition_variable(&mut self, variable: &mut VariableDefinition) -> bool {
        let initializer_type = match &mut variable.initializer {
            Some(initializer) => {
                if !self.analyze_expression(initializer) {
                    return false;
                }
                Some(initializer.expression_type().clone())
            }
            None => None,
        };

        if variable.declared_type.is_unresolved() {
            match initializer_type {
                Some(ty) => variable.declared_type = ty,
                None => {
                    self.handler.report_error(
                        format!("Cannot infer the type of '{}'", variable.name.lexeme),
                        variable.name.position.clone(),
                    );
                    return false;
                }
            }
        } else if let Some(ty) = initializer_type {
            if ty != variable.declared_type {
                self.handler.report_error(
                    format!(
                        "Cannot assign '{ty}' to a variable of type '{}'",
                        variable.declared_type
                    ),
                    variable.name.position.clone(),
                );
                return false;
            }
        }

        if variable.is_global {
            // registered during save_definition; only the type may change
            if let Some(entry) = self.global_table.get_mut(&variable.name.lexeme) {
                entry.ty = variable.declared_type.clone();
            }
            true
        } else {
            self.define_local(&mut variable.name, variable.declared_type.clone())
        }
    }

    // -- statements --

    fn analyze_statement(&mut self, statement: &mut Statement) -> bool {
        match statement {
            Statement::Null => true,
            Statement::Compound(compound) => {
                self.push_scope();
                let mut ok = true;
                for statement in &mut compound.statements {
                    if !self.analyze_statement(statement) {
                        ok = false;
                        break;
                    }
                }
                self.pop_scope();
                ok
            }
            Statement::Expression(expression_statement) => {
                if !self.analyze_expression(&mut expression_statement.expression) {
                    return false;
                }
                if !matches!(
                    expression_statement.expression,
                    Expression::Call(..) | Expression::MemberAccess(..) | Expression::Assignment(..)
                ) {
                    self.handler.report_warning(
                        "Unused expression",
                        expression_statement.position.clone(),
                    );
                }
                true
            }
            Statement::Return(return_statement) => self.analyze_statement_return(return_statement),
            Statement::If(if_statement) => {
                let mut ok = self.analyze_expression(&mut if_statement.condition);
                ok = self.analyze_statement(&mut if_statement.then_body) && ok;
                if let Some(else_body) = &mut if_statement.else_body {
                    ok = self.analyze_statement(else_body) && ok;
                }
                ok
            }
            Statement::While(while_statement) => {
                let ok = self.analyze_expression(&mut while_statement.condition);
                self.enter_loop();
                let ok = self.analyze_statement(&mut while_statement.body) && ok;
                self.loop_stack.pop();
                ok
            }
            Statement::Loop(loop_statement) => {
                self.enter_loop();
                let ok = self.analyze_statement(&mut loop_statement.body);
                self.loop_stack.pop();
                ok
            }
            Statement::Break(break_statement) => {
                match self.loop_stack.last() {
                    Some(id) => {
                        break_statement.loop_id = *id;
                        true
                    }
                    None => {
                        self.handler.report_error(
                            "'break' used outside of a loop",
                            break_statement.token.position.clone(),
                        );
                        false
                    }
                }
            }
            Statement::Continue(continue_statement) => {
                match self.loop_stack.last() {
                    Some(id) => {
                        continue_statement.loop_id = *id;
                        true
                    }
                    None => {
                        self.handler.report_error(
                            "'continue' used outside of a loop",
                            continue_statement.token.position.clone(),
                        );
                        false
                    }
                }
            }
            Statement::Definition(Definition::Variable(variable)) => {
                self.analyze_definition_variable(variable)
            }
            Statement::Definition(..) => true,
        }
    }

    fn enter_loop(&mut self) {
        self.loop_index += 1;
        self.loop_stack.push(self.loop_index);
    }

    fn analyze_statement_return(&mut self, return_statement: &mut ReturnStatement) -> bool {
        let Some(return_type) = self.current_return_type.clone() else {
            self.handler.report_error(
                "Return statement outside of a function",
                return_statement.token.position.clone(),
            );
            return false;
        };

        if !self.analyze_expression(&mut return_statement.expression) {
            return false;
        }

        let ty = return_statement.expression.expression_type();
        if *ty != return_type {
            self.handler.report_error(
                format!("Cannot return '{ty}' from a function returning '{return_type}'"),
                return_statement.token.position.clone(),
            );
            return false;
        }
        true
    }

    // -- expressions --

    fn analyze_expression(&mut self, expression: &mut Expression) -> bool {
        match expression {
            Expression::IntegerLiteral(literal) => {
                literal.ty = Type::Fundamental(BasicType::I32);
                true
            }
            Expression::FloatLiteral(literal) => {
                literal.ty = Type::Fundamental(BasicType::F32);
                true
            }
            Expression::StringLiteral(literal) => {
                literal.ty = Type::Fundamental(BasicType::String);
                true
            }
            Expression::CharacterLiteral(literal) => {
                literal.ty = Type::Fundamental(BasicType::Character);
                true
            }
            Expression::ArrayList(..) => self.analyze_expression_array(expression),
            Expression::Unary(..) => {
                let Expression::Unary(unary) = expression else {
                    unreachable!()
                };
                if !self.analyze_expression(&mut unary.operand) {
                    return false;
                }
                unary.ty = unary.operand.expression_type().clone();
                true
            }
            Expression::Binary(..) => self.analyze_expression_binary(expression),
            Expression::Identifier(identifier) => match self.resolve(&mut identifier.token) {
                Some(ty) => {
                    identifier.ty = ty;
                    true
                }
                None => false,
            },
            Expression::Call(..) => self.analyze_expression_call(expression),
            Expression::Assignment(..) => self.analyze_expression_assignment(expression),
            Expression::MemberAccess(..) => self.analyze_expression_member_access(expression),
        }
    }

    fn analyze_expression_array(&mut self, expression: &mut Expression) -> bool {
        let Expression::ArrayList(array) = expression else {
            unreachable!()
        };

        if array.elements.is_empty() {
            self.handler.report_error(
                "Cannot infer the type of an empty array literal",
                array.position.clone(),
            );
            return false;
        }

        let mut element_type = None;
        for (element, position) in &mut array.elements {
            if !self.analyze_expression(element) {
                return false;
            }
            let ty = element.expression_type().clone();
            match &element_type {
                None => element_type = Some(ty),
                Some(first) if *first != ty => {
                    self.handler.report_error(
                        format!("Array element of type '{ty}' does not match '{first}'"),
                        position.clone(),
                    );
                    return false;
                }
                Some(..) => {}
            }
        }

        array.ty = Type::array(element_type.unwrap());
        true
    }

    fn analyze_expression_binary(&mut self, expression: &mut Expression) -> bool {
        let Expression::Binary(binary) = expression else {
            unreachable!()
        };

        if !self.analyze_expression(&mut binary.left) {
            return false;
        }
        if !self.analyze_expression(&mut binary.right) {
            return false;
        }

        let left = binary.left.expression_type();
        let right = binary.right.expression_type();
        if left != right {
            self.handler.report_error(
                format!("Type mismatch between '{left}' and '{right}'"),
                binary.operator.position.clone(),
            );
            return false;
        }

        binary.ty = left.clone();
        true
    }

    fn analyze_expression_call(&mut self, expression: &mut Expression) -> bool {
        let Expression::Call(call) = expression else {
            unreachable!()
        };

        let Some(callee_type) = self.resolve(&mut call.callee) else {
            return false;
        };
        let Type::Function { ret, params } = callee_type else {
            self.handler.report_error(
                format!("'{}' is not a function", call.callee.lexeme),
                call.callee.position.clone(),
            );
            return false;
        };

        if call.arguments.len() != params.len() {
            self.handler.report_error(
                format!(
                    "'{}' expects {} arguments, but {} were given",
                    call.callee.lexeme,
                    params.len(),
                    call.arguments.len()
                ),
                call.callee.position.clone(),
            );
            return false;
        }

        for (argument, param) in call.arguments.iter_mut().zip(params.iter()) {
            if !self.analyze_expression(&mut argument.value) {
                return false;
            }
            let ty = argument.value.expression_type();
            if ty != param {
                self.handler.report_error(
                    format!("Argument of type '{ty}' does not match parameter type '{param}'"),
                    argument.value.position(),
                );
                return false;
            }
        }

        call.ty = *ret;
        true
    }

    fn analyze_expression_assignment(&mut self, expression: &mut Expression) -> bool {
        let Expression::Assignment(assignment) = expression else {
            unreachable!()
        };

        if !assignment.left.is_lvalue() {
            self.handler.report_error(
                "Left side of an assignment must be assignable",
                assignment.left.position(),
            );
            return false;
        }

        if !self.analyze_expression(&mut assignment.left) {
            return false;
        }
        if !self.analyze_expression(&mut assignment.right) {
            return false;
        }

        let left = assignment.left.expression_type();
        let right = assignment.right.expression_type();
        if left != right {
            self.handler.report_error(
                format!("Cannot assign '{right}' to '{left}'"),
                assignment.operator.position.clone(),
            );
            return false;
        }

        assignment.ty = left.clone();
        true
    }

    fn analyze_expression_member_access(&mut self, expression: &mut Expression) -> bool {
        let Expression::MemberAccess(member_access) = expression else {
            unreachable!()
        };

        if !member_access.left.is_lvalue() || !member_access.right.is_lvalue() {
            self.handler.report_error(
                "Member access requires a name on both sides",
                member_access.operator.position.clone(),
            );
            return false;
        }

        if !self.analyze_expression(&mut member_access.left) {
            return false;
        }

        // Member lookup is deferred until the class system lands; the right
        // side is intentionally left unresolved.
        member_access.ty = Type::Fundamental(BasicType::None);
        true
    }
}
