//! Recursive descent parser for GraphQL documents.

use crate::ast::*;
use crate::lexer::{block_string_value, string_value, Lexer};
use crate::token::{Token, TokenKind};
use holocron_core::{diagnostics::codes, DiagnosticBag, Span};

/// Deepest nesting of selection sets, list and object values, and list
/// types the parser descends into.
pub const MAX_NESTING: usize = 128;

/// Parser for GraphQL documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_end: u32,
    diagnostics: DiagnosticBag,
    depth: usize,
    depth_reported: bool,
    eof_reported: bool,
}

/// Result of parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

impl ParseResult {
    /// Returns the document if no errors were reported.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics when any of them is an error.
    pub fn into_result(self) -> Result<Document, DiagnosticBag> {
        if self.diagnostics.has_errors() {
            Err(self.diagnostics)
        } else {
            Ok(self.document)
        }
    }
}

/// Parses a source string into a document.
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::new(TokenKind::Eof, Span::empty(0)),
            prev_end: 0,
            diagnostics: DiagnosticBag::new(),
            depth: 0,
            depth_reported: false,
            eof_reported: false,
        };
        parser.current = parser.next_significant();
        parser
    }

    /// Pulls the next token, reporting and skipping invalid ones.
    fn next_significant(&mut self) -> Token {
        loop {
            let token = self.lexer.next_token();
            if token.kind != TokenKind::Error {
                return token;
            }
            let text = self.lexer.span_text(token.span);
            let message = if text.starts_with('"') {
                "unterminated string".to_string()
            } else {
                format!("unexpected character sequence `{text}`")
            };
            self.diagnostics
                .error(codes::INVALID_SYNTAX, "invalid token", token.span, message);
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Returns true if the current token is the given contextual keyword.
    fn at_keyword(&self, keyword: &str) -> bool {
        self.at_kind(TokenKind::Name) && self.current_text() == keyword
    }

    fn advance(&mut self) {
        self.prev_end = self.current.span.end;
        self.current = self.next_significant();
    }

    /// Consumes the token if it has the given kind.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            self.error_expected(&format!("`{keyword}`"));
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn error(&mut self, message: &str) {
        self.diagnostics.error(
            codes::INVALID_SYNTAX,
            message,
            self.current.span,
            message.to_string(),
        );
    }

    fn error_expected(&mut self, expected: &str) {
        // Every open delimiter fails at the end of input; one report is enough.
        if self.at_kind(TokenKind::Eof) {
            if self.eof_reported {
                return;
            }
            self.eof_reported = true;
        }
        let found = match self.at() {
            TokenKind::Name => format!("`{}`", self.current_text()),
            other => other.as_str().to_string(),
        };
        let code = if self.at_kind(TokenKind::Eof) {
            codes::UNEXPECTED_EOF
        } else {
            codes::UNEXPECTED_TOKEN
        };
        self.diagnostics.error(
            code,
            "unexpected token",
            self.current.span,
            format!("expected {expected}, found {found}"),
        );
    }

    /// Parses `open item* close`, guaranteeing progress on malformed input.
    fn delimited<T>(
        &mut self,
        open: TokenKind,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> T,
    ) -> Vec<T> {
        let mut items = Vec::new();
        if !self.expect(open) {
            return items;
        }
        while !self.at_kind(close) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            items.push(item(self));
            if self.current.span.start == before && !self.at_kind(close) {
                self.advance();
            }
        }
        self.expect(close);
        items
    }

    /// Runs `f` one nesting level deeper. Past [`MAX_NESTING`] the group at
    /// the current token is skipped and `fallback` is returned instead.
    fn nested<T>(&mut self, fallback: impl FnOnce(Span) -> T, f: impl FnOnce(&mut Self) -> T) -> T {
        if self.depth >= MAX_NESTING {
            let start = self.current.span.start;
            if !self.depth_reported {
                self.depth_reported = true;
                self.diagnostics.error(
                    codes::DEPTH_LIMIT,
                    "nesting too deep",
                    self.current.span,
                    format!("nesting exceeds the maximum depth of {MAX_NESTING}"),
                );
            }
            self.skip_group();
            return fallback(self.span_from(start));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Skips a balanced bracket group without recursing.
    fn skip_group(&mut self) {
        let mut open = 0usize;
        loop {
            match self.at() {
                TokenKind::Eof => return,
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => open += 1,
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    open = open.saturating_sub(1);
                }
                _ => {}
            }
            self.advance();
            if open == 0 {
                return;
            }
        }
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        if self.at_kind(TokenKind::Eof) {
            self.diagnostics.error(
                codes::UNEXPECTED_EOF,
                "empty document",
                self.current.span,
                "expected at least one definition",
            );
        }

        while !self.at_kind(TokenKind::Eof) {
            let before = self.current.span.start;
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
            if self.current.span.start == before {
                self.recover();
            }
        }

        Document {
            definitions,
            span: Span::new(start, self.current.span.end),
        }
    }

    /// Skips tokens until something that can start a definition.
    fn recover(&mut self) {
        self.advance();
        while !self.at_kind(TokenKind::Eof) && !self.at_definition_start() {
            self.advance();
        }
    }

    fn at_definition_start(&self) -> bool {
        const KEYWORDS: [&str; 10] = [
            "schema",
            "type",
            "interface",
            "union",
            "enum",
            "input",
            "scalar",
            "query",
            "mutation",
            "fragment",
        ];
        self.at_kind(TokenKind::Name) && KEYWORDS.contains(&self.current_text())
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        let description = self.try_parse_description();

        if self.at_kind(TokenKind::LBrace) {
            if let Some(desc) = &description {
                self.diagnostics.error(
                    codes::INVALID_SYNTAX,
                    "unexpected description",
                    desc.span,
                    "operations cannot have descriptions",
                );
            }
            return Some(Definition::Operation(self.parse_operation()));
        }

        if !self.at_kind(TokenKind::Name) {
            self.error("expected definition");
            return None;
        }

        match self.current_text() {
            "schema" => Some(Definition::Schema(self.parse_schema_definition(description))),
            "type" => Some(Definition::Type(TypeDefinition::Object(
                self.parse_object_type(description),
            ))),
            "interface" => Some(Definition::Type(TypeDefinition::Interface(
                self.parse_interface_type(description),
            ))),
            "union" => Some(Definition::Type(TypeDefinition::Union(
                self.parse_union_type(description),
            ))),
            "enum" => Some(Definition::Type(TypeDefinition::Enum(
                self.parse_enum_type(description),
            ))),
            "input" => Some(Definition::Type(TypeDefinition::Input(
                self.parse_input_object_type(description),
            ))),
            "scalar" => Some(Definition::Type(TypeDefinition::Scalar(
                self.parse_scalar_type(description),
            ))),
            "query" | "mutation" | "subscription" => {
                Some(Definition::Operation(self.parse_operation()))
            }
            "fragment" => Some(Definition::Fragment(self.parse_fragment_definition())),
            "extend" | "directive" => {
                self.error("type extensions and directive definitions are not supported");
                None
            }
            _ => {
                self.error("expected definition");
                None
            }
        }
    }

    fn try_parse_description(&mut self) -> Option<Description> {
        if !self.at().is_string() {
            return None;
        }
        let span = self.current.span;
        let block = self.at_kind(TokenKind::BlockStringLiteral);
        let value = self.string_literal();
        self.advance();
        Some(Description { value, block, span })
    }

    /// Decodes the current string token, reporting bad escapes.
    fn string_literal(&mut self) -> String {
        let text = self.current_text();
        if self.at_kind(TokenKind::BlockStringLiteral) {
            return block_string_value(text);
        }
        match string_value(text) {
            Ok(value) => value,
            Err(message) => {
                self.diagnostics.error(
                    codes::INVALID_STRING,
                    "invalid string literal",
                    self.current.span,
                    message,
                );
                String::new()
            }
        }
    }

    fn parse_name(&mut self) -> Name {
        if self.at_kind(TokenKind::Name) {
            let name = Name::new(self.current_text(), self.current.span);
            self.advance();
            name
        } else {
            self.error_expected("name");
            Name::new("", Span::empty(self.current.span.start))
        }
    }

    fn parse_schema_definition(&mut self, description: Option<Description>) -> SchemaDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("schema");
        let directives = self.parse_directives(true);

        let operations = self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
            let op_start = p.current.span.start;
            let operation = if p.at_kind(TokenKind::Name) {
                OperationType::from_keyword(p.current_text())
            } else {
                None
            };
            let operation = match operation {
                Some(operation) => {
                    p.advance();
                    operation
                }
                None => {
                    p.error_expected("`query`, `mutation` or `subscription`");
                    OperationType::Query
                }
            };
            p.expect(TokenKind::Colon);
            let type_name = p.parse_name();
            OperationTypeDefinition {
                operation,
                type_name,
                span: p.span_from(op_start),
            }
        });

        SchemaDefinition {
            description,
            directives,
            operations,
            span: self.span_from(start),
        }
    }

    fn parse_object_type(&mut self, description: Option<Description>) -> ObjectTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("type");
        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives(true);
        let fields = self.parse_field_definitions();

        ObjectTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_interface_type(&mut self, description: Option<Description>) -> InterfaceTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("interface");
        let name = self.parse_name();
        let implements = self.parse_implements();
        let directives = self.parse_directives(true);
        let fields = self.parse_field_definitions();

        InterfaceTypeDefinition {
            description,
            name,
            implements,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_union_type(&mut self, description: Option<Description>) -> UnionTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("union");
        let name = self.parse_name();
        let directives = self.parse_directives(true);

        let mut members = Vec::new();
        if self.eat(TokenKind::Eq) {
            self.eat(TokenKind::Pipe);
            members.push(self.parse_name());
            while self.eat(TokenKind::Pipe) {
                members.push(self.parse_name());
            }
        }

        UnionTypeDefinition {
            description,
            name,
            directives,
            members,
            span: self.span_from(start),
        }
    }

    fn parse_enum_type(&mut self, description: Option<Description>) -> EnumTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("enum");
        let name = self.parse_name();
        let directives = self.parse_directives(true);

        let values = if self.at_kind(TokenKind::LBrace) {
            self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
                let value_start = p.current.span.start;
                let description = p.try_parse_description();
                if p.at_keyword("true") || p.at_keyword("false") || p.at_keyword("null") {
                    p.error("enum values cannot be named true, false or null");
                }
                let name = p.parse_name();
                let directives = p.parse_directives(true);
                EnumValueDefinition {
                    description,
                    name,
                    directives,
                    span: p.span_from(value_start),
                }
            })
        } else {
            Vec::new()
        };

        EnumTypeDefinition {
            description,
            name,
            directives,
            values,
            span: self.span_from(start),
        }
    }

    fn parse_input_object_type(
        &mut self,
        description: Option<Description>,
    ) -> InputObjectTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("input");
        let name = self.parse_name();
        let directives = self.parse_directives(true);
        let fields = if self.at_kind(TokenKind::LBrace) {
            self.delimited(TokenKind::LBrace, TokenKind::RBrace, Self::parse_input_value_definition)
        } else {
            Vec::new()
        };

        InputObjectTypeDefinition {
            description,
            name,
            directives,
            fields,
            span: self.span_from(start),
        }
    }

    fn parse_scalar_type(&mut self, description: Option<Description>) -> ScalarTypeDefinition {
        let start = description.as_ref().map_or(self.current.span.start, |d| d.span.start);
        self.expect_keyword("scalar");
        let name = self.parse_name();
        let directives = self.parse_directives(true);

        ScalarTypeDefinition {
            description,
            name,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_implements(&mut self) -> Vec<Name> {
        let mut names = Vec::new();
        if self.at_keyword("implements") {
            self.advance();
            self.eat(TokenKind::Amp);
            names.push(self.parse_name());
            while self.eat(TokenKind::Amp) {
                names.push(self.parse_name());
            }
        }
        names
    }

    fn parse_field_definitions(&mut self) -> Vec<FieldDefinition> {
        if !self.at_kind(TokenKind::LBrace) {
            return Vec::new();
        }
        self.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
            let start = p.current.span.start;
            let description = p.try_parse_description();
            let name = p.parse_name();
            let arguments = if p.at_kind(TokenKind::LParen) {
                p.delimited(TokenKind::LParen, TokenKind::RParen, Self::parse_input_value_definition)
            } else {
                Vec::new()
            };
            p.expect(TokenKind::Colon);
            let ty = p.parse_type();
            let directives = p.parse_directives(true);
            FieldDefinition {
                description,
                name,
                arguments,
                ty,
                directives,
                span: p.span_from(start),
            }
        })
    }

    fn parse_input_value_definition(&mut self) -> InputValueDefinition {
        let start = self.current.span.start;
        let description = self.try_parse_description();
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();
        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };
        let directives = self.parse_directives(true);

        InputValueDefinition {
            description,
            name,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        }
    }

    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;
        let ty = if self.at_kind(TokenKind::LBracket) {
            self.nested(
                |span| Type::Named(Name::new("", span)),
                |p| {
                    p.advance();
                    let inner = p.parse_type();
                    p.expect(TokenKind::RBracket);
                    Type::List(Box::new(inner), p.span_from(start))
                },
            )
        } else {
            Type::Named(self.parse_name())
        };

        if self.eat(TokenKind::Bang) {
            Type::NonNull(Box::new(ty), self.span_from(start))
        } else {
            ty
        }
    }

    fn parse_directives(&mut self, is_const: bool) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance();
            let name = self.parse_name();
            let arguments = self.parse_arguments(is_const);
            directives.push(Directive {
                name,
                arguments,
                span: self.span_from(start),
            });
        }
        directives
    }

    fn parse_arguments(&mut self, is_const: bool) -> Vec<Argument> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.delimited(TokenKind::LParen, TokenKind::RParen, |p| {
            let start = p.current.span.start;
            let name = p.parse_name();
            p.expect(TokenKind::Colon);
            let value = p.parse_value(is_const);
            Argument {
                name,
                value,
                span: p.span_from(start),
            }
        })
    }

    fn parse_value(&mut self, is_const: bool) -> Value {
        match self.at() {
            TokenKind::Dollar => {
                let start = self.current.span.start;
                self.advance();
                let name = self.parse_name();
                if is_const {
                    self.diagnostics.error(
                        codes::INVALID_SYNTAX,
                        "unexpected variable",
                        self.span_from(start),
                        format!("variable `${}` is not allowed in a constant value", name.value),
                    );
                }
                Value::Variable(name.value)
            }
            TokenKind::IntLiteral => {
                let value = match self.current_text().parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error("integer literal out of range");
                        0
                    }
                };
                self.advance();
                Value::Int(value)
            }
            TokenKind::FloatLiteral => {
                let value = self.current_text().parse().unwrap_or(f64::NAN);
                self.advance();
                Value::Float(value)
            }
            TokenKind::StringLiteral | TokenKind::BlockStringLiteral => {
                let value = self.string_literal();
                self.advance();
                Value::String(value)
            }
            TokenKind::LBracket => self.nested(
                |_| Value::Null,
                |p| {
                    Value::List(p.delimited(TokenKind::LBracket, TokenKind::RBracket, |p| {
                        p.parse_value(is_const)
                    }))
                },
            ),
            TokenKind::LBrace => self.nested(
                |_| Value::Null,
                |p| {
                    Value::Object(p.delimited(TokenKind::LBrace, TokenKind::RBrace, |p| {
                        let name = p.parse_name();
                        p.expect(TokenKind::Colon);
                        (name.value, p.parse_value(is_const))
                    }))
                },
            ),
            TokenKind::Name => {
                let value = match self.current_text() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    other => Value::Enum(other.to_string()),
                };
                self.advance();
                value
            }
            _ => {
                self.error_expected("value");
                Value::Null
            }
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        if self.at_kind(TokenKind::LBrace) {
            let selection_set = self.parse_selection_set();
            return OperationDefinition {
                operation: OperationType::Query,
                name: None,
                variables: Vec::new(),
                directives: Vec::new(),
                selection_set,
                shorthand: true,
                span: self.span_from(start),
            };
        }

        let operation = OperationType::from_keyword(self.current_text()).unwrap_or(OperationType::Query);
        self.advance();

        let name = self.at_kind(TokenKind::Name).then(|| self.parse_name());
        let variables = if self.at_kind(TokenKind::LParen) {
            self.delimited(TokenKind::LParen, TokenKind::RParen, Self::parse_variable_definition)
        } else {
            Vec::new()
        };
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            shorthand: false,
            span: self.span_from(start),
        }
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();
        let default_value = if self.eat(TokenKind::Eq) {
            Some(self.parse_value(true))
        } else {
            None
        };
        // Directives on variables carry no execution meaning here.
        self.parse_directives(true);

        VariableDefinition {
            name,
            ty,
            default_value,
            span: self.span_from(start),
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.expect_keyword("fragment");
        if self.at_keyword("on") {
            self.error("fragment cannot be named `on`");
        }
        let name = self.parse_name();
        self.expect_keyword("on");
        let type_condition = self.parse_name();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        self.nested(
            |span| SelectionSet {
                selections: Vec::new(),
                span,
            },
            Self::parse_selection_set_body,
        )
    }

    fn parse_selection_set_body(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        let selections = self.delimited(TokenKind::LBrace, TokenKind::RBrace, Self::parse_selection);
        // A set cut short by the end of input is already reported as such.
        if selections.is_empty() && !self.eof_reported {
            self.diagnostics.error(
                codes::INVALID_SYNTAX,
                "empty selection set",
                self.span_from(start),
                "a selection set must select at least one field",
            );
        }
        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    fn parse_selection(&mut self) -> Selection {
        let start = self.current.span.start;

        if self.eat(TokenKind::Spread) {
            if self.at_kind(TokenKind::Name) && !self.at_keyword("on") {
                let name = self.parse_name();
                let directives = self.parse_directives(false);
                return Selection::FragmentSpread(FragmentSpread {
                    name,
                    directives,
                    span: self.span_from(start),
                });
            }

            let type_condition = if self.at_keyword("on") {
                self.advance();
                Some(self.parse_name())
            } else {
                None
            };
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            return Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: self.span_from(start),
            });
        }

        let first = self.parse_name();
        let (alias, name) = if self.eat(TokenKind::Colon) {
            (Some(first), self.parse_name())
        } else {
            (None, first)
        };
        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives(false);
        let selection_set = self
            .at_kind(TokenKind::LBrace)
            .then(|| self.parse_selection_set());

        Selection::Field(Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        })
    }
}
