//! Canonical pretty-printing of GraphQL documents.

use crate::ast::*;

/// Formatting options.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Number of spaces for indentation.
    pub indent_size: usize,
    /// Use tabs instead of spaces.
    pub use_tabs: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            use_tabs: false,
        }
    }
}

/// Code formatter.
pub struct Formatter {
    options: FormatOptions,
    output: String,
    indent: usize,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(options: FormatOptions) -> Self {
        Self {
            options,
            output: String::new(),
            indent: 0,
        }
    }

    /// Formats a document.
    pub fn format(&mut self, document: &Document) -> String {
        self.output.clear();

        for (i, def) in document.definitions.iter().enumerate() {
            if i > 0 {
                self.output.push_str("\n\n");
            }
            self.format_definition(def);
        }
        if !document.definitions.is_empty() {
            self.output.push('\n');
        }

        std::mem::take(&mut self.output)
    }

    fn format_definition(&mut self, def: &Definition) {
        match def {
            Definition::Schema(s) => self.format_schema(s),
            Definition::Type(t) => self.format_type_definition(t),
            Definition::Operation(o) => self.format_operation(o),
            Definition::Fragment(f) => self.format_fragment(f),
        }
    }

    fn format_schema(&mut self, schema: &SchemaDefinition) {
        if let Some(desc) = &schema.description {
            self.format_description(desc);
        }
        self.output.push_str("schema");
        self.format_directives(&schema.directives);
        self.output.push_str(" {\n");
        self.indent += 1;

        for op in &schema.operations {
            self.push_indent();
            self.output.push_str(op.operation.as_str());
            self.output.push_str(": ");
            self.output.push_str(op.type_name.as_str());
            self.output.push('\n');
        }

        self.indent -= 1;
        self.output.push('}');
    }

    fn format_type_definition(&mut self, type_def: &TypeDefinition) {
        match type_def {
            TypeDefinition::Object(obj) => self.format_fielded_type(
                "type",
                obj.description.as_ref(),
                &obj.name,
                &obj.implements,
                &obj.directives,
                &obj.fields,
            ),
            TypeDefinition::Interface(iface) => self.format_fielded_type(
                "interface",
                iface.description.as_ref(),
                &iface.name,
                &iface.implements,
                &iface.directives,
                &iface.fields,
            ),
            TypeDefinition::Union(u) => self.format_union_type(u),
            TypeDefinition::Enum(e) => self.format_enum_type(e),
            TypeDefinition::Input(inp) => self.format_input_type(inp),
            TypeDefinition::Scalar(s) => {
                if let Some(desc) = &s.description {
                    self.format_description(desc);
                }
                self.output.push_str("scalar ");
                self.output.push_str(s.name.as_str());
                self.format_directives(&s.directives);
            }
        }
    }

    fn format_fielded_type(
        &mut self,
        keyword: &str,
        description: Option<&Description>,
        name: &Name,
        implements: &[Name],
        directives: &[Directive],
        fields: &[FieldDefinition],
    ) {
        if let Some(desc) = description {
            self.format_description(desc);
        }
        self.output.push_str(keyword);
        self.output.push(' ');
        self.output.push_str(name.as_str());
        if !implements.is_empty() {
            self.output.push_str(" implements ");
            for (i, iface) in implements.iter().enumerate() {
                if i > 0 {
                    self.output.push_str(" & ");
                }
                self.output.push_str(iface.as_str());
            }
        }
        self.format_directives(directives);
        if fields.is_empty() {
            return;
        }
        self.output.push_str(" {\n");
        self.indent += 1;
        for field in fields {
            self.push_indent();
            if let Some(desc) = &field.description {
                self.format_description(desc);
                self.push_indent();
            }
            self.output.push_str(field.name.as_str());
            self.format_argument_definitions(&field.arguments);
            self.output.push_str(": ");
            self.output.push_str(&field.ty.to_string());
            self.format_directives(&field.directives);
            self.output.push('\n');
        }
        self.indent -= 1;
        self.output.push('}');
    }

    fn format_argument_definitions(&mut self, arguments: &[InputValueDefinition]) {
        if arguments.is_empty() {
            return;
        }
        self.output.push('(');
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.format_input_value(arg);
        }
        self.output.push(')');
    }

    fn format_input_value(&mut self, value: &InputValueDefinition) {
        self.output.push_str(value.name.as_str());
        self.output.push_str(": ");
        self.output.push_str(&value.ty.to_string());
        if let Some(default) = &value.default_value {
            self.output.push_str(" = ");
            self.output.push_str(&default.to_string());
        }
        self.format_directives(&value.directives);
    }

    fn format_union_type(&mut self, u: &UnionTypeDefinition) {
        if let Some(desc) = &u.description {
            self.format_description(desc);
        }
        self.output.push_str("union ");
        self.output.push_str(u.name.as_str());
        self.format_directives(&u.directives);
        if u.members.is_empty() {
            return;
        }
        self.output.push_str(" = ");
        for (i, member) in u.members.iter().enumerate() {
            if i > 0 {
                self.output.push_str(" | ");
            }
            self.output.push_str(member.as_str());
        }
    }

    fn format_enum_type(&mut self, e: &EnumTypeDefinition) {
        if let Some(desc) = &e.description {
            self.format_description(desc);
        }
        self.output.push_str("enum ");
        self.output.push_str(e.name.as_str());
        self.format_directives(&e.directives);
        self.output.push_str(" {\n");
        self.indent += 1;
        for value in &e.values {
            self.push_indent();
            if let Some(desc) = &value.description {
                self.format_description(desc);
                self.push_indent();
            }
            self.output.push_str(value.name.as_str());
            self.format_directives(&value.directives);
            self.output.push('\n');
        }
        self.indent -= 1;
        self.output.push('}');
    }

    fn format_input_type(&mut self, inp: &InputObjectTypeDefinition) {
        if let Some(desc) = &inp.description {
            self.format_description(desc);
        }
        self.output.push_str("input ");
        self.output.push_str(inp.name.as_str());
        self.format_directives(&inp.directives);
        self.output.push_str(" {\n");
        self.indent += 1;
        for field in &inp.fields {
            self.push_indent();
            if let Some(desc) = &field.description {
                self.format_description(desc);
                self.push_indent();
            }
            self.format_input_value(field);
            self.output.push('\n');
        }
        self.indent -= 1;
        self.output.push('}');
    }

    fn format_operation(&mut self, op: &OperationDefinition) {
        if !op.shorthand {
            self.output.push_str(op.operation.as_str());
            if let Some(name) = &op.name {
                self.output.push(' ');
                self.output.push_str(name.as_str());
            }
            if !op.variables.is_empty() {
                self.output.push('(');
                for (i, var) in op.variables.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push('$');
                    self.output.push_str(var.name.as_str());
                    self.output.push_str(": ");
                    self.output.push_str(&var.ty.to_string());
                    if let Some(default) = &var.default_value {
                        self.output.push_str(" = ");
                        self.output.push_str(&default.to_string());
                    }
                }
                self.output.push(')');
            }
            self.format_directives(&op.directives);
            self.output.push(' ');
        }
        self.format_selection_set(&op.selection_set);
    }

    fn format_fragment(&mut self, fragment: &FragmentDefinition) {
        self.output.push_str("fragment ");
        self.output.push_str(fragment.name.as_str());
        self.output.push_str(" on ");
        self.output.push_str(fragment.type_condition.as_str());
        self.format_directives(&fragment.directives);
        self.output.push(' ');
        self.format_selection_set(&fragment.selection_set);
    }

    fn format_selection_set(&mut self, selection_set: &SelectionSet) {
        self.output.push_str("{\n");
        self.indent += 1;
        for selection in &selection_set.selections {
            self.push_indent();
            match selection {
                Selection::Field(field) => {
                    if let Some(alias) = &field.alias {
                        self.output.push_str(alias.as_str());
                        self.output.push_str(": ");
                    }
                    self.output.push_str(field.name.as_str());
                    self.format_arguments(&field.arguments);
                    self.format_directives(&field.directives);
                    if let Some(nested) = &field.selection_set {
                        self.output.push(' ');
                        self.format_selection_set(nested);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    self.output.push_str("...");
                    self.output.push_str(spread.name.as_str());
                    self.format_directives(&spread.directives);
                }
                Selection::InlineFragment(inline) => {
                    self.output.push_str("...");
                    if let Some(condition) = &inline.type_condition {
                        self.output.push_str(" on ");
                        self.output.push_str(condition.as_str());
                    }
                    self.format_directives(&inline.directives);
                    self.output.push(' ');
                    self.format_selection_set(&inline.selection_set);
                }
            }
            self.output.push('\n');
        }
        self.indent -= 1;
        self.push_indent();
        self.output.push('}');
    }

    fn format_arguments(&mut self, arguments: &[Argument]) {
        if arguments.is_empty() {
            return;
        }
        self.output.push('(');
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(arg.name.as_str());
            self.output.push_str(": ");
            self.output.push_str(&arg.value.to_string());
        }
        self.output.push(')');
    }

    fn format_directives(&mut self, directives: &[Directive]) {
        for directive in directives {
            self.output.push_str(" @");
            self.output.push_str(directive.name.as_str());
            self.format_arguments(&directive.arguments);
        }
    }

    fn format_description(&mut self, desc: &Description) {
        if desc.block || desc.value.contains('\n') {
            self.output.push_str("\"\"\"\n");
            for line in desc.value.lines() {
                if !line.is_empty() {
                    self.push_indent();
                    self.output.push_str(line);
                }
                self.output.push('\n');
            }
            self.push_indent();
            self.output.push_str("\"\"\"\n");
        } else {
            self.output.push_str(&format!("{:?}", desc.value));
            self.output.push('\n');
        }
    }

    fn push_indent(&mut self) {
        if self.options.use_tabs {
            for _ in 0..self.indent {
                self.output.push('\t');
            }
        } else {
            for _ in 0..(self.indent * self.options.indent_size) {
                self.output.push(' ');
            }
        }
    }
}

/// Formats a document with default options.
pub fn format(document: &Document) -> String {
    Formatter::new(FormatOptions::default()).format(document)
}

/// Formats a document with custom options.
pub fn format_with_options(document: &Document, options: FormatOptions) -> String {
    Formatter::new(options).format(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn fmt(source: &str) -> String {
        let result = parse(source);
        assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics);
        format(&result.document)
    }

    #[test]
    fn test_format_schema() {
        insta::assert_snapshot!(fmt(r#"
            "A character from the saga"
            interface Character{id:ID! name:String friends:[Character] appearsIn:[Episode]}
            type Droid implements Character{id:ID! name:String friends:[Character] appearsIn:[Episode] primaryFunction:String}
            enum Episode{NEWHOPE EMPIRE JEDI}
            union SearchResult=Human|Droid
            type Query{hero(episode:Episode=JEDI):Character droid(id:ID!):Droid}
        "#), @r###"
        "A character from the saga"
        interface Character {
          id: ID!
          name: String
          friends: [Character]
          appearsIn: [Episode]
        }

        type Droid implements Character {
          id: ID!
          name: String
          friends: [Character]
          appearsIn: [Episode]
          primaryFunction: String
        }

        enum Episode {
          NEWHOPE
          EMPIRE
          JEDI
        }

        union SearchResult = Human | Droid

        type Query {
          hero(episode: Episode = JEDI): Character
          droid(id: ID!): Droid
        }
        "###);
    }

    #[test]
    fn test_format_query() {
        insta::assert_snapshot!(fmt(r#"
            query Hero($ep:Episode=JEDI,$full:Boolean!){leader:hero(episode:$ep){name ...on Droid{primaryFunction} friends@include(if:$full){...Names}}}
            fragment Names on Character{name}
        "#), @r###"
        query Hero($ep: Episode = JEDI, $full: Boolean!) {
          leader: hero(episode: $ep) {
            name
            ... on Droid {
              primaryFunction
            }
            friends @include(if: $full) {
              ...Names
            }
          }
        }

        fragment Names on Character {
          name
        }
        "###);
    }

    #[test]
    fn test_format_shorthand_with_custom_indent() {
        let result = parse(r#"{bookById(id: "book-1") {name }}"#);
        let output = format_with_options(
            &result.document,
            FormatOptions {
                indent_size: 4,
                use_tabs: false,
            },
        );
        insta::assert_snapshot!(output, @r###"
        {
            bookById(id: "book-1") {
                name
            }
        }
        "###);
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = fmt("type Book{id:ID name:String author:Author} type Author{firstName:String}");
        assert_eq!(fmt(&once), once);
    }
}
