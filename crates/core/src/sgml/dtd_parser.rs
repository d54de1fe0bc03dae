//! Parser for DTD declaration text.
//!
//! Parameter-entity references push a new entity onto an explicit stack; the
//! frame is popped when its text is exhausted. On failure the stack is rendered
//! into the error's context, innermost entity first.

use super::dtd::{AttDef, AttributeType, ContentModel, ElementDecl, SgmlDtd};
use super::entity::{Entity, LiteralType};
use crate::error::{EntityFrame, SgmlError};

/// Maximum number of nested parameter-entity frames.
pub const MAX_ENTITY_DEPTH: usize = 64;

const WHITESPACE: &str = " \r\n\t";
const NAME_GROUP_TERM: &str = " \r\n\t|,)";
const DECLARED_CONTENT_TERM: &str = " \r\n\t>";
const CONTENT_MODEL_TERM: &str = " \r\n\t,&|()?+*";
const PARAMETER_ENTITY_TERM: &str = " \t\r\n>";
const ATT_VALUE_TERM: &str = " \r\n\t>";

fn is_occurrence(ch: char) -> bool {
    matches!(ch, '?' | '+' | '*')
}

pub struct DtdParser {
    dtd: SgmlDtd,
    current: Entity,
    parents: Vec<Entity>,
}

impl DtdParser {
    /// Parses `text` as the declarations of a DTD called `name`.
    pub fn parse(name: &str, text: &str) -> Result<SgmlDtd, SgmlError> {
        let mut current = Entity::source(name, text);
        current.read_char();
        let mut parser = Self { dtd: SgmlDtd::new(name), current, parents: Vec::new() };
        match parser.run() {
            Ok(()) => Ok(parser.dtd),
            Err(err) => Err(err.with_context(parser.context())),
        }
    }

    fn context(&self) -> Vec<EntityFrame> {
        std::iter::once(&self.current)
            .chain(self.parents.iter().rev())
            .map(Entity::frame)
            .collect()
    }

    fn push_entity(&mut self, mut entity: Entity) -> Result<(), SgmlError> {
        if self.parents.len() >= MAX_ENTITY_DEPTH {
            return Err(SgmlError::syntax(format!(
                "Parameter entity '{}' nested deeper than {MAX_ENTITY_DEPTH} levels",
                entity.name
            )));
        }
        entity.open(self.current.is_html)?;
        entity.read_char();
        let parent = std::mem::replace(&mut self.current, entity);
        self.parents.push(parent);
        Ok(())
    }

    /// Returns false when the outermost entity is exhausted.
    fn pop_entity(&mut self) -> bool {
        match self.parents.pop() {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    fn run(&mut self) -> Result<(), SgmlError> {
        let mut ch = self.current.last_char();
        loop {
            match ch {
                Entity::EOF => {
                    if !self.pop_entity() {
                        return Ok(());
                    }
                    ch = self.current.last_char();
                }
                ' ' | '\n' | '\r' | '\t' => ch = self.current.read_char(),
                '<' => {
                    self.parse_markup()?;
                    ch = self.current.last_char();
                }
                '%' => {
                    let entity = self.parse_parameter_entity(WHITESPACE)?;
                    self.push_entity(entity)?;
                    ch = self.current.last_char();
                }
                _ => return Err(SgmlError::syntax(format!("Unexpected character '{ch}'"))),
            }
        }
    }

    /// Parses one `<!...>` construct and leaves the lookahead after it.
    fn parse_markup(&mut self) -> Result<(), SgmlError> {
        let mut ch = self.current.read_char();
        if ch != '!' {
            return Err(SgmlError::syntax(format!(
                "Found '{ch}', but expecting declaration starting with '<!'"
            )));
        }
        ch = self.current.read_char();
        if ch == '-' {
            ch = self.current.read_char();
            if ch != '-' {
                return Err(SgmlError::syntax(format!("Expecting comment '<!--' but found {ch}")));
            }
            self.current.scan_to_end("Comment", "-->")?;
            return Ok(());
        }
        if ch == '[' {
            return self.parse_marked_section();
        }

        let token = self.current.scan_token(WHITESPACE, true)?;
        match token.as_str() {
            "ENTITY" => self.parse_entity()?,
            "ELEMENT" => self.parse_element_decl()?,
            "ATTLIST" => self.parse_att_list_decl()?,
            _ => {
                return Err(SgmlError::syntax(format!(
                    "Invalid declaration '<!{token}'. Expecting 'ENTITY', 'ELEMENT' or 'ATTLIST'."
                )));
            }
        }
        self.current.read_char();
        Ok(())
    }

    fn parse_decl_comments(&mut self) -> Result<char, SgmlError> {
        let mut ch = self.current.last_char();
        while ch == '-' {
            ch = self.parse_decl_comment(true)?;
        }
        Ok(ch)
    }

    /// Skips `-- ... --`. With `full`, the lookahead is the first `-`; otherwise the second.
    fn parse_decl_comment(&mut self, full: bool) -> Result<char, SgmlError> {
        if full {
            let ch = self.current.read_char();
            if ch != '-' {
                return Err(SgmlError::syntax(format!("Expecting comment delimiter '--' but found {ch}")));
            }
        }
        self.current.scan_to_end("Markup Comment", "--")?;
        Ok(self.current.skip_whitespace())
    }

    fn parse_marked_section(&mut self) -> Result<(), SgmlError> {
        self.current.read_char();
        let name = self.scan_name(" \r\n\t[")?;
        if name.eq_ignore_ascii_case("INCLUDE") {
            Err(SgmlError::syntax("Include Section in DTD is not yet supported"))
        } else if name.eq_ignore_ascii_case("IGNORE") {
            let ch = self.current.skip_whitespace();
            if ch != '[' {
                return Err(SgmlError::syntax(format!("Expecting '[' but found {ch}")));
            }
            self.current.scan_to_end("Conditional Section", "]]>")?;
            Ok(())
        } else {
            Err(SgmlError::syntax(format!("Unsupported marked section type '{name}'")))
        }
    }

    /// Scans a name, which may be a parameter entity reference expanded to a name.
    fn scan_name(&mut self, term: &str) -> Result<String, SgmlError> {
        let ch = self.current.skip_whitespace();
        if ch == '%' {
            let entity = self.parse_parameter_entity(term)?;
            if !entity.is_internal {
                return Err(SgmlError::syntax(format!(
                    "External parameter entity '{}' cannot be resolved",
                    entity.name
                )));
            }
            return Ok(entity.literal.unwrap_or_default().trim().to_string());
        }
        self.current.scan_token(term, true)
    }

    /// Reads `%name;` (the lookahead is `%`) and returns a copy of the declared entity.
    fn parse_parameter_entity(&mut self, term: &str) -> Result<Entity, SgmlError> {
        self.current.read_char();
        let terminators = format!(";{term}");
        let name = self.current.scan_token(&terminators, false)?;
        if self.current.last_char() == ';' {
            self.current.read_char();
        }
        self.dtd
            .find_parameter_entity(&name)
            .cloned()
            .ok_or_else(|| SgmlError::syntax(format!("Reference to undefined parameter entity '{name}'")))
    }

    fn parse_entity(&mut self) -> Result<(), SgmlError> {
        let mut ch = self.current.skip_whitespace();
        let is_parameter = ch == '%';
        if is_parameter {
            self.current.read_char();
            self.current.skip_whitespace();
        }
        let name = self.current.scan_token(WHITESPACE, true)?;
        ch = self.current.skip_whitespace();

        let entity = if ch == '"' || ch == '\'' {
            let literal = self.current.scan_literal(ch)?;
            Entity::internal(name, literal)
        } else {
            let token = self.current.scan_token(WHITESPACE, true)?;
            if let Some(literal_type) = LiteralType::from_keyword(&token) {
                ch = self.current.skip_whitespace();
                let literal = self.current.scan_literal(ch)?;
                let mut entity = Entity::internal(name, literal);
                entity.literal_type = literal_type;
                entity
            } else {
                self.parse_external_id(name, &token)?
            }
        };

        ch = self.current.skip_whitespace();
        if ch == '-' {
            ch = self.parse_decl_comments()?;
        }
        if ch != '>' {
            return Err(SgmlError::syntax(format!(
                "Expecting end of entity declaration '>' but found '{ch}'"
            )));
        }

        let name = entity.name.clone();
        if is_parameter {
            self.dtd.parameter_entities.insert_if_absent(&name, entity);
        } else {
            self.dtd.entities.entry(name).or_insert(entity);
        }
        Ok(())
    }

    fn parse_external_id(&mut self, name: String, keyword: &str) -> Result<Entity, SgmlError> {
        let mut public_id = None;
        if keyword.eq_ignore_ascii_case("PUBLIC") {
            let ch = self.current.skip_whitespace();
            if ch != '"' && ch != '\'' {
                return Err(SgmlError::syntax(format!(
                    "Expecting public identifier literal but found '{ch}'"
                )));
            }
            public_id = Some(self.current.scan_literal(ch)?);
        } else if !keyword.eq_ignore_ascii_case("SYSTEM") {
            return Err(SgmlError::syntax(format!(
                "Invalid external identifier '{keyword}'. Expecting 'PUBLIC' or 'SYSTEM'."
            )));
        }

        let ch = self.current.skip_whitespace();
        let uri = if ch == '"' || ch == '\'' {
            Some(self.current.scan_literal(ch)?)
        } else if ch != '>' && ch != '-' {
            return Err(SgmlError::syntax(format!(
                "Expecting system identifier literal but found '{ch}'"
            )));
        } else {
            None
        };
        Ok(Entity::external(name, public_id, uri))
    }

    fn parse_element_decl(&mut self) -> Result<(), SgmlError> {
        let mut ch = self.current.skip_whitespace();
        let names = self.parse_name_group(ch, true)?;

        ch = self.current.skip_whitespace().to_ascii_uppercase();
        let mut start_tag_optional = false;
        let mut end_tag_optional = false;
        if ch == 'O' || ch == '-' {
            start_tag_optional = ch == 'O';
            self.current.read_char();
            ch = self.current.skip_whitespace().to_ascii_uppercase();
            if ch == 'O' || ch == '-' {
                end_tag_optional = ch == 'O';
                self.current.read_char();
            }
        }

        ch = self.current.skip_whitespace();
        let content_model = self.parse_content_model(ch)?;
        ch = self.current.skip_whitespace();

        let mut exclusions = Vec::new();
        let mut inclusions = Vec::new();
        if ch == '-' {
            ch = self.current.read_char();
            if ch == '(' {
                exclusions = self.parse_name_group(ch, true)?;
                ch = self.current.skip_whitespace();
            } else if ch == '-' {
                ch = self.parse_decl_comment(false)?;
            } else {
                return Err(SgmlError::syntax(format!("Invalid syntax at '{ch}'")));
            }
        }
        if ch == '-' {
            ch = self.parse_decl_comments()?;
        }
        if ch == '+' {
            ch = self.current.read_char();
            if ch != '(' {
                return Err(SgmlError::syntax(format!("Expecting inclusions name group but found '{ch}'")));
            }
            inclusions = self.parse_name_group(ch, true)?;
            ch = self.current.skip_whitespace();
        }
        if ch == '-' {
            ch = self.parse_decl_comments()?;
        }
        if ch != '>' {
            return Err(SgmlError::syntax(format!(
                "Expecting end of ELEMENT declaration '>' but found '{ch}'"
            )));
        }

        for name in names {
            let decl = ElementDecl {
                name: name.clone(),
                start_tag_optional,
                end_tag_optional,
                content_model: content_model.clone(),
                inclusions: inclusions.clone(),
                exclusions: exclusions.clone(),
                attlist: Vec::new(),
            };
            self.dtd.elements.insert_if_absent(&name, decl);
        }
        Ok(())
    }

    /// Parses `(a|b|c)` or a single name; names are lower-cased.
    fn parse_name_group(&mut self, ch: char, nmtokens: bool) -> Result<Vec<String>, SgmlError> {
        let mut names = Vec::new();
        if ch != '(' {
            let name = self.current.scan_token(WHITESPACE, nmtokens)?;
            names.push(name.to_lowercase());
            return Ok(names);
        }

        self.current.read_char();
        let mut ch = self.current.skip_whitespace();
        while ch != ')' {
            if ch == Entity::EOF {
                return Err(SgmlError::unexpected_eof("Name group was not closed"));
            }
            if ch == '%' {
                let entity = self.parse_parameter_entity(NAME_GROUP_TERM)?;
                self.push_entity(entity)?;
                self.parse_name_list(&mut names, nmtokens)?;
                self.pop_entity();
            } else {
                let token = self.current.scan_token(NAME_GROUP_TERM, nmtokens)?;
                if !token.is_empty() {
                    names.push(token.to_lowercase());
                }
            }
            ch = self.current.skip_whitespace();
            if ch == '|' || ch == ',' {
                self.current.read_char();
                ch = self.current.skip_whitespace();
            }
        }
        self.current.read_char();
        Ok(names)
    }

    /// Reads names from a pushed parameter entity until it is exhausted.
    fn parse_name_list(&mut self, names: &mut Vec<String>, nmtokens: bool) -> Result<(), SgmlError> {
        let mut ch = self.current.skip_whitespace();
        while ch != Entity::EOF {
            if ch == '%' {
                let entity = self.parse_parameter_entity(NAME_GROUP_TERM)?;
                self.push_entity(entity)?;
                self.parse_name_list(names, nmtokens)?;
                self.pop_entity();
            } else {
                let name = self.current.scan_token(NAME_GROUP_TERM, nmtokens)?;
                if !name.is_empty() {
                    names.push(name.to_lowercase());
                }
            }
            ch = self.current.skip_whitespace();
            if ch == '|' || ch == ',' {
                self.current.read_char();
                ch = self.current.skip_whitespace();
            }
        }
        Ok(())
    }

    fn parse_content_model(&mut self, ch: char) -> Result<ContentModel, SgmlError> {
        let mut model = ContentModel::default();
        if ch == '(' {
            self.current.read_char();
            self.parse_model(')', &mut model)?;
            let ch = self.current.read_char();
            if is_occurrence(ch) {
                model.add_occurrence(ch);
                self.current.read_char();
            }
        } else if ch == '%' {
            let entity = self.parse_parameter_entity(DECLARED_CONTENT_TERM)?;
            self.push_entity(entity)?;
            model = self.parse_content_model(self.current.last_char())?;
            self.pop_entity();
        } else {
            let keyword = self.scan_name(DECLARED_CONTENT_TERM)?;
            model.set_declared_content(&keyword)?;
        }
        Ok(model)
    }

    /// Parses model tokens until `term` at the starting group depth.
    fn parse_model(&mut self, term: char, model: &mut ContentModel) -> Result<(), SgmlError> {
        let depth = model.current_depth();
        let mut ch = self.current.skip_whitespace();
        while ch != term || model.current_depth() > depth {
            match ch {
                Entity::EOF => return Err(SgmlError::unexpected_eof("Content Model was not closed")),
                '%' => {
                    let entity = self.parse_parameter_entity(CONTENT_MODEL_TERM)?;
                    self.push_entity(entity)?;
                    self.parse_model(Entity::EOF, model)?;
                    self.pop_entity();
                    ch = self.current.skip_whitespace();
                }
                '(' => {
                    model.push_group();
                    self.current.read_char();
                    ch = self.current.skip_whitespace();
                }
                ')' => {
                    if model.current_depth() <= depth {
                        return Err(SgmlError::syntax(
                            "Parameter entity cannot close a paren outside its own scope",
                        ));
                    }
                    ch = self.current.read_char();
                    model.pop_group()?;
                    if is_occurrence(ch) {
                        model.add_occurrence(ch);
                        self.current.read_char();
                    }
                    ch = self.current.skip_whitespace();
                }
                ',' | '|' | '&' => {
                    model.add_connector(ch)?;
                    self.current.read_char();
                    ch = self.current.skip_whitespace();
                }
                _ => {
                    let token = if ch == '#' {
                        self.current.read_char();
                        format!("#{}", self.current.scan_token(CONTENT_MODEL_TERM, true)?)
                    } else {
                        self.current.scan_token(CONTENT_MODEL_TERM, true)?
                    };
                    ch = self.current.last_char();
                    if is_occurrence(ch) {
                        model.push_group();
                        model.add_symbol(&token);
                        model.pop_group()?;
                        model.add_occurrence(ch);
                        self.current.read_char();
                    } else {
                        model.add_symbol(&token);
                    }
                    ch = self.current.skip_whitespace();
                }
            }
        }
        Ok(())
    }

    fn parse_att_list_decl(&mut self) -> Result<(), SgmlError> {
        let ch = self.current.skip_whitespace();
        let names = self.parse_name_group(ch, true)?;
        let mut defs = Vec::new();
        self.parse_att_list(&mut defs, '>')?;
        for name in names {
            // Attributes of undeclared elements have nowhere to live.
            if let Some(decl) = self.dtd.elements.get_mut(&name) {
                decl.add_att_defs(&defs);
            }
        }
        Ok(())
    }

    fn parse_att_list(&mut self, defs: &mut Vec<AttDef>, term: char) -> Result<(), SgmlError> {
        let mut ch = self.current.skip_whitespace();
        while ch != term {
            if ch == Entity::EOF {
                return Err(SgmlError::unexpected_eof("ATTLIST declaration was not closed"));
            }
            if ch == '%' {
                let entity = self.parse_parameter_entity(PARAMETER_ENTITY_TERM)?;
                self.push_entity(entity)?;
                self.parse_att_list(defs, Entity::EOF)?;
                self.pop_entity();
            } else if ch == '-' {
                self.parse_decl_comments()?;
            } else {
                let def = self.parse_att_def()?;
                if !defs.iter().any(|d| d.name == def.name) {
                    defs.push(def);
                }
            }
            ch = self.current.skip_whitespace();
        }
        Ok(())
    }

    fn parse_att_def(&mut self) -> Result<AttDef, SgmlError> {
        let name = self.scan_name(WHITESPACE)?;
        let mut def = AttDef::new(&name);

        let mut ch = self.current.skip_whitespace();
        if ch == '-' {
            ch = self.parse_decl_comments()?;
        }
        self.parse_att_type(ch, &mut def)?;

        ch = self.current.skip_whitespace();
        if ch == '-' {
            ch = self.parse_decl_comments()?;
        }
        self.parse_att_default(ch, &mut def)?;

        if self.current.skip_whitespace() == '-' {
            self.parse_decl_comments()?;
        }
        Ok(def)
    }

    fn parse_att_type(&mut self, ch: char, def: &mut AttDef) -> Result<(), SgmlError> {
        if ch == '%' {
            let entity = self.parse_parameter_entity(WHITESPACE)?;
            self.push_entity(entity)?;
            let ch = self.current.skip_whitespace();
            self.parse_att_type(ch, def)?;
            self.pop_entity();
            return Ok(());
        }

        if ch == '(' {
            let values = self.parse_name_group(ch, false)?;
            return def.set_enumerated_type(values, AttributeType::Enumeration);
        }

        let token = self.scan_name(WHITESPACE)?;
        if token.eq_ignore_ascii_case("NOTATION") {
            let ch = self.current.skip_whitespace();
            if ch != '(' {
                return Err(SgmlError::syntax(format!("Expecting name group '(', but found '{ch}'")));
            }
            let values = self.parse_name_group(ch, true)?;
            def.set_enumerated_type(values, AttributeType::Notation)
        } else {
            def.set_type(&token)
        }
    }

    fn parse_att_default(&mut self, ch: char, def: &mut AttDef) -> Result<(), SgmlError> {
        let mut ch = ch;
        if ch == '%' {
            let entity = self.parse_parameter_entity(WHITESPACE)?;
            self.push_entity(entity)?;
            let ch = self.current.skip_whitespace();
            self.parse_att_default(ch, def)?;
            self.pop_entity();
            return Ok(());
        }

        let mut has_default = true;
        if ch == '#' {
            self.current.read_char();
            let token = self.current.scan_token(ATT_VALUE_TERM, true)?;
            has_default = def.set_presence(&token)?;
            ch = self.current.skip_whitespace();
        }
        if has_default {
            let value = if ch == '"' || ch == '\'' {
                self.current.scan_literal(ch)?
            } else {
                self.current.scan_token(ATT_VALUE_TERM, false)?.to_lowercase()
            };
            def.default_value = Some(value);
        }
        Ok(())
    }
}
