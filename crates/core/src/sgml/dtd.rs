//! In-memory DTD model: element declarations, content models and attribute lists.
//!
//! The model answers one question for the reader: may element `a` contain
//! element `b` (directly, or through elements whose start tag may be omitted)?
//! It is not a validator.

use std::collections::HashMap;
use std::fmt;

use super::entity::Entity;
use crate::error::SgmlError;

/// Groups nested deeper than this are not searched by [`Group::can_contain`].
const MAX_CONTAINMENT_DEPTH: usize = 16;

/// A map whose keys are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveMap<V> {
    inner: HashMap<String, V>,
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self { inner: HashMap::new() }
    }
}

impl<V> CaseInsensitiveMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(&key.to_lowercase())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(&key.to_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(&key.to_lowercase())
    }

    /// Inserts unless the key is already present; returns whether it was inserted.
    pub fn insert_if_absent(&mut self, key: &str, value: V) -> bool {
        let key = key.to_lowercase();
        if self.inner.contains_key(&key) {
            return false;
        }
        self.inner.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclaredContent {
    #[default]
    Default,
    Cdata,
    Rcdata,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupType {
    #[default]
    None,
    And,
    Or,
    Sequence,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupType::None => "None",
            GroupType::And => "And",
            GroupType::Or => "Or",
            GroupType::Sequence => "Sequence",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrence {
    #[default]
    Required,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn from_char(c: char) -> Self {
        match c {
            '?' => Occurrence::Optional,
            '*' => Occurrence::ZeroOrMore,
            '+' => Occurrence::OneOrMore,
            _ => Occurrence::Required,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Symbol(String),
    Group(Group),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub members: Vec<Member>,
    pub group_type: GroupType,
    pub occurrence: Occurrence,
    /// Set when the group contains `#PCDATA`.
    pub mixed: bool,
}

impl Group {
    pub fn text_only(&self) -> bool {
        self.mixed && self.members.is_empty()
    }

    pub fn add_symbol(&mut self, symbol: &str) {
        if symbol.eq_ignore_ascii_case("#pcdata") {
            self.mixed = true;
        } else {
            self.members.push(Member::Symbol(symbol.to_lowercase()));
        }
    }

    pub fn add_connector(&mut self, c: char) -> Result<(), SgmlError> {
        if !self.mixed && self.members.is_empty() {
            return Err(SgmlError::syntax(format!("Missing token before connector '{c}'.")));
        }
        let group_type = match c {
            ',' => GroupType::Sequence,
            '|' => GroupType::Or,
            '&' => GroupType::And,
            _ => GroupType::None,
        };
        if self.group_type != GroupType::None && self.group_type != group_type {
            return Err(SgmlError::syntax(format!(
                "Connector '{c}' is inconsistent with {} group.",
                self.group_type
            )));
        }
        self.group_type = group_type;
        Ok(())
    }

    /// Whether `name` appears as a symbol anywhere in this group tree.
    pub fn has_symbol(&self, name: &str) -> bool {
        self.members.iter().any(|m| match m {
            Member::Symbol(s) => s.eq_ignore_ascii_case(name),
            Member::Group(g) => g.has_symbol(name),
        })
    }

    /// All symbols of the group tree in declaration order.
    pub fn symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for member in &self.members {
            match member {
                Member::Symbol(s) => out.push(s.as_str()),
                Member::Group(g) => out.extend(g.symbols()),
            }
        }
        out
    }

    pub fn can_contain(&self, name: &str, dtd: &SgmlDtd) -> bool {
        self.can_contain_at(name, dtd, 0)
    }

    fn can_contain_at(&self, name: &str, dtd: &SgmlDtd, depth: usize) -> bool {
        if depth > MAX_CONTAINMENT_DEPTH {
            return false;
        }
        if name == "#pcdata" && self.mixed {
            return true;
        }
        let direct = self
            .members
            .iter()
            .any(|m| matches!(m, Member::Symbol(s) if s.eq_ignore_ascii_case(name)));
        if direct {
            return true;
        }
        self.members.iter().any(|member| match member {
            Member::Symbol(symbol) => dtd
                .find_element(symbol)
                .is_some_and(|decl| decl.start_tag_optional && decl.can_contain_at(name, dtd, depth + 1)),
            Member::Group(group) => group.can_contain_at(name, dtd, depth + 1),
        })
    }
}

/// Group tree under construction plus the declared-content shortcut.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentModel {
    pub declared_content: DeclaredContent,
    pub model: Group,
    /// Open groups; the last one receives new members.
    open: Vec<Group>,
}

impl ContentModel {
    pub fn current_depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut Group {
        self.open.last_mut().unwrap_or(&mut self.model)
    }

    pub fn push_group(&mut self) {
        self.open.push(Group::default());
    }

    /// Closes the innermost open group and returns the new depth.
    pub fn pop_group(&mut self) -> Result<usize, SgmlError> {
        let group = self
            .open
            .pop()
            .ok_or_else(|| SgmlError::syntax("Parenthesis mismatch in content model"))?;
        self.current().members.push(Member::Group(group));
        Ok(self.open.len())
    }

    pub fn add_symbol(&mut self, symbol: &str) {
        self.current().add_symbol(symbol);
    }

    pub fn add_connector(&mut self, c: char) -> Result<(), SgmlError> {
        self.current().add_connector(c)
    }

    /// Applies the occurrence to the most recently completed group.
    pub fn add_occurrence(&mut self, c: char) {
        let occurrence = Occurrence::from_char(c);
        let current = self.current();
        match current.members.last_mut() {
            Some(Member::Group(group)) => group.occurrence = occurrence,
            _ => current.occurrence = occurrence,
        }
    }

    pub fn set_declared_content(&mut self, keyword: &str) -> Result<(), SgmlError> {
        self.declared_content = match keyword.to_ascii_uppercase().as_str() {
            "EMPTY" => DeclaredContent::Empty,
            "RCDATA" => DeclaredContent::Rcdata,
            "CDATA" => DeclaredContent::Cdata,
            _ => {
                return Err(SgmlError::syntax(format!(
                    "Declared content type '{keyword}' is not supported"
                )));
            }
        };
        Ok(())
    }

    /// Whether `#PCDATA` is allowed anywhere in the model.
    pub fn is_mixed(&self) -> bool {
        fn mixed(group: &Group) -> bool {
            group.mixed
                || group.members.iter().any(|m| matches!(m, Member::Group(g) if mixed(g)))
        }
        mixed(&self.model)
    }

    pub fn can_contain(&self, name: &str, dtd: &SgmlDtd) -> bool {
        self.declared_content == DeclaredContent::Default && self.model.can_contain(name, dtd)
    }

    fn can_contain_at(&self, name: &str, dtd: &SgmlDtd, depth: usize) -> bool {
        self.declared_content == DeclaredContent::Default && self.model.can_contain_at(name, dtd, depth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeType {
    #[default]
    Default,
    Cdata,
    Entity,
    Entities,
    Id,
    Idref,
    Idrefs,
    Name,
    Names,
    Nmtoken,
    Nmtokens,
    Number,
    Numbers,
    Nutoken,
    Nutokens,
    Notation,
    Enumeration,
}

impl AttributeType {
    pub fn from_keyword(keyword: &str) -> Result<Self, SgmlError> {
        Ok(match keyword.to_ascii_uppercase().as_str() {
            "CDATA" => AttributeType::Cdata,
            "ENTITY" => AttributeType::Entity,
            "ENTITIES" => AttributeType::Entities,
            "ID" => AttributeType::Id,
            "IDREF" => AttributeType::Idref,
            "IDREFS" => AttributeType::Idrefs,
            "NAME" => AttributeType::Name,
            "NAMES" => AttributeType::Names,
            "NMTOKEN" => AttributeType::Nmtoken,
            "NMTOKENS" => AttributeType::Nmtokens,
            "NUMBER" => AttributeType::Number,
            "NUMBERS" => AttributeType::Numbers,
            "NUTOKEN" => AttributeType::Nutoken,
            "NUTOKENS" => AttributeType::Nutokens,
            _ => return Err(SgmlError::syntax(format!("Attribute type '{keyword}' is not supported"))),
        })
    }

    /// Types whose values are whitespace-normalized tokens.
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, AttributeType::Default | AttributeType::Cdata)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributePresence {
    #[default]
    Default,
    Fixed,
    Required,
    Implied,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttDef {
    pub name: String,
    pub attr_type: AttributeType,
    pub presence: AttributePresence,
    pub default_value: Option<String>,
    pub enum_values: Vec<String>,
}

impl AttDef {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_lowercase(), ..Default::default() }
    }

    pub fn set_type(&mut self, keyword: &str) -> Result<(), SgmlError> {
        self.attr_type = AttributeType::from_keyword(keyword)?;
        Ok(())
    }

    pub fn set_enumerated_type(&mut self, values: Vec<String>, attr_type: AttributeType) -> Result<(), SgmlError> {
        if !matches!(attr_type, AttributeType::Enumeration | AttributeType::Notation) {
            return Err(SgmlError::syntax(format!(
                "AttributeType {attr_type:?} is not valid for an attribute definition with an enumerated value."
            )));
        }
        self.enum_values = values;
        self.attr_type = attr_type;
        Ok(())
    }

    /// Sets presence from `FIXED`, `REQUIRED` or `IMPLIED`; returns whether a default value follows.
    pub fn set_presence(&mut self, token: &str) -> Result<bool, SgmlError> {
        let (presence, has_default) = match token.to_ascii_uppercase().as_str() {
            "FIXED" => (AttributePresence::Fixed, true),
            "REQUIRED" => (AttributePresence::Required, false),
            "IMPLIED" => (AttributePresence::Implied, false),
            _ => return Err(SgmlError::syntax(format!("Attribute value '{token}' not supported"))),
        };
        self.presence = presence;
        Ok(has_default)
    }

    pub fn allows_value(&self, value: &str) -> bool {
        self.enum_values.iter().any(|v| v.eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementDecl {
    pub name: String,
    pub start_tag_optional: bool,
    pub end_tag_optional: bool,
    pub content_model: ContentModel,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    pub attlist: Vec<AttDef>,
}

impl ElementDecl {
    pub fn find_attribute(&self, name: &str) -> Option<&AttDef> {
        self.attlist.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Merges attribute definitions; existing names are kept.
    pub fn add_att_defs(&mut self, defs: &[AttDef]) {
        for def in defs {
            if self.find_attribute(&def.name).is_none() {
                self.attlist.push(def.clone());
            }
        }
    }

    pub fn declared_content(&self) -> DeclaredContent {
        self.content_model.declared_content
    }

    pub fn is_empty(&self) -> bool {
        self.declared_content() == DeclaredContent::Empty
    }

    /// Containment without passing through omitted start tags. `#pcdata` asks for mixed content.
    pub fn contains_directly(&self, name: &str) -> bool {
        if self.exclusions.iter().any(|e| e.eq_ignore_ascii_case(name)) {
            return false;
        }
        if self.inclusions.iter().any(|i| i.eq_ignore_ascii_case(name)) {
            return true;
        }
        let model = &self.content_model;
        if model.declared_content != DeclaredContent::Default {
            return false;
        }
        if name == "#pcdata" { model.is_mixed() } else { model.model.has_symbol(name) }
    }

    pub fn can_contain(&self, name: &str, dtd: &SgmlDtd) -> bool {
        self.can_contain_at(name, dtd, 0)
    }

    fn can_contain_at(&self, name: &str, dtd: &SgmlDtd, depth: usize) -> bool {
        if self.exclusions.iter().any(|e| e.eq_ignore_ascii_case(name)) {
            return false;
        }
        if self.inclusions.iter().any(|i| i.eq_ignore_ascii_case(name)) {
            return true;
        }
        self.content_model.can_contain_at(name, dtd, depth)
    }
}

/// A parsed DTD.
#[derive(Debug, Clone, Default)]
pub struct SgmlDtd {
    pub name: String,
    pub(crate) elements: CaseInsensitiveMap<ElementDecl>,
    pub(crate) parameter_entities: CaseInsensitiveMap<Entity>,
    pub(crate) entities: HashMap<String, Entity>,
}

impl SgmlDtd {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn find_element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    pub fn find_parameter_entity(&self, name: &str) -> Option<&Entity> {
        self.parameter_entities.get(name)
    }

    /// General entities are case-sensitive (`Agrave` and `agrave` differ);
    /// an exact miss falls back to a case-insensitive match.
    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name).or_else(|| {
            self.entities
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, entity)| entity)
        })
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
