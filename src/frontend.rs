//! Frontend assembler — turns parser callback sequences into model types.
//!
//! The declaration parser drives this through the capture callbacks: one
//! info frame per capture scope, one member scope per composite body. The
//! assembler resolves base types through the registry, folds decorated
//! typedef layers into member decorations, applies `cser` pragmas, and
//! registers the finished types and aliases.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::model::{Alias, Cardinality, Decorations, Member, Registry, Type, TypeKind};
use crate::{Error, Result};

/// Symbol classification answered to the parser's lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymKind {
    TypedefName,
    EnumConstant,
    Identifier,
}

/// In-progress declarator state, one frame per capture scope.
#[derive(Debug, Default)]
struct ParseInfo {
    ptr: usize,
    base_type: Option<String>,
    name: Option<String>,
    arr_sz: Option<String>,
    /// Pragma override: "0" single, "1" zeroterm, anything else names the
    /// variable-array size member.
    array_def: Option<String>,
    omit: bool,
}

impl ParseInfo {
    fn is_undecorated(&self) -> bool {
        self.ptr == 0 && self.arr_sz.is_none()
    }
}

/// Fold the decorations of a typedef layer (`src`) with the pointer level
/// and array extent written at the current use site.
///
/// Pointer levels add. A fixed extent on exactly one side wins; fixed
/// extents on both sides collapse into the textual product
/// `(use)*(src)`. A variable-length or zero-terminated cardinality on the
/// typedef layer cannot be combined and yields `None`.
pub fn merge_decorations(
    src: &Decorations,
    use_ptr: usize,
    use_arr_sz: Option<&str>,
) -> Option<Decorations> {
    let mut out = Decorations {
        ptr_level: src.ptr_level + use_ptr,
        ..Decorations::default()
    };
    match (src.cardinality, use_arr_sz) {
        (Cardinality::Single, None) => {}
        (Cardinality::Single, Some(sz)) => {
            out.cardinality = Cardinality::FixedArray;
            out.arr_sz = Some(sz.to_string());
        }
        (Cardinality::FixedArray, None) => {
            out.cardinality = Cardinality::FixedArray;
            out.arr_sz = src.arr_sz.clone();
        }
        (Cardinality::FixedArray, Some(sz)) => {
            out.cardinality = Cardinality::FixedArray;
            out.arr_sz = Some(format!("({})*({})", sz, src.arr_sz.as_deref().unwrap_or("")));
        }
        (Cardinality::VarArray | Cardinality::ZeroTermArray, _) => return None,
    }
    Some(out)
}

/// Reinterpret a bare `char *` slot as a zero-terminated character string.
pub fn mark_char_zeroterm(base_type: &str, d: &mut Decorations) {
    if d.ptr_level == 1 && d.cardinality == Cardinality::Single && base_type == "char" {
        d.cardinality = Cardinality::ZeroTermArray;
    }
}

pub struct Frontend {
    registry: Registry,
    typedef_names: HashSet<String>,
    enum_constants: HashSet<String>,
    placeholders: HashSet<String>,
    /// Info frame stack; the base frame at index 0 is never popped.
    info: Vec<ParseInfo>,
    member_scopes: Vec<Vec<Member>>,
    /// A completed composite waiting for the enclosing typedef to name it.
    unnamed_struct: Option<Type>,
    capturing: usize,
    unnamed_bitfields: usize,
    line: usize,
}

impl Default for Frontend {
    fn default() -> Self {
        Frontend::new()
    }
}

impl Frontend {
    pub fn new() -> Self {
        let mut typedef_names = HashSet::new();
        for name in Registry::builtin_alias_names() {
            typedef_names.insert(name.to_string());
        }
        Frontend {
            registry: Registry::with_builtins(),
            typedef_names,
            enum_constants: HashSet::new(),
            placeholders: HashSet::new(),
            info: vec![ParseInfo::default()],
            member_scopes: Vec::new(),
            unnamed_struct: None,
            capturing: 0,
            unnamed_bitfields: 0,
            line: 0,
        }
    }

    /// Registry namespace for a tagged struct.
    pub fn struct_name(tag: &str) -> String {
        format!("struct {tag}")
    }

    /// Current source line, used in diagnostics. The parser updates this as
    /// it advances.
    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.line,
            msg: msg.into(),
        }
    }

    fn info(&self) -> &ParseInfo {
        self.info.last().expect("info stack never empty")
    }

    fn info_mut(&mut self) -> &mut ParseInfo {
        self.info.last_mut().expect("info stack never empty")
    }

    //
    // Symbol classification
    //

    pub fn add_typedef_name(&mut self, name: &str) {
        self.typedef_names.insert(name.to_string());
    }

    pub fn add_enum_constant(&mut self, name: &str) {
        self.enum_constants.insert(name.to_string());
    }

    pub fn sym_type(&self, name: &str) -> SymKind {
        if self.typedef_names.contains(name) {
            SymKind::TypedefName
        } else if self.enum_constants.contains(name) {
            SymKind::EnumConstant
        } else {
            SymKind::Identifier
        }
    }

    //
    // Forward-declared struct tags
    //

    pub fn add_placeholder(&mut self, name: &str) {
        self.placeholders.insert(name.to_string());
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.contains(name)
    }

    //
    // Capture scopes
    //

    pub fn capture(&mut self, with_members: bool) {
        self.capturing += 1;
        self.info.push(ParseInfo::default());
        if with_members {
            self.member_scopes.push(Vec::new());
        }
    }

    pub fn set_type(&mut self, base_type: &str) {
        if self.capturing == 0 {
            return;
        }
        if let Some(old) = &self.info().base_type {
            warn!(
                line = self.line,
                from = %old,
                to = %base_type,
                "changing base type"
            );
        }
        self.info_mut().base_type = Some(base_type.to_string());
    }

    pub fn set_name(&mut self, name: &str) {
        if self.capturing == 0 {
            return;
        }
        self.info_mut().name = Some(name.to_string());
    }

    pub fn note_pointer(&mut self) {
        if self.capturing == 0 {
            return;
        }
        self.info_mut().ptr += 1;
    }

    /// Record one array extent; repeated extents combine by textual
    /// multiplication, collapsing multi-dimensional declarators.
    pub fn note_array_size(&mut self, expr: &str) {
        if self.capturing == 0 {
            return;
        }
        let info = self.info_mut();
        info.arr_sz = match info.arr_sz.take() {
            Some(prev) => Some(format!("({prev})*({expr})")),
            None => Some(expr.to_string()),
        };
    }

    /// Reset the current info frame to a clean slate.
    pub fn reset_info(&mut self) {
        *self.info_mut() = ParseInfo::default();
    }

    /// Handle a `#pragma` / `_Pragma` payload. Anything not starting with
    /// `cser ` is not ours; pragmas outside a capture scope are ignored.
    pub fn handle_pragma(&mut self, prag: &str) {
        if self.capturing == 0 {
            return;
        }
        let prag = prag.trim().trim_matches('"');
        let Some(rest) = prag.strip_prefix("cser ") else {
            return;
        };
        match rest {
            "single" => self.info_mut().array_def = Some("0".to_string()),
            "zeroterm" => self.info_mut().array_def = Some("1".to_string()),
            "omit" => self.info_mut().omit = true,
            "emit" => self.info_mut().omit = false,
            _ => {
                if let Some(member) = rest.strip_prefix("vararray:") {
                    self.info_mut().array_def = Some(member.trim_matches('"').to_string());
                }
            }
        }
    }

    //
    // Member finalization
    //

    /// Finalize one struct member from the current info frame.
    pub fn capture_member(&mut self) -> Result<()> {
        if self.member_scopes.is_empty() {
            return Err(self.err("nowhere to capture member to"));
        }
        if self.info().omit {
            self.reset_info();
            return Ok(());
        }
        let Some(base) = self.info().base_type.clone() else {
            warn!(line = self.line, "ignoring unsupported member");
            self.reset_info();
            return Ok(());
        };

        let resolved = self.registry.lookup(&base).cloned();
        if resolved.is_none() && !self.has_placeholder(&base) {
            let member = self.info().name.clone().unwrap_or_default();
            return Err(self.err(format!("unrecognised type '{base}' for '{member}'")));
        }

        let name = match self.info().name.clone() {
            Some(n) => n,
            None => {
                // unnamed bit fields
                self.unnamed_bitfields += 1;
                format!("__unnamed_bitfield_{}", self.unnamed_bitfields)
            }
        };

        let (member_base, src_decor) = match resolved {
            Some(Type {
                kind: TypeKind::Decorated { base_type, decor },
                ..
            }) => (base_type, decor),
            Some(t) => (t.name, Decorations::default()),
            // Forward-declared composite; keep the spelled name.
            None => (base.clone(), Decorations::default()),
        };

        let info = self.info();
        let mut decor = merge_decorations(&src_decor, info.ptr, info.arr_sz.as_deref())
            .ok_or_else(|| {
                self.err(format!("unable to combine arrays for '{base}' and '{name}'"))
            })?;

        match self.info().array_def.clone() {
            None => mark_char_zeroterm(&member_base, &mut decor),
            Some(def) => {
                if self.info().ptr == 0 {
                    return Err(self.err("pragma can only apply to pointer members"));
                }
                match def.as_str() {
                    "0" => {
                        decor.cardinality = Cardinality::Single;
                        decor.arr_sz = None;
                    }
                    "1" => {
                        decor.cardinality = Cardinality::ZeroTermArray;
                        decor.arr_sz = None;
                    }
                    sibling => {
                        let scope = self.member_scopes.last().expect("checked above");
                        if !scope.iter().any(|m| m.name == sibling) {
                            return Err(self.err(format!(
                                "variable array size member '{sibling}' not found"
                            )));
                        }
                        decor.cardinality = Cardinality::VarArray;
                        decor.arr_sz = None;
                        decor.var_size_member = Some(sibling.to_string());
                    }
                }
            }
        }

        self.member_scopes
            .last_mut()
            .expect("checked above")
            .push(Member {
                name,
                base_type: member_base,
                decor,
            });
        self.reset_info();
        Ok(())
    }

    //
    // Type finalization
    //

    /// Close a capture scope and produce a type or alias.
    ///
    /// With `end_of_members`, the accumulated member scope becomes a
    /// composite; an unnamed composite is parked for the enclosing typedef
    /// to name. Without it, the current frame describes a typedef body: an
    /// undecorated one becomes an alias, a decorated one becomes a
    /// decorated type with the referenced layer folded in.
    pub fn end_capture(&mut self, end_of_members: bool) -> Result<()> {
        self.capturing = self.capturing.saturating_sub(1);
        if self.info.len() < 2 {
            return Err(Error::Internal("unbalanced capture scopes".to_string()));
        }
        let frame = self.info.pop().expect("checked above");

        if end_of_members {
            let members = self
                .member_scopes
                .pop()
                .ok_or_else(|| Error::Internal("missing member scope".to_string()))?;
            match frame.name {
                Some(name) => self.register_type(Type {
                    name,
                    kind: TypeKind::Composite { members },
                }),
                None => {
                    self.unnamed_struct = Some(Type {
                        name: String::new(),
                        kind: TypeKind::Composite { members },
                    });
                }
            }
            return Ok(());
        }

        if self.unnamed_struct.is_some() && frame.base_type.is_some() {
            warn!(line = self.line, "ignoring unmentionable struct");
            self.unnamed_struct = None;
        }

        if let Some(mut pending) = self.unnamed_struct.take() {
            if !frame.is_undecorated() {
                return Err(self.err("typedefs to unnamed struct pointers are not supported"));
            }
            let name = frame
                .name
                .ok_or_else(|| self.err("typedef is missing a name"))?;
            pending.name = name;
            self.register_type(pending);
            return Ok(());
        }

        let name = frame
            .name
            .clone()
            .ok_or_else(|| self.err("typedef is missing a name"))?;
        let base = frame
            .base_type
            .clone()
            .ok_or_else(|| self.err(format!("typedef '{name}' is missing a base type")))?;

        let resolved = self.registry.lookup(&base).cloned();
        if resolved.is_none() && !self.has_placeholder(&base) {
            return Err(self.err(format!("unrecognised type '{base}' for '{name}'")));
        }

        if frame.is_undecorated() {
            self.register_alias(Alias {
                alias_name: name,
                actual_name: base,
            });
            return Ok(());
        }

        // Decorated typedefs need a complete referenced type.
        let Some(target) = resolved else {
            return Err(self.err(format!("cannot decorate incomplete type '{base}'")));
        };
        let (base_type, mut decor) = match target.kind {
            TypeKind::Decorated {
                base_type,
                decor: src,
            } => {
                let merged = merge_decorations(&src, frame.ptr, frame.arr_sz.as_deref())
                    .ok_or_else(|| {
                        self.err(format!("unable to combine arrays for '{base}' and '{name}'"))
                    })?;
                (base_type, merged)
            }
            _ => {
                let decor = Decorations {
                    ptr_level: frame.ptr,
                    cardinality: if frame.arr_sz.is_some() {
                        Cardinality::FixedArray
                    } else {
                        Cardinality::Single
                    },
                    arr_sz: frame.arr_sz.clone(),
                    var_size_member: None,
                };
                (target.name, decor)
            }
        };
        mark_char_zeroterm(&base_type, &mut decor);
        self.register_type(Type {
            name,
            kind: TypeKind::Decorated { base_type, decor },
        });
        Ok(())
    }

    /// Abandon a capture scope without producing a type; used when the
    /// parser bails out of an unsupported declaration.
    pub fn abort_capture(&mut self) {
        self.capturing = self.capturing.saturating_sub(1);
        if self.info.len() > 1 {
            self.info.pop();
        }
    }

    /// Discard a pending unnamed composite that no typedef will name.
    pub fn drop_unnamed(&mut self) {
        if self.unnamed_struct.take().is_some() {
            warn!(line = self.line, "discarding unnamed struct without a typedef name");
        }
    }

    fn register_type(&mut self, t: Type) {
        debug!(name = %t.name, decl = %t, "type added");
        self.registry.add_type(t);
    }

    fn register_alias(&mut self, a: Alias) {
        debug!(alias = %a.alias_name, actual = %a.actual_name, "alias added");
        self.registry.add_alias(a);
    }

    /// Consume the frontend, yielding the populated registry. The
    /// placeholder set only matters during parsing and is dropped here.
    pub fn into_registry(self) -> Registry {
        self.registry
    }
}
