//! Type model — the bridge between declaration parsing and backend emission.
//!
//! The frontend builds these types from parser callbacks, the reachability
//! pass prunes them, and the backends walk them read-only. Members only
//! ever reference native or composite types by name; decorated typedefs
//! are folded into member decorations before a member is finalized.

use std::collections::HashSet;
use std::fmt;

/// How many instances of the base type a decorated slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Single,
    FixedArray,
    VarArray,
    ZeroTermArray,
}

/// Shape decorations layered on a base type at one point of use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decorations {
    pub ptr_level: usize,
    pub cardinality: Cardinality,
    /// Textual size expression, present iff cardinality is `FixedArray`.
    pub arr_sz: Option<String>,
    /// Name of the sibling member carrying the element count, present iff
    /// cardinality is `VarArray`. The sibling must precede the array member.
    pub var_size_member: Option<String>,
}

impl Decorations {
    pub fn is_ptr(&self) -> bool {
        self.ptr_level > 0
    }
}

impl fmt::Display for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.ptr_level {
            write!(f, "*")?;
        }
        match self.cardinality {
            Cardinality::Single => Ok(()),
            Cardinality::FixedArray => {
                write!(f, "[{}]", self.arr_sz.as_deref().unwrap_or(""))
            }
            Cardinality::VarArray => write!(
                f,
                " /*vararray:{}*/",
                self.var_size_member.as_deref().unwrap_or("")
            ),
            Cardinality::ZeroTermArray => write!(f, " /*zeroterm*/"),
        }
    }
}

/// One field of a composite type.
///
/// `base_type` names a native or composite type, never a decorated one.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub base_type: String,
    pub decor: Decorations,
}

/// Classification of a model type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A plain, unadorned integer-shaped type.
    Native,
    /// An intermediary typedef layering decorations over a base type.
    /// Members never reference these directly; the decorations get folded
    /// into the member's own when the member is finalized.
    Decorated {
        base_type: String,
        decor: Decorations,
    },
    /// A record with ordered fields.
    Composite { members: Vec<Member> },
}

/// A named type in the model.
#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
}

impl Type {
    pub fn native(name: &str) -> Self {
        Type {
            name: name.to_string(),
            kind: TypeKind::Native,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, TypeKind::Composite { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Native => write!(f, "{} /* native */;", self.name),
            TypeKind::Decorated { base_type, decor } => {
                write!(f, "typedef {base_type} {decor} {};", self.name)
            }
            TypeKind::Composite { members } => {
                writeln!(f, "typedef struct {{")?;
                for m in members {
                    writeln!(f, "  {}{} {};", m.base_type, m.decor, m.name)?;
                }
                write!(f, "}} {};", self.name)
            }
        }
    }
}

/// A shape-preserving typedef from one name to another.
#[derive(Debug, Clone)]
pub struct Alias {
    pub alias_name: String,
    pub actual_name: String,
}

/// The built-in native types preloaded before parsing begins, covering the
/// multi-word integer spellings the declaration syntax can produce.
const BUILTIN_NATIVES: &[&str] = &[
    "void",
    "_Bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "signed short",
    "unsigned short",
    "short int",
    "signed short int",
    "unsigned short int",
    "short signed int",
    "short unsigned int",
    "int",
    "signed",
    "unsigned",
    "signed int",
    "unsigned int",
    "long",
    "signed long",
    "unsigned long",
    "long int",
    "signed long int",
    "unsigned long int",
    "long signed int",
    "long unsigned int",
    "long long",
    "long long int",
    "signed long long",
    "unsigned long long",
    "signed long long int",
    "unsigned long long int",
    "float",
    "double",
    "long double",
];

/// Fixed-width and stddef names preloaded as aliases so inputs do not have
/// to be run through the preprocessor against the system headers. The
/// `__builtin_va_list` entry mirrors the compiler quirk of the same name.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("int8_t", "signed char"),
    ("uint8_t", "unsigned char"),
    ("int16_t", "short"),
    ("uint16_t", "unsigned short"),
    ("int32_t", "int"),
    ("uint32_t", "unsigned int"),
    ("int64_t", "long long"),
    ("uint64_t", "unsigned long long"),
    ("size_t", "unsigned long"),
    ("ssize_t", "long"),
    ("bool", "_Bool"),
    ("__builtin_va_list", "void"),
];

/// Insertion-ordered collection of types and aliases with lookup by name.
///
/// Lookup resolves alias chains transitively down to the final type.
#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<Type>,
    aliases: Vec<Alias>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry preloaded with the built-in native types and aliases.
    pub fn with_builtins() -> Self {
        let mut reg = Registry::new();
        for name in BUILTIN_NATIVES {
            reg.add_type(Type::native(name));
        }
        for (alias, actual) in BUILTIN_ALIASES {
            reg.add_alias(Alias {
                alias_name: alias.to_string(),
                actual_name: actual.to_string(),
            });
        }
        reg
    }

    /// Names of the preloaded aliases, for seeding the parser's
    /// typedef-name classification.
    pub fn builtin_alias_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_ALIASES.iter().map(|(alias, _)| *alias)
    }

    pub fn add_type(&mut self, t: Type) {
        self.types.push(t);
    }

    pub fn add_alias(&mut self, a: Alias) {
        self.aliases.push(a);
    }

    /// Look up a type by name, resolving alias chains transitively.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        if let Some(t) = self.get_type(name) {
            return Some(t);
        }
        self.get_alias(name)
            .and_then(|a| self.lookup(&a.actual_name))
    }

    /// Direct type lookup, without alias resolution.
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Direct alias lookup.
    pub fn get_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.alias_name == name)
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// Drop every type and alias whose name is not in `used`.
    /// Returns the number of (types, aliases) that survived.
    pub fn retain_used(&mut self, used: &HashSet<String>) -> (usize, usize) {
        self.types.retain(|t| used.contains(&t.name));
        self.aliases.retain(|a| used.contains(&a.alias_name));
        (self.types.len(), self.aliases.len())
    }
}
