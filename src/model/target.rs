//! Target-representation table for basic type names.
//!
//! The set of known basic names (the signed/unsigned integer families and
//! the special return-flag-bearing names) is policy, not grammar, so it
//! lives in a configurable table. Entries map a description name to the C
//! type used for temporaries and casts in the generated decoders.

use crate::StringId;
use hashbrown::HashMap;

/// How values of a basic type print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicClass {
    Signed,
    Unsigned,
    /// String-like; only meaningful behind a pointer.
    Str,
}

/// Target-language representation of one basic type name.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicType {
    /// C type used when declaring temporaries for this type.
    pub ctype: String,
    pub class: BasicClass,
    /// Return flag or'ed into `RVAL_DECODED` when this name is a call's
    /// return type (e.g. `RVAL_FD`).
    pub rval_flag: Option<String>,
}

impl BasicType {
    pub fn new(ctype: &str, class: BasicClass) -> Self {
        Self {
            ctype: ctype.to_string(),
            class,
            rval_flag: None,
        }
    }

    pub fn with_rval_flag(ctype: &str, class: BasicClass, flag: &str) -> Self {
        Self {
            ctype: ctype.to_string(),
            class,
            rval_flag: Some(flag.to_string()),
        }
    }
}

/// Resolved target representation of a type name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Repr<'a> {
    Basic(&'a BasicType),
    /// A user-declared aggregate; renders as `struct <name>`.
    Aggregate(StringId),
}

/// Name-to-representation table, seeded with the original tool's entries.
#[derive(Debug)]
pub struct TargetTable {
    map: HashMap<StringId, BasicType>,
}

impl Default for TargetTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TargetTable {
    pub fn with_defaults() -> Self {
        use BasicClass::*;
        let mut table = Self {
            map: HashMap::new(),
        };
        let defaults: &[(&str, BasicType)] = &[
            ("int8", BasicType::new("signed char", Signed)),
            ("int16", BasicType::new("short", Signed)),
            ("int32", BasicType::new("int", Signed)),
            ("int64", BasicType::new("long long", Signed)),
            ("intptr", BasicType::new("kernel_long_t", Signed)),
            ("uint8", BasicType::new("unsigned char", Unsigned)),
            ("uint16", BasicType::new("unsigned short", Unsigned)),
            ("uint32", BasicType::new("unsigned int", Unsigned)),
            ("uint64", BasicType::new("unsigned long long", Unsigned)),
            ("uintptr", BasicType::new("kernel_ulong_t", Unsigned)),
            ("fd", BasicType::with_rval_flag("int", Signed, "RVAL_FD")),
            ("pid", BasicType::with_rval_flag("int", Signed, "RVAL_TGID")),
            ("tid", BasicType::with_rval_flag("int", Signed, "RVAL_TID")),
            ("uid", BasicType::new("unsigned int", Unsigned)),
            ("gid", BasicType::new("unsigned int", Unsigned)),
            ("string", BasicType::new("char", Str)),
            ("filename", BasicType::new("char", Str)),
            ("buffer", BasicType::new("char", Str)),
        ];
        for (name, bt) in defaults {
            table.map.insert(StringId::new(name), bt.clone());
        }
        table
    }

    /// Registers (or replaces) one basic type name.
    pub fn register(&mut self, name: &str, basic: BasicType) {
        self.map.insert(StringId::new(name), basic);
    }

    pub fn get(&self, name: StringId) -> Option<&BasicType> {
        self.map.get(&name)
    }
}
