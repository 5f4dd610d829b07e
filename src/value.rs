use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sub-version of the wire format. AMF3 adds compact variable-length
/// integers and back-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Amf0,
    Amf3,
}

impl Version {
    pub fn from_u16(raw: u16) -> Option<Version> {
        match raw {
            0 => Some(Version::Amf0),
            3 => Some(Version::Amf3),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Version::Amf0 => 0,
            Version::Amf3 => 3,
        }
    }
}

/// Identity handle assigned at construction, used by the reference tables to
/// tell structurally equal but distinct containers apart. Clones share the
/// handle and therefore count as the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        InstanceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Null,
    Undefined,
    Boolean(bool),
    Number(f64),
    /// AMF3 only, signed 29-bit range.
    Integer(i32),
    String(String),
    /// AMF0 only.
    StrictArray(Vec<AmfValue>),
    /// AMF0 loosely-typed object. Key order is not significant.
    Object(HashMap<String, AmfValue>),
    /// AMF0 object carrying a class name.
    TypedObject {
        class_name: String,
        properties: HashMap<String, AmfValue>,
    },
    Amf3Array(Amf3Array),
    Amf3Object(Amf3Object),
}

/// AMF3 array with a positionally indexed dense portion and a string-keyed
/// associative portion.
#[derive(Debug, Clone)]
pub struct Amf3Array {
    pub dense: Vec<AmfValue>,
    pub associative: HashMap<String, AmfValue>,
    id: InstanceId,
}

impl Amf3Array {
    pub fn new() -> Self {
        Self {
            dense: vec![],
            associative: HashMap::new(),
            id: InstanceId::next(),
        }
    }

    pub fn add_dense_value(&mut self, value: AmfValue) {
        self.dense.push(value);
    }

    pub fn add_assoc_value(&mut self, key: impl Into<String>, value: AmfValue) {
        self.associative.insert(key.into(), value);
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }
}

impl Default for Amf3Array {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Amf3Array {
    fn eq(&self, other: &Self) -> bool {
        self.dense == other.dense && self.associative == other.associative
    }
}

/// AMF3 classed object: an ordered list of sealed member names with
/// positionally matched values, plus trailing dynamic members when the
/// trait shape allows them.
#[derive(Debug, Clone)]
pub struct Amf3Object {
    pub class_name: String,
    pub dynamic: bool,
    pub member_names: Vec<String>,
    pub values: HashMap<String, AmfValue>,
    pub dyn_values: HashMap<String, AmfValue>,
    trait_id: InstanceId,
}

impl Amf3Object {
    pub fn new(class_name: impl Into<String>, dynamic: bool) -> Self {
        Self {
            class_name: class_name.into(),
            dynamic,
            member_names: vec![],
            values: HashMap::new(),
            dyn_values: HashMap::new(),
            trait_id: InstanceId::next(),
        }
    }

    /// Appends a sealed member. Re-adding an existing name replaces its value.
    pub fn add_value(&mut self, name: impl Into<String>, value: AmfValue) {
        let name = name.into();
        if !self.member_names.contains(&name) {
            self.member_names.push(name.clone());
        }
        self.values.insert(name, value);
    }

    pub fn add_dyn_value(&mut self, name: impl Into<String>, value: AmfValue) {
        self.dyn_values.insert(name.into(), value);
    }

    pub(crate) fn from_shape(shape: &TraitShape) -> Self {
        Self {
            class_name: shape.class_name.clone(),
            dynamic: shape.dynamic,
            member_names: shape.member_names.clone(),
            values: HashMap::with_capacity(shape.member_names.len()),
            dyn_values: HashMap::new(),
            trait_id: shape.id,
        }
    }

    pub(crate) fn shape(&self) -> TraitShape {
        TraitShape {
            class_name: self.class_name.clone(),
            dynamic: self.dynamic,
            member_names: self.member_names.clone(),
            id: self.trait_id,
        }
    }

    pub(crate) fn trait_id(&self) -> InstanceId {
        self.trait_id
    }
}

impl PartialEq for Amf3Object {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.dynamic == other.dynamic
            && self.member_names == other.member_names
            && self.values == other.values
            && self.dyn_values == other.dyn_values
    }
}

/// Declared shape of an AMF3 classed object, cacheable via the trait
/// reference table.
#[derive(Debug, Clone)]
pub(crate) struct TraitShape {
    pub(crate) class_name: String,
    pub(crate) dynamic: bool,
    pub(crate) member_names: Vec<String>,
    pub(crate) id: InstanceId,
}

impl TraitShape {
    pub(crate) fn new(class_name: String, dynamic: bool, member_names: Vec<String>) -> Self {
        Self {
            class_name,
            dynamic,
            member_names,
            id: InstanceId::next(),
        }
    }
}
