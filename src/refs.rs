use crate::error::AmfDecodingError;
use crate::value::{AmfValue, InstanceId, TraitShape};

/// The three append-only reference tables shared by all recursion within one
/// top-level encode or decode call. Strings are looked up by content; object
/// instances and trait shapes by their identity handle, so two structurally
/// equal but distinct values never collapse into one back-reference.
#[derive(Default)]
pub(crate) struct RefTables {
    strings: Vec<String>,
    objects: Vec<AmfValue>,
    traits: Vec<TraitShape>,
}

impl RefTables {
    pub(crate) fn add_string(&mut self, string: &str) {
        self.strings.push(string.to_string());
    }

    pub(crate) fn find_string(&self, string: &str) -> Option<u32> {
        self.strings
            .iter()
            .position(|entry| entry == string)
            .map(|index| index as u32)
    }

    pub(crate) fn get_string(&self, index: u32) -> Result<&str, AmfDecodingError> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(AmfDecodingError::OutOfBoundsReference(index))
    }

    pub(crate) fn add_object(&mut self, value: AmfValue) {
        self.objects.push(value);
    }

    pub(crate) fn find_object(&self, id: InstanceId) -> Option<u32> {
        self.objects
            .iter()
            .position(|entry| object_id(entry) == Some(id))
            .map(|index| index as u32)
    }

    pub(crate) fn get_object(&self, index: u32) -> Result<&AmfValue, AmfDecodingError> {
        self.objects
            .get(index as usize)
            .ok_or(AmfDecodingError::OutOfBoundsReference(index))
    }

    pub(crate) fn add_trait(&mut self, shape: TraitShape) {
        self.traits.push(shape);
    }

    pub(crate) fn find_trait(&self, id: InstanceId) -> Option<u32> {
        self.traits
            .iter()
            .position(|entry| entry.id == id)
            .map(|index| index as u32)
    }

    pub(crate) fn get_trait(&self, index: u32) -> Result<&TraitShape, AmfDecodingError> {
        self.traits
            .get(index as usize)
            .ok_or(AmfDecodingError::OutOfBoundsReference(index))
    }
}

fn object_id(value: &AmfValue) -> Option<InstanceId> {
    match value {
        AmfValue::Amf3Array(array) => Some(array.id()),
        _ => None,
    }
}
