//! Typed access to the tag trees stored in region columns.
//!
//! Trees are decoded and encoded by `quartz_nbt`; with its `preserve_order`
//! feature compounds keep the order their entries were read or inserted in.
//! This module only adds `Option` returning getters on top, where a missing
//! name and a tag of another type both read as `None`.

pub use quartz_nbt::io::{read_nbt, write_nbt, Flavor, NbtIoError};
pub use quartz_nbt::{NbtCompound as CompoundTag, NbtList as ListTag, NbtTag as TagNode};

/// Borrowed view over any of the three numeric array tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericArray<'a> {
    Byte(&'a [i8]),
    Int(&'a [i32]),
    Long(&'a [i64]),
}

impl<'a> NumericArray<'a> {
    pub fn of(tag: &'a TagNode) -> Option<Self> {
        match tag {
            TagNode::ByteArray(values) => Some(NumericArray::Byte(values)),
            TagNode::IntArray(values) => Some(NumericArray::Int(values)),
            TagNode::LongArray(values) => Some(NumericArray::Long(values)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NumericArray::Byte(values) => values.len(),
            NumericArray::Int(values) => values.len(),
            NumericArray::Long(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        match self {
            NumericArray::Byte(values) => values.get(index).map(|v| *v as i64),
            NumericArray::Int(values) => values.get(index).map(|v| *v as i64),
            NumericArray::Long(values) => values.get(index).copied(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + 'a {
        let view = *self;
        (0..view.len()).filter_map(move |index| view.get(index))
    }
}

pub fn as_compound(tag: &TagNode) -> Option<&CompoundTag> {
    match tag {
        TagNode::Compound(compound) => Some(compound),
        _ => None,
    }
}

pub fn as_str(tag: &TagNode) -> Option<&str> {
    match tag {
        TagNode::String(value) => Some(value),
        _ => None,
    }
}

/// Getters which never fail: names compare exactly (case-sensitive).
pub trait CompoundTagExt {
    fn tag(&self, name: &str) -> Option<&TagNode>;

    fn get_compound(&self, name: &str) -> Option<&CompoundTag> {
        self.tag(name).and_then(as_compound)
    }

    fn get_list(&self, name: &str) -> Option<&ListTag> {
        match self.tag(name) {
            Some(TagNode::List(list)) => Some(list),
            _ => None,
        }
    }

    fn get_string(&self, name: &str) -> Option<&str> {
        self.tag(name).and_then(as_str)
    }

    fn get_numeric_array(&self, name: &str) -> Option<NumericArray<'_>> {
        self.tag(name).and_then(NumericArray::of)
    }

    fn get_long_array(&self, name: &str) -> Option<&[i64]> {
        match self.tag(name) {
            Some(TagNode::LongArray(values)) => Some(values),
            _ => None,
        }
    }

    fn get_i8(&self, name: &str) -> Option<i8> {
        match self.tag(name) {
            Some(TagNode::Byte(value)) => Some(*value),
            _ => None,
        }
    }

    fn get_i32(&self, name: &str) -> Option<i32> {
        match self.tag(name) {
            Some(TagNode::Int(value)) => Some(*value),
            _ => None,
        }
    }
}

impl CompoundTagExt for CompoundTag {
    fn tag(&self, name: &str) -> Option<&TagNode> {
        self.inner().get(name)
    }
}

/// Compound items of a list, `Err` with the index of the first other item.
pub fn list_compounds(list: &ListTag) -> Result<Vec<&CompoundTag>, usize> {
    list.iter()
        .enumerate()
        .map(|(index, item)| as_compound(item).ok_or(index))
        .collect()
}
