//! Typed sparse identity updates.
//!
//! A [`SparseUpdate`] carries exactly the staged fields of a `PUT users/{id}`
//! call. Each [`Field`] has one fixed value kind, so a field can only ever be
//! staged with a value of the right shape: values are always read out of a
//! [`Projection`].

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use roster_core::{LocationId, Projection, RemoteId};

/// Every syncable identity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Username,
    Email,
    FirstName,
    LastName,
    LocationId,
    Domain,
    MemberOf,
    TeacherGroups,
    Children,
}

impl Field {
    /// Property name on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Email => "email",
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::LocationId => "locationId",
            Field::Domain => "domain",
            Field::MemberOf => "memberOf",
            Field::TeacherGroups => "teacher",
            Field::Children => "children",
        }
    }

    /// Read this field out of a projection.
    pub fn value_in(self, p: &Projection) -> FieldValue {
        match self {
            Field::Username => FieldValue::Text(p.username.clone()),
            Field::Email => FieldValue::Text(p.email.clone()),
            Field::FirstName => FieldValue::Text(p.first_name.clone()),
            Field::LastName => FieldValue::Text(p.last_name.clone()),
            Field::LocationId => FieldValue::Number(p.location_id.0),
            Field::Domain => FieldValue::Text(p.domain.clone()),
            Field::MemberOf => FieldValue::TextList(p.member_of.clone()),
            Field::TeacherGroups => {
                FieldValue::NumberList(p.teacher_groups.iter().map(|id| id.0).collect())
            }
            Field::Children => FieldValue::TextList(p.children.clone()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A staged value. The variant is fixed by the field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(u32),
    TextList(Vec<String>),
    NumberList(Vec<u32>),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serializer.serialize_u32(*n),
            FieldValue::TextList(items) => items.serialize(serializer),
            FieldValue::NumberList(items) => items.serialize(serializer),
        }
    }
}

/// Field → value map for one partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseUpdate {
    fields: BTreeMap<Field, FieldValue>,
}

impl SparseUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `field` with its value in `source`.
    pub fn stage(&mut self, field: Field, source: &Projection) {
        self.fields.insert(field, field.value_in(source));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Staged fields in table order.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.keys().copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Write every staged value into `target`, leaving other fields alone.
    pub fn apply_to(&self, target: &mut Projection) {
        for (field, value) in &self.fields {
            match (field, value) {
                (Field::Username, FieldValue::Text(v)) => target.username = v.clone(),
                (Field::Email, FieldValue::Text(v)) => target.email = v.clone(),
                (Field::FirstName, FieldValue::Text(v)) => target.first_name = v.clone(),
                (Field::LastName, FieldValue::Text(v)) => target.last_name = v.clone(),
                (Field::LocationId, FieldValue::Number(v)) => target.location_id = LocationId(*v),
                (Field::Domain, FieldValue::Text(v)) => target.domain = v.clone(),
                (Field::MemberOf, FieldValue::TextList(v)) => target.member_of = v.clone(),
                (Field::TeacherGroups, FieldValue::NumberList(v)) => {
                    target.teacher_groups = v.iter().copied().map(RemoteId).collect()
                }
                (Field::Children, FieldValue::TextList(v)) => target.children = v.clone(),
                // `stage` is the only way in, so kinds always match.
                _ => {}
            }
        }
    }
}

impl Serialize for SparseUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field.wire_name(), value)?;
        }
        map.end()
    }
}
