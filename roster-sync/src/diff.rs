//! Field diff between an archived snapshot and a fresh projection.

use roster_core::{LocationId, Projection};
use roster_remote::{Field, FieldValue, SparseUpdate};

/// How a field's archived and fresh values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Scalar,
    /// Element-wise, order-sensitive.
    OrderedSequence,
}

impl Comparator {
    fn differs(self, archived: &FieldValue, fresh: &FieldValue) -> bool {
        match (self, archived, fresh) {
            (Comparator::OrderedSequence, FieldValue::TextList(a), FieldValue::TextList(b)) => {
                !a.iter().eq(b.iter())
            }
            (Comparator::OrderedSequence, FieldValue::NumberList(a), FieldValue::NumberList(b)) => {
                !a.iter().eq(b.iter())
            }
            _ => archived != fresh,
        }
    }
}

/// Fields compared for a partial update. The location id is not listed: a
/// location change always recreates the identity.
pub const FIELDS: &[(Field, Comparator)] = &[
    (Field::Username, Comparator::Scalar),
    (Field::Email, Comparator::Scalar),
    (Field::FirstName, Comparator::Scalar),
    (Field::LastName, Comparator::Scalar),
    (Field::Domain, Comparator::Scalar),
    (Field::MemberOf, Comparator::OrderedSequence),
    (Field::TeacherGroups, Comparator::OrderedSequence),
    (Field::Children, Comparator::OrderedSequence),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
    Unchanged,
    Update(SparseUpdate),
    Relocate { from: LocationId, to: LocationId },
}

pub fn diff(archived: &Projection, fresh: &Projection) -> Diff {
    if archived.location_id != fresh.location_id {
        return Diff::Relocate {
            from: archived.location_id,
            to: fresh.location_id,
        };
    }

    let mut update = SparseUpdate::new();
    for &(field, comparator) in FIELDS {
        if comparator.differs(&field.value_in(archived), &field.value_in(fresh)) {
            update.stage(field, fresh);
        }
    }
    if update.is_empty() {
        Diff::Unchanged
    } else {
        Diff::Update(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::RemoteId;

    fn base() -> Projection {
        Projection {
            username: "ola@example.no".to_string(),
            email: "ola@example.no".to_string(),
            first_name: "Ola".to_string(),
            last_name: "Berg".to_string(),
            location_id: LocationId(42),
            member_of: vec!["Berg skole Elever".to_string(), "7A - Berg skole".to_string()],
            teacher_groups: vec![RemoteId(3)],
            ..Default::default()
        }
    }

    #[test]
    fn identical_projections_are_unchanged() {
        assert_eq!(diff(&base(), &base()), Diff::Unchanged);
    }

    #[test]
    fn only_differing_fields_are_staged() {
        let mut fresh = base();
        fresh.last_name = "Dahl".to_string();
        fresh.teacher_groups = vec![RemoteId(3), RemoteId(4)];

        let Diff::Update(update) = diff(&base(), &fresh) else {
            panic!("expected update");
        };
        let fields: Vec<Field> = update.fields().collect();
        assert_eq!(fields, vec![Field::LastName, Field::TeacherGroups]);
    }

    #[test]
    fn membership_order_matters() {
        let mut fresh = base();
        fresh.member_of.reverse();
        let Diff::Update(update) = diff(&base(), &fresh) else {
            panic!("expected update");
        };
        assert!(update.contains(Field::MemberOf));
        assert_eq!(update.len(), 1);
    }

    #[test]
    fn location_change_wins_over_other_changes() {
        let mut fresh = base();
        fresh.location_id = LocationId(43);
        fresh.first_name = "Per".to_string();
        assert_eq!(
            diff(&base(), &fresh),
            Diff::Relocate {
                from: LocationId(42),
                to: LocationId(43)
            }
        );
    }
}
