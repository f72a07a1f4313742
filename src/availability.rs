use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{Enrollment, Profile, Role};
use crate::store::{Collection, Filter, Query};

pub fn enrolled_ids(enrollments: &[Enrollment], course_id: Uuid) -> HashSet<Uuid> {
    enrollments
        .iter()
        .filter(|e| e.course_id == course_id)
        .map(|e| e.student_id)
        .collect()
}

/// Students in `universe` that are not in `enrolled`. With nobody enrolled this is every
/// student.
pub fn complement<'a>(universe: &'a [Profile], enrolled: &HashSet<Uuid>) -> Vec<&'a Profile> {
    universe
        .iter()
        .filter(|p| p.role == Some(Role::Student))
        .filter(|p| !enrolled.contains(&p.id))
        .collect()
}

/// `NOT IN` filter over `enrolled`, or nothing when the set is empty. An empty exclusion
/// list is not a valid filter for every backend.
pub fn exclusion_filter(field: &'static str, enrolled: &HashSet<Uuid>) -> Option<Filter> {
    if enrolled.is_empty() {
        return None;
    }
    let mut ids: Vec<String> = enrolled.iter().map(Uuid::to_string).collect();
    ids.sort();
    Some(Filter::NotIn(field, ids))
}

pub fn available_students_query(enrolled: &HashSet<Uuid>) -> Query {
    let query = Query::new(Collection::Profiles).filter(Filter::eq("role", Role::Student));
    match exclusion_filter("id", enrolled) {
        Some(filter) => query.filter(filter),
        None => query,
    }
}
