use std::collections::{BTreeMap, BTreeSet};

use super::FileInfo;

#[derive(Debug, Clone)]
/// A sharing group. The owner is always a member, and nobody is both a
/// member and a pending requester.
pub struct Group {
    pub group_id: String,
    pub owner_id: String,
    pub members: BTreeSet<String>,
    pub pending_requests: BTreeSet<String>,
    pub files: BTreeMap<String, FileInfo>,
}

impl Group {
    pub fn new(group_id: String, owner_id: String) -> Self {
        let mut members = BTreeSet::new();
        members.insert(owner_id.clone());
        Group {
            group_id,
            owner_id,
            members,
            pending_requests: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }
}
