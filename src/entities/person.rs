// 👧 Roster Entities - children and their linked parents
//
// The roster is owned by the calling service. We only read it, and we read
// it in a fixed order so that ties between equal match scores resolve the
// same way on every run.

use serde::{Deserialize, Serialize};

// ============================================================================
// PARENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub first_name: String,
    pub last_name: String,
}

impl Parent {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Parent {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

// ============================================================================
// CHILD
// ============================================================================

/// Child enrolled in care - the person fees are owed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    /// Caller-assigned identity
    pub id: String,

    pub first_name: String,
    pub last_name: String,

    /// 5-digit member number; empty when none was assigned
    #[serde(default)]
    pub member_number: String,

    #[serde(default)]
    pub parents: Vec<Parent>,
}

impl Child {
    pub fn new(id: &str, first_name: &str, last_name: &str, member_number: &str) -> Self {
        Child {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            member_number: member_number.to_string(),
            parents: Vec::new(),
        }
    }

    /// Builder pattern: link a parent
    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// ROSTER
// ============================================================================

/// Read-only snapshot of all children for one import run.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    children: Vec<Child>,
}

impl Roster {
    /// Build a roster, sorted by (member number, last name, first name, id).
    pub fn new(mut children: Vec<Child>) -> Self {
        children.sort_by(|a, b| {
            a.member_number
                .cmp(&b.member_number)
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Roster { children }
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Child> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Child with exactly this member number; `None` if zero or several match.
    pub fn find_by_member_number(&self, number: &str) -> Option<&Child> {
        if number.is_empty() {
            return None;
        }

        let mut hits = self.children.iter().filter(|c| c.member_number == number);
        let first = hits.next()?;
        if hits.next().is_some() {
            return None;
        }
        Some(first)
    }
}
