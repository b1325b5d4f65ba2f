//! Portal roles and the role string stored on each user

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Roles a portal user can hold. A single user may hold several.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Supervisor,
    Committee,
    Staff,
    Admin,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[
            Role::Student,
            Role::Instructor,
            Role::Supervisor,
            Role::Committee,
            Role::Staff,
            Role::Admin,
        ]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Committee => write!(f, "committee"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" | "course_instructor" => Ok(Role::Instructor),
            "supervisor" => Ok(Role::Supervisor),
            "committee" => Ok(Role::Committee),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Set of roles, stored in the database as a comma-separated string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// Parse a role string such as `"staff, committee"`. Empty segments are skipped.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut roles = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            roles.insert(part.parse()?);
        }
        Ok(Self(roles))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// True if the set holds any of `roles`, or is an admin
    pub fn allows_any(&self, roles: &[Role]) -> bool {
        self.is_admin() || roles.iter().any(|r| self.0.contains(r))
    }

    pub fn is_admin(&self) -> bool {
        self.0.contains(&Role::Admin)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Storage form: sorted, comma-separated, lowercase
    pub fn to_db_string(&self) -> String {
        self.0
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self
            .0
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}", s)
    }
}

impl Serialize for RoleSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(Self::new(roles))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self::new(iter)
    }
}
