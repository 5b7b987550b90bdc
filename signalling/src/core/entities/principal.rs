use std::collections::HashSet;

/// Privileges granted by the identity provider's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Joins every room as a Moderator.
    ModerateRooms,
    /// Deletes any room and reads any room's recordings.
    ManageRooms,
}

impl Capability {
    /// Role names are matched case-insensitively; unknown roles grant nothing.
    pub fn for_role(role: &str) -> &'static [Capability] {
        match role.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => &[Capability::ManageRooms, Capability::ModerateRooms],
            "teacher" | "moderator" => &[Capability::ModerateRooms],
            _ => &[],
        }
    }
}

/// The authenticated caller of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub username: String,
    pub capabilities: HashSet<Capability>,
}

impl Principal {
    pub fn new<S: AsRef<str>>(user_id: i32, username: &str, roles: &[S]) -> Self {
        let capabilities = roles
            .iter()
            .flat_map(|role| Capability::for_role(role.as_ref()).iter().copied())
            .collect();

        Self {
            user_id,
            username: username.to_string(),
            capabilities,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_roles_to_capabilities() {
        let admin = Principal::new(1, "root", &["Admin"]);
        assert!(admin.has(Capability::ManageRooms));
        assert!(admin.has(Capability::ModerateRooms));

        let teacher = Principal::new(2, "kai", &["teacher", "unknown"]);
        assert!(teacher.has(Capability::ModerateRooms));
        assert!(!teacher.has(Capability::ManageRooms));

        let student = Principal::new(3, "ana", &["student"]);
        assert!(student.capabilities.is_empty());
    }
}
