//! User administration: permissions, form checks, filtering

use crate::api::models::{
    Permissions, Role, TaskScope, User, UserPayload, UserSettings, UserStatus,
};
use crate::validation::ValidationError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const MAX_CONCURRENT_RANGE: (u32, u32) = (1, 10);

/// Permission set a freshly created account of `role` gets
pub fn default_permissions(role: Role) -> Permissions {
    match role {
        Role::SuperAdmin => Permissions {
            user_management: true,
            site_management: true,
            system_config: true,
            role_management: true,
            task_management: TaskScope::All,
        },
        Role::Admin => Permissions {
            user_management: true,
            site_management: true,
            system_config: false,
            role_management: false,
            task_management: TaskScope::All,
        },
        Role::User => Permissions::default(),
    }
}

/// Roles the acting user may hand out
pub fn assignable_roles(actor: Role) -> &'static [Role] {
    match actor {
        Role::SuperAdmin => &Role::ALL,
        Role::Admin | Role::User => &[Role::User],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Details,
    Edit,
    Enable,
    Disable,
    Delete,
}

impl UserAction {
    pub fn label(&self) -> &'static str {
        match self {
            UserAction::Details => "Details",
            UserAction::Edit => "Edit",
            UserAction::Enable => "Enable",
            UserAction::Disable => "Disable",
            UserAction::Delete => "Delete",
        }
    }
}

/// What `actor` may do to `target`
pub fn actions_for(actor: &User, target: &User) -> Vec<UserAction> {
    let mut actions = vec![UserAction::Details];
    if actor.id == target.id {
        return actions;
    }
    if actor.role == Role::Admin && target.role == Role::SuperAdmin {
        return actions;
    }

    actions.push(UserAction::Edit);
    actions.push(if target.status == UserStatus::Active {
        UserAction::Disable
    } else {
        UserAction::Enable
    });
    if target.role != Role::SuperAdmin {
        actions.push(UserAction::Delete);
    }
    actions
}

/// Create/edit form contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    /// `None` when creating
    pub user_id: Option<String>,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    pub status: UserStatus,
    pub permissions: Permissions,
    pub settings: UserSettings,
}

impl UserForm {
    pub fn create() -> Self {
        Self {
            user_id: None,
            username: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            role: Role::User,
            status: UserStatus::Active,
            permissions: default_permissions(Role::User),
            settings: UserSettings::default(),
        }
    }

    pub fn edit(user: &User) -> Self {
        Self {
            user_id: Some(user.id.clone()),
            username: user.username.clone(),
            password: String::new(),
            confirm_password: String::new(),
            role: user.role,
            status: user.status,
            permissions: user
                .permissions
                .clone()
                .unwrap_or_else(|| default_permissions(user.role)),
            settings: user.settings.clone().unwrap_or_default(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.user_id.is_none()
    }

    /// Changing role resets permissions to that role's defaults
    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.permissions = default_permissions(role);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ValidationError::Required("username"));
        }
        let len = username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
            return Err(ValidationError::Length {
                field: "username",
                min: USERNAME_MIN,
                max: USERNAME_MAX,
            });
        }

        if self.is_new() && self.password.is_empty() {
            return Err(ValidationError::Required("password"));
        }
        if !self.password.is_empty() {
            if self.password.chars().count() < PASSWORD_MIN {
                return Err(ValidationError::TooShort {
                    field: "password",
                    min: PASSWORD_MIN,
                });
            }
            if self.password != self.confirm_password {
                return Err(ValidationError::PasswordMismatch);
            }
        }

        let (min, max) = MAX_CONCURRENT_RANGE;
        if !(min..=max).contains(&self.settings.max_concurrent_tasks) {
            return Err(ValidationError::OutOfRange {
                field: "max concurrent tasks",
                min: min as i64,
                max: max as i64,
            });
        }
        Ok(())
    }

    /// Validated request body; the password is only sent when set
    pub fn payload(&self) -> Result<UserPayload, ValidationError> {
        self.validate()?;
        Ok(UserPayload {
            username: self.username.trim().to_string(),
            role: self.role,
            status: self.status,
            settings: self.settings.clone(),
            permissions: self.permissions.clone(),
            password: (!self.password.is_empty()).then(|| self.password.clone()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub search: String,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        let term = self.search.to_lowercase();
        user.username.to_lowercase().contains(&term)
            && self.role.map_or(true, |r| user.role == r)
            && self.status.map_or(true, |s| user.status == s)
    }

    pub fn apply<'a>(&self, users: &'a [User]) -> Vec<&'a User> {
        users.iter().filter(|u| self.matches(u)).collect()
    }

    pub fn cycle_role(&mut self) {
        self.role = match self.role {
            None => Some(Role::User),
            Some(Role::User) => Some(Role::Admin),
            Some(Role::Admin) => Some(Role::SuperAdmin),
            Some(Role::SuperAdmin) => None,
        };
    }

    pub fn cycle_status(&mut self) {
        self.status = match self.status {
            None => Some(UserStatus::Active),
            Some(UserStatus::Active) => Some(UserStatus::Disabled),
            Some(UserStatus::Disabled) => Some(UserStatus::Locked),
            Some(UserStatus::Locked) => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, role: Role, status: UserStatus) -> User {
        User {
            id: id.to_string(),
            username: name.to_string(),
            role,
            status,
            created_at: None,
            last_login: None,
            permissions: None,
            settings: None,
        }
    }

    #[test]
    fn test_default_permissions() {
        let su = default_permissions(Role::SuperAdmin);
        assert!(su.system_config && su.role_management);
        assert_eq!(su.task_management, TaskScope::All);

        let admin = default_permissions(Role::Admin);
        assert!(admin.user_management && admin.site_management);
        assert!(!admin.system_config && !admin.role_management);

        let plain = default_permissions(Role::User);
        assert!(!plain.user_management);
        assert_eq!(plain.task_management, TaskScope::Own);
    }

    #[test]
    fn test_assignable_roles() {
        assert_eq!(assignable_roles(Role::SuperAdmin).len(), 3);
        assert_eq!(assignable_roles(Role::Admin), &[Role::User]);
    }

    #[test]
    fn test_row_actions() {
        let admin = user("1", "alice", Role::Admin, UserStatus::Active);
        let root = user("2", "root", Role::SuperAdmin, UserStatus::Active);
        let bob = user("3", "bob", Role::User, UserStatus::Disabled);

        assert_eq!(actions_for(&admin, &admin), vec![UserAction::Details]);
        assert_eq!(actions_for(&admin, &root), vec![UserAction::Details]);
        assert_eq!(
            actions_for(&admin, &bob),
            vec![UserAction::Details, UserAction::Edit, UserAction::Enable, UserAction::Delete]
        );
        // Super admins can be edited by peers but never deleted
        let other_root = user("4", "ops", Role::SuperAdmin, UserStatus::Active);
        assert_eq!(
            actions_for(&root, &other_root),
            vec![UserAction::Details, UserAction::Edit, UserAction::Disable]
        );
    }

    #[test]
    fn test_form_validation() {
        let mut form = UserForm::create();
        assert_eq!(form.validate(), Err(ValidationError::Required("username")));

        form.username = "al".to_string();
        assert!(matches!(form.validate(), Err(ValidationError::Length { .. })));

        form.username = "alice".to_string();
        assert_eq!(form.validate(), Err(ValidationError::Required("password")));

        form.password = "12345".to_string();
        assert!(matches!(form.validate(), Err(ValidationError::TooShort { .. })));

        form.password = "secret1".to_string();
        form.confirm_password = "secret2".to_string();
        assert_eq!(form.validate(), Err(ValidationError::PasswordMismatch));

        form.confirm_password = "secret1".to_string();
        form.settings.max_concurrent_tasks = 11;
        assert!(matches!(form.validate(), Err(ValidationError::OutOfRange { .. })));

        form.settings.max_concurrent_tasks = 4;
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_edit_without_password_omits_it() {
        let existing = user("9", "carol", Role::Admin, UserStatus::Active);
        let form = UserForm::edit(&existing);
        let payload = form.payload().unwrap();
        assert_eq!(payload.password, None);
        assert_eq!(payload.permissions, default_permissions(Role::Admin));
    }

    #[test]
    fn test_role_change_resets_permissions() {
        let mut form = UserForm::create();
        form.permissions.system_config = true;
        form.set_role(Role::Admin);
        assert!(!form.permissions.system_config);
        assert!(form.permissions.user_management);
    }

    #[test]
    fn test_filter() {
        let users = vec![
            user("1", "Alice", Role::Admin, UserStatus::Active),
            user("2", "alfred", Role::User, UserStatus::Locked),
            user("3", "bob", Role::User, UserStatus::Active),
        ];
        let mut filter = UserFilter {
            search: "AL".to_string(),
            ..Default::default()
        };
        assert_eq!(filter.apply(&users).len(), 2);

        filter.role = Some(Role::User);
        let hits = filter.apply(&users);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "alfred");

        filter.search.clear();
        filter.status = Some(UserStatus::Active);
        assert_eq!(filter.apply(&users)[0].username, "bob");
    }
}
