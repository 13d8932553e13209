use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

string_enum! {
    pub enum UserRole {
        Worker => "worker",
        Manager => "manager",
        Admin => "admin",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub user_code: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    /// 0 none, 1 supervisor, 2 manager, 3 area manager, 4 admin.
    pub approval_level: i16,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and managers see every request; workers only their own.
    pub fn can_view_all_requests(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }

    /// Role label written to the approval history.
    pub fn approver_role(&self) -> &'static str {
        match self.approval_level {
            1 => "Supervisor",
            2 => "Manager",
            3 => "Area Manager",
            4 => "Administrator",
            _ => match self.role {
                UserRole::Admin => "Administrator",
                UserRole::Manager => "Manager",
                UserRole::Worker => "Worker",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub user_code: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
}

/// Admin-side user creation; may set role and approval level.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    #[validate]
    #[serde(flatten)]
    pub profile: RegisterUser,
    #[serde(default = "default_role")]
    pub role: UserRole,
    #[validate(range(min = 0, max = 4, message = "Approval level must be between 0 and 4"))]
    #[serde(default)]
    pub approval_level: i16,
}

fn default_role() -> UserRole {
    UserRole::Worker
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(email(message = "Valid email is required"))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_code: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub role: Option<UserRole>,
    #[validate(range(min = 0, max = 4, message = "Approval level must be between 0 and 4"))]
    pub approval_level: Option<i16>,
}

impl UpdateUser {
    /// Fields a user may change on their own profile.
    pub fn profile_only(self) -> Self {
        Self {
            role: None,
            approval_level: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetPassword {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, level: i16) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: "secret".into(),
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: None,
            designation: None,
            department: None,
            location: None,
            role,
            approval_level: level,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(user(UserRole::Worker, 0)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "worker");
    }

    #[test]
    fn test_visibility_and_role_labels() {
        assert!(!user(UserRole::Worker, 1).can_view_all_requests());
        assert!(user(UserRole::Manager, 2).can_view_all_requests());
        assert_eq!(user(UserRole::Worker, 1).approver_role(), "Supervisor");
        assert_eq!(user(UserRole::Admin, 0).approver_role(), "Administrator");
    }

    #[test]
    fn test_register_validation() {
        let input = RegisterUser {
            email: "not-an-email".into(),
            password: "123".into(),
            first_name: "Ada".into(),
            last_name: "".into(),
            user_code: None,
            designation: None,
            department: None,
            location: None,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("last_name"));
        assert!(!fields.contains_key("first_name"));
    }

    #[test]
    fn test_profile_update_cannot_escalate() {
        let update = UpdateUser {
            role: Some(UserRole::Admin),
            approval_level: Some(4),
            designation: Some("Lead".into()),
            ..Default::default()
        }
        .profile_only();
        assert!(update.role.is_none());
        assert!(update.approval_level.is_none());
        assert_eq!(update.designation.as_deref(), Some("Lead"));
    }
}
