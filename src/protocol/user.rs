use serde::Serialize;

use super::{Map, Value};

/// Represents user info.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct User {
    /// The ID of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The email address of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The remote ip address of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// A human readable username of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The segment the user belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    /// Additional arbitrary fields for forwards compatibility.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl User {
    /// Fills every field that is unset on `self` from `other`.
    ///
    /// Values already present on `self` are kept.
    pub fn merge(&mut self, other: &User) {
        fn fill(target: &mut Option<String>, source: &Option<String>) {
            if target.is_none() {
                target.clone_from(source);
            }
        }

        fill(&mut self.id, &other.id);
        fill(&mut self.email, &other.email);
        fill(&mut self.ip_address, &other.ip_address);
        fill(&mut self.username, &other.username);
        fill(&mut self.segment, &other.segment);
        for (key, value) in &other.other {
            if !self.other.contains_key(key) {
                self.other.insert(key.clone(), value.clone());
            }
        }
    }

    /// Whether no field is set at all.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.email.is_none()
            && self.ip_address.is_none()
            && self.username.is_none()
            && self.segment.is_none()
            && self.other.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_own_values() {
        let mut user = User {
            id: Some("42".into()),
            ..Default::default()
        };
        let mut other = User {
            id: Some("7".into()),
            email: Some("foo@example.com".into()),
            ..Default::default()
        };
        other.other.insert("plan".into(), "pro".into());

        user.merge(&other);
        assert_eq!(user.id.as_deref(), Some("42"));
        assert_eq!(user.email.as_deref(), Some("foo@example.com"));
        assert_eq!(user.other.get("plan"), Some(&Value::from("pro")));
        assert!(!user.is_empty());
        assert!(User::default().is_empty());
    }
}
