//! 用户聚合
//!
use crate::error::{CommerceError, CommerceResult};
use crate::events;
use ddd_eventing::Event;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    id: String,
    name: String,
    email: String,
    active: bool,
    version: usize,
}

/// 规范化并校验邮箱：去除首尾空白并转小写，要求 `local@domain.tld`
fn normalize_email(email: &str) -> CommerceResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(CommerceError::invalid_value(format!(
            "invalid email: {email}"
        )));
    }
    Ok(email)
}

impl User {
    pub fn register(name: &str, email: &str) -> CommerceResult<(Self, Event)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommerceError::invalid_value("user name is empty"));
        }
        let email = normalize_email(email)?;

        let user = Self {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            email,
            active: true,
            version: 1,
        };
        let event = events::user_registered(&user.id, &user.name, &user.email);
        Ok((user, event))
    }

    pub fn change_email(&mut self, email: &str) -> CommerceResult<Event> {
        if !self.active {
            return Err(CommerceError::invalid_state("user is deactivated"));
        }
        let email = normalize_email(email)?;
        if email == self.email {
            return Err(CommerceError::invalid_value("email unchanged"));
        }

        let old_email = std::mem::replace(&mut self.email, email);
        self.version += 1;
        Ok(events::user_email_changed(&self.id, &old_email, &self.email))
    }

    pub fn deactivate(&mut self, reason: Option<&str>) -> CommerceResult<Event> {
        if !self.active {
            return Err(CommerceError::invalid_state("user already deactivated"));
        }
        self.active = false;
        self.version += 1;
        Ok(events::user_deactivated(&self.id, reason))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn version(&self) -> usize {
        self.version
    }
}
