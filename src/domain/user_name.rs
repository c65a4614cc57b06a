use std::fmt::Debug;

const MAX_NAME_LENGTH: usize = 64;

// Display name a diner enters when joining a table
#[derive(Debug, Clone)]
pub struct UserName(String);

impl UserName {
    pub fn parse(name: String) -> Result<UserName, String> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err("Display name cannot be empty".to_string());
        }

        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(format!("{} is not a valid display name", trimmed));
        }

        if trimmed.chars().any(char::is_control) {
            return Err(format!("{} is not a valid display name", trimmed));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn inner(&self) -> String {
        self.0.clone()
    }
}

impl std::fmt::Display for UserName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
