//! Message bodies.

use super::Email;

pub fn admin_new_user(admin: &str, name: &str, email: &str) -> Email {
    Email {
        to: admin.to_string(),
        subject: "New User Registration".into(),
        text: format!("A new user has registered:\n\nName: {name}\nEmail: {email}"),
    }
}

pub fn welcome(name: &str, email: &str) -> Email {
    Email {
        to: email.to_string(),
        subject: "Welcome!".into(),
        text: format!(
            "Hi {name}, welcome to our platform!\nWe are really excited to have you on board!"
        ),
    }
}

/// Link the frontend serves for completing a reset.
pub fn reset_url(frontend_url: &str, token: &str) -> String {
    format!("{frontend_url}/reset-password/{token}")
}

pub fn password_reset(email: &str, reset_url: &str) -> Email {
    Email {
        to: email.to_string(),
        subject: "Password Reset".into(),
        text: format!("Reset your password using this link: {reset_url}"),
    }
}
