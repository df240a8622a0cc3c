//! User and session identity used to scope lock names.
//!
//! These lookups are best-effort: a missing variable degrades to a stable
//! fallback rather than failing lock construction.

use crate::config::Scope;

/// Name of the current user.
pub fn current_user() -> String {
    if let Some(user) = non_empty_var("USER").or_else(|| non_empty_var("USERNAME")) {
        return user;
    }

    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        format!("uid{}", uid)
    }

    #[cfg(not(unix))]
    {
        "unknown".to_string()
    }
}

/// Identifier of the current login session.
///
/// Prefers the logind session id, then the graphical display, then the
/// process session id.
pub fn current_session() -> String {
    if let Some(id) = non_empty_var("XDG_SESSION_ID") {
        return id;
    }
    if let Some(display) = non_empty_var("WAYLAND_DISPLAY").or_else(|| non_empty_var("DISPLAY")) {
        return display;
    }

    #[cfg(unix)]
    {
        // SAFETY: getsid(0) queries the calling process and has no preconditions.
        let sid = unsafe { libc::getsid(0) };
        if sid > 0 {
            return format!("sid{}", sid);
        }
    }

    "default".to_string()
}

/// Qualifiers appended to the application name to form the lock key.
pub fn scope_qualifiers(scope: Scope) -> Vec<String> {
    match scope {
        Scope::Global => Vec::new(),
        Scope::User => vec![current_user()],
        Scope::Session => vec![current_user(), current_session()],
    }
}

/// Default record title: `user@host`.
pub fn owner_string() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", current_user(), host)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Restores an environment variable on drop.
    struct EnvGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests touching the environment are #[serial].
            unsafe {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: tests touching the environment are #[serial].
            unsafe {
                match &self.original {
                    Some(v) => std::env::set_var(self.key, v),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_current_user_prefers_env() {
        let _user = EnvGuard::set("USER", Some("alice"));
        assert_eq!(current_user(), "alice");
    }

    #[test]
    #[serial]
    fn test_current_user_falls_back() {
        let _user = EnvGuard::set("USER", None);
        let _username = EnvGuard::set("USERNAME", None);
        assert!(!current_user().is_empty());
    }

    #[test]
    #[serial]
    fn test_current_session_prefers_logind_id() {
        let _sid = EnvGuard::set("XDG_SESSION_ID", Some("c7"));
        assert_eq!(current_session(), "c7");
    }

    #[test]
    #[serial]
    fn test_scope_qualifiers() {
        let _user = EnvGuard::set("USER", Some("bob"));
        let _sid = EnvGuard::set("XDG_SESSION_ID", Some("3"));

        assert!(scope_qualifiers(Scope::Global).is_empty());
        assert_eq!(scope_qualifiers(Scope::User), vec!["bob".to_string()]);
        assert_eq!(
            scope_qualifiers(Scope::Session),
            vec!["bob".to_string(), "3".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_owner_string() {
        let _user = EnvGuard::set("USER", Some("carol"));
        let owner = owner_string();
        assert!(owner.starts_with("carol@"));
    }
}
