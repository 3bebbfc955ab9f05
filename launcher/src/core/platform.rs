//! Hosting platform detection from the environment snapshot.

use crate::core::config::EnvSnapshot;
use crate::core::types::Platform;

/// Detect a known hosting platform. Heroku wins over Railway over Render.
pub fn detect_platform(env: &EnvSnapshot) -> Option<Platform> {
    if env.contains("DYNO") {
        let container_stack = env
            .get("HEROKU_DOCKER")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
        return Some(Platform::Heroku { container_stack });
    }
    if env.contains("RAILWAY_ENVIRONMENT") {
        return Some(Platform::Railway);
    }
    if env.contains("RENDER") {
        return Some(Platform::Render);
    }
    None
}
