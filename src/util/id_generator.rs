use uuid::Uuid;

/// Generates collision-free identifiers for runs and sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Id for a single invocation used as its session id when the caller
    /// did not supply one.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4().simple())
    }

    /// Id for a long-lived, caller-managed session.
    #[must_use]
    pub fn generate_session_id(&self) -> String {
        format!("session-{}", Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let generator = IdGenerator::new();
        let a = generator.generate_run_id();
        let b = generator.generate_run_id();
        assert_ne!(a, b);
        assert!(a.starts_with("run-"));
    }
}
