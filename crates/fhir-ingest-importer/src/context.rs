/// Per-file import state, created fresh for every bundle.
///
/// Holds the id of the most recent Patient entry so that later Encounter,
/// Observation and Condition entries can be attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportContext {
    active_patient_id: Option<String>,
}

impl ImportContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active patient for the entries that follow.
    pub fn set_active_patient(&mut self, id: impl Into<String>) {
        self.active_patient_id = Some(id.into());
    }

    pub fn active_patient(&self) -> Option<&str> {
        self.active_patient_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_patient_replaces_earlier() {
        let mut ctx = ImportContext::new();
        assert_eq!(ctx.active_patient(), None);
        ctx.set_active_patient("P1");
        ctx.set_active_patient("P2");
        assert_eq!(ctx.active_patient(), Some("P2"));
    }
}
