//! Shared fixtures for the record-linkage engine's test suites: a
//! builder for [`Unit`] that defaults every optional field to `None` so a
//! test only has to set the fields it cares about, and a fixed clock for
//! assertions that would otherwise race `Utc::now()`.

use chrono::{DateTime, TimeZone, Utc};
use linkage_core::Unit;

/// Builds a [`Unit`] field-by-field, defaulting every optional field to
/// `None`. Tests across `linkage-match`, `linkage-tasks`, and
/// `linkage-aggregate` each hand-rolled this before it moved here.
#[derive(Debug, Clone, Default)]
pub struct UnitBuilder {
    id: String,
    name: String,
    credit_code: Option<String>,
    address: Option<String>,
    legal_representative: Option<String>,
    safety_manager: Option<String>,
    contact_phone: Option<String>,
}

impl UnitBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn credit_code(mut self, value: impl Into<String>) -> Self {
        self.credit_code = Some(value.into());
        self
    }

    #[must_use]
    pub fn address(mut self, value: impl Into<String>) -> Self {
        self.address = Some(value.into());
        self
    }

    #[must_use]
    pub fn legal_representative(mut self, value: impl Into<String>) -> Self {
        self.legal_representative = Some(value.into());
        self
    }

    #[must_use]
    pub fn safety_manager(mut self, value: impl Into<String>) -> Self {
        self.safety_manager = Some(value.into());
        self
    }

    #[must_use]
    pub fn contact_phone(mut self, value: impl Into<String>) -> Self {
        self.contact_phone = Some(value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Unit {
        Unit {
            id: self.id,
            name: self.name,
            credit_code: self.credit_code,
            address: self.address,
            legal_representative: self.legal_representative,
            safety_manager: self.safety_manager,
            contact_phone: self.contact_phone,
        }
    }
}

/// Shorthand for `UnitBuilder::new(id, name).build()`.
#[must_use]
pub fn unit(id: &str, name: &str) -> Unit {
    UnitBuilder::new(id, name).build()
}

/// A fixed instant for tests that assert on `created_time`/`updated_time`
/// without racing the system clock: 2024-01-01T00:00:00Z.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid fixed timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_optional_fields_to_none() {
        let u = UnitBuilder::new("P1", "Acme").build();
        assert_eq!(u.id, "P1");
        assert_eq!(u.name, "Acme");
        assert!(u.credit_code.is_none());
        assert!(u.address.is_none());
    }

    #[test]
    fn builder_sets_optional_fields() {
        let u = UnitBuilder::new("P1", "Acme")
            .credit_code("91330000ABC")
            .contact_phone("0571-88888888")
            .build();
        assert_eq!(u.credit_code.as_deref(), Some("91330000ABC"));
        assert_eq!(u.contact_phone.as_deref(), Some("0571-88888888"));
    }

    #[test]
    fn fixed_now_is_stable() {
        assert_eq!(fixed_now(), fixed_now());
    }
}
