use std::sync::Arc;

use crate::adapter::Provider;
use crate::error::ProviderError;
use crate::recgov::RecGov;
use crate::reserve_ca::ReserveCalifornia;

/// Resolve a configured provider name to its adapter.
pub fn resolve(name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    match name {
        RecGov::NAME => Ok(Arc::new(RecGov::new()?)),
        ReserveCalifornia::NAME => Ok(Arc::new(ReserveCalifornia::new()?)),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

/// Resolve every configured provider name, failing on the first unknown.
pub fn resolve_all(names: &[String]) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
    names.iter().map(|name| resolve(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!(resolve("recgov").unwrap().name(), "recgov");
        assert_eq!(
            resolve("reservecalifornia").unwrap().name(),
            "reservecalifornia"
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = match resolve("yellowstone-direct") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, ProviderError::UnknownProvider(_)));
        assert!(!err.is_rate_limited());
    }
}
