pub mod mock;
pub mod servicenow;

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::summary::Incident;

pub use mock::{MockOptions, MockSource};
pub use servicenow::ServiceNowSource;

/// Supplies the incident list the summary is computed over.
///
/// `query` is a per-call override of the upstream filter; sources without a
/// notion of filtering ignore it.
pub trait IncidentProvider: Send + Sync {
    fn incidents(
        &self,
        query: Option<String>,
    ) -> impl Future<Output = Result<Vec<Incident>>> + Send;
}

impl<P: IncidentProvider> IncidentProvider for Arc<P> {
    fn incidents(
        &self,
        query: Option<String>,
    ) -> impl Future<Output = Result<Vec<Incident>>> + Send {
        (**self).incidents(query)
    }
}

/// A source chosen at runtime.
pub enum Source {
    Mock(MockSource),
    ServiceNow(ServiceNowSource),
}

impl Source {
    pub fn name(&self) -> &'static str {
        match self {
            Source::Mock(_) => "mock",
            Source::ServiceNow(_) => "servicenow",
        }
    }
}

impl IncidentProvider for Source {
    fn incidents(
        &self,
        query: Option<String>,
    ) -> impl Future<Output = Result<Vec<Incident>>> + Send {
        async move {
            match self {
                Source::Mock(mock) => mock.incidents(query).await,
                Source::ServiceNow(servicenow) => servicenow.incidents(query).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::error::Error;

    #[tokio::test]
    async fn test_source_dispatches_to_variant() {
        let mock = MockSource::from_incidents(Vec::new());
        let source = Source::Mock(mock);
        assert_eq!(source.name(), "mock");
        assert!(source.incidents(None).await.unwrap().is_empty());

        let store = MemoryConfigStore::new();
        let source = Source::ServiceNow(ServiceNowSource::new(&store).unwrap());
        assert_eq!(source.name(), "servicenow");
        assert!(matches!(source.incidents(None).await, Err(Error::MissingConfig)));
    }

    #[tokio::test]
    async fn test_arc_provider_delegates() {
        let shared = Arc::new(MockSource::from_incidents(Vec::new()));
        assert!(shared.incidents(None).await.unwrap().is_empty());
    }
}
