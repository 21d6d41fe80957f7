//! Schema retrieval and lookup
//!
//! The document comes from exactly one source per fetch: the override URL
//! when configured, otherwise the cluster's `/openapi/v2` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::tree::{ResourceSchemaFragment, SchemaDocument};
use crate::ai::timeout::guarded;
use crate::cluster::ClusterConnection;
use crate::config::SchemaConfig;
use crate::constants::schema::{DEFINITIONS_KEY, OPENAPI_V2_PATH};
use crate::types::{AssistError, Result};

/// Anything that can produce a fresh schema document
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self, cancel: &CancellationToken) -> Result<SchemaDocument>;
}

pub struct SchemaResolver {
    url: Option<String>,
    connection: Option<ClusterConnection>,
    client: reqwest::Client,
    timeout: Duration,
}

impl SchemaResolver {
    pub fn new(config: &SchemaConfig, connection: Option<ClusterConnection>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AssistError::SchemaUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            url: config.url.clone(),
            connection,
            client,
            timeout,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_from_url(&self, url: &str) -> Result<SchemaDocument> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AssistError::SchemaUnavailable(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AssistError::SchemaUnavailable(format!(
                "GET {} answered {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AssistError::SchemaUnavailable(format!("reading {}: {}", url, e)))?;

        SchemaDocument::from_slice(&bytes)
    }

    #[instrument(skip_all, fields(context = %connection.context()))]
    async fn fetch_from_cluster(&self, connection: &ClusterConnection) -> Result<SchemaDocument> {
        let request = http::Request::get(OPENAPI_V2_PATH)
            .header("Accept", "application/json")
            .body(Vec::new())
            .map_err(|e| AssistError::SchemaUnavailable(e.to_string()))?;

        let text = connection
            .client()
            .request_text(request)
            .await
            .map_err(|e| AssistError::SchemaUnavailable(format!("{}: {}", OPENAPI_V2_PATH, e)))?;

        SchemaDocument::from_slice(text.as_bytes())
    }
}

#[async_trait]
impl SchemaSource for SchemaResolver {
    async fn fetch_schema(&self, cancel: &CancellationToken) -> Result<SchemaDocument> {
        let fetch = async {
            match (&self.url, &self.connection) {
                (Some(url), _) => {
                    debug!("Fetching schema from override URL {}", url);
                    self.fetch_from_url(url).await
                }
                (None, Some(connection)) => {
                    debug!("Fetching schema from cluster");
                    self.fetch_from_cluster(connection).await
                }
                (None, None) => Err(AssistError::SchemaUnavailable(
                    "no schema URL configured and no cluster connection".to_string(),
                )),
            }
        };

        guarded(
            cancel,
            self.timeout,
            fetch,
            "schema fetch",
            AssistError::schema_timeout,
        )
        .await
    }
}

/// Definition names containing `substring`, case-insensitively, sorted
pub fn find_resource_names(doc: &SchemaDocument, substring: &str) -> Result<Vec<String>> {
    let needle = substring.to_lowercase();
    let definitions = doc.root().child(DEFINITIONS_KEY)?.as_mapping()?;

    let mut names: Vec<String> = definitions
        .keys()
        .filter(|name| name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    names.sort();
    Ok(names)
}

/// Fragment for an exact definition name
pub fn get_resource_schema(doc: &SchemaDocument, kind: &str) -> Result<ResourceSchemaFragment> {
    let definitions = doc.root().child(DEFINITIONS_KEY)?;
    let entry = definitions
        .get(kind)?
        .ok_or_else(|| AssistError::ResourceNotFound(kind.to_string()))?;
    entry.as_mapping()?;

    Ok(ResourceSchemaFragment {
        kind: kind.to_string(),
        body: entry.value().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::connection::tests::connection_for;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_doc() -> Value {
        json!({
            "swagger": "2.0",
            "definitions": {
                "io.k8s.api.apps.v1.Deployment": {"type": "object", "description": "Deployment"},
                "io.k8s.api.apps.v1.DeploymentSpec": {"type": "object"},
                "io.k8s.api.core.v1.Pod": {"type": "object"},
                "io.k8s.api.core.v1.Broken": "not a mapping"
            }
        })
    }

    fn resolver(url: Option<String>, connection: Option<ClusterConnection>) -> SchemaResolver {
        let config = SchemaConfig {
            url,
            timeout_secs: 5,
            ..Default::default()
        };
        SchemaResolver::new(&config, connection).unwrap()
    }

    #[test]
    fn test_find_resource_names_case_insensitive() {
        let doc = SchemaDocument::new(sample_doc());
        let names = find_resource_names(&doc, "deployment").unwrap();
        assert_eq!(
            names,
            vec!["io.k8s.api.apps.v1.Deployment", "io.k8s.api.apps.v1.DeploymentSpec"]
        );
        assert!(find_resource_names(&doc, "StatefulSet").unwrap().is_empty());
    }

    #[test]
    fn test_find_without_definitions() {
        let doc = SchemaDocument::new(json!({"swagger": "2.0"}));
        assert_matches!(
            find_resource_names(&doc, "pod"),
            Err(AssistError::SchemaShape { .. })
        );

        let doc = SchemaDocument::new(json!({"definitions": []}));
        assert_matches!(
            find_resource_names(&doc, "pod"),
            Err(AssistError::SchemaShape { .. })
        );
    }

    #[test]
    fn test_get_resource_schema() {
        let doc = SchemaDocument::new(sample_doc());
        let fragment = get_resource_schema(&doc, "io.k8s.api.core.v1.Pod").unwrap();
        assert_eq!(fragment.kind, "io.k8s.api.core.v1.Pod");
        assert_eq!(fragment.body, json!({"type": "object"}));

        assert_matches!(
            get_resource_schema(&doc, "io.k8s.api.core.v1.Nope"),
            Err(AssistError::ResourceNotFound(_))
        );
        assert_matches!(
            get_resource_schema(&doc, "io.k8s.api.core.v1.Broken"),
            Err(AssistError::SchemaShape { ref path, .. }) if path == "definitions.io.k8s.api.core.v1.Broken"
        );
    }

    #[tokio::test]
    async fn test_no_source_is_unavailable() {
        let result = resolver(None, None)
            .fetch_schema(&CancellationToken::new())
            .await;
        assert_matches!(result, Err(AssistError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_url() {
        let result = resolver(Some("http://127.0.0.1:1/openapi/v2".to_string()), None)
            .fetch_schema(&CancellationToken::new())
            .await;
        assert_matches!(result, Err(AssistError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_from_override_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let doc = resolver(Some(format!("{}/openapi/v2", server.uri())), None)
            .fetch_schema(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(find_resource_names(&doc, "pod").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_override_url_excludes_cluster() {
        let schema_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_doc()))
            .expect(1)
            .mount(&schema_server)
            .await;

        let cluster = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&cluster)
            .await;

        let result = resolver(
            Some(schema_server.uri()),
            Some(connection_for(&cluster.uri()).await),
        )
        .fetch_schema(&CancellationToken::new())
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let result = resolver(Some(server.uri()), None)
            .fetch_schema(&CancellationToken::new())
            .await;
        assert_matches!(result, Err(AssistError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = resolver(Some(server.uri()), None)
            .fetch_schema(&CancellationToken::new())
            .await;
        assert_matches!(result, Err(AssistError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_through_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let doc = resolver(None, Some(connection_for(&server.uri()).await))
            .fetch_schema(&CancellationToken::new())
            .await
            .unwrap();
        assert!(get_resource_schema(&doc, "io.k8s.api.apps.v1.Deployment").is_ok());
    }

    fn definitions_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[a-z]{2,6}(\\.[a-z0-9]{1,4}){0,3}\\.[A-Z][a-z]{2,8}", 1..12)
            .prop_map(|set| set.into_iter().collect())
    }

    fn doc_with(names: &[String]) -> SchemaDocument {
        let definitions: serde_json::Map<String, Value> = names
            .iter()
            .map(|name| (name.clone(), json!({"x-name": name})))
            .collect();
        SchemaDocument::new(json!({ "definitions": definitions }))
    }

    proptest! {
        #[test]
        fn prop_full_name_is_found(names in definitions_strategy(), pick in any::<prop::sample::Index>()) {
            let doc = doc_with(&names);
            let name = &names[pick.index(names.len())];
            let found = find_resource_names(&doc, name).unwrap();
            prop_assert!(found.contains(name));
        }

        #[test]
        fn prop_lookup_is_idempotent(names in definitions_strategy(), pick in any::<prop::sample::Index>()) {
            let doc = doc_with(&names);
            let name = &names[pick.index(names.len())];
            let first = get_resource_schema(&doc, name).unwrap();
            let second = get_resource_schema(&doc, name).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_unique_match_equals_exact_lookup(names in definitions_strategy(), pick in any::<prop::sample::Index>()) {
            let doc = doc_with(&names);
            let name = &names[pick.index(names.len())];
            let found = find_resource_names(&doc, name).unwrap();
            if found.len() == 1 {
                let narrowed = get_resource_schema(&doc, &found[0]).unwrap();
                let exact = get_resource_schema(&doc, name).unwrap();
                prop_assert_eq!(narrowed, exact);
            }
        }
    }
}
