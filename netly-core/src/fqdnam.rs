//! §4.4 FQDN-AM — derives a unique, DNS-legal hostname for a service under
//! the configured base domain.

use netly_db::repositories::ServiceRepository;

use crate::error::{CoreError, CoreResult};

/// Sanitize-time truncation per §4.4 — shorter than the DNS label ceiling
/// so a `-<nodeId>-<6 hex>` collision suffix always still fits under 63.
const SANITIZE_LABEL_LEN: usize = 32;
const DNS_LABEL_LEN: usize = 63;
const MAX_FQDN_LEN: usize = 253;

#[derive(Clone)]
pub struct FqdnAllocator {
    base_domain: String,
}

impl FqdnAllocator {
    pub fn new(base_domain: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
        }
    }

    /// Sanitizes `want` into a DNS label, then on collision appends
    /// `-<node_id>-<6 hex chars>` before the base domain until the result
    /// is unique among existing services' fqdns.
    pub async fn allocate(
        &self,
        want: &str,
        node_id: i64,
        services: &dyn ServiceRepository,
    ) -> CoreResult<String> {
        let label = sanitize_label(want);
        let existing: std::collections::HashSet<String> = services
            .list_all()
            .await
            .map_err(CoreError::from)?
            .into_iter()
            .filter_map(|s| s.fqdn().map(|f| f.to_string()))
            .collect();

        let candidate = format!("{label}.{}", self.base_domain);
        if !existing.contains(&candidate) {
            self.validate(&candidate)?;
            return Ok(candidate);
        }

        for _ in 0..1000 {
            let suffix: u32 = rand::random::<u32>() & 0xFF_FFFF;
            let suffixed = format!("{label}-{node_id}-{suffix:06x}");
            let candidate = format!("{suffixed}.{}", self.base_domain);
            if !existing.contains(&candidate) {
                self.validate(&candidate)?;
                return Ok(candidate);
            }
        }

        Err(CoreError::Exhausted(format!(
            "no free fqdn under label `{label}`"
        )))
    }

    /// Enforces DNS length limits: each label <= 63 octets, whole name <= 253.
    pub fn validate(&self, fqdn: &str) -> CoreResult<()> {
        if fqdn.len() > MAX_FQDN_LEN {
            return Err(CoreError::Validation(format!(
                "fqdn `{fqdn}` exceeds {MAX_FQDN_LEN} characters"
            )));
        }
        for label in fqdn.split('.') {
            if label.is_empty() || label.len() > DNS_LABEL_LEN {
                return Err(CoreError::Validation(format!(
                    "label `{label}` in `{fqdn}` is empty or exceeds {DNS_LABEL_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

/// Lowercases, replaces anything outside `[a-z0-9-]` with `-`, collapses
/// repeats, trims leading/trailing `-`, truncates to 32 chars, and
/// defaults to `svc` if nothing usable survives.
fn sanitize_label(want: &str) -> String {
    let mut out = String::with_capacity(want.len());
    let mut last_was_dash = false;
    for c in want.to_lowercase().chars() {
        let mapped = if c.is_ascii_alphanumeric() { c } else { '-' };
        if mapped == '-' && last_was_dash {
            continue;
        }
        out.push(mapped);
        last_was_dash = mapped == '-';
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        return "svc".to_string();
    }
    let truncated: String = trimmed.chars().take(SANITIZE_LABEL_LEN).collect();
    let truncated = truncated.trim_end_matches('-').to_string();
    if truncated.is_empty() {
        "svc".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use netly_db::entities::service;
    use netly_db::repositories::NewService;
    use netly_db::DbResult;

    use super::*;

    #[test]
    fn sanitize_label_collapses_and_trims() {
        assert_eq!(sanitize_label("My Cool Service!!"), "my-cool-service");
        assert_eq!(sanitize_label("--leading"), "leading");
        assert_eq!(sanitize_label("trailing--"), "trailing");
    }

    #[test]
    fn sanitize_label_defaults_to_svc_when_nothing_survives() {
        assert_eq!(sanitize_label("!!!"), "svc");
    }

    #[test]
    fn sanitize_label_truncates_to_32_chars() {
        let long = "a".repeat(100);
        let label = sanitize_label(&long);
        assert_eq!(label.len(), SANITIZE_LABEL_LEN);
    }

    #[test]
    fn validate_rejects_overlong_fqdn() {
        let allocator = FqdnAllocator::new("netly.internal");
        let long = format!("{}.netly.internal", "a".repeat(254));
        assert!(allocator.validate(&long).is_err());
    }

    #[test]
    fn validate_accepts_normal_fqdn() {
        let allocator = FqdnAllocator::new("netly.internal");
        assert!(allocator.validate("web-1.netly.internal").is_ok());
    }

    struct FixedServices(Vec<service::Model>);

    #[async_trait]
    impl ServiceRepository for FixedServices {
        async fn create(&self, _new: NewService) -> DbResult<service::Model> {
            unimplemented!()
        }
        async fn get(&self, _id: i64) -> DbResult<Option<service::Model>> {
            Ok(None)
        }
        async fn list_for_node(&self, _node_id: i64) -> DbResult<Vec<service::Model>> {
            Ok(self.0.clone())
        }
        async fn list_all(&self) -> DbResult<Vec<service::Model>> {
            Ok(self.0.clone())
        }
        async fn soft_delete(&self, _id: i64) -> DbResult<()> {
            Ok(())
        }
    }

    fn existing_service(id: i64, fqdn: &str) -> service::Model {
        let now = chrono::Utc::now();
        service::Model {
            id,
            name: "web".to_string(),
            protocol: "http".to_string(),
            node_id: 1,
            listen_port: 8080,
            routing_mode: "direct".to_string(),
            config: serde_json::json!({"fqdn": fqdn}),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn allocate_returns_the_plain_candidate_when_free() {
        let allocator = FqdnAllocator::new("netly.internal");
        let services = FixedServices(Vec::new());
        let fqdn = allocator.allocate("Web App", 9, &services).await.unwrap();
        assert_eq!(fqdn, "web-app.netly.internal");
    }

    #[tokio::test]
    async fn allocate_appends_node_id_and_hex_suffix_on_collision() {
        let allocator = FqdnAllocator::new("netly.internal");
        let services = FixedServices(vec![existing_service(1, "web-app.netly.internal")]);
        let fqdn = allocator.allocate("Web App", 9, &services).await.unwrap();
        assert!(fqdn.starts_with("web-app-9-"));
        assert!(fqdn.ends_with(".netly.internal"));
        let label = fqdn.strip_suffix(".netly.internal").unwrap();
        let hex_part = label.strip_prefix("web-app-9-").unwrap();
        assert_eq!(hex_part.len(), 6);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
