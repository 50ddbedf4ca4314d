//! Legal-tag and data-country compliance.
//!
//! Tags are validated through the external legal-tag service; tags seen
//! valid once are cached per partition and short-circuit later batches.
//! The country whitelist is fetched once and kept for process lifetime,
//! invalidated only by an explicit reset.

use async_trait::async_trait;
use parking_lot::RwLock;
use recordio_auth::Cache;
use recordio_common::{ComplianceStatus, Error, Legal, RequestContext, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// One rejected legal tag, as reported by the legal-tag service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidTag {
    pub name: String,
    pub reason: String,
}

/// Client contract for the external legal-tag service
#[async_trait]
pub trait LegalTagValidator: Send + Sync {
    /// Validate a set of tag names in one call, returning the invalid ones
    async fn validate(&self, ctx: &RequestContext, tags: &BTreeSet<String>)
        -> Result<Vec<InvalidTag>>;

    /// The country codes records may declare as relevant, mapped to
    /// their display names
    async fn valid_data_countries(&self, ctx: &RequestContext)
        -> Result<BTreeMap<String, String>>;
}

/// Validates legal tags and data countries, and propagates legal info
/// from parent records
pub struct LegalComplianceResolver {
    validator: Arc<dyn LegalTagValidator>,
    tag_cache: Arc<dyn Cache<bool>>,
    countries: RwLock<Option<BTreeMap<String, String>>>,
    default_country: String,
}

impl LegalComplianceResolver {
    pub fn new(
        validator: Arc<dyn LegalTagValidator>,
        tag_cache: Arc<dyn Cache<bool>>,
        default_country: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            tag_cache,
            countries: RwLock::new(None),
            default_country: default_country.into(),
        }
    }

    /// Validate the legal tags and data countries collected across one
    /// ingestion batch. Fails on the first invalid tag or country.
    pub async fn validate(
        &self,
        ctx: &RequestContext,
        legaltags: &BTreeSet<String>,
        countries: &BTreeSet<String>,
    ) -> Result<()> {
        self.validate_tags(ctx, legaltags).await?;
        self.validate_countries(ctx, countries).await
    }

    /// Tags already seen valid short-circuit; the remainder goes to the
    /// legal-tag service in one call and is cached on success.
    async fn validate_tags(&self, ctx: &RequestContext, legaltags: &BTreeSet<String>) -> Result<()> {
        let unverified: BTreeSet<String> = legaltags
            .iter()
            .filter(|tag| self.tag_cache.get(&tag_key(ctx, tag)).is_none())
            .cloned()
            .collect();
        if unverified.is_empty() {
            return Ok(());
        }

        debug!(count = unverified.len(), "validating legal tags");
        let invalid = self.validator.validate(ctx, &unverified).await?;
        if let Some(tag) = invalid.first() {
            return Err(Error::InvalidLegalTag(format!(
                "the legal tag '{}' is invalid: {}",
                tag.name, tag.reason
            )));
        }

        for tag in unverified {
            self.tag_cache.put(tag_key(ctx, &tag), true);
        }
        Ok(())
    }

    /// Every batch is checked with the default domestic country injected,
    /// against the cached whitelist.
    async fn validate_countries(
        &self,
        ctx: &RequestContext,
        countries: &BTreeSet<String>,
    ) -> Result<()> {
        let mut effective = countries.clone();
        effective.insert(self.default_country.clone());

        let whitelist = self.whitelist(ctx).await?;
        for country in &effective {
            if !whitelist.contains_key(country) {
                return Err(Error::InvalidDataCountry(country.clone()));
            }
        }
        Ok(())
    }

    async fn whitelist(&self, ctx: &RequestContext) -> Result<BTreeMap<String, String>> {
        if let Some(cached) = self.countries.read().clone() {
            return Ok(cached);
        }
        let fetched = self.validator.valid_data_countries(ctx).await?;
        *self.countries.write() = Some(fetched.clone());
        Ok(fetched)
    }

    /// Drop the cached country whitelist so the next batch re-fetches it
    pub fn reset_countries(&self) {
        *self.countries.write() = None;
    }

    /// Union-merge the parents' legal tags and data countries into the
    /// child and mark it compliant.
    pub fn inherit_from_parents<'a>(
        child: &mut Legal,
        parents: impl IntoIterator<Item = &'a Legal>,
    ) {
        for parent in parents {
            child.legaltags.extend(parent.legaltags.iter().cloned());
            child
                .other_relevant_data_countries
                .extend(parent.other_relevant_data_countries.iter().cloned());
        }
        child.status = Some(ComplianceStatus::Compliant);
    }
}

fn tag_key(ctx: &RequestContext, tag: &str) -> String {
    format!("{}:{tag}", ctx.partition_id)
}
