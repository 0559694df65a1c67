//! Affiliate attribution from the referral cookie.
//!
//! Attribution is best-effort: a missing, malformed, or expired token, an
//! unknown affiliate, or a store failure simply leaves the order
//! unattributed.

use chrono::{DateTime, TimeZone, Utc};
use common::{DocumentId, TenantId};
use domain::{Affiliate, AffiliateSettings, AffiliateStatus, CommissionRecord, Money, Order};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use store::{DocumentStore, DocumentStoreExt, Filter};

/// Expiry as written by the storefront: epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TokenExpiry {
    Millis(f64),
    Text(String),
}

impl TokenExpiry {
    fn parse_text(text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Ok(millis) = text.parse::<f64>() {
            return TokenExpiry::Millis(millis).instant();
        }
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// The expiry instant, or `None` if it cannot be interpreted.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            TokenExpiry::Millis(millis) if millis.is_finite() => {
                Utc.timestamp_millis_opt(*millis as i64).single()
            }
            TokenExpiry::Millis(_) => None,
            TokenExpiry::Text(text) => Self::parse_text(text),
        }
    }
}

/// Decoded contents of the attribution cookie.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionToken {
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub affiliate_id: Option<String>,
    #[serde(default)]
    pub expiry: Option<TokenExpiry>,
}

impl AttributionToken {
    /// A token needs a promo code, an affiliate id, and an expiry (if any)
    /// in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.promo_code) || !present(&self.affiliate_id) {
            return false;
        }
        match &self.expiry {
            None => true,
            Some(expiry) => expiry.instant().is_some_and(|at| at > now),
        }
    }
}

/// Extracts one cookie's raw value from a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

fn looks_percent_encoded(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

fn parse_pairs(value: &str) -> Option<AttributionToken> {
    let mut token = AttributionToken {
        promo_code: None,
        affiliate_id: None,
        expiry: None,
    };
    let mut recognized = false;
    for (key, value) in url::form_urlencoded::parse(value.as_bytes()) {
        match key.as_ref() {
            "promoCode" | "promo_code" => token.promo_code = Some(value.into_owned()),
            "affiliateId" | "affiliate_id" => token.affiliate_id = Some(value.into_owned()),
            "expiry" => token.expiry = Some(TokenExpiry::Text(value.into_owned())),
            _ => continue,
        }
        recognized = true;
    }
    recognized.then_some(token)
}

/// Decodes a raw cookie value into a token.
///
/// The value is URL-decoded once, and a second time if it still looks
/// percent-encoded. JSON is tried first, then `key=value&...` pairs.
pub fn decode_token(raw: &str) -> Option<AttributionToken> {
    let once = percent_decode_str(raw).decode_utf8().ok()?.into_owned();
    let decoded = if looks_percent_encoded(&once) {
        percent_decode_str(&once).decode_utf8().ok()?.into_owned()
    } else {
        once
    };

    serde_json::from_str::<AttributionToken>(&decoded)
        .ok()
        .or_else(|| parse_pairs(&decoded))
}

/// A resolved affiliate and the commission it earns on one order.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub affiliate: Affiliate,
    pub percentage: f64,
    pub commission: Money,
}

impl Attribution {
    /// Writes the affiliate and, if positive, the commission onto the order.
    pub fn apply_to(&self, order: &mut Order) {
        order.affiliate_code = Some(self.affiliate.promo_code.clone());
        order.affiliate_id = Some(self.affiliate.id);
        if self.commission.is_positive() {
            order.affiliate_commission = Some(self.commission);
        }
    }

    /// The pending commission record to create once the order is persisted.
    pub fn commission_record(&self, order: &Order) -> Option<CommissionRecord> {
        self.commission.is_positive().then(|| {
            CommissionRecord::pending(
                self.affiliate.id,
                order.id,
                self.affiliate.tier,
                order.total,
                self.percentage,
                self.commission,
            )
        })
    }
}

async fn find_affiliate<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    token: &AttributionToken,
) -> store::Result<Option<Affiliate>> {
    if let Some(id) = token.affiliate_id.as_deref().and_then(DocumentId::parse)
        && let Some(affiliate) = store.get::<Affiliate>(tenant, id).await?
        && affiliate.is_active()
    {
        return Ok(Some(affiliate));
    }

    let Some(code) = token.promo_code.as_deref().map(|c| c.trim().to_uppercase()) else {
        return Ok(None);
    };
    let filter = Filter::new()
        .eq("promoCode", code)
        .eq("status", serde_json::to_value(AffiliateStatus::Active)?);
    store.find_one_as(tenant, &filter).await
}

/// Resolves the token to an active affiliate under enabled settings.
#[tracing::instrument(skip(store, token), fields(tenant_id = %tenant))]
pub async fn attribute<S: DocumentStore + ?Sized>(
    store: &S,
    tenant: &TenantId,
    token: &AttributionToken,
    order_total: Money,
    now: DateTime<Utc>,
) -> Option<Attribution> {
    if !token.is_valid_at(now) {
        tracing::debug!("ignoring invalid or expired attribution token");
        return None;
    }

    let affiliate = match find_affiliate(store, tenant, token).await {
        Ok(Some(affiliate)) => affiliate,
        Ok(None) => {
            tracing::debug!(promo_code = ?token.promo_code, "no active affiliate for token");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "affiliate lookup failed");
            return None;
        }
    };

    let settings = match store
        .find_one_as::<AffiliateSettings>(tenant, &Filter::new())
        .await
    {
        Ok(Some(settings)) if settings.enabled => settings,
        Ok(_) => {
            tracing::debug!("affiliate program disabled");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "affiliate settings lookup failed");
            return None;
        }
    };

    let percentage = settings.percentage_for(affiliate.tier);
    let commission = settings.commission_for(affiliate.tier, order_total);
    metrics::counter!("affiliate_attributions_total").increment(1);
    tracing::info!(
        affiliate_id = %affiliate.id,
        tier = affiliate.tier,
        %commission,
        "order attributed to affiliate"
    );

    Some(Attribution {
        affiliate,
        percentage,
        commission,
    })
}
