//! Shopify Admin GraphQL client.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use preorder_kernel::settings::{GatewaySettings, ShopifySettings};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{error_body, http_client, CatalogGateway, GatewayError};
use crate::domain::{
    dates::format_date, Money, PlatformTitle, SalesPeriod, SalesRecord, TitleId,
};

const SERVICE: &str = "shopify";
const PUB_DATE_KEY: &str = "pub_date";

const PRODUCTS_QUERY: &str = r#"
query($handle: String!, $first: Int!, $after: String) {
  collectionByHandle(handle: $handle) {
    products(first: $first, after: $after) {
      edges {
        node {
          id
          title
          variants(first: 1) { edges { node { barcode } } }
          metafields(first: 10, namespace: "custom") { edges { node { key value } } }
          collections(first: 5) { edges { node { title } } }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const ORDERS_QUERY: &str = r#"
query($first: Int!, $query: String!, $after: String) {
  orders(first: $first, query: $query, after: $after) {
    edges {
      node {
        id
        createdAt
        cancelledAt
        lineItems(first: 50) {
          edges {
            node {
              quantity
              originalUnitPriceSet { shopMoney { amount } }
              variant { barcode }
            }
          }
        }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

/// Reads preorder titles and their sales from a Shopify store.
pub struct ShopifyCatalog {
    client: reqwest::Client,
    graphql_url: String,
    access_token: String,
    collection: String,
    page_size: u32,
    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl ShopifyCatalog {
    pub fn new(shopify: &ShopifySettings, gateway: &GatewaySettings) -> Result<Self, GatewayError> {
        let (Some(shop_url), Some(access_token)) = (&shopify.shop_url, &shopify.access_token) else {
            return Err(GatewayError::NotConfigured {
                service: SERVICE,
                missing: "shopify.shop_url and shopify.access_token",
            });
        };

        let graphql_url = format!(
            "{}/admin/api/{}/graphql.json",
            normalize_shop_url(shop_url),
            shopify.api_version
        );
        tracing::info!(url = %graphql_url, collection = %shopify.collection, "shopify catalog configured");

        Ok(Self {
            client: http_client(SERVICE, gateway.timeout())?,
            graphql_url,
            access_token: access_token.clone(),
            collection: shopify.collection.clone(),
            page_size: shopify.page_size.clamp(1, 250),
            max_retries: gateway.max_retries.max(1),
            retry_delay: gateway.retry_delay(),
            timeout: gateway.timeout(),
        })
    }

    /// Run one GraphQL query, retrying transport failures, non-200 answers
    /// and `errors` payloads with a fixed delay.
    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, GatewayError> {
        let payload = json!({ "query": query, "variables": variables });
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.attempt(&payload).await {
                Ok(data) => {
                    return serde_json::from_value(data).map_err(|err| GatewayError::Decode {
                        service: SERVICE,
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(attempt, max_retries = self.max_retries, error = %err, "shopify query failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::Unavailable {
            service: SERVICE,
            message: "no attempts made".to_string(),
        }))
    }

    async fn attempt(&self, payload: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(&self.graphql_url)
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(SERVICE, self.timeout, err))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GatewayError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let envelope: GraphqlResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(SERVICE, self.timeout, err))?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_null()) {
            return Err(GatewayError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body: errors.to_string(),
            });
        }

        envelope.data.ok_or_else(|| GatewayError::Decode {
            service: SERVICE,
            message: "response carried neither data nor errors".to_string(),
        })
    }
}

#[async_trait]
impl CatalogGateway for ShopifyCatalog {
    async fn fetch_titles(&self) -> Result<Vec<PlatformTitle>, GatewayError> {
        let mut titles = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let data: CollectionData = self
                .query(
                    PRODUCTS_QUERY,
                    json!({ "handle": self.collection, "first": self.page_size, "after": after }),
                )
                .await?;

            let Some(collection) = data.collection_by_handle else {
                tracing::warn!(collection = %self.collection, "shopify collection not found");
                break;
            };

            for edge in collection.products.edges {
                match edge.node.into_platform_title() {
                    Some(title) => titles.push(title),
                    None => tracing::debug!("product without barcode skipped"),
                }
            }

            match next_cursor(&collection.products.page_info) {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        tracing::info!(count = titles.len(), collection = %self.collection, "shopify titles fetched");
        Ok(titles)
    }

    async fn fetch_sales(
        &self,
        title_ids: &[TitleId],
        period: SalesPeriod,
    ) -> Result<Vec<SalesRecord>, GatewayError> {
        let wanted: HashSet<&str> = title_ids.iter().map(TitleId::as_str).collect();
        let search = format!(
            "created_at:>={} AND created_at:<={}",
            format_date(period.start),
            format_date(period.end)
        );

        let mut totals: BTreeMap<String, (u64, Money)> = BTreeMap::new();
        let mut after: Option<String> = None;

        loop {
            let data: OrdersData = self
                .query(
                    ORDERS_QUERY,
                    json!({ "first": self.page_size, "query": search, "after": after }),
                )
                .await?;

            for edge in data.orders.edges {
                let order = edge.node;
                if order.cancelled_at.is_some() {
                    continue;
                }
                if let Some(created) = order.created_date() {
                    if !period.contains(created) {
                        continue;
                    }
                }

                for item in order.line_items.edges {
                    let line = item.node;
                    let Some(barcode) = line.barcode() else {
                        continue;
                    };
                    if !wanted.contains(barcode) {
                        continue;
                    }

                    let unit_price = line.unit_price(&order.id);
                    let entry = totals.entry(barcode.to_string()).or_default();
                    entry.0 += line.quantity;
                    entry.1 += unit_price * line.quantity;
                }
            }

            match next_cursor(&data.orders.page_info) {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        let records: Vec<SalesRecord> = totals
            .into_iter()
            .map(|(id, (quantity, revenue))| SalesRecord {
                title_id: TitleId::new(id),
                period,
                quantity,
                revenue,
            })
            .collect();
        tracing::info!(titles = records.len(), start = %period.start, end = %period.end, "shopify sales fetched");
        Ok(records)
    }
}

/// `example.myshopify.com/` -> `https://example.myshopify.com`
fn normalize_shop_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn next_cursor(page: &PageInfo) -> Option<String> {
    if page.has_next_page {
        page.end_cursor.clone()
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
    #[serde(default, rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionData {
    collection_by_handle: Option<CollectionNode>,
}

#[derive(Debug, Deserialize)]
struct CollectionNode {
    products: Connection<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    title: String,
    variants: Connection<VariantNode>,
    metafields: Connection<MetafieldNode>,
    collections: Connection<NamedNode>,
}

impl ProductNode {
    fn into_platform_title(self) -> Option<PlatformTitle> {
        let barcode = self
            .variants
            .edges
            .into_iter()
            .find_map(|edge| edge.node.barcode)
            .map(|barcode| barcode.trim().to_string())
            .filter(|barcode| !barcode.is_empty())?;

        let pub_date = self
            .metafields
            .edges
            .into_iter()
            .find(|edge| edge.node.key == PUB_DATE_KEY)
            .and_then(|edge| edge.node.value);

        Some(PlatformTitle {
            id: TitleId::new(barcode),
            title: self.title,
            pub_date,
            collections: self
                .collections
                .edges
                .into_iter()
                .map(|edge| edge.node.title)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct VariantNode {
    barcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetafieldNode {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    title: String,
}

#[derive(Debug, Deserialize)]
struct OrdersData {
    orders: Connection<OrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderNode {
    id: String,
    created_at: Option<String>,
    cancelled_at: Option<String>,
    line_items: Connection<LineItemNode>,
}

impl OrderNode {
    fn created_date(&self) -> Option<time::Date> {
        let raw = self.created_at.as_deref()?;
        OffsetDateTime::parse(raw, &Rfc3339)
            .ok()
            .map(|at| at.date())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemNode {
    quantity: u64,
    original_unit_price_set: Option<PriceSet>,
    variant: Option<VariantNode>,
}

impl LineItemNode {
    fn barcode(&self) -> Option<&str> {
        self.variant
            .as_ref()
            .and_then(|variant| variant.barcode.as_deref())
            .map(str::trim)
            .filter(|barcode| !barcode.is_empty())
    }

    fn unit_price(&self, order_id: &str) -> Money {
        let Some(amount) = self
            .original_unit_price_set
            .as_ref()
            .map(|set| set.shop_money.amount.as_str())
        else {
            return Money::ZERO;
        };

        amount.parse().unwrap_or_else(|err| {
            tracing::warn!(order_id, %err, "unreadable line item price counted as zero");
            Money::ZERO
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceSet {
    shop_money: MoneyNode,
}

#[derive(Debug, Deserialize)]
struct MoneyNode {
    amount: String,
}
