//! Wire types for catalog product listings.

use serde::{Deserialize, Serialize};

/// One product exactly as the catalog sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteProduct(serde_json::Value);

impl RemoteProduct {
    #[must_use]
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }

    /// The catalog id rendered as a string, if one is present at all.
    ///
    /// Used for log context on records that fail to decode.
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        match self.0.get("id")? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Decode into the typed listing shape.
    pub fn decode(&self) -> Result<ProductListing, serde_json::Error> {
        ProductListing::deserialize(&self.0)
    }
}

/// A decoded product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl ProductListing {
    /// The variant that carries price, quantity and SKU for the product.
    ///
    /// Listings without variants get a zero-valued placeholder.
    #[must_use]
    pub fn primary_variant(&self) -> Variant {
        self.variants
            .first()
            .cloned()
            .unwrap_or_else(Variant::placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    /// Decimal string, e.g. `"19.99"`.
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub weight_unit: Option<String>,
    #[serde(default)]
    pub inventory_quantity: i64,
}

impl Variant {
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            id: 0,
            title: Some("Default".into()),
            sku: None,
            price: Some("0".into()),
            weight: Some(0.0),
            weight_unit: Some("kg".into()),
            inventory_quantity: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    #[serde(default)]
    pub position: u32,
}

/// Body of `GET /products.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductPage {
    #[serde(default)]
    pub products: Vec<RemoteProduct>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn decodes_full_listing() {
        let raw = RemoteProduct::new(json!({
            "id": 632910392,
            "title": "IPod Nano - 8GB",
            "body_html": "<p>It's the small iPod.</p>",
            "vendor": "Apple",
            "product_type": "Cult Products",
            "tags": "Emotive, Flash Memory",
            "variants": [
                { "id": 808950810, "sku": "IPOD2008PINK", "price": "199.00",
                  "weight": 0.2, "weight_unit": "kg", "inventory_quantity": 10 }
            ],
            "images": [ { "src": "https://cdn.example.com/ipod.png", "position": 1 } ]
        }));
        let listing = raw.decode().unwrap();
        assert_eq!(listing.id, 632910392);
        assert_eq!(listing.primary_variant().sku.as_deref(), Some("IPOD2008PINK"));
        assert_eq!(listing.images[0].src, "https://cdn.example.com/ipod.png");
        assert_eq!(raw.external_id().as_deref(), Some("632910392"));
    }

    #[test]
    fn missing_variants_use_placeholder() {
        let listing = RemoteProduct::new(json!({ "id": 1, "title": "Bare" }))
            .decode()
            .unwrap();
        let v = listing.primary_variant();
        assert_eq!(v.inventory_quantity, 0);
        assert_eq!(v.price.as_deref(), Some("0"));
    }

    #[test]
    fn wrong_id_type_fails_decode_but_keeps_context() {
        let raw = RemoteProduct::new(json!({ "id": "abc", "title": "Bad" }));
        assert!(raw.decode().is_err());
        assert_eq!(raw.external_id().as_deref(), Some("abc"));
    }

    #[test]
    fn page_keeps_malformed_elements() {
        let page: ProductPage =
            serde_json::from_str(r#"{"products":[{"id":1,"title":"ok"},{"nope":true},42]}"#)
                .unwrap();
        assert_eq!(page.products.len(), 3);
    }
}
