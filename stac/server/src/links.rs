//! Hypermedia links generated for collections and items.

use url::Url;

use crate::stac::{Link, MEDIA_TYPE_GEOJSON, MEDIA_TYPE_JSON};

/// Relations the API derives itself; stored links with these relations are dropped.
pub const INFERRED_LINK_RELS: [&str; 6] = ["self", "item", "items", "parent", "collection", "root"];

/// Appends path segments to `base_url`, percent-encoding each one so that IDs
/// containing `/`, `?` or `#` stay a single segment.
pub fn join_path(base_url: &str, segments: &[&str]) -> String {
    let Ok(mut url) = Url::parse(base_url) else {
        return format!("{}{}", base_url, segments.join("/"));
    };
    match url.path_segments_mut() {
        Ok(mut path) => {
            path.pop_if_empty().extend(segments);
        }
        Err(()) => return format!("{}{}", base_url, segments.join("/")),
    }
    url.to_string()
}

/// Links for a collection document. `base_url` ends with a slash.
#[derive(Debug, Clone)]
pub struct CollectionLinks<'a> {
    pub collection_id: &'a str,
    pub base_url: &'a str,
}

impl CollectionLinks<'_> {
    pub fn create_links(&self) -> Vec<Link> {
        let collection_url = join_path(self.base_url, &["collections", self.collection_id]);
        let items_url = join_path(
            self.base_url,
            &["collections", self.collection_id, "items"],
        );
        vec![
            Link::new("self", collection_url).with_type(MEDIA_TYPE_JSON),
            Link::new("parent", self.base_url).with_type(MEDIA_TYPE_JSON),
            Link::new("items", items_url).with_type(MEDIA_TYPE_GEOJSON),
            Link::new("root", self.base_url).with_type(MEDIA_TYPE_JSON),
        ]
    }
}

/// Links for an item document. `base_url` ends with a slash.
#[derive(Debug, Clone)]
pub struct ItemLinks<'a> {
    pub collection_id: &'a str,
    pub item_id: &'a str,
    pub base_url: &'a str,
}

impl ItemLinks<'_> {
    pub fn create_links(&self) -> Vec<Link> {
        let collection_url = join_path(self.base_url, &["collections", self.collection_id]);
        let item_url = join_path(
            self.base_url,
            &["collections", self.collection_id, "items", self.item_id],
        );
        vec![
            Link::new("self", item_url).with_type(MEDIA_TYPE_GEOJSON),
            Link::new("parent", collection_url.clone()).with_type(MEDIA_TYPE_JSON),
            Link::new("collection", collection_url).with_type(MEDIA_TYPE_JSON),
            Link::new("root", self.base_url).with_type(MEDIA_TYPE_JSON),
        ]
    }
}

/// Drops inferred relations from stored links and makes relative hrefs absolute.
pub fn resolve_links(links: Vec<Link>, base_url: &str) -> Vec<Link> {
    let base = Url::parse(base_url).ok();
    links
        .into_iter()
        .filter(|link| !INFERRED_LINK_RELS.contains(&link.rel.as_str()))
        .map(|mut link| {
            if let Some(resolved) = base.as_ref().and_then(|b| b.join(&link.href).ok()) {
                link.href = resolved.to_string();
            }
            link
        })
        .collect()
}
