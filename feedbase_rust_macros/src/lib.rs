mod feed;

use proc_macro::TokenStream;

/// Derive macro for the `Feed` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize, Feed)]
/// struct DemoTable {
///     #[serde(skip)]
///     base: FeedBase,
///     uid: Option<u64>,
///     #[feed(column = "create_time")]
///     created_at: String,
///     #[feed(skip)]
///     cache: String,
/// }
/// ```
///
/// - The `FeedBase` field is the one marked `#[feed(base)]`, or the field
///   named `base`. It must be `#[serde(skip)]`.
/// - Every other serialized field maps to a column of the same name.
///   `#[feed(column = "...")]` picks another column, `#[feed(skip)]` leaves
///   the field unmapped. The column defaults to the Rust field name.
/// - `#[serde(rename = "...")]` and a container `#[serde(rename_all = "...")]`
///   are honored. Fields that are skipped in either direction stay unmapped,
///   `flatten` and container shapes other than a plain map are rejected.
/// - Mapping two fields to one column is a compile error.
#[proc_macro_derive(Feed, attributes(feed))]
pub fn derive_feed(input: TokenStream) -> TokenStream {
    feed::derive_feed(input)
}
