use std::collections::HashMap;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, Token};

pub fn derive_feed(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct FieldAttrs {
    base: bool,
    skip: bool,
    column: Option<LitStr>,
    serde_skip: bool,
    serde_rename: Option<String>,
}

/// serde's `rename_all` rules, applied to snake_case field names.
#[derive(Clone, Copy)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("Feed derive: unknown rename_all rule `{}`", other),
                ))
            }
        })
    }

    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => pascal_case(field),
            RenameRule::Camel => {
                let pascal = pascal_case(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

fn pascal_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Feed cannot be derived for generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Feed can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Feed can only be derived for structs",
            ))
        }
    };
    let rename_all = parse_container_attrs(&input.attrs)?;

    let mut parsed = Vec::new();
    for field in fields {
        if let Some(ident) = &field.ident {
            parsed.push((ident, parse_field_attrs(field)?));
        }
    }

    // Base: the field marked #[feed(base)], else the field named `base`.
    let marked: Vec<_> = parsed.iter().filter(|(_, attrs)| attrs.base).collect();
    let base = match marked.as_slice() {
        [(ident, attrs)] => (*ident, attrs),
        [] => match parsed.iter().find(|(ident, _)| *ident == "base") {
            Some((ident, attrs)) => (*ident, attrs),
            None => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Feed derive: no field marked #[feed(base)] and no field named `base`",
                ))
            }
        },
        [_, (ident, _), ..] => {
            return Err(syn::Error::new_spanned(
                ident,
                "Feed derive: only one field may be #[feed(base)]",
            ))
        }
    };
    let (base_ident, base_attrs) = base;
    if !base_attrs.serde_skip {
        return Err(syn::Error::new_spanned(
            base_ident,
            "Feed derive: the base field must be #[serde(skip)]",
        ));
    }

    let mut mapped: Vec<&Ident> = Vec::new();
    let mut properties = Vec::new();
    let mut columns = Vec::new();
    let mut seen: HashMap<String, Span> = HashMap::new();
    for (ident, attrs) in &parsed {
        if *ident == base_ident || attrs.skip || attrs.serde_skip {
            continue;
        }
        let field_name = ident.unraw().to_string();
        let property = match (&attrs.serde_rename, rename_all) {
            (Some(renamed), _) => renamed.clone(),
            (None, Some(rule)) => rule.apply(&field_name),
            (None, None) => field_name.clone(),
        };
        let (column, span) = match &attrs.column {
            Some(lit) => (lit.value(), lit.span()),
            None => (field_name, ident.span()),
        };
        if seen.insert(column.clone(), span).is_some() {
            return Err(syn::Error::new(
                span,
                format!("Feed derive: column `{}` is mapped twice", column),
            ));
        }
        mapped.push(*ident);
        properties.push(property);
        columns.push(column);
    }
    if properties.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Feed derive: no mapped fields",
        ));
    }

    let name_str = name.to_string();
    Ok(quote! {
        impl ::feedbase_rust::Feed for #name {
            fn property_mapper() -> &'static ::feedbase_rust::PropertyMapper {
                static MAPPER: ::std::sync::OnceLock<::feedbase_rust::PropertyMapper> =
                    ::std::sync::OnceLock::new();
                MAPPER.get_or_init(|| {
                    ::feedbase_rust::PropertyMapper::new([#((#properties, #columns)),*])
                })
            }

            fn base(&self) -> &::feedbase_rust::FeedBase {
                &self.#base_ident
            }

            fn base_mut(&mut self) -> &mut ::feedbase_rust::FeedBase {
                &mut self.#base_ident
            }

            fn take_mapped(&mut self, decoded: &mut Self) {
                #(::std::mem::swap(&mut self.#mapped, &mut decoded.#mapped);)*
            }

            fn model_name() -> &'static str {
                #name_str
            }
        }
    })
}

/// Container-level serde attributes. Only `rename_all` is supported among
/// the ones that reshape the serialized key set.
fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if !meta.input.peek(Token![=]) {
                    return Err(meta.error(
                        "Feed derive: rename_all must apply to both directions, use `rename_all = \"...\"`",
                    ));
                }
                let lit: LitStr = meta.value()?.parse()?;
                rule = Some(RenameRule::parse(&lit)?);
                return Ok(());
            }
            for shape in ["transparent", "into", "from", "try_from", "tag", "untagged"] {
                if meta.path.is_ident(shape) {
                    return Err(meta.error(format!(
                        "Feed derive: #[serde({})] is not supported, the model must serialize as a plain map",
                        shape
                    )));
                }
            }
            skip_meta_value(&meta)
        })?;
    }
    Ok(rule)
}

fn parse_field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if attr.path().is_ident("feed") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("base") {
                    attrs.base = true;
                } else if meta.path.is_ident("skip") {
                    attrs.skip = true;
                } else if meta.path.is_ident("column") {
                    attrs.column = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("expected `base`, `skip` or `column = \"...\"`"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                // A field that cannot be read back is never mapped.
                if meta.path.is_ident("skip")
                    || meta.path.is_ident("skip_serializing")
                    || meta.path.is_ident("skip_deserializing")
                {
                    attrs.serde_skip = true;
                } else if meta.path.is_ident("flatten") {
                    return Err(meta.error("Feed derive: #[serde(flatten)] fields cannot be mapped"));
                } else if meta.path.is_ident("rename") {
                    attrs.serde_rename = Some(parse_rename(&meta)?);
                    return Ok(());
                }
                skip_meta_value(&meta)
            })?;
        }
    }
    Ok(attrs)
}

/// `rename = "x"`, or `rename(serialize = "x", deserialize = "x")` with
/// both sides equal.
fn parse_rename(meta: &ParseNestedMeta) -> syn::Result<String> {
    if meta.input.peek(Token![=]) {
        let value: LitStr = meta.value()?.parse()?;
        return Ok(value.value());
    }
    let mut serialize = None;
    let mut deserialize = None;
    meta.parse_nested_meta(|inner| {
        let value: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("serialize") {
            serialize = Some(value.value());
        } else if inner.path.is_ident("deserialize") {
            deserialize = Some(value.value());
        } else {
            return Err(inner.error("expected `serialize` or `deserialize`"));
        }
        Ok(())
    })?;
    match (serialize, deserialize) {
        (Some(ser), Some(de)) if ser == de => Ok(ser),
        _ => Err(meta.error(
            "Feed derive: a mapped field must serialize and deserialize under the same name",
        )),
    }
}

fn skip_meta_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta_value(&inner))?;
    }
    Ok(())
}
