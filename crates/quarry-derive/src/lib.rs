//! Derive macro for quarry entity models.
//!
//! This crate provides `#[derive(Model)]`, re-exported by `quarry-orm`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, Meta, Type};

/// Derives `quarry_orm::Model` for a struct with named fields.
///
/// # Attributes
///
/// - `#[model(table = "table_name")]` - SQL table name (optional, defaults
///   to snake_case of the struct name)
/// - `#[model(name = "Entity")]` - entity name in the schema (optional,
///   defaults to the struct name)
///
/// # Field Attributes
///
/// - `#[column(primary_key)]` - marks the primary key; without it a field
///   named `id` is used
/// - `#[column(name = "column_name")]` - SQL column name (optional,
///   defaults to the field name)
/// - `#[column(fractional)]` - timestamp column that also gets a text
///   rendering with fractional seconds
///
/// # Generated Items
///
/// For a struct `User` with a field `email`, this macro generates:
///
/// - `impl quarry_orm::Model for User`
/// - `User::find_by_email(repo, value)` returning every matching `User`
/// - `User::fetch_email(repo, key)` reading one column by primary key
///
/// Every field type must implement `Clone`, `ToSqlValue` and
/// `FromSqlValue`.
#[proc_macro_derive(Model, attributes(model, column))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let model_attrs = parse_model_attrs(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut column_infos: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let column_attrs = parse_column_attrs(&field.attrs)?;

        column_infos.push(ColumnInfo {
            field_name: field_name.clone(),
            field_type: field.ty.clone(),
            column_name: column_attrs
                .name
                .unwrap_or_else(|| field_name.unraw().to_string()),
            is_primary_key: column_attrs.primary_key,
            is_fractional: column_attrs.fractional,
        });
    }

    let marked: Vec<&ColumnInfo> = column_infos.iter().filter(|c| c.is_primary_key).collect();
    let primary_key = match marked.as_slice() {
        [one] => one.column_name.clone(),
        [] => column_infos
            .iter()
            .find(|c| c.column_name == "id")
            .map(|c| c.column_name.clone())
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    &input.ident,
                    "Model derive needs a #[column(primary_key)] field or a field named `id`",
                )
            })?,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Model derive supports a single #[column(primary_key)] field",
            ));
        }
    };

    let entity_name = &model_attrs.name;
    let table_name = &model_attrs.table;
    let all_column_names: Vec<&str> = column_infos
        .iter()
        .map(|c| c.column_name.as_str())
        .collect();
    let fractional_columns: Vec<&str> = column_infos
        .iter()
        .filter(|c| c.is_fractional)
        .map(|c| c.column_name.as_str())
        .collect();

    let field_reads: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let field_name = &info.field_name;
            let column_name = &info.column_name;
            quote! {
                #field_name: ::quarry_orm::field(record, #column_name)?
            }
        })
        .collect();

    let field_writes: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let field_name = &info.field_name;
            let column_name = &info.column_name;
            quote! {
                .with(#column_name, ::std::clone::Clone::clone(&self.#field_name))
            }
        })
        .collect();

    let getters: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let column_name = &info.column_name;
            let field_type = &info.field_type;
            let find_by = format_ident!("find_by_{}", info.field_name.unraw());
            let fetch = format_ident!("fetch_{}", info.field_name.unraw());
            let find_doc = format!("Returns every record whose `{column_name}` equals `value`.");
            let fetch_doc = format!("Reads `{column_name}` of the record with primary key `key`.");

            quote! {
                #[doc = #find_doc]
                pub fn #find_by<C: ::quarry_orm::Connection>(
                    repo: &mut ::quarry_orm::Repository<'_, C>,
                    value: impl ::quarry_orm::ToSqlValue,
                ) -> ::quarry_orm::Result<::std::vec::Vec<Self>> {
                    repo.find_by(#column_name, value, ::quarry_orm::FilterSpec::new())?
                        .iter()
                        .map(<Self as ::quarry_orm::Model>::from_record)
                        .collect()
                }

                #[doc = #fetch_doc]
                pub fn #fetch<C: ::quarry_orm::Connection>(
                    repo: &mut ::quarry_orm::Repository<'_, C>,
                    key: impl ::quarry_orm::ToSqlValue,
                ) -> ::quarry_orm::Result<::std::option::Option<#field_type>> {
                    match repo.fetch_field(key, #column_name)? {
                        ::std::option::Option::None => ::std::result::Result::Ok(::std::option::Option::None),
                        ::std::option::Option::Some(value) => {
                            <#field_type as ::quarry_orm::FromSqlValue>::from_sql_value(&value)
                                .map(::std::option::Option::Some)
                                .ok_or_else(|| ::quarry_orm::OrmError::Record(::std::format!(
                                    "column `{}` holds {}", #column_name, value.type_name()
                                )))
                        }
                    }
                }
            }
        })
        .collect();

    let expanded = quote! {
        impl ::quarry_orm::Model for #struct_name {
            fn entity() -> ::quarry_orm::Entity {
                ::quarry_orm::Entity::new(#entity_name, #table_name, #primary_key)
                    .with_columns([#(#all_column_names),*])
                    #(.with_fractional(#fractional_columns))*
            }

            fn from_record(record: &::quarry_orm::Record) -> ::quarry_orm::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#field_reads),*
                })
            }

            fn to_record(&self) -> ::quarry_orm::Record {
                ::quarry_orm::Record::new()
                    #(#field_writes)*
            }
        }

        impl #struct_name {
            #(#getters)*
        }
    };

    Ok(expanded)
}

struct ColumnInfo {
    field_name: Ident,
    field_type: Type,
    column_name: String,
    is_primary_key: bool,
    is_fractional: bool,
}

struct ModelAttrs {
    name: String,
    table: String,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    fractional: bool,
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Option<String>> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = value {
        if let Lit::Str(s) = lit.lit {
            return Ok(Some(s.value()));
        }
    }
    Ok(None)
}

fn parse_model_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<ModelAttrs> {
    let mut name = None;
    let mut table = None;

    for attr in attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table = string_value(&meta)?;
                } else if meta.path.is_ident("name") {
                    name = string_value(&meta)?;
                } else {
                    return Err(meta.error("unsupported model attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(ModelAttrs {
        name: name.unwrap_or_else(|| struct_name.to_string()),
        // Default to snake_case of struct name
        table: table.unwrap_or_else(|| to_snake_case(&struct_name.to_string())),
    })
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("column") {
            // Handle empty attribute like #[column]
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("fractional") {
                    result.fractional = true;
                } else if meta.path.is_ident("name") {
                    result.name = string_value(&meta)?;
                } else {
                    return Err(meta.error("unsupported column attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
