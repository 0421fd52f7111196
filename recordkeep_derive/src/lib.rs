use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, parse_macro_input, spanned::Spanned};

/// Derives `recordkeep::Record` (and `recordkeep::Searchable` when any field
/// carries `#[record(search)]`).
///
/// Struct options: `#[record(kind = "...")]`.
/// Field options: `id`, `required`, `non_negative`, `search`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct RecordOptions {
    kind: Option<String>,
}

#[derive(Default)]
struct RecordFieldOptions {
    id: bool,
    required: bool,
    non_negative: bool,
    search: bool,
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Record does not support generic structs",
        ));
    }

    let options = parse_record_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record requires named fields",
            ));
        }
    };

    let mut explicit_id: Option<Ident> = None;
    let mut implicit_id: Option<Ident> = None;
    let mut required = Vec::<Ident>::new();
    let mut non_negative = Vec::<Ident>::new();
    let mut searchable = Vec::<Ident>::new();

    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let field_options = parse_record_field_options(&field.attrs)?;

        if field_options.id {
            if explicit_id.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "Only one field can be marked #[record(id)]",
                ));
            }
            explicit_id = Some(ident.clone());
        } else if ident == "id" {
            implicit_id = Some(ident.clone());
        }
        if field_options.required {
            required.push(ident.clone());
        }
        if field_options.non_negative {
            non_negative.push(ident.clone());
        }
        if field_options.search {
            searchable.push(ident);
        }
    }

    let id_field = explicit_id.or(implicit_id).ok_or_else(|| {
        syn::Error::new(
            struct_name.span(),
            "Record requires a field named `id` or a field marked #[record(id)]",
        )
    })?;

    let kind = options
        .kind
        .unwrap_or_else(|| to_snake_case(&struct_name.to_string()));
    let required_names = required.iter().map(field_label).collect::<Vec<_>>();
    let non_negative_names = non_negative.iter().map(field_label).collect::<Vec<_>>();

    let record_impl = quote! {
        impl ::recordkeep::Record for #struct_name {
            const KIND: &'static str = #kind;

            fn id(&self) -> &::recordkeep::RecordId {
                &self.#id_field
            }

            #[allow(unused_mut)]
            fn validate(&self) -> ::core::result::Result<(), ::recordkeep::ValidationError> {
                let mut validator =
                    ::recordkeep::Validator::new(<Self as ::recordkeep::Record>::KIND);
                validator.require("id", &self.#id_field);
                #( validator.require(#required_names, &self.#required); )*
                #( validator.non_negative(#non_negative_names, &self.#non_negative); )*
                validator.finish()
            }
        }
    };

    let search_impl = if searchable.is_empty() {
        quote!()
    } else {
        quote! {
            impl ::recordkeep::Searchable for #struct_name {
                fn search_fields(&self) -> ::std::vec::Vec<&str> {
                    let mut fields = ::std::vec::Vec::new();
                    #( ::recordkeep::SearchText::collect_text(&self.#searchable, &mut fields); )*
                    fields
                }
            }
        }
    };

    Ok(quote! {
        #record_impl
        #search_impl
    })
}

fn field_label(ident: &Ident) -> String {
    ident.to_string().trim_start_matches("r#").to_string()
}

fn parse_record_options(attrs: &[syn::Attribute]) -> syn::Result<RecordOptions> {
    let mut options = RecordOptions { kind: None };

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(meta.error("record kind cannot be empty"));
                }
                options.kind = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported record attribute. Supported: kind = \"...\""))
        })?;
    }

    Ok(options)
}

fn parse_record_field_options(attrs: &[syn::Attribute]) -> syn::Result<RecordFieldOptions> {
    let mut parsed = RecordFieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        match &attr.meta {
            syn::Meta::List(list) => {
                list.parse_nested_meta(|meta| {
                    if meta.path.is_ident("id") {
                        parsed.id = true;
                        return Ok(());
                    }

                    if meta.path.is_ident("required") {
                        parsed.required = true;
                        return Ok(());
                    }

                    if meta.path.is_ident("non_negative") {
                        parsed.non_negative = true;
                        return Ok(());
                    }

                    if meta.path.is_ident("search") {
                        parsed.search = true;
                        return Ok(());
                    }

                    Err(meta.error(
                        "Unsupported #[record(...)] field option. Supported: id, required, non_negative, search",
                    ))
                })?;
            }
            _ => {
                return Err(syn::Error::new(
                    attr.span(),
                    "Use #[record(required)], #[record(search)], #[record(non_negative)] or #[record(id)]",
                ));
            }
        }
    }

    Ok(parsed)
}

fn to_snake_case(value: &str) -> String {
    let mut out = String::new();
    for (index, ch) in value.chars().enumerate() {
        if ch.is_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_snake_case;

    #[test]
    fn snake_case_kind_names() {
        assert_eq!(to_snake_case("Part"), "part");
        assert_eq!(to_snake_case("SaleLine"), "sale_line");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }
}
