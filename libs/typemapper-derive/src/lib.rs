use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    Data, DeriveInput, Field, Fields, GenericArgument, Ident, LitStr, PathArguments, Type,
    parse_macro_input,
};

/// Derive macro for mapped-field metadata.
///
/// Generates `impl typemapper::Mapped`, describing the struct's tagged
/// fields, its accessor methods and its ancestor.
///
/// Field attributes:
///
/// - `#[db_field(name = "...")]`: mapped field, known externally by `name`.
/// - `#[embed]`: holds a nested mapped object whose fields are flattened into
///   this type's descriptor list. The type must implement `Mapped + Default`;
///   wrap it in `Option` to have it built on first write.
/// - `#[parent]`: ancestor struct held by value; its fields follow this
///   type's own. At most one per struct.
/// - `#[accessor(set, get)]`: route writes through `set_<field>(&mut self, T)`
///   and reads through `<field>_mut(&mut self) -> Option<&mut T>`. Either
///   method can be renamed: `#[accessor(set = "assign_city")]`.
///
/// A field of type `Option<T>` has declared type `T`: the converter for `T`
/// applies and a direct write stores `Some(value)`.
///
/// # Example
///
/// ```ignore
/// #[derive(Mapped, Default)]
/// pub struct Customer {
///     #[parent]
///     record: Record,
///
///     #[db_field(name = "customer_name")]
///     #[accessor(set)]
///     name: String,
///
///     #[embed]
///     address: Option<Address>,
/// }
/// ```
#[proc_macro_derive(Mapped, attributes(db_field, embed, parent, accessor))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Attributes collected from one field.
#[derive(Default)]
struct FieldAttrs {
    external_name: Option<LitStr>,
    embed: bool,
    parent: bool,
    setter: Option<Ident>,
    getter: Option<Ident>,
}

impl FieldAttrs {
    fn is_tagged(&self) -> bool {
        self.external_name.is_some() || self.embed
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Mapped does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Mapped only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Mapped only supports structs",
            ));
        }
    };

    let mut field_tokens = Vec::new();
    let mut method_tokens = Vec::new();
    let mut parent_tokens: Option<TokenStream2> = None;

    for field in fields {
        let field_ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let attrs = parse_field_attrs(field)?;

        if attrs.parent {
            if attrs.is_tagged() || attrs.setter.is_some() || attrs.getter.is_some() {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    "#[parent] cannot be combined with other mapping attributes",
                ));
            }
            if parent_tokens.is_some() {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    "only one #[parent] field is allowed",
                ));
            }
            let parent_ty = &field.ty;
            parent_tokens = Some(quote! {
                .parent::<Self, #parent_ty, _>(|o: &mut Self| &mut o.#field_ident)
            });
            continue;
        }

        if !attrs.is_tagged() {
            if attrs.setter.is_some() || attrs.getter.is_some() {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    "#[accessor] needs #[db_field] or #[embed] on the same field",
                ));
            }
            continue;
        }

        let field_name = field_ident.unraw().to_string();
        let (value_ty, optional) = match option_inner(&field.ty) {
            Some(inner) => (inner, true),
            None => (&field.ty, false),
        };

        let (read, write) = if optional {
            (
                quote! { |o: &mut Self| o.#field_ident.as_mut() },
                quote! { |o: &mut Self, v: #value_ty| o.#field_ident = ::core::option::Option::Some(v) },
            )
        } else {
            (
                quote! { |o: &mut Self| ::core::option::Option::Some(&mut o.#field_ident) },
                quote! { |o: &mut Self, v: #value_ty| o.#field_ident = v },
            )
        };

        let mapped = attrs.external_name.as_ref().map(|ext| {
            quote! { .mapped(#ext) }
        });
        let embed = attrs.embed.then(|| quote! { .embed() });

        field_tokens.push(quote! {
            ::typemapper::meta::FieldDecl::new::<Self, #value_ty, _, _>(#field_name, #read, #write)
                #mapped
                #embed
        });

        if let Some(setter) = &attrs.setter {
            method_tokens.push(quote! {
                ::typemapper::meta::Method::setter::<Self, #value_ty, _>(
                    #field_name,
                    |o: &mut Self, v: #value_ty| o.#setter(v),
                )
            });
        }
        if let Some(getter) = &attrs.getter {
            method_tokens.push(quote! {
                ::typemapper::meta::Method::getter::<Self, #value_ty, _>(
                    #field_name,
                    |o: &mut Self| o.#getter(),
                )
            });
        }
    }

    let expanded = quote! {
        impl ::typemapper::meta::Mapped for #name {
            fn class_info() -> ::typemapper::meta::ClassInfo {
                ::typemapper::meta::ClassInfo::new::<Self>()
                    #(.field(#field_tokens))*
                    #(.method(#method_tokens))*
                    #parent_tokens
            }
        }
    };

    Ok(expanded)
}

fn parse_field_attrs(field: &Field) -> Result<FieldAttrs, syn::Error> {
    let mut attrs = FieldAttrs::default();
    let field_ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
    let base = field_ident.unraw();

    for attr in &field.attrs {
        if attr.path().is_ident("db_field") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    attrs.external_name = Some(value);
                    Ok(())
                } else {
                    Err(meta.error("unknown db_field option (expected `name`)"))
                }
            })?;
            if attrs.external_name.is_none() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "missing #[db_field(name = \"...\")]",
                ));
            }
        } else if attr.path().is_ident("embed") {
            attr.meta.require_path_only()?;
            attrs.embed = true;
        } else if attr.path().is_ident("parent") {
            attr.meta.require_path_only()?;
            attrs.parent = true;
        } else if attr.path().is_ident("accessor") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("set") {
                    attrs.setter = Some(if meta.input.peek(syn::Token![=]) {
                        meta.value()?.parse::<LitStr>()?.parse()?
                    } else {
                        format_ident!("set_{}", base)
                    });
                    Ok(())
                } else if meta.path.is_ident("get") {
                    attrs.getter = Some(if meta.input.peek(syn::Token![=]) {
                        meta.value()?.parse::<LitStr>()?.parse()?
                    } else {
                        format_ident!("{}_mut", base)
                    });
                    Ok(())
                } else {
                    Err(meta.error("unknown accessor option (expected `set` or `get`)"))
                }
            })?;
        }
    }

    Ok(attrs)
}

/// `T` when `ty` is `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}
