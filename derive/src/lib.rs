extern crate proc_macro;

use crc::{Crc, CRC_64_ECMA_182};
use itertools::izip;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, Lit, Type};

/// CRC-64 hasher for layout hashes
const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Field attributes parsed from `#[netser(...)]` annotations
///
/// * `extends` - The field embeds the ancestor value type
/// * `immutable` - Constructor-only field, installed directly by the decoder
/// * `constant` - Compile-time literal; never on the wire, restored by bare allocation
/// * `skip` - Excluded from serialization, restored to `Default::default()`
/// * `rename` - Logical field name for the descriptor and the layout hash
#[derive(Clone, Default)]
struct FieldAttributes {
    extends: bool,
    immutable: bool,
    constant: Option<Lit>,
    skip: bool,
    rename: Option<String>,
}

impl FieldAttributes {
    fn mutability(&self) -> &'static str {
        if self.constant.is_some() {
            "Constant"
        } else if self.immutable {
            "Immutable"
        } else {
            "Mutable"
        }
    }
}

/// Extract and parse `#[netser(...)]` attribute values from field attributes
///
/// Multiple attributes can be combined: `#[netser(immutable, rename = "count")]`.
/// Conflicting combinations are reported at the offending field.
fn get_field_attributes(attrs: &[Attribute], field: &Ident) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("netser") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;

                if ident == "extends" {
                    parsed.extends = true;
                } else if ident == "immutable" {
                    parsed.immutable = true;
                } else if ident == "constant" {
                    input.parse::<syn::Token![=]>()?;
                    parsed.constant = Some(input.parse::<Lit>()?);
                } else if ident == "skip" {
                    parsed.skip = true;
                } else if ident == "rename" {
                    input.parse::<syn::Token![=]>()?;
                    parsed.rename = Some(input.parse::<syn::LitStr>()?.value());
                } else {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("Unknown attribute: {}", ident),
                    ));
                }

                // Consume comma if present, otherwise end
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }

    let exclusive = [
        parsed.extends,
        parsed.constant.is_some(),
        parsed.skip,
    ]
    .iter()
    .filter(|flag| **flag)
    .count();
    if exclusive > 1 || (parsed.immutable && (parsed.extends || parsed.skip)) {
        return Err(syn::Error::new(
            field.span(),
            format!(
                "Field '{}' combines netser attributes that exclude each other",
                field
            ),
        ));
    }

    Ok(parsed)
}

/// Layout hash over the type name and the (name, type, mutability) of each serialized field.
fn layout_hash(type_name: &str, names: &[String], types: &[String], mutability: &[&str]) -> u64 {
    let mut digest = CRC64.digest();
    digest.update(type_name.as_bytes());
    for (name, ty, m) in izip!(names, types, mutability) {
        digest.update(b"\0");
        digest.update(name.as_bytes());
        digest.update(b":");
        digest.update(ty.as_bytes());
        digest.update(b":");
        digest.update(m.as_bytes());
    }
    digest.finalize()
}

/// Derive macro registering a struct as a netser value type
///
/// Generates `Object`, `Serializable`, `Encoder` and `Decoder` implementations. The struct
/// must have named fields, no generic parameters, and implement `Debug` and `PartialEq`.
/// Every serialized field type must implement `Encoder`, `Decoder` and `Default`.
///
/// # Supported Attributes
///
/// * `#[netser(extends)]` - Embed the ancestor value type; its fields are written first
/// * `#[netser(immutable)]` - Constructor-only field
/// * `#[netser(constant = "abc")]` - Compile-time constant, not on the wire
/// * `#[netser(skip)]` - Not serialized
/// * `#[netser(rename = "name")]` - Logical field name
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Serializable, Debug, PartialEq)]
/// struct Sub {
///     #[netser(extends)]
///     base: Base,
///     #[netser(immutable)]
///     some_long: i64,
/// }
/// ```
#[proc_macro_derive(Serializable, attributes(netser))]
pub fn derive_serializable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Serializable cannot be derived for generic types",
        ));
    }
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Serializable requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Serializable can only be derived for structs",
            ))
        }
    };

    let mut parent: Option<(&Ident, &Type)> = None;
    let mut accessors = Vec::new();
    let mut descriptors = Vec::new();
    let mut bare_inits = Vec::new();
    let mut hash_names = Vec::new();
    let mut hash_types = Vec::new();
    let mut hash_mutability = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else {
            continue;
        };
        let ty = &f.ty;
        let attrs = get_field_attributes(&f.attrs, ident)?;

        if attrs.extends {
            if parent.is_some() {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Only one field can be marked #[netser(extends)]",
                ));
            }
            parent = Some((ident, ty));
            bare_inits.push(quote! {
                #ident: <#ty as ::netser::Serializable>::bare()
            });
            continue;
        }

        if attrs.skip {
            bare_inits.push(quote! {
                #ident: ::core::default::Default::default()
            });
            continue;
        }

        let logical = attrs.rename.clone().unwrap_or_else(|| ident.to_string());
        let mutability = attrs.mutability();
        let mutability_ident = format_ident!("{}", mutability);

        let access = match &attrs.constant {
            Some(lit) => {
                match lit {
                    Lit::Str(_) => bare_inits.push(quote! {
                        #ident: ::core::convert::From::from(#lit)
                    }),
                    _ => bare_inits.push(quote! { #ident: #lit }),
                }
                quote! { ::core::option::Option::None }
            }
            None => {
                let write_fn = format_ident!("__netser_write_{}", ident);
                let read_fn = format_ident!("__netser_read_{}", ident);
                accessors.push(quote! {
                    fn #write_fn(
                        obj: &dyn ::netser::Object,
                        ctx: &mut ::netser::WriteContext<'_>,
                    ) -> ::netser::Result<()> {
                        let this = ::netser::model::downcast_ref::<#name>(obj)?;
                        ::netser::Encoder::encode(&this.#ident, ctx)
                    }
                    fn #read_fn(
                        obj: &mut dyn ::netser::Object,
                        ctx: &mut ::netser::ReadContext<'_>,
                    ) -> ::netser::Result<()> {
                        let this = ::netser::model::downcast_mut::<#name>(obj)?;
                        this.#ident = <#ty as ::netser::Decoder>::decode(ctx)?;
                        ::core::result::Result::Ok(())
                    }
                });
                bare_inits.push(quote! {
                    #ident: ::core::default::Default::default()
                });
                quote! {
                    ::core::option::Option::Some(::netser::FieldAccess {
                        write: #write_fn,
                        read: #read_fn,
                    })
                }
            }
        };

        descriptors.push(quote! {
            ::netser::FieldDescriptor {
                name: #logical,
                declaring_type: #name_str,
                kind: <#ty as ::netser::Encoder>::kind(),
                mutability: ::netser::Mutability::#mutability_ident,
                access: #access,
            }
        });
        hash_names.push(logical);
        hash_types.push(quote!(#ty).to_string());
        hash_mutability.push(mutability);
    }

    let hash = layout_hash(&name_str, &hash_names, &hash_types, &hash_mutability);

    let (parent_link, parent_methods) = match parent {
        Some((ident, ty)) => {
            let field_str = ident.to_string();
            (
                quote! {
                    ::core::option::Option::Some(::netser::ParentLink {
                        field: #field_str,
                        descriptor: <#ty as ::netser::Serializable>::descriptor,
                    })
                },
                quote! {
                    fn parent(&self) -> ::core::option::Option<&dyn ::netser::Object> {
                        ::core::option::Option::Some(&self.#ident)
                    }
                    fn parent_mut(&mut self) -> ::core::option::Option<&mut dyn ::netser::Object> {
                        ::core::option::Option::Some(&mut self.#ident)
                    }
                },
            )
        }
        None => (quote! { ::core::option::Option::None }, quote! {}),
    };

    Ok(quote! {
        impl ::netser::Object for #name {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }
            fn type_name(&self) -> &'static str {
                #name_str
            }
            #parent_methods
            fn eq_object(&self, other: &dyn ::netser::Object) -> bool {
                other
                    .as_any()
                    .downcast_ref::<#name>()
                    .map_or(false, |other| self == other)
            }
        }

        impl ::netser::Serializable for #name {
            const TYPE_NAME: &'static str = #name_str;

            fn descriptor() -> ::netser::TypeDescriptor {
                #(#accessors)*
                fn __netser_bare() -> ::std::boxed::Box<dyn ::netser::Object> {
                    ::std::boxed::Box::new(<#name as ::netser::Serializable>::bare())
                }
                ::netser::TypeDescriptor {
                    name: <#name as ::netser::Serializable>::TYPE_NAME,
                    type_id: ::std::any::TypeId::of::<#name>(),
                    parent: #parent_link,
                    fields: ::std::vec![#(#descriptors),*],
                    bare: __netser_bare,
                    layout_hash: #hash,
                }
            }

            fn bare() -> Self {
                #name {
                    #(#bare_inits),*
                }
            }
        }

        impl ::netser::Encoder for #name {
            fn encode(&self, ctx: &mut ::netser::WriteContext<'_>) -> ::netser::Result<()> {
                ::netser::object::encode_object(self, ctx)
            }
            fn kind() -> ::netser::ValueKind {
                ::netser::ValueKind::Nested {
                    declared: ::core::option::Option::Some(::netser::TypeKey::of::<#name>()),
                    polymorphic: false,
                }
            }
        }

        impl ::netser::Decoder for #name {
            fn decode_tagged(
                tag: u8,
                ctx: &mut ::netser::ReadContext<'_>,
            ) -> ::netser::Result<Self> {
                let obj = ::netser::object::decode_object(tag, ctx)?;
                ::netser::model::downcast_box::<#name>(obj)
            }
        }
    })
}
