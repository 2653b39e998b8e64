use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Attribute, Ident, Token, Type, Visibility, braced,
    ext::IdentExt,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

/// `name: Type` entry of a [`lets!`] block.
struct LetAccessor {
    attrs: Vec<Attribute>,
    name: Ident,
    ty: Type,
}

impl Parse for LetAccessor {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let name = method_name(input.call(Ident::parse_any)?)?;
        input.parse::<Token![:]>()?;
        let ty = input.parse()?;

        Ok(LetAccessor { attrs, name, ty })
    }
}

/// Accessor method for the attribute `name`. Keywords are emitted as raw identifiers, so
/// `type: T` and `r#type: T` both declare `fn r#type(&self)`.
fn method_name(name: Ident) -> syn::Result<Ident> {
    let key = name.unraw().to_string();
    if syn::parse_str::<Ident>(&key).is_ok() {
        return Ok(name);
    }

    match key.as_str() {
        "_" | "self" | "Self" | "super" | "crate" => Err(syn::Error::new(
            name.span(),
            format!("`{key}` cannot be used as the name of a memoized attribute accessor"),
        )),
        _ => Ok(Ident::new_raw(&key, name.span())),
    }
}

/// `pub trait Name for Target { ... }`
struct LetsTrait {
    attrs: Vec<Attribute>,
    vis: Visibility,
    trait_name: Ident,
    target: Type,
    accessors: Vec<LetAccessor>,
}

impl Parse for LetsTrait {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse()?;
        input.parse::<Token![trait]>()?;
        let trait_name = input.parse()?;
        input.parse::<Token![for]>()?;
        let target = input.parse()?;

        let content;
        braced!(content in input);
        let punctuated = Punctuated::<LetAccessor, Token![,]>::parse_terminated(&content)?;

        Ok(LetsTrait {
            attrs,
            vis,
            trait_name,
            target,
            accessors: punctuated.into_iter().collect(),
        })
    }
}

/// Generate an extension trait with one typed accessor per memoized attribute, implemented for
/// `Instance`, `SyncInstance`, `Frozen` and `Scope` of the target type.
///
/// ```ignore
/// hymemo::lets! {
///     pub trait PersonLets for Person {
///         /// First and last name separated by a space.
///         full_name: String,
///     }
/// }
///
/// let joe = person.construct(Person::new("Joe", "Doe"))?;
/// assert_eq!(*joe.full_name()?, "Joe Doe");
/// ```
#[proc_macro]
pub fn lets(input: TokenStream) -> TokenStream {
    let LetsTrait {
        attrs,
        vis,
        trait_name,
        target,
        accessors,
    } = parse_macro_input!(input as LetsTrait);

    // fn $name(&self) -> hymemo::MemoResult<Arc<$ty>>
    let mut signatures = Vec::new();
    // fn $name(&self) -> hymemo::MemoResult<Arc<$ty>> { self.get::<$ty>("$name") }
    let mut bodies = Vec::new();
    for LetAccessor {
        attrs: accessor_attrs,
        name,
        ty,
    } in &accessors
    {
        let key = name.unraw().to_string();
        signatures.push(quote! {
            #(#accessor_attrs)*
            fn #name(&self) -> ::hymemo::MemoResult<::std::sync::Arc<#ty>>;
        });
        bodies.push(quote! {
            fn #name(&self) -> ::hymemo::MemoResult<::std::sync::Arc<#ty>> {
                self.get::<#ty>(#key)
            }
        });
    }

    let expanded = quote! {
        #(#attrs)*
        #vis trait #trait_name {
            #(#signatures)*
        }

        impl #trait_name for ::hymemo::Instance<#target> {
            #(#bodies)*
        }

        impl #trait_name for ::hymemo::SyncInstance<#target> {
            #(#bodies)*
        }

        impl #trait_name for ::hymemo::Frozen<#target> {
            #(#bodies)*
        }

        impl<'__scope> #trait_name for ::hymemo::Scope<'__scope, #target> {
            #(#bodies)*
        }
    };
    TokenStream::from(expanded)
}
