#![recursion_limit = "512"]

extern crate proc_macro;
extern crate proc_macro2;
extern crate quote;
extern crate syn;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, ToTokens};
use syn::{
    braced,
    ext::IdentExt,
    parenthesized,
    parse::{Parse, ParseStream},
    parse_macro_input, parse_quote,
    spanned::Spanned,
    Attribute, FnArg, Ident, Pat, PatType, ReturnType, Token, Type, Visibility,
};

// the generated client stub already defines these
const RESERVED_CLIENT_FNS: &[&str] = &["new", "set_timeout"];

// a `#[service]` trait
struct Service {
    attrs: Vec<Attribute>,
    vis: Visibility,
    ident: Ident,
    rpcs: Vec<RpcMethod>,
}

// one `fn name(&self, arg: Type, ..) -> Ret;` of the trait
struct RpcMethod {
    attrs: Vec<Attribute>,
    ident: Ident,
    args: Vec<PatType>,
    output: ReturnType,
}

impl Parse for Service {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse()?;
        input.parse::<Token![trait]>()?;
        let ident: Ident = input.parse()?;
        let body;
        braced!(body in input);

        let mut rpcs = Vec::new();
        while !body.is_empty() {
            let rpc: RpcMethod = body.parse()?;
            if RESERVED_CLIENT_FNS.iter().any(|name| rpc.ident == *name) {
                let msg = format!(
                    "`{}` is already defined on the generated `{}Client`",
                    rpc.ident,
                    ident.unraw()
                );
                return Err(syn::Error::new(rpc.ident.span(), msg));
            }
            rpcs.push(rpc);
        }

        Ok(Service {
            attrs,
            vis,
            ident,
            rpcs,
        })
    }
}

impl Parse for RpcMethod {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        input.parse::<Token![fn]>()?;
        let ident: Ident = input.parse()?;
        let content;
        parenthesized!(content in input);

        let mut inputs = content
            .parse_terminated(FnArg::parse, Token![,])?
            .into_iter();
        match inputs.next() {
            Some(FnArg::Receiver(me)) if me.reference.is_some() && me.mutability.is_none() => {}
            _ => {
                return Err(syn::Error::new(
                    ident.span(),
                    "rpc methods must take `&self` as the first argument",
                ))
            }
        }
        let args = inputs
            .map(|arg| match arg {
                FnArg::Typed(arg) if matches!(*arg.pat, Pat::Ident(_)) => Ok(arg),
                other => Err(syn::Error::new(
                    other.span(),
                    "rpc arguments must be plain `name: Type` pairs",
                )),
            })
            .collect::<syn::Result<Vec<_>>>()?;

        let output = input.parse()?;
        input.parse::<Token![;]>()?;
        Ok(RpcMethod {
            attrs,
            ident,
            args,
            output,
        })
    }
}

/// Derives serde's `Serialize` and `Deserialize` through the `calc_rpc::serde`
/// re-export, for types that travel inside a calculator payload.
#[proc_macro_attribute]
pub fn derive_serde(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut gen: proc_macro2::TokenStream = quote! {
        #[derive(calc_rpc::serde::Serialize, calc_rpc::serde::Deserialize)]
        #[serde(crate = "calc_rpc::serde")]
    };
    gen.extend(proc_macro2::TokenStream::from(item));
    proc_macro::TokenStream::from(gen)
}

/// Generates:
/// - service trait
/// - client stub struct, generic over the channel and the codec
/// - dispatch service trait
/// - Request enums
#[proc_macro_attribute]
pub fn service(attr: TokenStream, input: TokenStream) -> TokenStream {
    use heck::ToUpperCamelCase;

    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "`#[calc_rpc::service]` takes no arguments",
        )
        .to_compile_error()
        .into();
    }

    let unit_type: &Type = &parse_quote!(());
    let Service {
        ref attrs,
        ref vis,
        ref ident,
        ref rpcs,
    } = parse_macro_input!(input as Service);

    let camel_case_fn_names: &Vec<_> = &rpcs
        .iter()
        .map(|rpc| rpc.ident.unraw().to_string().to_upper_camel_case())
        .collect();
    let args: &[&[PatType]] = &rpcs.iter().map(|rpc| &*rpc.args).collect::<Vec<_>>();
    let derive_serialize = {
        quote! {
            #[derive(calc_rpc::serde::Serialize, calc_rpc::serde::Deserialize)]
            #[serde(crate = "calc_rpc::serde")]
        }
    };

    let methods = rpcs.iter().map(|rpc| &rpc.ident).collect::<Vec<_>>();

    let generator = ServiceGenerator {
        service_ident: ident,
        client_ident: &format_ident!("{}Client", ident),
        request_ident: &format_ident!("{}Request", ident),
        vis,
        args,
        method_attrs: &rpcs.iter().map(|rpc| &*rpc.attrs).collect::<Vec<_>>(),
        method_idents: &methods,
        attrs,
        rpcs,
        return_types: &rpcs
            .iter()
            .map(|rpc| match rpc.output {
                ReturnType::Type(_, ref ty) => ty,
                ReturnType::Default => unit_type,
            })
            .collect::<Vec<_>>(),
        arg_pats: &args
            .iter()
            .map(|args| args.iter().map(|arg| &*arg.pat).collect())
            .collect::<Vec<_>>(),
        camel_case_idents: &rpcs
            .iter()
            .zip(camel_case_fn_names.iter())
            .map(|(rpc, name)| Ident::new(name, rpc.ident.span()))
            .collect::<Vec<_>>(),
        derive_serialize: &derive_serialize,
    };
    generator.into_token_stream().into()
}

// Things needed to generate the service items: trait, dispatch trait, request enum, and
// the client stub.
struct ServiceGenerator<'a> {
    service_ident: &'a Ident,
    client_ident: &'a Ident,
    request_ident: &'a Ident,
    vis: &'a Visibility,
    attrs: &'a [Attribute],
    rpcs: &'a [RpcMethod],
    camel_case_idents: &'a [Ident],
    method_idents: &'a [&'a Ident],
    method_attrs: &'a [&'a [Attribute]],
    args: &'a [&'a [PatType]],
    return_types: &'a [&'a Type],
    arg_pats: &'a [Vec<&'a Pat>],
    derive_serialize: &'a TokenStream2,
}

impl<'a> ServiceGenerator<'a> {
    fn trait_service(&self) -> TokenStream2 {
        let &Self {
            attrs,
            rpcs,
            vis,
            return_types,
            service_ident,
            ..
        } = self;

        let types_and_fns = rpcs.iter().zip(return_types.iter()).map(
            |(
                RpcMethod {
                    attrs, ident, args, ..
                },
                output,
            )| {
                quote! {
                    #( #attrs )*
                    fn #ident(&self, #( #args ),*) -> #output;
                }
            },
        );

        quote! {
            #( #attrs )*
            #vis trait #service_ident: Sized {
                #( #types_and_fns )*
            }
        }
    }

    fn impl_dispatch_for_server(&self) -> TokenStream2 {
        let &Self {
            request_ident,
            service_ident,
            camel_case_idents,
            arg_pats,
            method_idents,
            vis,
            ..
        } = self;

        let dispatch_service_ident = format_ident!("{}ServiceDispatch", service_ident);
        quote! {
            /// Routes a decoded request to the matching service method.
            #vis trait #dispatch_service_ident: #service_ident + std::panic::RefUnwindSafe
            {
                /// Calls the method named by `req` and encodes its return value into `rsp`.
                fn dispatch_req<K: calc_rpc::net::Codec>(
                    &self,
                    req: #request_ident,
                    codec: &K,
                    rsp: &mut calc_rpc::net::RspBuf,
                ) -> Result<(), calc_rpc::net::WireError> {
                    match req {
                        #(
                            #request_ident::#camel_case_idents{ #( #arg_pats ),* } => match std::panic::catch_unwind(|| self.#method_idents(#( #arg_pats ),*)) {
                                Ok(ret) => calc_rpc::net::Codec::encode(codec, rsp, &ret)
                                    .map_err(calc_rpc::net::WireError::ServerSerialize),
                                Err(_) => Err(calc_rpc::net::WireError::Status(
                                    format!("rpc `{}` panicked in server!", stringify!(#method_idents)),
                                )),
                            }
                        )*
                    }
                }
            }

            impl<T: #service_ident + std::panic::RefUnwindSafe> #dispatch_service_ident for T {}
        }
    }

    fn enum_request(&self) -> TokenStream2 {
        let &Self {
            derive_serialize,
            vis,
            request_ident,
            camel_case_idents,
            args,
            ..
        } = self;

        quote! {
            /// The request sent over the wire from the client to the server.
            #[allow(missing_docs)]
            #[derive(Debug)]
            #derive_serialize
            #vis enum #request_ident {
                #( #camel_case_idents{ #( #args ),* } ),*
            }
        }
    }

    fn struct_client(&self) -> TokenStream2 {
        let &Self {
            vis, client_ident, ..
        } = self;

        quote! {
            #[allow(unused)]
            #[derive(Debug)]
            /// The client stub that makes RPC calls to the server.
            #vis struct #client_ident<C: calc_rpc::net::Channel, K: calc_rpc::net::Codec> {
                transport: calc_rpc::net::StreamClient<C>,
                codec: K,
            }
        }
    }

    fn impl_client_new(&self) -> TokenStream2 {
        let &Self {
            client_ident, vis, ..
        } = self;

        quote! {
            impl<C: calc_rpc::net::Channel, K: calc_rpc::net::Codec> #client_ident<C, K> {
                /// Returns a new client stub that sends requests over the given channel.
                #vis fn new(stream: C, codec: K) -> Self {
                    let transport = calc_rpc::net::StreamClient::new(stream);
                    Self { transport, codec }
                }

                /// set the read timeout value for the client, `None` waits forever
                #vis fn set_timeout(&mut self, timeout: Option<std::time::Duration>) -> std::io::Result<()> {
                    self.transport.set_timeout(timeout)
                }
            }
        }
    }

    fn impl_client_rpc_methods(&self) -> TokenStream2 {
        let &Self {
            client_ident,
            request_ident,
            method_attrs,
            vis,
            method_idents,
            args,
            return_types,
            arg_pats,
            camel_case_idents,
            ..
        } = self;

        quote! {
            impl<C: calc_rpc::net::Channel, K: calc_rpc::net::Codec> #client_ident<C, K> {
                #(
                    #[allow(unused)]
                    #( #method_attrs )*
                    #vis fn #method_idents(&mut self, #( #args ),*) -> Result<#return_types, calc_rpc::net::Error> {
                        let mut req = calc_rpc::net::ReqBuf::new();
                        // serialize the request
                        let request = #request_ident::#camel_case_idents { #( #arg_pats ),* };
                        calc_rpc::net::Codec::encode(&self.codec, &mut req, &request)
                            .map_err(calc_rpc::net::Error::Encode)?;
                        // call the server
                        let rsp_frame = self.transport.call_service(req)?;
                        let rsp = rsp_frame.decode_rsp()?;
                        // deserialize the response
                        calc_rpc::net::Codec::decode(&self.codec, rsp)
                            .map_err(calc_rpc::net::Error::Decode)
                    }
                )*
            }
        }
    }
}

impl<'a> ToTokens for ServiceGenerator<'a> {
    fn to_tokens(&self, output: &mut TokenStream2) {
        output.extend(vec![
            self.trait_service(),
            self.enum_request(),
            self.struct_client(),
            self.impl_client_new(),
            self.impl_client_rpc_methods(),
            self.impl_dispatch_for_server(),
        ])
    }
}

// the trait path of `#[service(path::to::Trait)]`
fn service_path(attrs: &[Attribute]) -> syn::Result<syn::Path> {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident("service"))
        .ok_or_else(|| {
            syn::Error::new(
                proc_macro2::Span::call_site(),
                "`#[derive(Server)]` needs `#[service(path::to::Trait)]`",
            )
        })?
        .parse_args()
}

/// Implements `calc_rpc::net::Server` for a type that implements the service
/// trait named in `#[service(...)]`.
#[proc_macro_derive(Server, attributes(service))]
pub fn derive_rpc_server(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as syn::DeriveInput);
    let struct_ident = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut service = match service_path(&ast.attrs) {
        Err(err) => return err.to_compile_error().into(),
        Ok(s) => s,
    };
    let mut service_request = service.clone();

    if let Some(seg) = service.segments.last_mut() {
        seg.ident = format_ident!("{}ServiceDispatch", seg.ident);
    }

    if let Some(seg) = service_request.segments.last_mut() {
        seg.ident = format_ident!("{}Request", seg.ident);
    }

    let out = quote!(
        impl #impl_generics calc_rpc::net::Server for #struct_ident #ty_generics #where_clause {
            fn service<K: calc_rpc::net::Codec>(
                &self,
                codec: &K,
                req: &[u8],
                rsp: &mut calc_rpc::net::RspBuf,
            ) -> Result<(), calc_rpc::net::WireError> {
                use #service;
                // deserialize the request
                let request: #service_request = calc_rpc::net::Codec::decode(codec, req)
                    .map_err(calc_rpc::net::WireError::ServerDeserialize)?;
                // dispatch to the service method
                self.dispatch_req(request, codec, rsp)
            }
        }
    );
    out.into()
}
