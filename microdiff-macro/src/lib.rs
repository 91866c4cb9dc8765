use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    BinOp, Block, Expr, ExprLit, Ident, Pat, Stmt, Token, UnOp,
};

struct MacroInput {
    graph: Expr,
    block: Block,
}

impl Parse for MacroInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let graph = input.parse()?;
        input.parse::<Token![,]>()?;
        let block = input.parse()?;
        Ok(Self { graph, block })
    }
}

/// Turns a block of `let` statements over numbers into nodes of a graph.
///
/// ```ignore
/// let graph = Graph::new();
/// microdiff!(graph, {
///     let a = 2.;
///     let b = 3.;
///     let c = relu(a * b - 1.);
/// });
/// ```
///
/// Literals bound by `let` become named leaves. `+ - * /`, unary `-`,
/// `relu(x)` and `powf(x, k)` (or their method forms) become graph operations.
#[proc_macro]
pub fn microdiff(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let MacroInput { graph, block } = parse_macro_input!(input as MacroInput);

    let graph_var = Ident::new("__microdiff_graph", Span::call_site());
    let mut objs = vec![quote! {
        let #graph_var: &::microdiff::Graph = &(#graph);
    }];

    for stmt in &block.stmts {
        if let Err(e) = traverse_stmt(stmt, &graph_var, &mut objs) {
            return e.to_compile_error().into();
        }
    }

    // Build the output, possibly using quasi-quotation
    let expanded = quote! {
        #(#objs)*
    };

    // Hand the output tokens back to the compiler
    TokenStream::from(expanded)
}

fn traverse_stmt(input: &Stmt, graph: &Ident, terms: &mut Vec<TokenStream2>) -> syn::Result<()> {
    match input {
        Stmt::Local(local) => {
            if let (Pat::Ident(id), Some(init)) = (&local.pat as &Pat, &local.init) {
                let name = id.ident.clone();
                let ex = &init.expr;
                let ts = match ex as &Expr {
                    Expr::Lit(_) => quote! {
                        let #name = #graph.term(stringify!(#name), (#ex) as f64);
                    },
                    Expr::Unary(neg)
                        if matches!(neg.op, UnOp::Neg(_))
                            && matches!(&*neg.expr, Expr::Lit(_)) =>
                    {
                        quote! {
                            let #name = #graph.term(stringify!(#name), (#ex) as f64);
                        }
                    }
                    Expr::Path(path) => quote! {
                        let #name = #path;
                    },
                    _ => {
                        let res = traverse_expr(ex, graph, terms).ok_or_else(|| {
                            syn::Error::new(ex.span(), "unsupported expression in microdiff!")
                        })?;
                        quote! {
                            let #name = #res;
                        }
                    }
                };
                terms.push(ts);
            }
        }
        Stmt::Expr(ex, _) => {
            traverse_expr(ex, graph, terms);
        }
        _ => (),
    }
    Ok(())
}

fn var_name(terms: &[TokenStream2]) -> String {
    format!("_a{}", terms.len())
}

fn format_term(ex: &ExprLit, graph: &Ident, terms: &mut Vec<TokenStream2>) -> Ident {
    let name = Ident::new(&var_name(terms), ex.span());
    let ts = quote! {
        let #name = #graph.term(stringify!(#name), (#ex) as f64);
    };
    terms.push(ts);
    name
}

fn push_term(name_span: Span, value: TokenStream2, terms: &mut Vec<TokenStream2>) -> Ident {
    let name = Ident::new(&var_name(terms), name_span);
    terms.push(quote! {
        let #name = #value;
    });
    name
}

fn unary_call(
    func: &str,
    arg: Ident,
    exponent: Option<&Expr>,
    span: Span,
    terms: &mut Vec<TokenStream2>,
) -> Option<Ident> {
    let value = match (func, exponent) {
        ("relu", None) => quote! { #arg.relu() },
        ("powf", Some(k)) => quote! { #arg.powf((#k) as f64) },
        _ => return None,
    };
    Some(push_term(span, value, terms))
}

fn traverse_expr(input: &Expr, graph: &Ident, terms: &mut Vec<TokenStream2>) -> Option<Ident> {
    match input {
        Expr::Binary(ex) => {
            let lhs = traverse_expr(&ex.left, graph, terms)?;
            let rhs = traverse_expr(&ex.right, graph, terms)?;
            let binop = match ex.op {
                BinOp::Add(_) => quote! { #lhs + #rhs },
                BinOp::Sub(_) => quote! { #lhs - #rhs },
                BinOp::Mul(_) => quote! { #lhs * #rhs },
                BinOp::Div(_) => quote! { #lhs / #rhs },
                _ => return None,
            };
            Some(push_term(ex.span(), binop, terms))
        }
        Expr::Unary(ex) => {
            if let UnOp::Neg(_) = ex.op {
                let term = traverse_expr(&ex.expr, graph, terms)?;
                Some(push_term(ex.span(), quote! { -#term }, terms))
            } else {
                None
            }
        }
        Expr::Paren(ex) => traverse_expr(&ex.expr, graph, terms),
        Expr::Lit(lit) => Some(format_term(lit, graph, terms)),
        Expr::Path(path) => path.path.segments.last().map(|seg| seg.ident.clone()),
        Expr::Call(call) => {
            let Expr::Path(func) = &call.func as &Expr else {
                return None;
            };
            let func = func.path.segments.last()?.ident.to_string();
            let mut args = call.args.iter();
            let arg = traverse_expr(args.next()?, graph, terms)?;
            unary_call(&func, arg, args.next(), call.span(), terms)
        }
        Expr::MethodCall(call) => {
            let receiver = traverse_expr(&call.receiver, graph, terms)?;
            unary_call(
                &call.method.to_string(),
                receiver,
                call.args.first(),
                call.span(),
                terms,
            )
        }
        _ => None,
    }
}
