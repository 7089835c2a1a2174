//! Integration tests for template rendering.
//!
//! These tests compile templates through the public [`Engine`] API and check
//! the rendered text and the errors raised while rendering.

use float_cmp::approx_eq;
use proptest::prelude::*;

use quill::{
    Engine, RenderError, RenderErrorKind, Value, Vars,
    ast::{Expr, ExprList, Stat},
    directive::{Directive, DirectiveContext},
    output::CharOutput,
    source::MemorySourceFactory,
    value::{Enumeration, Iterable},
};

fn vars<const N: usize>(pairs: [(&str, Value); N]) -> Vars {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn render(template: &str, data: Vars) -> String {
    let engine = Engine::builder().build().expect("default config is valid");
    let template = engine
        .template_from_str(template)
        .unwrap_or_else(|err| panic!("Expected {template:?} to compile: {err}"));
    template
        .render_to_string(data)
        .unwrap_or_else(|err| panic!("Expected render to succeed: {err}"))
}

fn render_err(template: &str, data: Vars) -> RenderError {
    let engine = Engine::builder().build().expect("default config is valid");
    engine
        .template_from_str(template)
        .expect("Template should compile")
        .render_to_string(data)
        .expect_err("Expected render to fail")
}

proptest! {
    #[test]
    fn test_text_without_directives_is_unchanged(text in "[^#]{0,200}") {
        prop_assert_eq!(render(&text, Vars::new()), text);
    }
}

#[test]
fn test_end_to_end_examples() {
    assert_eq!(
        render("Hello #(name)!", vars([("name", Value::str("World"))])),
        "Hello World!"
    );
    assert_eq!(render("#for(x : [1,2,3])#(x)#end", Vars::new()), "123");
    assert_eq!(
        render(
            "#if(a>b)\n big\n#else\n small\n#end",
            vars([("a", Value::Int(1)), ("b", Value::Int(2))])
        ),
        " small\n"
    );
}

#[test]
fn test_if_chain_runs_exactly_one_branch() {
    let template = "#if(x == 1)A#elseif(x == 2)B#else()C#end";
    assert_eq!(render(template, vars([("x", Value::Int(1))])), "A");
    assert_eq!(render(template, vars([("x", Value::Int(2))])), "B");
    assert_eq!(render(template, vars([("x", Value::Int(3))])), "C");
    assert_eq!(render("[#if(x)yes#end]", vars([("x", Value::Bool(false))])), "[]");
}

#[test]
fn test_for_else_runs_for_null_and_empty_sources() {
    let template = "#for(x : items)body#else()empty#end";
    assert_eq!(render(template, Vars::new()), "empty");
    assert_eq!(render(template, vars([("items", Value::Null)])), "empty");
    assert_eq!(render(template, vars([("items", Value::list([]))])), "empty");
    assert_eq!(
        render(template, vars([("items", Value::list([Value::Int(1)]))])),
        "body"
    );
}

#[test]
fn test_loop_status_sequence() {
    let template = "#for(x : items)#(for.index),#(for.count),#(for.first),#(for.last),#(for.odd),#(for.even);#end";
    let items = Value::list(["a", "b", "c"].map(Value::str));
    assert_eq!(
        render(template, vars([("items", items)])),
        "0,1,true,false,true,false;1,2,false,false,false,true;2,3,false,true,true,false;"
    );
}

#[test]
fn test_nested_loops_see_outer_status() {
    let template = "#for(a : [1..2])#for(b : [1..2])#(for.outer.index)#(for.index) #end#end";
    assert_eq!(render(template, Vars::new()), "00 01 10 11 ");
}

#[test]
fn test_uncountable_sources_reject_size() {
    let iter = Value::iter(vec![Value::Int(1), Value::Int(2)].into_iter());
    assert_eq!(render("#for(x : it)#(x)#end", vars([("it", iter)])), "12");

    let iter = Value::iter(vec![Value::Int(1)].into_iter());
    let err = render_err("#for(x : it)#(for.size)#end", vars([("it", iter)]));
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize("iterator")));

    let err = render_err("#for(i = 0; i < 3; i++)#(for.last)#end", Vars::new());
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize(_)));
}

#[test]
fn test_full_domain_range() {
    let data = || vars([("lo", Value::Int(i64::MIN)), ("hi", Value::Int(i64::MAX))]);

    let err = render_err("#([lo..hi].size())", data());
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize("range")));

    let err = render_err("#for(x : [lo..hi])#(for.size)#break#end", data());
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize("range")));

    let err = render_err("#for(x : [hi..lo])#(for.last)#break#end", data());
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize("range")));

    // Walking and indexing do not need the size.
    assert_eq!(
        render("#for(x : [lo..hi])#(x)#if(for.index == 1)#break#end,#end", data()),
        "-9223372036854775808,-9223372036854775807"
    );
    assert_eq!(
        render("#set(r = [hi..lo])#(r[1]) #(r.get(2))", data()),
        "9223372036854775806 9223372036854775805"
    );
}

#[derive(Debug)]
struct Letters(&'static str);

impl Iterable for Letters {
    fn iter(&self) -> Box<dyn Iterator<Item = Value> + Send> {
        Box::new(self.0.chars().map(|c| Value::str(c.to_string())))
    }
}

#[derive(Debug)]
struct Countdown(i64);

impl Enumeration for Countdown {
    fn has_more(&mut self) -> bool {
        self.0 > 0
    }

    fn next_element(&mut self) -> Value {
        self.0 -= 1;
        Value::Int(self.0 + 1)
    }
}

#[test]
fn test_for_over_array() {
    let data = vars([("xs", Value::array([10, 20, 30].map(Value::Int)))]);
    let template = "#for(x : xs)#(for.first ? \"\" : \", \")#(for.index)=#(x)#end";
    assert_eq!(render(template, data), "0=10, 1=20, 2=30");

    let data = vars([("xs", Value::array([Value::str("a"), Value::str("b")]))]);
    assert_eq!(
        render("#for(x : xs)#(x)#if(for.last)!#end#end", data),
        "ab!"
    );
}

#[test]
fn test_for_over_iterable_restarts() {
    let data = vars([("letters", Value::iterable(Letters("abc")))]);
    let template = "#for(c : letters)#(for.index)#(c)#end|#for(c : letters)#if(for.first)^#end#(c)#end";
    assert_eq!(render(template, data), "0a1b2c|^abc");

    let data = vars([("letters", Value::iterable(Letters("ab")))]);
    let err = render_err("#for(c : letters)#(for.size)#end", data);
    assert!(matches!(err.kind(), RenderErrorKind::UncountableSize("iterable")));
}

#[test]
fn test_for_over_enumeration() {
    let data = vars([("countdown", Value::enumeration(Countdown(3)))]);
    let template = "#for(n : countdown)#(for.index):#(n)#if(for.first)^#end#if(for.last)$#end/#(for.size) #end";
    assert_eq!(render(template, data), "0:3^/3 1:2/3 2:1$/3 ");

    let data = vars([("countdown", Value::enumeration(Countdown(0)))]);
    assert_eq!(
        render("#for(n : countdown)#(n)#else()empty#end", data),
        "empty"
    );
}

#[test]
fn test_counter_loop() {
    assert_eq!(render("#for(i = 0; i < 3; i++)#(i)#end", Vars::new()), "012");
    assert_eq!(
        render("#for(i = 0; i < 0; i++)#(i)#else()none#end", Vars::new()),
        "none"
    );
    // The counter stays local to the loop.
    assert_eq!(render("#for(i = 0; i < 2; i++)#end[#(i)]", Vars::new()), "[]");
}

#[test]
fn test_break_and_continue() {
    let template = "#for(x : [1..5])#if(x == 2)#continue#end#if(x == 4)#break#end#(x)#end";
    assert_eq!(render(template, Vars::new()), "13");
}

#[test]
fn test_map_iteration_writes_through_entries() {
    let data = vars([("m", Value::map([("a", Value::Int(1)), ("b", Value::Int(2))]))]);
    let template = "#for(e : m)#(e.key)#set(e.value = e.value * 10)#end:#(m.a),#(m.b)";
    assert_eq!(render(template, data), "ab:10,20");
}

#[test]
fn test_arity_mismatch_is_a_render_error() {
    let err = render_err("#define f(a)#(a)#end\n#@f(1, 2)", Vars::new());
    assert!(matches!(
        err.kind(),
        RenderErrorKind::ArityMismatch { expected: 1, found: 2, .. }
    ));
    assert_eq!(err.location().row(), 2);
}

#[test]
fn test_return_does_not_break_caller_loop() {
    let template = "#define f(x)#if(x == 2)#return#end#(x)#end#for(x : [1..4])#@f(x)#end";
    assert_eq!(render(template, Vars::new()), "134");
}

#[test]
fn test_undefined_functions() {
    let err = render_err("#@nope()", Vars::new());
    assert!(matches!(err.kind(), RenderErrorKind::UndefinedFunction(name) if name == "nope"));
    assert_eq!(render("#@nope?()ok", Vars::new()), "ok");
    assert_eq!(
        render(
            "#define hi(n)hi #(n)#end#call(\"hi\", \"there\")",
            Vars::new()
        ),
        "hi there"
    );
}

#[test]
fn test_functions_do_not_see_caller_locals() {
    let template = "#define show()[#(x)#(g)]#end#for(x : [5])#@show()#end";
    assert_eq!(render(template, vars([("g", Value::Int(1))])), "[1]");
}

#[test]
fn test_switch_matching() {
    let template = "#switch(x)#case(1, 2)low#case(3)three#default()other#end";
    assert_eq!(render(template, vars([("x", Value::Int(1))])), "low");
    assert_eq!(render(template, vars([("x", Value::Int(2))])), "low");
    assert_eq!(render(template, vars([("x", Value::Int(3))])), "three");
    assert_eq!(render(template, vars([("x", Value::Int(9))])), "other");
    assert_eq!(render("#switch(n)#case(null)none#end", Vars::new()), "none");
}

#[test]
fn test_undeclared_assignment_becomes_global() {
    assert_eq!(
        render("#for(x : [1..2])#set(seen = x)#end#(seen)", Vars::new()),
        "2"
    );
    assert_eq!(
        render("#for(x : [1..2])#setLocal(tmp = x)#end[#(tmp)]", Vars::new()),
        "[]"
    );
    assert_eq!(
        render("#define f()#setGlobal(g = 7)#end#@f()#(g)", Vars::new()),
        "7"
    );
}

#[test]
fn test_expressions() {
    let data = vars([
        ("name", Value::str("quill")),
        ("user", Value::map([("age", Value::Int(30))])),
    ]);
    assert_eq!(
        render(
            "#(name.toUpperCase()) #(user.age + 1) #(user?.missing ?? \"-\") #(missing?.x)",
            data
        ),
        "QUILL 31 - "
    );
    assert_eq!(render("#(1 + 2 * 3)|#(\"a\" + 1)|#(7 % 4)", Vars::new()), "7|a1|3");
    assert_eq!(render("#(x > 1 ? \"big\" : \"small\")", vars([("x", Value::Int(2))])), "big");
}

#[test]
fn test_float_arithmetic() {
    let out = render("#(7 / 2.0)", Vars::new());
    let value: f64 = out.parse().expect("Output should be a float");
    assert!(approx_eq!(f64, value, 3.5));
    assert_eq!(render("#(1.0) #(2.5) #(4 / 2.0) #(2 * 3)", Vars::new()), "1.0 2.5 2.0 6");
}

#[test]
fn test_division_by_zero_keeps_partial_output() {
    let engine = Engine::builder().build().unwrap();
    let template = engine.template_from_str("line\n#(1 / 0)").unwrap();
    let mut out = CharOutput::new(String::new());
    let err = template.render(Vars::new(), &mut out).unwrap_err();
    assert!(matches!(err.kind(), RenderErrorKind::Arithmetic(_)));
    assert_eq!(err.location().row(), 2);
    assert_eq!(out.into_inner().unwrap(), "line\n");
}

#[test]
fn test_shared_objects_and_methods() {
    let engine = Engine::builder()
        .shared_object("site", Value::str("Quill"))
        .shared_method("join", |args| {
            Ok(Value::str(
                args.iter().map(Value::to_string).collect::<Vec<_>>().join("-"),
            ))
        })
        .method("shout", |target, _| Ok(Value::str(format!("{target}!"))))
        .build()
        .unwrap();
    let template = engine
        .template_from_str("#(site) #(join(1, 2, 3)) #(site.shout())")
        .unwrap();
    assert_eq!(template.render_to_string(Vars::new()).unwrap(), "Quill 1-2-3 Quill!");
    // Template data shadows shared objects.
    assert_eq!(
        template
            .render_to_string(vars([("site", Value::str("Mine"))]))
            .unwrap(),
        "Mine 1-2-3 Mine!"
    );
}

#[test]
fn test_includes_run_in_their_own_frame() {
    let files = MemorySourceFactory::new();
    files.insert("page.html", "#include(\"parts/nav.html\", title = \"Home\")[#(title)]#@link(\"x\")");
    files.insert("parts/nav.html", "#define link(to)<a>#(to)</a>#end<#(title)>#set(inner = 1)");
    let engine = Engine::builder().source_factory(files).build().unwrap();
    let out = engine
        .template("page.html")
        .unwrap()
        .render_to_string(Vars::new())
        .unwrap();
    assert_eq!(out, "<Home>[]<a>x</a>");
}

#[test]
fn test_set_global_in_include_reaches_root() {
    let files = MemorySourceFactory::new();
    files.insert("page.html", "#for(i : [1])#include(\"part.html\")#end[#(g)|#(h)]");
    files.insert("part.html", "#for(x : [1..2])#setGlobal(g = x)#end#setLocal(h = 1)");
    let engine = Engine::builder().source_factory(files).build().unwrap();
    let out = engine
        .template("page.html")
        .unwrap()
        .render_to_string(Vars::new())
        .unwrap();
    assert_eq!(out, "[2|]");
}

#[derive(Debug, Default)]
struct Repeat {
    count: Option<Expr>,
    body: Option<Stat>,
}

impl Directive for Repeat {
    fn set_expr(&mut self, exprs: ExprList) -> Result<(), String> {
        let mut exprs = exprs.into_inner();
        if exprs.len() != 1 {
            return Err("expects exactly one count".to_string());
        }
        self.count = exprs.pop();
        Ok(())
    }

    fn has_end(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: Stat) {
        self.body = Some(body);
    }

    fn exec(&self, ctx: &mut dyn DirectiveContext) -> Result<(), RenderError> {
        let (Some(count), Some(body)) = (&self.count, &self.body) else {
            return Ok(());
        };
        let count = ctx.eval(count)?.as_int().unwrap_or(0);
        ctx.push_frame();
        let result = (0..count).try_for_each(|n| {
            ctx.set_local("n", Value::Int(n));
            ctx.exec(body)
        });
        ctx.pop_frame();
        result
    }
}

/// Runs its body and writes `!` in place of an error.
#[derive(Debug, Default)]
struct Recover {
    body: Option<Stat>,
}

impl Directive for Recover {
    fn set_expr(&mut self, exprs: ExprList) -> Result<(), String> {
        if exprs.into_inner().is_empty() {
            Ok(())
        } else {
            Err("takes no parameters".to_string())
        }
    }

    fn has_end(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: Stat) {
        self.body = Some(body);
    }

    fn exec(&self, ctx: &mut dyn DirectiveContext) -> Result<(), RenderError> {
        let Some(body) = &self.body else {
            return Ok(());
        };
        if ctx.exec(body).is_err() {
            ctx.write_str("!")?;
        }
        Ok(())
    }
}

#[test]
fn test_extension_directive() {
    let engine = Engine::builder().directive::<Repeat>("repeat").build().unwrap();
    let template = engine.template_from_str("#repeat(3)[#(n)]#end#(n)").unwrap();
    assert_eq!(template.render_to_string(Vars::new()).unwrap(), "[0][1][2]");
}

#[test]
fn test_failed_blocks_release_their_frames() {
    let files = MemorySourceFactory::new();
    files.insert(
        "page.html",
        "#set(x = \"root\")#recover()#for(x : [1])#(1 / 0)#end#end#(x)\
         #recover()#include(\"bad.html\", y = 2)#end[#(y)]",
    );
    files.insert("bad.html", "#(1 / 0)");
    let engine = Engine::builder()
        .source_factory(files)
        .directive::<Recover>("recover")
        .build()
        .unwrap();
    let out = engine
        .template("page.html")
        .unwrap()
        .render_to_string(Vars::new())
        .unwrap();
    assert_eq!(out, "!root![]");
}

#[test]
fn test_render_to_writer() {
    let engine = Engine::builder().build().unwrap();
    let template = engine.template_from_str("héllo #(n)").unwrap();
    let mut bytes = Vec::new();
    template
        .render_to_writer(vars([("n", Value::Int(1))]), &mut bytes)
        .unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), "héllo 1");
}

#[test]
fn test_call_depth_limit() {
    let engine = Engine::new(quill::config::EngineConfig::default().with_max_call_depth(8)).unwrap();
    let template = engine.template_from_str("#define f()#@f()#end#@f()").unwrap();
    let err = template.render_to_string(Vars::new()).unwrap_err();
    assert!(matches!(err.kind(), RenderErrorKind::CallDepthExceeded(8)));
}
