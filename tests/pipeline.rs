//! End-to-end tests: source text through to SM code

use cd25c::types::{ConstValue, Region, Symbol, SymbolKind};
use cd25c::utils::Category;
use cd25c::{compile, CompileOptions, Compilation};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Compilation {
    compile(source, &CompileOptions::default()).expect("internal compiler error")
}

fn code_lines(source: &str) -> Vec<String> {
    let compilation = run(source);
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);
    let module = compilation.module.expect("module");
    module.code.lines().map(str::to_string).collect()
}

fn messages(compilation: &Compilation) -> Vec<String> {
    compilation.diagnostics.iter().map(|d| d.message.clone()).collect()
}

fn symbol<'c>(compilation: &'c Compilation, name: &str) -> &'c Symbol {
    compilation
        .analysis
        .symbols
        .iter()
        .map(|(_, s)| s)
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no symbol '{}'", name))
}

#[test]
fn constant_is_folded() {
    let compilation = run("cd25 p constants PI is 3 main begin end cd25 p");
    assert!(compilation.is_success());
    let pi = symbol(&compilation, "PI");
    assert_eq!(pi.kind, SymbolKind::Const { value: Some(ConstValue::Int(3)) });
}

#[test]
fn simple_store() {
    let lines = code_lines("cd25 p main x : integer begin x = 5; end cd25 p");
    assert_eq!(lines, vec!["ALLOC 1", "main:", "LB 5", "ST 1 0", "HALT"]);
}

#[test]
fn struct_field_of_array_element() {
    let lines = code_lines(
        "cd25 p
         types pt is e : integer, f : integer end
               pts is array [4] of pt end
         arrays a : pts
         main i : integer, x : integer
         begin
           x = a[i].f;
         end cd25 p",
    );
    assert_eq!(
        lines,
        vec![
            "ALLOC 3", "LA1 0", "LB 4", "ARRAY 16", "main:", "LV1 0", "LV1 8", "INDEX 16", "STEP 8", "L", "ST 1 16",
            "HALT",
        ]
    );
}

#[test]
fn if_else_labels_are_unique() {
    let lines = code_lines(
        "cd25 p main x : integer begin
           if (x > 0) x = 1; else x = 2; end
           if (x < 0) x = 3; end
         end cd25 p",
    );
    assert_eq!(
        lines,
        vec![
            "ALLOC 1", "main:", "LV1 0", "LB 0", "GT", "BF else_0", "LB 1", "ST 1 0", "BR endif_1", "else_0:", "LB 2",
            "ST 1 0", "endif_1:", "LV1 0", "LB 0", "LT", "BF else_2", "LB 3", "ST 1 0", "else_2:", "HALT",
        ]
    );
}

#[test]
fn missing_return_blocks_codegen() {
    let compilation = run("cd25 p func f() : integer begin end main begin end cd25 p");
    assert_eq!(messages(&compilation), vec!["missing return statement in function 'f'"]);
    assert!(compilation.module.is_none());
}

#[test]
fn duplicate_declaration() {
    let compilation = run("cd25 p main x : integer, x : real begin end cd25 p");
    assert_eq!(messages(&compilation), vec!["duplicate identifier 'x'"]);
    assert_eq!(compilation.diagnostics.count(Category::Semantic), 1);
}

#[test]
fn storage_offsets() {
    let compilation = run(
        "cd25 p
         types v is array [10] of real end
         arrays g : v
         func f(a : integer, const b : real) : real
           t : real, u : v
         begin
           return a + b;
         end
         main m : integer begin m = 1; end cd25 p",
    );
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);
    let address = |name| symbol(&compilation, name).address();
    assert_eq!(address("g"), Some((Region::Global, 0)));
    assert_eq!(address("m"), Some((Region::Global, 8)));
    assert_eq!(address("a"), Some((Region::Frame, -8)));
    assert_eq!(address("b"), Some((Region::Frame, -16)));
    assert_eq!(address("t"), Some((Region::Frame, 16)));
    assert_eq!(address("u"), Some((Region::Frame, 24)));
}

#[test]
fn recursive_function() {
    let lines = code_lines(
        "cd25 p
         func fact(n : integer) : integer
         begin
           if (n <= 1) return 1; end
           return n * fact(n - 1);
         end
         main r : integer begin r = fact(5); out << r << line; end cd25 p",
    );
    assert_eq!(
        lines,
        vec![
            "ALLOC 1", "main:", "LB 5", "LB 1", "LA0 fn_fact", "JS2", "ST 1 0", "LV1 0", "VALPR", "NEWLN", "HALT",
            "fn_fact:", "LV2 -8", "LB 1", "LE", "BF else_0", "LB 1", "RVAL", "RETN", "else_0:", "LV2 -8", "LV2 -8",
            "LB 1", "SUB", "LB 1", "LA0 fn_fact", "JS2", "MUL", "RVAL", "RETN", "TRAP",
        ]
    );
}

#[test]
fn constant_pool_file_contents() {
    let compilation = run("cd25 p main r : real begin r = 2.5; out << \"hi\"; r = 2.5; end cd25 p");
    let module = compilation.module.expect("module");
    let json = serde_json::to_string(&module.constants).unwrap();
    assert_eq!(
        json,
        r#"[{"offset":0,"value":{"kind":"real","value":2.5}},{"offset":8,"value":{"kind":"str","value":"hi"}}]"#
    );
}

#[test]
fn errors_from_every_stage_are_collected() {
    let compilation = run(
        "cd25 p
         main x : integer
         begin
           x = 1 @ 2;
           y = 3;
         end cd25 p",
    );
    assert!(compilation.diagnostics.count(Category::Lexical) >= 1);
    assert!(compilation.module.is_none());
}

#[test]
fn listing_reproduces_source() {
    let source = "cd25 p // header\n/** block\n comment ***/\nmain x : real begin x = 1.5; x = a.b; end cd25 p\n";
    let compilation = run(source);
    assert_eq!(compilation.listing.text(), source);
    let rendered = compilation.render_listing();
    assert!(rendered.starts_with("   1  cd25 p // header\n   2  /** block\n"));
    assert!(rendered.contains("error(s):"));
}

#[test]
fn json_feedback_report() {
    let compilation = run("cd25 p main begin y = 1; end cd25 q");
    let feedback = compilation.feedback("prog.cd");
    let json: serde_json::Value = serde_json::from_str(&feedback.to_json()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["stats"]["semantic_errors"], 2);
    assert_eq!(json["diagnostics"][0]["location"]["file"], "prog.cd");
}

#[test]
fn infinite_real_constant_is_rejected() {
    let compilation = run("cd25 p constants R is 1.0 / 0.0, Q is 0.0 / 0.0 main r : real begin r = R; end cd25 p");
    assert_eq!(
        messages(&compilation),
        vec!["division by zero in constant expression", "division by zero in constant expression"]
    );
    assert!(compilation.module.is_none());
}
