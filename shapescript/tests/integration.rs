use shapescript::Program;
use shapescript::block::header::ForClause;
use shapescript::block::{BlockId, BlockKind};
use shapescript::parser::{ErrorKind, Parser};
use shapescript::variable::{Binding, TypeName, Value};

fn parse(source: &str) -> Program {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn kinds_of(program: &Program) -> Vec<ErrorKind> {
    program.diagnostics.iter().map(|d| d.kind).collect()
}

fn child(program: &Program, id: BlockId, index: usize) -> BlockId {
    program.tree.get(id).children[index]
}

fn value_of(program: &Program, block: BlockId, name: &str) -> Option<Value> {
    let (_, var) = program.tree.lookup(block, name)?;
    var.value().cloned()
}

#[test]
fn if_elif_else_chain() {
    let src = "{ if (a) { b = 1 } elif (c) { b = 2 } else { b = 3 } }";
    let program = parse(src);
    let root = program.tree.root();
    assert_eq!(program.tree.get(root).kind, BlockKind::Main);
    assert_eq!(program.tree.get(root).children.len(), 1);

    let outer = child(&program, root, 0);
    assert_eq!(program.tree.get(outer).kind, BlockKind::Generic);
    let kinds: Vec<&str> = program.tree.children(outer).map(|b| b.kind.label()).collect();
    assert_eq!(kinds, vec!["If", "Elif", "Else"]);
    assert_eq!(
        program.tree.get(child(&program, outer, 0)).kind.condition(),
        Some("a")
    );
    assert_eq!(
        program.tree.outline(src),
        "Main\n  Generic\n    If (a)\n    Elif (c)\n    Else\n"
    );

    // `b` is never declared, so each branch's update is reported.
    assert_eq!(
        kinds_of(&program),
        vec![ErrorKind::UnresolvedNameOnUpdate; 3]
    );
}

#[test]
fn immutable_reassignment_keeps_value() {
    let src = "val x : Integer = 5\nx = 6";
    let program = parse(src);
    assert_eq!(kinds_of(&program), vec![ErrorKind::ImmutableReassignment]);
    assert_eq!(program.diagnostics[0].line, 1);
    assert_eq!(
        value_of(&program, program.tree.root(), "x"),
        Some(Value::Integer(5))
    );
}

#[test]
fn unmatched_brace_produces_no_tree() {
    let err = Parser::new("{ var x : Integer = 1\n".to_string(), 0)
        .parse()
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnbalancedBraces);
    assert!(err.is_fatal());

    let err = Parser::new("}".to_string(), 0).parse().unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnbalancedBraces);
}

#[test]
fn identical_bodies_are_distinct_blocks() {
    let src = "var x : Integer = 0\n{ x = 1 }\nfoo()\n{ x = 1 }\n{ { x = 1 } }";
    let program = parse(src);
    let tree = &program.tree;
    let top: Vec<BlockId> = tree.root_block().children.clone();
    assert_eq!(top.len(), 3);
    assert_ne!(top[0], top[1]);
    assert_eq!(tree.get(top[0]).text, tree.get(top[1]).text);
    assert!(tree.get(top[0]).span.end <= tree.get(top[1]).span.start);

    let nested = tree.get(top[2]).children[0];
    assert_eq!(tree.get(nested).text, " x = 1 ");
    assert_eq!(tree.depth(nested), 2);
    assert!(program.diagnostics.is_empty());
}

#[test]
fn tree_invariants_hold() {
    let src = "\
var n : Integer = 0
function grow(size : Integer) : Integer {
    for (i = 0; i < size; i += 1) {
        if (i > 2) { n += 1 } else { n -= 1 }
    }
    while (n < 10) { n += 2 }
}
{ { } { { } } }
";
    let program = parse(src);
    let tree = &program.tree;

    let roots: Vec<_> = tree.blocks().iter().filter(|b| b.parent.is_none()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, tree.root());
    assert_eq!(tree.root_block().span, 0..src.len());

    for block in tree.blocks() {
        for c in &block.children {
            assert_eq!(tree.parent(*c), Some(block.id));
            assert!(block.contains_span(&tree.get(*c).span));
        }
        if let Some(parent) = block.parent {
            assert!(tree.get(parent).children.contains(&block.id));
            assert!(tree.depth(block.id) < tree.len());
        }
        // Siblings are in source order and never overlap.
        for pair in block.children.windows(2) {
            assert!(tree.get(pair[0]).span.end <= tree.get(pair[1]).span.start);
        }
    }

    assert_eq!(tree.iter().count(), tree.len());
    assert_eq!(tree.len(), 10);
}

#[test]
fn reparsing_is_deterministic() {
    let src = "var a : Integer = 1\n{ a += 1; b = 2 }\nif (a) { c() } else { a = 'x' }\n";
    let first = parse(src);
    let second = parse(src);
    assert_eq!(first.tree.outline(src), second.tree.outline(src));
    let spans = |p: &Program| -> Vec<_> {
        p.diagnostics
            .iter()
            .map(|d| (d.kind, d.span.clone(), d.message.clone()))
            .collect()
    };
    assert_eq!(spans(&first), spans(&second));
    assert_eq!(first.lines, second.lines);
}

#[test]
fn classifies_loops_and_functions() {
    let src = "\
function area(w : Integer, h : Integer) : Integer {
}
for (i = 0; i < 3; i += 1) {
}
for (s in shapes) {
}
while (true) {
}
";
    let program = parse(src);
    let blocks: Vec<&BlockKind> = program.tree.children(program.tree.root()).map(|b| &b.kind).collect();
    match blocks[0] {
        BlockKind::FunctionDecl(sig) => {
            assert_eq!(sig.name, "area");
            assert_eq!(sig.parameters.len(), 2);
            assert_eq!(sig.return_type, Some(TypeName::Integer));
        }
        other => panic!("expected a function, got {:?}", other),
    }
    assert_eq!(
        blocks[1],
        &BlockKind::For(ForClause::Counted {
            init: "i = 0".into(),
            condition: "i < 3".into(),
            step: "i += 1".into(),
        })
    );
    assert!(matches!(blocks[2], BlockKind::For(ForClause::Each { item, .. }) if item == "s"));
    assert_eq!(blocks[3].condition(), Some("true"));
    // Header text is never parsed as a statement.
    assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
}

#[test]
fn unknown_header_is_flagged_but_kept() {
    let src = "repeat 3 {\n  square(10)\n}";
    let program = parse(src);
    let block = program.tree.children(program.tree.root()).next().unwrap();
    assert_eq!(block.kind, BlockKind::Generic);
    assert!(block.flagged);
    assert_eq!(block.header(src), "repeat 3");
    assert_eq!(block.calls.len(), 1);
    assert_eq!(kinds_of(&program), vec![ErrorKind::UnclassifiedHeader]);
}

#[test]
fn dangling_else_is_reported() {
    let src = "else { }\nif (x) { } else { }";
    let program = parse(src);
    assert_eq!(kinds_of(&program), vec![ErrorKind::DanglingBranch]);
    assert_eq!(program.diagnostics[0].line, 0);
}

#[test]
fn scopes_resolve_through_parents() {
    let src = "\
var count : Integer = 0
var name : String = \"box\"
function draw(size) {
    count += 1
    var name : String = \"inner\"
    name = \"changed\"
}
";
    let program = parse(src);
    assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
    let root = program.tree.root();
    let func = child(&program, root, 0);

    assert_eq!(value_of(&program, root, "count"), Some(Value::Integer(1)));
    assert_eq!(
        value_of(&program, root, "name"),
        Some(Value::String("box".into()))
    );
    assert_eq!(
        value_of(&program, func, "name"),
        Some(Value::String("changed".into()))
    );
    let (owner, _) = program.tree.lookup(func, "count").unwrap();
    assert_eq!(owner, root);
}

#[test]
fn declarations_after_a_block_are_not_visible_inside_it() {
    let src = "{\n  x = 1\n}\nvar x : Integer = 0";
    let program = parse(src);
    assert_eq!(kinds_of(&program), vec![ErrorKind::UnresolvedNameOnUpdate]);
    assert_eq!(program.diagnostics[0].line, 1);
    assert_eq!(
        value_of(&program, program.tree.root(), "x"),
        Some(Value::Integer(0))
    );
}

#[test]
fn duplicate_declaration_keeps_first() {
    let src = "var x : Integer = 1\nvar x : String = \"a\"";
    let program = parse(src);
    assert_eq!(kinds_of(&program), vec![ErrorKind::DuplicateDeclaration]);
    assert_eq!(program.diagnostics[0].notes, vec!["the declaration on line 1 is kept"]);
    let scope = &program.tree.root_block().scope;
    assert_eq!(scope.len(), 1);
    assert!(scope.strings.is_empty());
    assert_eq!(scope.integers["x"].value(), Some(&Value::Integer(1)));
}

#[test]
fn initializer_forms() {
    let src = "\
val s : String = 'hi'
val d : Double = 3
var i : Integer = -4
val b : Boolean = True
var r : Integer = random(1, 6)
var n : String = null
var a : Array<Integer> = [1, 2]
var m : Map<String, Integer> = [\"w\": 3]
var e : Map<String, Integer> = []
";
    let program = parse(src);
    assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
    let scope = &program.tree.root_block().scope;
    assert_eq!(scope.len(), 9);
    assert_eq!(scope.strings["s"].value(), Some(&Value::String("hi".into())));
    assert_eq!(scope.doubles["d"].value(), Some(&Value::Double(3.0)));
    assert_eq!(scope.integers["i"].value(), Some(&Value::Integer(-4)));
    assert_eq!(scope.booleans["b"].value(), Some(&Value::Boolean(true)));
    assert_eq!(scope.integers["r"].binding, Binding::Deferred("random(1, 6)".into()));
    assert_eq!(scope.strings["n"].binding, Binding::Null);
    assert!(!scope.strings["s"].mutable);
    assert!(scope.integers["i"].mutable);
    assert_eq!(
        scope.maps["m"].value(),
        Some(&Value::Map(vec![(Value::String("w".into()), Value::Integer(3))]))
    );
    assert_eq!(scope.maps["e"].value(), Some(&Value::Map(vec![])));
    assert_eq!(
        scope.arrays["a"].ty,
        TypeName::Array(Box::new(TypeName::Integer))
    );
}

#[test]
fn updates_and_compound_assignment() {
    let src = "\
var total : Double = 1.5
total += 2
var shapes : Array<String> = [\"circle\"]
shapes += \"square\"
shapes += [\"line\"]
shapes -= \"circle\"
var label : String = \"a\"
label += \"b\"
var r : Integer = roll()
r -= 1
var big : Integer = 9223372036854775807
big += 1
";
    let program = parse(src);
    let root = program.tree.root();
    assert_eq!(value_of(&program, root, "total"), Some(Value::Double(3.5)));
    assert_eq!(
        value_of(&program, root, "shapes"),
        Some(Value::Array(vec![
            Value::String("square".into()),
            Value::String("line".into())
        ]))
    );
    assert_eq!(
        program.tree.root_block().scope.integers["r"].binding,
        Binding::Deferred("roll() - 1".into())
    );
    assert_eq!(
        kinds_of(&program),
        vec![ErrorKind::InvalidCompoundAssignment, ErrorKind::TypeMismatch]
    );
    assert_eq!(program.diagnostics[0].line, 7);
    assert_eq!(program.diagnostics[1].line, 11);
}

#[test]
fn type_problems_skip_the_declaration() {
    let src = "var n : Integer = \"a\"\nvar s : Shape = 1\nvar k : Integer = 2\nk = 2.5";
    let program = parse(src);
    assert_eq!(
        kinds_of(&program),
        vec![
            ErrorKind::TypeMismatch,
            ErrorKind::UnknownType,
            ErrorKind::TypeMismatch
        ]
    );
    let scope = &program.tree.root_block().scope;
    assert_eq!(scope.len(), 1);
    assert_eq!(scope.integers["k"].value(), Some(&Value::Integer(2)));
}

#[test]
fn calls_and_unrecognised_lines() {
    let src = "circle(10, 20)\ndraw square\nmove(1); rect(2, 3)";
    let program = parse(src);
    let calls: Vec<String> = program
        .tree
        .root_block()
        .calls
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(calls, vec!["circle(10, 20)", "move(1)", "rect(2, 3)"]);
    assert_eq!(kinds_of(&program), vec![ErrorKind::UnrecognizedStatement]);
    assert_eq!(program.diagnostics[0].line, 1);
    assert!(program.diagnostics[0].message.contains("draw square"));
}

#[test]
fn braces_inside_strings_are_text() {
    let src = "val open : String = \"{\"\n{ val close : String = '}' }";
    let program = parse(src);
    assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
    assert_eq!(program.tree.len(), 2);
    let inner = child(&program, program.tree.root(), 0);
    assert_eq!(
        value_of(&program, inner, "close"),
        Some(Value::String("}".into()))
    );
}

#[test]
fn diagnostics_arrive_in_source_order() {
    let src = "a = 1\n{\n  b = 2\n}\nc = 3\nwhat is this";
    let program = parse(src);
    let lines: Vec<usize> = program.diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![0, 2, 4, 5]);
    assert!(program.diagnostics[0].to_string().starts_with("line 1:"));
}

#[test]
fn lines_point_at_their_blocks() {
    let src = "var x : Integer = 1\nif (x) {\n  x = 2\n}";
    let program = parse(src);
    let root = program.tree.root();
    let branch = child(&program, root, 0);
    assert_eq!(program.lines.len(), 4);
    assert_eq!(program.lines[0].block, Some(root));
    assert_eq!(program.lines[1].block, Some(root));
    assert_eq!(program.lines[2].block, Some(branch));
    assert_eq!(program.tree.get(branch).lines, 1..4);
}

#[test]
fn empty_source_is_a_bare_root() {
    let program = parse("");
    assert_eq!(program.tree.len(), 1);
    assert_eq!(program.lines.len(), 1);
    assert!(program.diagnostics.is_empty());
    assert_eq!(program.tree.outline(""), "Main\n");
}

#[test]
fn header_on_the_line_above_the_brace() {
    let src = "var x : Integer = 0\nif (x > 0)\n{\n  x = 1\n}\nelse\n{\n  x = 2\n}";
    let program = parse(src);
    assert!(!program.has_warnings(), "{:?}", program.diagnostics);
    assert_eq!(
        program.tree.outline(src),
        "Main\n  var x : Integer = 2\n  If (x > 0)\n  Else\n"
    );

    let root = program.tree.root();
    let branch = program.tree.get(child(&program, root, 0));
    assert_eq!(branch.header(src), "if (x > 0)");
    assert_eq!(branch.kind.condition(), Some("x > 0"));
    assert_eq!(program.tree.get(child(&program, root, 1)).header(src), "else");
}

#[test]
fn statement_above_a_bare_brace_stays_a_statement() {
    let src = "var x : Integer = 0\nx = 1\n{\n}";
    let program = parse(src);
    assert!(!program.has_warnings(), "{:?}", program.diagnostics);
    let root = program.tree.root();
    let inner = program.tree.get(child(&program, root, 0));
    assert_eq!(inner.kind, BlockKind::Generic);
    assert!(!inner.flagged);
    assert_eq!(value_of(&program, root, "x"), Some(Value::Integer(1)));
}

#[test]
fn escaped_quotes_in_string_literals() {
    let src = "val s : String = \"say \\\"hi\\\"\"\n{ val t : String = 'a \\' }' }";
    let program = parse(src);
    assert!(!program.has_warnings(), "{:?}", program.diagnostics);
    assert_eq!(program.tree.len(), 2);
    let root = program.tree.root();
    assert_eq!(
        value_of(&program, root, "s"),
        Some(Value::String("say \"hi\"".into()))
    );
    assert_eq!(
        value_of(&program, child(&program, root, 0), "t"),
        Some(Value::String("a ' }".into()))
    );
}

#[test]
fn oversized_integer_literal_is_a_type_mismatch() {
    let src = "var n : Integer = 99999999999999999999\nvar m : Integer = 1\nm += 99999999999999999999";
    let program = parse(src);
    assert_eq!(
        kinds_of(&program),
        vec![ErrorKind::TypeMismatch, ErrorKind::TypeMismatch]
    );
    assert!(program.diagnostics[0].message.contains("does not fit"));
    let root = program.tree.root();
    assert!(program.tree.lookup(root, "n").is_none());
    assert_eq!(value_of(&program, root, "m"), Some(Value::Integer(1)));
}
