use pretty_assertions::assert_eq;

use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::print_handler::PrintHandler;
use rox::value::Value;

fn interpreter() -> Interpreter {
    Interpreter::with_output(PrintHandler::buffer())
}

/// Runs `source` and returns everything it printed, panicking on error.
fn output(source: &str) -> String {
    let mut interpreter = interpreter();
    if let Err(e) = rox::run_source(source, &mut interpreter) {
        panic!("unexpected error: {}", e);
    }
    interpreter.output()
}

/// Runs `source`, expecting it to fail.
fn error(source: &str) -> LoxError {
    let mut interpreter = interpreter();
    match rox::run_source(source, &mut interpreter) {
        Ok(_) => panic!("expected an error from {:?}", source),
        Err(e) => e,
    }
}

fn values(source: &str) -> Vec<Option<Value>> {
    let mut interpreter = interpreter();
    match rox::run_source(source, &mut interpreter) {
        Ok(values) => values,
        Err(e) => panic!("unexpected error: {}", e),
    }
}

// ───────────────────────────── numbers ─────────────────────────────

#[test]
fn integral_division_yields_int() {
    let values = values("6 / 2; 1 / 3;");

    assert!(matches!(values[0], Some(Value::Int(3))));
    assert!(matches!(values[1], Some(Value::Float(n)) if n.fract() != 0.0));
}

#[test]
fn arithmetic_results_print_normalised() {
    assert_eq!(
        output("print 7 / 2; print 2.5 * 2; print type(2.5 * 2); print type(0.5);"),
        "3.5\n5\nint\nfloat\n"
    );
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_eq!(output("print 1 / 0; print type(1 / 0);"), "inf\nfloat\n");
}

#[test]
fn adding_string_and_number_is_a_convert_error() {
    let err = error("\"a\" + 1;");

    assert!(matches!(err, LoxError::Convert { .. }));
    assert_eq!(err.to_string(), "Convert error: can't convert 1 [int] to string.");
    assert_eq!(err.exit_code(), 70);
}

#[test]
fn negating_a_string_is_a_convert_error() {
    let err = error("-\"x\";");

    assert_eq!(err.to_string(), "Convert error: can't convert x [string] to float.");
}

// ───────────────────────────── scoping ─────────────────────────────

#[test]
fn block_shadowing_restores_outer_binding() {
    assert_eq!(
        output("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn closures_see_later_mutation() {
    assert_eq!(
        output("var x = 1; fun show() { print x; } x = 2; show();"),
        "2\n"
    );
}

#[test]
fn closures_keep_their_own_counter() {
    let source = "
        fun makeCounter() {
            var i = 0;
            fun count() { i = i + 1; return i; }
            return count;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a(); print a(); print b();
    ";

    assert_eq!(output(source), "1\n2\n1\n");
}

#[test]
fn closures_bind_lexically_not_dynamically() {
    let source = "
        var a = \"global\";
        {
            fun show() { print a; }
            show();
            var a = \"block\";
            show();
        }
    ";

    assert_eq!(output(source), "global\nglobal\n");
}

#[test]
fn self_initializer_is_a_resolve_error() {
    let err = error("{ var a = a; }");

    assert!(matches!(err, LoxError::Resolve { .. }));
    assert_eq!(err.exit_code(), 65);
}

#[test]
fn multi_name_declaration() {
    assert_eq!(
        output("var a = 1, b, c = a + 1; print b; print c;"),
        "nil\n2\n"
    );
}

#[test]
fn units_share_one_interpreter() {
    let mut interpreter = interpreter();

    rox::run_source("var a = 1; fun f() { return a + 4; }", &mut interpreter).unwrap();
    rox::run_source("a = 2; print f();", &mut interpreter).unwrap();

    assert_eq!(interpreter.output(), "6\n");
}

// ───────────────────────────── control flow ─────────────────────────────

#[test]
fn break_leaves_infinite_loop() {
    assert_eq!(
        output("var i = 0; while (true) { i = i + 1; if (i == 3) break; } print i;"),
        "3\n"
    );
}

#[test]
fn break_outside_loop_is_a_parse_error() {
    let err = error("break;");

    assert_eq!(
        err.to_string(),
        "[line 1] Error at 'break': Can't use 'break' outside of a loop."
    );
    assert!(err.is_static());
}

#[test]
fn break_inside_function_inside_loop_is_rejected() {
    assert!(error("while (true) { fun f() { break; } }").is_static());
}

#[test]
fn continue_still_runs_for_increment() {
    assert_eq!(
        output("for (var i = 0; i < 5; i++) { if (i == 2) continue; print i; }"),
        "0\n1\n3\n4\n"
    );
}

#[test]
fn return_unwinds_nested_loops() {
    let source = "
        fun find() {
            for (var i = 0; i < 10; i = i + 1) {
                while (true) { if (i == 4) return i; break; }
            }
            return -1;
        }
        print find();
    ";

    assert_eq!(output(source), "4\n");
}

#[test]
fn logical_operators_return_deciding_operand() {
    assert_eq!(
        output("print nil or \"x\"; print 1 and 2; print false and boom;"),
        "x\n2\nfalse\n"
    );
}

#[test]
fn ternary_evaluates_only_selected_branch() {
    assert_eq!(
        output("print true ? \"a\" : boom; print nil ? boom : \"b\";"),
        "a\nb\n"
    );
}

#[test]
fn increments_return_old_or_new_value() {
    assert_eq!(
        output("var a = 1; print a++; print a; print ++a; print --a; print a--; print a;"),
        "1\n2\n3\n2\n2\n1\n"
    );
}

#[test]
fn increment_writes_to_enclosing_variable() {
    assert_eq!(
        output("var n = 0; fun bump() { n++; } bump(); bump(); print n;"),
        "2\n"
    );
}

#[test]
fn increment_reads_and_writes_the_same_binding() {
    let source = "
        var i = 0;
        {
            fun f() { i++; }
            var i = 10;
            f();
            print i;
        }
        print i;
    ";

    assert_eq!(output(source), "11\n0\n");
}

#[test]
fn return_at_top_level_is_a_resolve_error() {
    let err = error("return 1;");

    assert_eq!(
        err.to_string(),
        "[line 1] Error at 'return': Can't return from top-level code."
    );
}

// ───────────────────────────── functions ─────────────────────────────

#[test]
fn lambdas_are_first_class() {
    assert_eq!(
        output("var add = fun (a, b) { return a + b; }; print add(1, 2); print add;"),
        "3\n<fn lambda>\n"
    );
}

#[test]
fn arity_is_enforced() {
    let err = error("fun f(a) {} f();");

    assert_eq!(
        err.to_string(),
        "[line 1] Runtime error: Expected 1 arguments but got 0."
    );
}

#[test]
fn calling_a_non_callable_fails() {
    let err = error("var x = 1; x();");

    assert!(err.to_string().contains("Can only call functions and classes"));
}

#[test]
fn unbounded_recursion_overflows_the_call_stack() {
    let err = error("fun f() { return f(); } f();");

    let LoxError::Runtime { message, trace, .. } = &err else {
        panic!("expected runtime error, got {}", err);
    };
    assert!(message.contains("Stack overflow"), "{}", message);
    assert_eq!(trace.first().map(String::as_str), Some("f"));
    assert_eq!(trace.last().map(String::as_str), Some("<script>"));
}

#[test]
fn deep_but_bounded_recursion_succeeds() {
    let source = "
        fun sum(n) { if (n == 0) return 0; return n + sum(n - 1); }
        print sum(5000);
    ";

    assert_eq!(output(source), "12502500\n");
}

#[test]
fn runtime_errors_carry_a_call_trace() {
    let source = "fun inner() { return missing; }\nfun outer() { return inner(); }\nouter();";
    let err = error(source);

    assert_eq!(
        err.to_string(),
        "[line 1] Runtime error: Undefined variable 'missing'.\n  in inner -> outer -> <script>"
    );
}

#[test]
fn output_before_an_error_stands() {
    let mut interpreter = interpreter();

    let result = rox::run_source("print 1; print nil + 1; print 2;", &mut interpreter);

    assert!(result.is_err());
    assert_eq!(interpreter.output(), "1\n");
}

#[test]
fn builtins_can_be_shadowed() {
    assert_eq!(
        output("fun len(x) { return 99; } print len([1]);"),
        "99\n"
    );
}

#[test]
fn conversion_builtins() {
    assert_eq!(
        output(
            "print int(\"42\") + 1; print float(3); print type(float(3)); \
             print bool(nil); print string(12) + \"!\"; print type(clock());"
        ),
        "43\n3\nfloat\nfalse\n12!\nfloat\n"
    );
}

#[test]
fn values_render_by_kind() {
    let source = "
        class A {}
        fun f() {}
        print A; print A(); print f; print clock; print [1, \"two\", nil];
    ";

    assert_eq!(
        output(source),
        "A\nA instance\n<fn f>\n<builtin-fn clock>\n[1, two, nil]\n"
    );
}

// ───────────────────────────── classes ─────────────────────────────

#[test]
fn initializer_and_method_share_this() {
    let source = "
        class Box {
            init(v) { this.v = v; }
            get() { return this.v; }
        }
        var b = Box(1);
        print b.get();
    ";

    assert_eq!(output(source), "1\n");
}

#[test]
fn reading_an_unset_field_fails() {
    let err = error("class Box {} var b = Box(); print b.missing;");

    assert_eq!(
        err.to_string(),
        "[line 1] Runtime error: Undefined property 'missing'."
    );
}

#[test]
fn init_always_returns_this() {
    let source = "
        class A { init() { this.x = 1; return; } }
        var a = A();
        print a.init() == a;
        print a.x;
    ";

    assert_eq!(output(source), "true\n1\n");
}

#[test]
fn class_arity_follows_init() {
    let err = error("class P { init(x, y) {} } P(1);");

    assert!(err.to_string().contains("Expected 2 arguments but got 1."));
}

#[test]
fn bound_methods_remember_their_instance() {
    let source = "
        class Counter {
            init() { this.n = 0; }
            tick() { this.n = this.n + 1; return this.n; }
        }
        var c = Counter();
        var tick = c.tick;
        tick(); tick();
        print c.n;
    ";

    assert_eq!(output(source), "2\n");
}

#[test]
fn fields_shadow_methods() {
    let source = "
        class A { m() { return 1; } }
        var a = A();
        a.m = fun () { return 2; };
        print a.m();
    ";

    assert_eq!(output(source), "2\n");
}

#[test]
fn property_access_on_non_instance_fails() {
    assert!(error("var x = 1; x.y;")
        .to_string()
        .contains("Only instances have properties."));
    assert!(error("var x = 1; x.y = 2;")
        .to_string()
        .contains("Only instances have fields."));
}

// ───────────────────────────── arrays ─────────────────────────────

#[test]
fn array_indexing() {
    assert_eq!(output("print array(10, 20, 30)[1];"), "20\n");

    let err = error("array(10, 20, 30)[3];");
    assert_eq!(
        err.to_string(),
        "[line 1] Runtime error: Array index 3 out of range for length 3."
    );
}

#[test]
fn array_literals_and_len() {
    assert_eq!(
        output("var a = [1, 2 + 3, \"x\"]; print len(a); print a[1]; print a[4 / 2];"),
        "3\n5\nx\n"
    );
}

#[test]
fn indexing_a_non_array_fails() {
    assert!(error("var s = 1; s[0];")
        .to_string()
        .contains("Can only index arrays"));
}

#[test]
fn arrays_compare_structurally() {
    assert_eq!(
        output("print [1, 2] == [1, 2]; print 1 == 1.0; print nil == false; print [1] != [2];"),
        "true\ntrue\nfalse\ntrue\n"
    );
}

// ───────────────────────────── errors ─────────────────────────────

#[test]
fn every_parse_error_is_reported() {
    let err = error("print ;\nvar = 1;\nprint 1;");

    match err {
        LoxError::Syntax(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected aggregated syntax errors, got {}", other),
    }
}

#[test]
fn deeply_nested_grouping_runs() {
    let printed = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let depth = 10_000;
            output(&format!("print {}1{};", "(".repeat(depth), ")".repeat(depth)))
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(printed, "1\n");
}
