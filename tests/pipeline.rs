//! Whole-pipeline tests: Fractal source in, NASM text out.

use fractal::diag::ErrorHandler;
use fractal::target::Platform;

fn compile(source: &str, platform: Platform) -> String {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.frc");
    std::fs::write(&path, source).unwrap();

    let mut handler = ErrorHandler::new();
    let assembly = fractal::compile(&path, platform, &mut handler, false);
    assert!(
        !handler.has_errors(),
        "unexpected errors: {:?}",
        handler.errors()
    );
    assembly.unwrap()
}

fn compile_error(source: &str, platform: Platform) -> Vec<String> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.frc");
    std::fs::write(&path, source).unwrap();

    let mut handler = ErrorHandler::new();
    let assembly = fractal::compile(&path, platform, &mut handler, false);
    assert!(assembly.is_none(), "compilation unexpectedly succeeded");
    handler
        .errors()
        .iter()
        .map(|diagnostic| diagnostic.message.clone())
        .collect()
}

/// Assert the fragments appear in the output in the given order.
fn assert_order(assembly: &str, fragments: &[&str]) {
    let mut from = 0;
    for fragment in fragments {
        match assembly[from..].find(fragment) {
            Some(index) => from += index + fragment.len(),
            None => panic!("fragment `{fragment}` not found in order in:\n{assembly}"),
        }
    }
}

#[test]
fn empty_main() {
    let assembly = compile("<define><!define>", Platform::Windows);
    assert_order(
        &assembly,
        &[
            "section .text",
            "global main",
            "main:",
            "push rbp",
            "mov rbp, rsp",
            "sub rsp, 0",
            "mov eax, 0",
            "mov rsp, rbp",
            "pop rbp",
            "ret",
        ],
    );
}

#[test]
fn integer_literal_return() {
    let assembly = compile(
        "<define> fn f(): i32 { return 42; } <!define> f();",
        Platform::Windows,
    );
    // f comes first, in declaration order
    assert_order(
        &assembly,
        &[
            "global f",
            "f:",
            "mov eax, 42",
            "mov rsp, rbp",
            "pop rbp",
            "ret",
            "global main",
            "main:",
            // zero arguments is even: 32 shadow bytes + 8 alignment
            "sub rsp, 40",
            "call f",
            "add rsp, 40",
            "mov eax, 0",
        ],
    );
}

#[test]
fn integer_literal_return_macos() {
    let assembly = compile(
        "<define> fn f(): i32 { return 42; } <!define> f();",
        Platform::MacOs,
    );
    assert_order(
        &assembly,
        &[
            "global _f",
            "_f:",
            "mov eax, 42",
            "global _main",
            "_main:",
            // no shadow space on System V: just the 8 alignment bytes
            "sub rsp, 8",
            "call _f",
            "add rsp, 8",
        ],
    );
}

#[test]
fn addition_of_locals() {
    let assembly = compile(
        "<define> fn g(): i32 { let a: i32 = 1; let b: i32 = 2; return a + b; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &[
            "global g",
            "g:",
            "sub rsp, 12",
            "mov DWORD [rbp - 4], 1",
            "mov DWORD [rbp - 8], 2",
            // memory-to-memory copy into the result slot goes through R10
            "mov r10d, DWORD [rbp - 4]",
            "mov DWORD [rbp - 12], r10d",
            // two-operand add with R10 as scratch
            "mov r10d, DWORD [rbp - 8]",
            "add DWORD [rbp - 12], r10d",
            "mov eax, DWORD [rbp - 12]",
            "ret",
        ],
    );
}

#[test]
fn if_else() {
    let assembly = compile(
        "<define> fn h(x: i32): i32 { if x == 0 => return 1; else return 2; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &[
            "global h",
            "h:",
            // parameter homed from ECX into its slot
            "mov DWORD [rbp - 4], ecx",
            // x routed through AX for the compare
            "mov eax, DWORD [rbp - 4]",
            "cmp eax, 0",
            "jne .IF1",
            "mov eax, 1",
            "ret",
            "jmp .IE1",
            ".IF1:",
            "mov eax, 2",
            "ret",
            ".IE1:",
        ],
    );
}

#[test]
fn while_loop_with_break() {
    let assembly = compile(
        "<define> fn k(): i32 { while 1 => { break; } return 0; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &[
            ".LS1:",
            "mov eax, 1",
            "cmp eax, 0",
            "je .LE1",
            // break
            "jmp .LE1",
            "jmp .LS1",
            ".LE1:",
            "mov eax, 0",
        ],
    );
}

#[test]
fn call_with_five_arguments_on_windows() {
    let assembly = compile(
        "<define> external fn p(a:i32,b:i32,c:i32,d:i32,e:i32): i32; <!define> p(1,2,3,4,5);",
        Platform::Windows,
    );
    assert_order(&assembly, &["extern p", "section .text"]);
    assert_order(
        &assembly,
        &[
            // five arguments is odd, so only the 32 shadow bytes
            "sub rsp, 32",
            "mov ecx, 1",
            "mov edx, 2",
            "mov r8d, 3",
            "mov r9d, 4",
            "push 5",
            "call p",
            "add rsp, 40",
        ],
    );
}

#[test]
fn externals_are_mangled_on_macos() {
    let assembly = compile(
        "<define> external fn p(a:i32): i32; <!define> p(1);",
        Platform::MacOs,
    );
    assert_order(&assembly, &["extern _p", "section .text"]);
    assert_order(&assembly, &["mov edi, 1", "call _p"]);
}

#[test]
fn division_uses_cdq_and_idiv() {
    let assembly = compile(
        "<define> fn d(a: i32, b: i32): i32 { return a / b; } <!define>",
        Platform::Windows,
    );
    assert_order(&assembly, &["cdq", "idiv DWORD [rbp - "]);
}

#[test]
fn logical_and_short_circuits() {
    let assembly = compile(
        "<define> fn l(a: i32, b: i32): i32 { if a and b => return 1; return 0; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &["je .CF1", "je .CF1", "jmp .CE1", ".CF1:", ".CE1:"],
    );
}

#[test]
fn logical_or_short_circuits() {
    let assembly = compile(
        "<define> fn l(a: i32, b: i32): i32 { if a or b => return 1; return 0; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &["jne .CT1", "jne .CT1", "jmp .CE1", ".CT1:", ".CE1:"],
    );
}

#[test]
fn if_condition_branches_on_negated_comparison() {
    let assembly = compile(
        "<define> fn c(a: i32, b: i32): i32 { let r: i32 = 0; if a < b => r = 1; return r; } <!define>",
        Platform::Windows,
    );
    assert_order(&assembly, &["cmp eax, DWORD [rbp - 8]", "jge .IE1"]);
}

#[test]
fn comparison_value_sets_a_byte_flag() {
    let assembly = compile(
        "<define> fn c(a: i32, b: i32): i32 { let r: i32 = a < b; return r; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &[
            "cmp eax, DWORD [rbp - 8]",
            // byte flag in a 4-byte slot, widened into the i32 local
            "setl BYTE [rbp - 16]",
            "movsx eax, BYTE [rbp - 16]",
            "mov DWORD [rbp - 12], eax",
        ],
    );
}

#[test]
fn nested_loops_get_distinct_labels() {
    let assembly = compile(
        "<define> fn n(): i32 { loop { while 1 => { break; } break; } return 0; } <!define>",
        Platform::Windows,
    );
    assert_order(&assembly, &[".LS1:", ".LS2:", "je .LE2", ".LE2:", ".LE1:"]);
}

#[test]
fn unary_minus_and_not() {
    let assembly = compile(
        "<define> fn u(a: i32): i32 { return -a; } fn v(a: i32): i32 { return ~a; } <!define>",
        Platform::Windows,
    );
    assert_order(&assembly, &["neg DWORD [rbp - ", "not DWORD [rbp - "]);
}

#[test]
fn i64_locals_use_qword_slots() {
    // integer literals are always i32, so an i64 value can only come from a
    // call; the DWord call result is sign-extended into the QWord slot
    let assembly = compile(
        "<define> external fn big(): i64; fn q(): i64 { let a: i64 = big(); return a; } <!define>",
        Platform::Windows,
    );
    assert_order(
        &assembly,
        &[
            "call big",
            "movsx rax, eax",
            "mov QWORD [rbp - 8], rax",
            "mov rax, QWORD [rbp - 8]",
        ],
    );
}

#[test]
fn lexical_error_stops_the_pipeline() {
    let errors = compile_error("let a = 1 @ 2;", Platform::Windows);
    assert!(errors[0].contains("Unknown Character"));
}

#[test]
fn semantic_error_stops_before_emission() {
    let errors = compile_error("missing();", Platform::Windows);
    assert_eq!(errors[0], "Undefined name 'missing'");
}

#[test]
fn float_literals_are_rejected_by_the_back_end() {
    let errors = compile_error("let f: f32 = 1.5; f = 2.0;", Platform::Windows);
    assert!(errors
        .iter()
        .any(|message| message.contains("not supported by the x86-64 back end")));
}

#[test]
fn emission_is_a_pure_function_of_its_inputs() {
    let source = "<define> fn f(): i32 { return 1; } <!define> f();";
    let first = compile(source, Platform::Windows);
    let second = compile(source, Platform::Windows);
    assert_eq!(first, second);
}
