use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mujs::{State, Value};

use std::cell::Cell;
use std::rc::Rc;

fn bench_loop(c: &mut Criterion) {
    let code = r#"
        var sum = 0;
        for (var i = 0; i < 10000; i = i + 1) {
            sum = sum + i;
        }
        sum;
    "#;

    c.bench_function("loop 10k", |b| {
        b.iter(|| {
            let mut state = State::new();
            black_box(state.eval(code).unwrap())
        })
    });
}

fn bench_fib(c: &mut Criterion) {
    // Iterative fibonacci keeps the call stack shallow
    let code = r#"
        function fib(n) {
            if (n <= 1) return n;
            var a = 0;
            var b = 1;
            for (var i = 2; i <= n; i = i + 1) {
                var next = a + b;
                a = b;
                b = next;
            }
            return b;
        }
        var sum = 0;
        for (var i = 0; i < 200; i = i + 1) {
            sum = sum + fib(25);
        }
        sum;
    "#;

    c.bench_function("fib_iter 200", |b| {
        b.iter(|| {
            let mut state = State::new();
            black_box(state.eval(code).unwrap())
        })
    });
}

fn bench_recursion(c: &mut Criterion) {
    let code = r#"
        function sum(n) {
            if (n <= 0) return 0;
            return n + sum(n - 1);
        }
        var total = 0;
        for (var i = 0; i < 100; i = i + 1) {
            total = total + sum(100);
        }
        total;
    "#;

    c.bench_function("recursion 100x100", |b| {
        b.iter(|| {
            let mut state = State::new();
            black_box(state.eval(code).unwrap())
        })
    });
}

fn bench_string_concat(c: &mut Criterion) {
    let code = r#"
        var s = "";
        for (var i = 0; i < 1000; i = i + 1) {
            s = s + "x";
        }
        s === s + "";
    "#;

    c.bench_function("string concat 1k", |b| {
        b.iter(|| {
            let mut state = State::new();
            black_box(state.eval(code).unwrap())
        })
    });
}

fn bench_native_call(c: &mut Criterion) {
    let code = r#"
        for (var i = 0; i < 10000; i = i + 1) {
            tally(i);
        }
    "#;

    let mut state = State::new();
    let total = Rc::new(Cell::new(0.0f64));
    let sink = total.clone();
    state.register("tally", 1, move |frame| {
        sink.set(sink.get() + frame.arg(0).to_number());
        Ok(Value::Undefined)
    });

    c.bench_function("native call 10k", |b| {
        b.iter(|| {
            state.eval(code).unwrap();
            black_box(total.get())
        })
    });
}

fn bench_compile_only(c: &mut Criterion) {
    let code = r#"
        function clamp(x, lo, hi) {
            if (x < lo) return lo;
            if (x > hi) return hi;
            return x;
        }
        var acc = 0;
        for (var i = 0; i < 100; i = i + 1) {
            try {
                acc = acc + clamp(i * 3 % 17, 2, 11);
            } catch (e) {
                acc = -1;
            }
        }
        acc;
    "#;

    c.bench_function("compile only", |b| {
        b.iter(|| black_box(mujs::parser::compile(code).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_loop,
    bench_fib,
    bench_recursion,
    bench_string_concat,
    bench_native_call,
    bench_compile_only,
);

criterion_main!(benches);
