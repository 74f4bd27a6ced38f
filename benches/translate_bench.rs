//! Translation throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mjit::{translate_str, MjitConfig};

fn bench_translate(c: &mut Criterion) {
    let cfg = MjitConfig::default();

    let mut kernels = String::new();
    for i in 0..50 {
        kernels.push_str(&format!(
            "MFEM_KERNEL void k{i}(const int n, double *x) {{ x[0] = n + {i}; }}\n"
        ));
    }
    c.bench_function("translate_50_kernels", |b| {
        b.iter(|| translate_str(black_box(&kernels), &cfg, "bench.cpp").unwrap())
    });

    let template = "MFEM_TEMPLATE void t(MFEM_RANGE(1-8) const int d, \
                    MFEM_RANGE(1-8) const int q, double *x) { x[0] = d * q; }\n";
    c.bench_function("template_64_specializations", |b| {
        b.iter(|| translate_str(black_box(template), &cfg, "bench.cpp").unwrap())
    });

    let plain = "int f(int a, int b) { return a + b; } // plain\n".repeat(500);
    c.bench_function("copy_through_500_lines", |b| {
        b.iter(|| translate_str(black_box(&plain), &cfg, "bench.cpp").unwrap())
    });
}

criterion_group!(benches, bench_translate);
criterion_main!(benches);
