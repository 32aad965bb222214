use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use loginflow_core::{AuthContext, OrganizationId, SessionId};
use loginflow_flow::{resolve_page, LinkBuilder, Step};

fn full_context() -> AuthContext {
    AuthContext::new()
        .with_login_name("admin@example.com")
        .with_session_id(SessionId::new("318236147628392").ok())
        .with_organization(OrganizationId::new("org-acme").ok())
        .with_code("123456")
        .with_submit(true)
}

fn bench_query_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("auth_context_query");
    let query = full_context().to_query();

    group.bench_function("from_query", |b| {
        b.iter(|| AuthContext::from_query(black_box(&query)));
    });
    group.bench_function("to_query", |b| {
        let ctx = full_context();
        b.iter(|| black_box(&ctx).to_query());
    });

    group.finish();
}

fn bench_step_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_page");
    let ctx = full_context();

    for page in Step::ALL.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(page), page, |b, page| {
            b.iter(|| resolve_page(black_box(*page), black_box(&ctx)));
        });
    }

    group.finish();
}

fn bench_next_url(c: &mut Criterion) {
    let links = LinkBuilder::new("/ui/v2/login");
    let ctx = full_context();

    c.bench_function("next_url", |b| {
        b.iter(|| links.next_url(black_box(Step::ChooseMfa), black_box(&ctx)));
    });
}

criterion_group!(benches, bench_query_parsing, bench_step_resolution, bench_next_url);
criterion_main!(benches);
