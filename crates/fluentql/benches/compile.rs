use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fluentql::connection::number_placeholders;
use fluentql::{
    Builder, Connection, Grammar, PostgresGrammar, PostgresProcessor, Processor, QueryResult, Row,
    RowStream, Value,
};
use std::sync::Arc;

/// Compiles only; nothing is ever executed.
struct Offline {
    grammar: Arc<dyn Grammar>,
}

#[async_trait::async_trait]
impl Connection for Offline {
    fn database_name(&self) -> &str {
        "bench"
    }

    fn query_grammar(&self) -> Arc<dyn Grammar> {
        self.grammar.clone()
    }

    fn post_processor(&self) -> Arc<dyn Processor> {
        Arc::new(PostgresProcessor)
    }

    async fn select(&self, _query: &str, _bindings: &[Value], _use_read: bool) -> QueryResult<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn cursor(&self, _query: &str, _bindings: &[Value], _use_read: bool) -> QueryResult<RowStream> {
        Ok(RowStream::from_rows(Vec::new()))
    }

    async fn statement(&self, _query: &str, _bindings: &[Value]) -> QueryResult<bool> {
        Ok(true)
    }

    async fn affecting_statement(&self, _query: &str, _bindings: &[Value]) -> QueryResult<u64> {
        Ok(0)
    }
}

fn connection() -> Arc<dyn Connection> {
    Arc::new(Offline {
        grammar: Arc::new(PostgresGrammar::default()),
    })
}

/// `select * from "t" where "col0" = ? and "col1" = ? ...` with `n` conditions.
fn build_wheres(connection: &Arc<dyn Connection>, n: usize) -> Builder {
    let mut query = fluentql::table(connection, "t");
    for i in 0..n {
        query.where_eq(format!("col{i}"), i as i64);
    }
    query
}

fn bench_compile_wheres(c: &mut Criterion) {
    let connection = connection();
    let mut group = c.benchmark_group("compile/wheres");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut query = build_wheres(&connection, n);
                black_box(query.to_sql().ok());
                black_box(query.get_bindings());
            });
        });
    }

    group.finish();
}

fn bench_compile_where_in(c: &mut Criterion) {
    let connection = connection();
    let mut group = c.benchmark_group("compile/where_in");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let mut query = fluentql::table(&connection, "t");
                let _ = query.where_in("id", values.iter().copied());
                black_box(query.to_sql().ok());
            });
        });
    }

    group.finish();
}

fn bench_compile_joined(c: &mut Criterion) {
    let connection = connection();

    c.bench_function("compile/joined_nested", |b| {
        b.iter(|| {
            let mut query = fluentql::table(&connection, "users");
            query
                .select(["users.id", "users.name", "posts.title"])
                .join("posts", "users.id", "=", "posts.user_id")
                .left_join("comments", "posts.id", "=", "comments.post_id")
                .where_eq("users.active", true);
            let _ = query.where_nested(|q| {
                q.where_("votes", ">", 100)?.or_where_null("votes");
                Ok(())
            });
            let _ = query.order_by("users.created_at", "desc");
            query.limit(20).offset(40);
            black_box(query.to_sql().ok());
        });
    });
}

fn bench_number_placeholders(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/number_placeholders");

    for n in [1, 10, 100] {
        let sql = vec!["?"; n].join(", ");
        let sql = format!("select * from \"t\" where \"id\" in ({sql}) and \"tags\" ?? ?");
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(number_placeholders(sql)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_wheres,
    bench_compile_where_in,
    bench_compile_joined,
    bench_number_placeholders
);
criterion_main!(benches);
