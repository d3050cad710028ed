use super::*;
use crate::processor::{PostgresProcessor, StandardProcessor};
use crate::query::JoinType;
use crate::testing::{self, FakeConnection};
use std::sync::Arc;

fn postgres_with(config: GrammarConfig) -> Builder {
    let connection = FakeConnection::with_parts(
        Arc::new(PostgresGrammar::new(config)),
        Arc::new(PostgresProcessor),
    );
    testing::table(connection, "users").1
}

fn standard_with(config: GrammarConfig) -> Builder {
    let connection = FakeConnection::with_parts(
        Arc::new(StandardGrammar::new(config)),
        Arc::new(StandardProcessor),
    );
    testing::table(connection, "users").1
}

fn pg_users() -> Builder {
    postgres_with(GrammarConfig::default())
}

fn std_users() -> Builder {
    standard_with(GrammarConfig::default())
}

fn values(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// ===== helpers =====

#[test]
fn leading_boolean_is_stripped_once() {
    assert_eq!(remove_leading_boolean(r#"and "a" = ? or "b" = ?"#), r#""a" = ? or "b" = ?"#);
    assert_eq!(remove_leading_boolean(r#"or "a" = ?"#), r#""a" = ?"#);
    assert_eq!(remove_leading_boolean(r#""a" = ?"#), r#""a" = ?"#);
}

#[test]
fn aliases_split_on_the_first_as() {
    assert_eq!(split_alias("users.name as n"), Some(("users.name", "n")));
    assert_eq!(split_alias("users AS u"), Some(("users", "u")));
    assert_eq!(split_alias("users"), None);
    assert!(is_aliased("a as b"));
    assert!(!is_aliased("alias"));
}

#[test]
fn json_path_array_keys() {
    assert_eq!(parse_json_path_array_keys("items[0][1]"), vec!["items", "0", "1"]);
    assert_eq!(parse_json_path_array_keys("name"), vec!["name"]);
}

#[test]
fn integer_literals() {
    assert!(is_integer_literal("0"));
    assert!(is_integer_literal("-12"));
    assert!(!is_integer_literal("012"));
    assert!(!is_integer_literal("1a"));
    assert!(!is_integer_literal(""));
}

#[test]
fn components_concatenate_without_blank_segments() {
    let components = SelectComponents {
        columns: Some("select *".into()),
        from: Some(r#"from "users""#.into()),
        wheres: Some(String::new()),
        orders: Some(String::new()),
        limit: Some("limit 1".into()),
        ..Default::default()
    };
    assert_eq!(components.concatenate(), r#"select * from "users" limit 1"#);
}

// ===== wrapping =====

#[test]
fn wraps_identifiers() {
    let grammar = StandardGrammar::default();
    assert_eq!(grammar.wrap_str("users.name as n"), r#""users"."name" as "n""#);
    assert_eq!(grammar.wrap_str("*"), "*");
    assert_eq!(grammar.wrap_str("users.*"), r#""users".*"#);
    assert_eq!(grammar.wrap_str(r#"we"ird"#), r#""we""ird""#);
    assert_eq!(
        grammar.wrap(&Column::Raw(Expression::new("count(*)"))),
        "count(*)"
    );
}

#[test]
fn table_prefix_applies_to_tables_and_aliases() {
    let grammar = StandardGrammar::new(GrammarConfig::new().with_table_prefix("app_"));
    assert_eq!(grammar.wrap_table_str("users"), r#""app_users""#);
    assert_eq!(grammar.wrap_table_str("users as u"), r#""app_users" as "app_u""#);
    assert_eq!(grammar.wrap_table_str("public.users"), r#""public"."app_users""#);
    assert_eq!(grammar.wrap_str("users.id"), r#""app_users"."id""#);
}

#[test]
fn standard_json_selector_uses_json_value() {
    let grammar = StandardGrammar::default();
    assert_eq!(
        grammar.wrap_str("options->language"),
        r#"json_value("options", '$."language"')"#
    );
    assert_eq!(
        grammar.wrap_str("options->items[0]"),
        r#"json_value("options", '$."items"[0]')"#
    );
}

#[test]
fn postgres_json_selector_uses_arrows() {
    let grammar = PostgresGrammar::default();
    assert_eq!(grammar.wrap_str("options->language"), r#""options"->>'language'"#);
    assert_eq!(
        grammar.wrap_str("options->languages->0"),
        r#""options"->'languages'->>0"#
    );
    assert_eq!(
        grammar.wrap_str("users.options->theme"),
        r#""users"."options"->>'theme'"#
    );
}

// ===== escaping =====

#[test]
fn escapes_literals_per_dialect() {
    let standard = StandardGrammar::default();
    let postgres = PostgresGrammar::default();

    assert_eq!(standard.escape(&Value::Bool(true)), "1");
    assert_eq!(postgres.escape(&Value::Bool(true)), "true");
    assert_eq!(standard.escape(&Value::Null), "null");
    assert_eq!(standard.escape(&Value::from("it's")), "'it''s'");
    assert_eq!(standard.escape(&Value::Bytes(vec![0xde, 0xad])), "x'dead'");
    assert_eq!(postgres.escape(&Value::Bytes(vec![0xde, 0xad])), r"'\xdead'::bytea");
    assert_eq!(
        postgres.escape(&Value::Enum(Box::new(Value::from("admin")))),
        "'admin'"
    );
}

#[test]
fn raw_sql_leaves_quoted_question_marks_alone() {
    let grammar = StandardGrammar::default();
    let sql = grammar.substitute_bindings_into_raw_sql(
        "select * from t where a = ? and b = '?' and c = ?",
        &[Value::Int(1), Value::from("x")],
    );
    assert_eq!(sql, "select * from t where a = 1 and b = '?' and c = 'x'");
}

#[test]
fn postgres_question_mark_operators_survive_raw_sql() {
    let mut q = pg_users();
    q.where_("tags", "?", "rust").unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "tags" ?? ?"#);
    assert_eq!(
        q.to_raw_sql().unwrap(),
        r#"select * from "users" where "tags" ? 'rust'"#
    );
}

#[test]
fn question_mark_operator_in_having_is_not_a_placeholder() {
    let mut q = pg_users();
    q.group_by(["tags"]).having("tags", "?", "admin").unwrap();
    let sql = q.to_sql().unwrap();
    assert_eq!(
        sql,
        r#"select * from "users" group by "tags" having "tags" ?? ?"#
    );

    let numbered = crate::connection::number_placeholders(&sql);
    assert_eq!(
        numbered,
        r#"select * from "users" group by "tags" having "tags" ? $1"#
    );
    assert_eq!(numbered.matches('$').count(), q.get_bindings().len());
}

#[test]
fn question_mark_operators_are_escaped_everywhere() {
    let mut q = pg_users();
    q.where_column("roles", "?|", "wanted")
        .where_date("created_at", "?", "2024-01-01")
        .unwrap()
        .where_json_length("tags", "?&", 2)
        .unwrap();
    let sql = q.to_sql().unwrap();
    assert_eq!(
        sql,
        r#"select * from "users" where "roles" ??| "wanted" and "created_at"::date ?? ? and jsonb_array_length(("tags")::jsonb) ??& ?"#
    );
    assert_eq!(
        crate::connection::number_placeholders(&sql).matches('$').count(),
        q.get_bindings().len()
    );
}

// ===== select =====

#[test]
fn standard_distinct() {
    let mut q = std_users();
    q.distinct().select(["name"]);
    assert_eq!(q.to_sql().unwrap(), r#"select distinct "name" from "users""#);
}

#[test]
fn bitwise_operators_compile_to_boolean_casts() {
    let mut q = pg_users();
    q.where_("flags", "&", 4).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where ("flags" & ?)::bool"#);
}

#[test]
fn custom_operators_are_accepted() {
    let mut q = postgres_with(GrammarConfig::new().with_custom_operators(["@-@"]));
    q.where_("path", "@-@", 10).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "path" @-@ ?"#);

    let mut q = pg_users();
    q.where_("path", "@-@", Value::Null).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "path" = ?"#);
    assert_eq!(q.get_bindings(), vec![Value::from("@-@")]);
}

#[test]
fn standard_case_sensitive_like_is_unsupported() {
    let mut q = std_users();
    q.where_like("name", "A%", true);
    assert!(matches!(q.to_sql(), Err(QueryError::Unsupported(_))));

    let mut q = std_users();
    q.where_like("name", "a%", false);
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" where "name" like ?"#);
}

#[test]
fn date_parts() {
    let mut q = pg_users();
    q.where_date("created_at", "=", "2024-01-02")
        .unwrap()
        .where_year("created_at", ">", 2020)
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where "created_at"::date = ? and extract(year from "created_at") > ?"#
    );

    let mut q = std_users();
    q.where_month("created_at", "=", 3).unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where month("created_at") = ?"#
    );
    assert_eq!(q.get_bindings(), vec![Value::from("03")]);
}

#[test]
fn postgres_fulltext() {
    let mut q = pg_users();
    q.where_fulltext(["bio"], "rust", FulltextOptions::default())
        .or_where_fulltext(
            ["title", "body"],
            "async io",
            FulltextOptions::default().language("german").mode("websearch"),
        );
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where (to_tsvector('english', "bio")) @@ plainto_tsquery('english', ?) or (to_tsvector('german', "title") || to_tsvector('german', "body")) @@ websearch_to_tsquery('german', ?)"#
    );
}

#[test]
fn fulltext_is_unsupported_without_a_dialect() {
    let mut q = std_users();
    q.where_fulltext(["bio"], "rust", FulltextOptions::default());
    assert!(matches!(q.to_sql(), Err(QueryError::Unsupported(_))));
}

#[test]
fn postgres_json_operations() {
    let mut q = pg_users();
    q.where_json_contains("options->languages", Value::Array(vec![Value::from("en")]))
        .where_json_contains_key("options->theme")
        .where_json_length("options->languages", ">", 1)
        .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where ("options"->'languages')::jsonb @> ? and coalesce(("options")::jsonb ?? 'theme', false) and jsonb_array_length(("options"->'languages')::jsonb) > ?"#
    );
    assert_eq!(
        q.get_bindings(),
        vec![Value::from(r#"["en"]"#), Value::Int(1)]
    );
}

#[test]
fn postgres_json_contains_key_with_an_index() {
    let mut q = pg_users();
    q.where_json_contains_key("options->languages[1]");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" where case when jsonb_typeof(("options"->'languages')::jsonb) = 'array' then jsonb_array_length(("options"->'languages')::jsonb) >= 2 else false end"#
    );
}

#[test]
fn json_overlaps_is_unsupported() {
    let mut q = pg_users();
    q.where_json_overlaps("options->languages", Value::Array(vec![Value::from("en")]));
    assert!(matches!(q.to_sql(), Err(QueryError::Unsupported(_))));
}

#[test]
fn lateral_joins() {
    let mut q = pg_users();
    q.join_lateral(
        |q: &mut Builder| -> QueryResult<()> {
            q.from("posts")
                .where_column("posts.user_id", "=", "users.id")
                .limit(3);
            Ok(())
        },
        "recent",
    )
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" inner join lateral (select * from "posts" where "posts"."user_id" = "users"."id" limit 3) as "recent" on true"#
    );

    let mut q = std_users();
    q.join_lateral(
        |q: &mut Builder| -> QueryResult<()> {
            q.from("posts");
            Ok(())
        },
        "recent",
    )
    .unwrap();
    assert!(matches!(q.to_sql(), Err(QueryError::Unsupported(_))));
}

#[test]
fn nested_join_constraints() {
    let mut q = pg_users();
    q.join_with("contacts", JoinType::Inner, |join| {
        join.on("users.id", "=", "contacts.user_id")
            .or_on_nested(|nested| {
                nested.on("users.email", "=", "contacts.email");
                nested.where_null("contacts.user_id");
                Ok(())
            })?;
        Ok(())
    })
    .unwrap();
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from "users" inner join "contacts" on "users"."id" = "contacts"."user_id" or ("users"."email" = "contacts"."email" and "contacts"."user_id" is null)"#
    );
}

#[test]
fn union_aggregate_wraps_the_union() {
    let mut q = pg_users();
    q.union(|u: &mut Builder| -> QueryResult<()> {
        u.from("admins");
        Ok(())
    })
    .unwrap();
    q.aggregate = Some(crate::query::Aggregate {
        function: "count".into(),
        columns: vec![Column::from("*")],
    });
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select count(*) as aggregate from ((select * from "users") union (select * from "admins")) as "temp_table""#
    );
}

#[test]
fn group_limit_with_offset() {
    let mut q = pg_users();
    q.group_limit(3, "team_id").offset(1);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"select * from (select *, row_number() over (partition by "team_id") as "group_row" from "users") as "limited_table" where "group_row" <= 4 and "group_row" > 1 order by "group_row""#
    );
}

#[test]
fn shared_lock() {
    let mut q = pg_users();
    q.shared_lock();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users" for share"#);

    let mut q = std_users();
    q.lock_for_update();
    assert_eq!(q.to_sql().unwrap(), r#"select * from "users""#);
}

// ===== writes =====

#[test]
fn insert_without_values_uses_defaults() {
    let q = pg_users();
    let sql = q.grammar().compile_insert(&q, &[]).unwrap();
    assert_eq!(sql, r#"insert into "users" default values"#);
}

#[test]
fn insert_or_ignore() {
    let q = pg_users();
    let rows = vec![values(&[("email", Value::from("a"))])];
    assert_eq!(
        q.grammar().compile_insert_or_ignore(&q, &rows).unwrap(),
        r#"insert into "users" ("email") values (?) on conflict do nothing"#
    );

    let q = std_users();
    assert!(matches!(
        q.grammar().compile_insert_or_ignore(&q, &rows),
        Err(QueryError::Unsupported(_))
    ));
}

#[test]
fn insert_using_a_sub_select() {
    let q = pg_users();
    let sql = q
        .grammar()
        .compile_insert_using(&q, &["email".to_string()], r#"select "email" from "invites""#)
        .unwrap();
    assert_eq!(
        sql,
        r#"insert into "users" ("email") select "email" from "invites""#
    );
}

#[test]
fn postgres_update_with_join_uses_ctid() {
    let mut q = pg_users();
    q.join("posts", "users.id", "=", "posts.user_id")
        .where_eq("posts.draft", true);
    let sql = q
        .grammar()
        .compile_update(&q, &values(&[("votes", Value::Int(0))]))
        .unwrap();
    assert_eq!(
        sql,
        r#"update "users" set "votes" = ? where "ctid" in (select "users"."ctid" from "users" inner join "posts" on "users"."id" = "posts"."user_id" where "posts"."draft" = ?)"#
    );
}

#[test]
fn postgres_update_of_a_json_path() {
    let mut q = pg_users();
    q.where_eq("id", 1);
    let update = values(&[("options->theme", Value::from("dark"))]);
    let sql = q.grammar().compile_update(&q, &update).unwrap();
    assert_eq!(
        sql,
        r#"update "users" set "options" = jsonb_set("options"::jsonb, '{"theme"}', ?) where "id" = ?"#
    );
    let bindings = q
        .grammar()
        .prepare_bindings_for_update(q.get_raw_bindings(), &update);
    assert_eq!(bindings, vec![Value::from(r#""dark""#), Value::Int(1)]);
}

#[test]
fn postgres_update_from() {
    let mut q = pg_users();
    q.join_where("posts", "posts.user_id", "=", 7)
        .unwrap()
        .where_eq("users.active", true);
    let sql = q
        .grammar()
        .compile_update_from(&q, &values(&[("votes", Value::Int(0))]))
        .unwrap();
    assert_eq!(
        sql,
        r#"update "users" set "votes" = ? from "posts" where "users"."active" = ? and "posts"."user_id" = ?"#
    );
}

#[test]
fn standard_update_with_joins() {
    let mut q = std_users();
    q.join("posts", "users.id", "=", "posts.user_id");
    let sql = q
        .grammar()
        .compile_update(&q, &values(&[("votes", Value::Int(0))]))
        .unwrap();
    assert_eq!(
        sql,
        r#"update "users" inner join "posts" on "users"."id" = "posts"."user_id" set "votes" = ?"#
    );
}

#[test]
fn postgres_delete_with_limit_uses_ctid() {
    let mut q = pg_users();
    q.where_eq("a", 1).limit(1);
    assert_eq!(
        q.grammar().compile_delete(&q).unwrap(),
        r#"delete from "users" where "ctid" in (select "users"."ctid" from "users" where "a" = ? limit 1)"#
    );
}

#[test]
fn truncate_per_dialect() {
    let q = std_users();
    let statements = q.grammar().compile_truncate(&q).unwrap();
    assert_eq!(statements, vec![(r#"truncate table "users""#.to_string(), Vec::new())]);

    let q = postgres_with(GrammarConfig::new().with_cascade_truncate(true));
    let statements = q.grammar().compile_truncate(&q).unwrap();
    assert_eq!(statements[0].0, r#"truncate "users" restart identity cascade"#);
}
